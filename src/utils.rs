use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing_subscriber::EnvFilter;

/// Current time, as stored in `created_at` / `updated_at` columns.
pub fn now_utc() -> time::OffsetDateTime {
    time::OffsetDateTime::now_utc()
}

/// Initialize logging to stdout, or to a daily rotated file under `log_dir`.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Keep the returned
/// guard alive for as long as logs should be flushed.
pub fn init_log(log_dir: Option<PathBuf>) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber_builder = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true);
    let (non_blocking, guard) = if let Some(log_dir) = log_dir {
        if !log_dir.is_dir() {
            bail!("log path {} is not a directory", log_dir.display());
        }
        let file_appender = tracing_appender::rolling::daily(log_dir, "course_admin.log");
        tracing_appender::non_blocking(file_appender)
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };
    tracing::subscriber::set_global_default(subscriber_builder.with_writer(non_blocking).finish())
        .context("init log failed")?;
    Ok(guard)
}
