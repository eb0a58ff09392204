use std::path::PathBuf;

use clap::{Parser, Subcommand};
use course_core::{
    auth::{Identity, OwnerAuthorizer},
    config::Config,
    service::Courses,
    store::sqlite::SqliteStore,
    utils::init_log,
};
use serde::Serialize;
use tracing::error;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "./course.toml")]
    config: PathBuf,

    /// Path to database file, overrides the config
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Directory for daily rotated logs, overrides the config
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// User the command acts for
    #[arg(short, long, default_value = "")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or upgrade the database schema
    Migrate,
    /// Completion percentage of the user in a course
    Progress { course: String },
    /// Open a chapter as the user
    Chapter { course: String, chapter: String },
    /// Purchased courses of the user, split by completion
    Dashboard,
    /// Mark a chapter completed for the user
    Complete {
        chapter: String,
        /// Mark it not completed instead
        #[arg(long)]
        undo: bool,
    },
    UnpublishChapter { course: String, chapter: String },
    PublishChapter { course: String, chapter: String },
    DeleteChapter { course: String, chapter: String },
    PublishCourse { course: String },
    UnpublishCourse { course: String },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let mut config = Config::load(&args.config)?;
    if let Some(database) = args.database {
        config.database = database;
    }
    let _guard = init_log(args.log_dir.or(config.log_dir.clone()))?;

    if let Err(e) = run(config, &args.user, args.command).await {
        error!("command failed: {e:#}");
        return Err(e);
    }
    Ok(())
}

async fn run(config: Config, user: &str, command: Command) -> anyhow::Result<()> {
    if let Some(parent) = config.database.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if user.is_empty() && !matches!(command, Command::Migrate) {
        anyhow::bail!("--user is required for this command");
    }
    let identity = Identity::new(user);
    let store = SqliteStore::connect(&config.database).await?;
    let courses = Courses::new(
        store,
        OwnerAuthorizer::new(config.teacher_ids),
        config.on_read_error,
    );

    match command {
        Command::Migrate => Ok(courses.store().migrate().await?),
        Command::Progress { course } => print_json(&courses.progress(&identity, &course).await?),
        Command::Chapter { course, chapter } => {
            print_json(&courses.chapter(&identity, &course, &chapter).await?)
        }
        Command::Dashboard => print_json(&courses.dashboard(&identity).await?),
        Command::Complete { chapter, undo } => print_json(
            &courses
                .set_chapter_completed(&identity, &chapter, !undo)
                .await?,
        ),
        Command::UnpublishChapter { course, chapter } => {
            print_json(&courses.unpublish_chapter(&identity, &course, &chapter).await?)
        }
        Command::PublishChapter { course, chapter } => {
            print_json(&courses.publish_chapter(&identity, &course, &chapter).await?)
        }
        Command::DeleteChapter { course, chapter } => {
            print_json(&courses.delete_chapter(&identity, &course, &chapter).await?)
        }
        Command::PublishCourse { course } => {
            print_json(&courses.publish_course(&identity, &course).await?)
        }
        Command::UnpublishCourse { course } => {
            print_json(&courses.unpublish_course(&identity, &course).await?)
        }
    }
}
