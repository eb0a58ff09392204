use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// What a read operation reports when the store fails underneath it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadErrorPolicy {
    /// Return the store error to the caller.
    #[default]
    Propagate,
    /// Log the error and report zero progress / an empty dashboard.
    Degrade,
}

impl std::str::FromStr for ReadErrorPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "propagate" => Ok(ReadErrorPolicy::Propagate),
            "degrade" => Ok(ReadErrorPolicy::Degrade),
            other => anyhow::bail!("unknown read error policy: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub on_read_error: ReadErrorPolicy,
    /// Users allowed to author courses. Empty means every course owner.
    pub teacher_ids: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from("./database/course.db"),
            log_dir: None,
            on_read_error: ReadErrorPolicy::default(),
            teacher_ids: Vec::new(),
        }
    }
}

impl Config {
    /// Load from a toml file, falling back to defaults when it does not exist,
    /// then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            Self::parse(&content)?
        } else {
            Self::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("parse config")
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        dotenv_loaded(dotenvy::dotenv())?;
        if let Ok(database) = dotenvy::var("COURSE_DATABASE") {
            self.database = PathBuf::from(database);
        }
        if let Ok(policy) = dotenvy::var("COURSE_ON_READ_ERROR") {
            self.on_read_error = policy.parse()?;
        }
        if let Ok(teacher_id) = dotenvy::var("TEACHER_ID") {
            if !teacher_id.is_empty() && !self.teacher_ids.contains(&teacher_id) {
                self.teacher_ids.push(teacher_id);
            }
        }
        Ok(())
    }
}

/// A missing `.env` is fine; an unreadable or malformed one is not.
fn dotenv_loaded(result: Result<PathBuf, dotenvy::Error>) -> anyhow::Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).context("load .env"),
    }
}
