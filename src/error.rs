use std::fmt;

/// Kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Course,
    Chapter,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Course => f.write_str("course"),
            Entity::Chapter => f.write_str("chapter"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{kind} {id} not found")]
    NotFound { kind: Entity, id: String },
    #[error("chapter {chapter_id} does not belong to course {course_id}")]
    Mismatch {
        course_id: String,
        chapter_id: String,
    },
    #[error("user {user_id} may not modify course {course_id}")]
    Forbidden { user_id: String, course_id: String },
    #[error("{kind} {id} cannot be published: {reason}")]
    NotPublishable {
        kind: Entity,
        id: String,
        reason: &'static str,
    },
    #[error("store unavailable: {0}")]
    Unavailable(anyhow::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn course_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: Entity::Course,
            id: id.into(),
        }
    }

    pub fn chapter_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: Entity::Chapter,
            id: id.into(),
        }
    }

    /// Whether the failure came from the store rather than from the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Unavailable(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Unavailable(e.into())
    }
}
