use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// A course as stored; `user_id` is the owning teacher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<f64>,
    pub category_id: Option<String>,
    pub is_published: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Chapter {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    /// Order within the course. Progress and publication ignore it.
    pub position: i64,
    pub is_published: bool,
    pub is_free: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Chapter {
    /// First missing piece that keeps this chapter from being published.
    pub fn publish_blocker(&self) -> Option<&'static str> {
        fn blank(s: &Option<String>) -> bool {
            s.as_deref().is_none_or(|s| s.trim().is_empty())
        }
        if self.title.trim().is_empty() {
            Some("missing title")
        } else if blank(&self.description) {
            Some("missing description")
        } else if blank(&self.video_url) {
            Some("missing video")
        } else {
            None
        }
    }
}

/// Completion record of one learner for one chapter. A missing row means the
/// chapter is not completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserProgress {
    pub id: String,
    pub user_id: String,
    pub chapter_id: String,
    pub is_completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Grants `user_id` access to `course_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Purchase {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
