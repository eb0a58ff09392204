use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ReadErrorPolicy;
use crate::error::Result;
use crate::model::Course;
use crate::progress::chapters_progress;
use crate::store::CourseStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseWithProgress {
    #[serde(flatten)]
    pub course: Course,
    pub progress: f64,
    pub published_chapters: usize,
    /// Where a learner opening the course starts.
    pub first_chapter_id: Option<String>,
}

impl CourseWithProgress {
    pub fn is_completed(&self) -> bool {
        self.progress >= 100.0
    }
}

/// Purchased courses of a learner, split by completion. Each purchased course
/// is in exactly one list, in purchase order. A failed read leaves both lists
/// empty under [`ReadErrorPolicy::Degrade`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardCourses {
    pub completed: Vec<CourseWithProgress>,
    pub in_progress: Vec<CourseWithProgress>,
}

impl DashboardCourses {
    pub fn len(&self) -> usize {
        self.completed.len() + self.in_progress.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<CourseWithProgress> for DashboardCourses {
    fn from_iter<I: IntoIterator<Item = CourseWithProgress>>(iter: I) -> Self {
        let (completed, in_progress) = iter.into_iter().partition(CourseWithProgress::is_completed);
        Self {
            completed,
            in_progress,
        }
    }
}

pub async fn partition_dashboard<S: CourseStore>(
    store: &S,
    user_id: &str,
    on_read_error: ReadErrorPolicy,
) -> Result<DashboardCourses> {
    match fetch_dashboard(store, user_id).await {
        Ok(dashboard) => Ok(dashboard),
        Err(e) if on_read_error == ReadErrorPolicy::Degrade && e.is_unavailable() => {
            warn!("dashboard of {user_id} reported as empty: {e}");
            Ok(DashboardCourses::default())
        }
        Err(e) => Err(e),
    }
}

async fn fetch_dashboard<S: CourseStore>(store: &S, user_id: &str) -> Result<DashboardCourses> {
    let courses = store.purchased_courses(user_id).await?;
    let mut entries = Vec::with_capacity(courses.len());
    for course in courses {
        let chapters = store.published_chapters(&course.id).await?;
        let progress = chapters_progress(store, user_id, &chapters).await?;
        entries.push(CourseWithProgress {
            course,
            progress,
            published_chapters: chapters.len(),
            first_chapter_id: chapters.first().map(|chapter| chapter.id.clone()),
        });
    }
    Ok(entries.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::error::Error;
    use crate::store::sqlite::testing::{FailingReads, test_db};

    fn ids(courses: &[CourseWithProgress]) -> Vec<&str> {
        courses.iter().map(|c| c.course.id.as_str()).collect()
    }

    #[tokio::test]
    async fn completed_course_moves_lists() {
        let db = test_db().await;
        db.add_course("c", "teacher", true).await;
        db.add_chapter("c", "a", 1, true).await;
        db.add_chapter("c", "b", 2, true).await;
        db.add_purchase("learner", "c").await;
        db.complete("learner", "a").await;
        let policy = ReadErrorPolicy::Propagate;

        let dashboard = partition_dashboard(&db.store, "learner", policy).await.unwrap();
        assert!(dashboard.completed.is_empty());
        assert_eq!(ids(&dashboard.in_progress), vec!["c"]);
        assert_eq!(dashboard.in_progress[0].progress, 50.0);
        assert_eq!(dashboard.in_progress[0].published_chapters, 2);
        assert_eq!(dashboard.in_progress[0].first_chapter_id.as_deref(), Some("a"));

        db.complete("learner", "b").await;
        let dashboard = partition_dashboard(&db.store, "learner", policy).await.unwrap();
        assert_eq!(ids(&dashboard.completed), vec!["c"]);
        assert!(dashboard.in_progress.is_empty());
    }

    #[tokio::test]
    async fn every_purchase_lands_in_exactly_one_list() {
        let db = test_db().await;
        db.add_course("done", "teacher", true).await;
        db.add_chapter("done", "d1", 1, true).await;
        db.add_course("half", "teacher", true).await;
        db.add_chapter("half", "h1", 1, true).await;
        db.add_chapter("half", "h2", 2, true).await;
        db.add_course("empty", "teacher", false).await;
        db.add_course("not-bought", "teacher", true).await;
        for course in ["done", "half", "empty"] {
            db.add_purchase("learner", course).await;
        }
        db.complete("learner", "d1").await;
        db.complete("learner", "h1").await;

        let dashboard = partition_dashboard(&db.store, "learner", ReadErrorPolicy::Propagate)
            .await
            .unwrap();
        assert_eq!(ids(&dashboard.completed), vec!["done"]);
        assert_eq!(ids(&dashboard.in_progress), vec!["half", "empty"]);
        let empty = &dashboard.in_progress[1];
        assert_eq!(empty.published_chapters, 0);
        assert!(empty.first_chapter_id.is_none());

        let completed: BTreeSet<_> = ids(&dashboard.completed).into_iter().collect();
        let in_progress: BTreeSet<_> = ids(&dashboard.in_progress).into_iter().collect();
        assert!(completed.is_disjoint(&in_progress));
        assert_eq!(completed.len() + in_progress.len(), 3);
        assert_eq!(dashboard.len(), 3);
    }

    #[tokio::test]
    async fn no_purchases_is_empty() {
        let db = test_db().await;
        let dashboard = partition_dashboard(&db.store, "learner", ReadErrorPolicy::Propagate)
            .await
            .unwrap();
        assert!(dashboard.is_empty());
    }

    #[tokio::test]
    async fn read_error_policy() {
        let db = test_db().await;
        db.add_course("c", "teacher", true).await;
        db.add_purchase("learner", "c").await;
        db.close().await;

        let err = partition_dashboard(&db.store, "learner", ReadErrorPolicy::Propagate)
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        let dashboard = partition_dashboard(&db.store, "learner", ReadErrorPolicy::Degrade)
            .await
            .unwrap();
        assert_eq!(dashboard, DashboardCourses::default());
    }

    #[tokio::test]
    async fn degrade_keeps_request_errors() {
        let db = test_db().await;
        let store = FailingReads {
            inner: db.store.clone(),
            error: || Error::Mismatch {
                course_id: "c".into(),
                chapter_id: "a".into(),
            },
        };
        let err = partition_dashboard(&store, "learner", ReadErrorPolicy::Degrade)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Mismatch { .. }));

        let store = FailingReads {
            inner: db.store.clone(),
            error: || sqlx::Error::PoolTimedOut.into(),
        };
        let dashboard = partition_dashboard(&store, "learner", ReadErrorPolicy::Degrade)
            .await
            .unwrap();
        assert!(dashboard.is_empty());
    }

    #[test]
    fn serializes_course_fields_inline() {
        let entry = CourseWithProgress {
            course: Course {
                id: "c".into(),
                user_id: "teacher".into(),
                title: "Rust".into(),
                description: None,
                image_url: None,
                price: Some(9.5),
                category_id: None,
                is_published: true,
                created_at: crate::utils::now_utc(),
                updated_at: crate::utils::now_utc(),
            },
            progress: 50.0,
            published_chapters: 2,
            first_chapter_id: Some("a".into()),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["id"], "c");
        assert_eq!(json["progress"], 50.0);
        assert_eq!(json["published_chapters"], 2);
    }
}
