use tracing::warn;

use crate::config::ReadErrorPolicy;
use crate::error::Result;
use crate::model::Chapter;
use crate::store::CourseStore;

/// Percentage of published chapters completed. A course without published
/// chapters is 0% complete.
pub fn completion_percentage(published: usize, completed: usize) -> f64 {
    if published == 0 {
        return 0.0;
    }
    completed.min(published) as f64 / published as f64 * 100.0
}

/// Completion percentage of `user_id` in `course_id`, in `[0, 100]`.
///
/// Only published chapters count, and a chapter without a progress row is not
/// completed. The caller decides whether the learner may see the course.
pub async fn compute_progress<S: CourseStore>(
    store: &S,
    user_id: &str,
    course_id: &str,
    on_read_error: ReadErrorPolicy,
) -> Result<f64> {
    let progress = async {
        let chapters = store.published_chapters(course_id).await?;
        chapters_progress(store, user_id, &chapters).await
    };
    match progress.await {
        Ok(progress) => Ok(progress),
        Err(e) if on_read_error == ReadErrorPolicy::Degrade && e.is_unavailable() => {
            warn!("progress of {user_id} in course {course_id} reported as 0: {e}");
            Ok(0.0)
        }
        Err(e) => Err(e),
    }
}

/// Completion percentage of `user_id` over already fetched published chapters.
pub async fn chapters_progress<S: CourseStore>(
    store: &S,
    user_id: &str,
    chapters: &[Chapter],
) -> Result<f64> {
    if chapters.is_empty() {
        return Ok(0.0);
    }
    let chapter_ids: Vec<String> = chapters.iter().map(|chapter| chapter.id.clone()).collect();
    let completed = store.completed_progress(user_id, &chapter_ids).await?.len();
    Ok(completion_percentage(chapter_ids.len(), completed))
}
