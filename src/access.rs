use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Chapter, Purchase, UserProgress};
use crate::store::CourseStore;

/// What a learner sees when opening a chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterView {
    /// The chapter; its video reference is cleared while locked.
    pub chapter: Chapter,
    /// Neither free nor purchased.
    pub is_locked: bool,
    /// Next published chapter by position, only for unlocked chapters.
    pub next_chapter: Option<Chapter>,
    pub user_progress: Option<UserProgress>,
    pub purchase: Option<Purchase>,
}

/// Open a published chapter of a published course for `user_id`.
///
/// Free-preview chapters are readable without a purchase; any other chapter
/// is returned locked until the course is bought.
pub async fn chapter_view<S: CourseStore>(
    store: &S,
    user_id: &str,
    course_id: &str,
    chapter_id: &str,
) -> Result<ChapterView> {
    match store.course(course_id).await? {
        Some(course) if course.is_published => {}
        _ => return Err(Error::course_not_found(course_id)),
    }
    let mut chapter = store
        .published_chapter(course_id, chapter_id)
        .await?
        .ok_or_else(|| Error::chapter_not_found(chapter_id))?;
    let purchase = store.purchase(user_id, course_id).await?;
    let is_locked = !chapter.is_free && purchase.is_none();

    let next_chapter = if is_locked {
        chapter.video_url = None;
        None
    } else {
        store.next_published_chapter(course_id, chapter.position).await?
    };
    let user_progress = store.progress(user_id, chapter_id).await?;
    Ok(ChapterView {
        chapter,
        is_locked,
        next_chapter,
        user_progress,
        purchase,
    })
}
