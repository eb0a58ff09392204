//! Publication state of courses and chapters.
//!
//! A published course must keep at least one published chapter. Removing the
//! last published chapter (by unpublishing or deleting it) unpublishes the
//! course in the same transaction. Publishing a chapter never republishes the
//! course; that is a separate owner action.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Entity, Error, Result};
use crate::model::{Chapter, Course};
use crate::store::{CourseStore, PublicationTx};

/// Result of removing a chapter from the published set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterWithdrawal {
    pub chapter: Chapter,
    /// Whether the course went from published to unpublished.
    pub course_unpublished: bool,
}

/// Unpublish `chapter_id` and unpublish `course_id` if no published chapter
/// remains. Both changes commit together or not at all.
pub async fn on_chapter_unpublished<S: CourseStore>(
    store: &S,
    course_id: &str,
    chapter_id: &str,
) -> Result<ChapterWithdrawal> {
    let mut tx = store.begin().await?;
    let chapter = tx.set_chapter_published(course_id, chapter_id, false).await?;
    let course_unpublished = unpublish_if_no_chapters(&mut tx, course_id).await?;
    tx.commit().await?;
    info!("unpublished chapter {chapter_id} of course {course_id}");
    Ok(ChapterWithdrawal {
        chapter,
        course_unpublished,
    })
}

/// Delete `chapter_id` with the same course recheck as unpublishing.
pub async fn on_chapter_deleted<S: CourseStore>(
    store: &S,
    course_id: &str,
    chapter_id: &str,
) -> Result<ChapterWithdrawal> {
    let mut tx = store.begin().await?;
    let chapter = tx.delete_chapter(course_id, chapter_id).await?;
    let course_unpublished = unpublish_if_no_chapters(&mut tx, course_id).await?;
    tx.commit().await?;
    info!("deleted chapter {chapter_id} of course {course_id}");
    Ok(ChapterWithdrawal {
        chapter,
        course_unpublished,
    })
}

async fn unpublish_if_no_chapters<T: PublicationTx>(tx: &mut T, course_id: &str) -> Result<bool> {
    if tx.count_published_chapters(course_id).await? > 0 {
        return Ok(false);
    }
    let changed = tx.set_course_published(course_id, false).await?;
    if changed {
        info!("course {course_id} has no published chapters left, unpublished");
    }
    Ok(changed)
}

pub async fn publish_chapter<S: CourseStore>(
    store: &S,
    course_id: &str,
    chapter_id: &str,
) -> Result<Chapter> {
    let mut tx = store.begin().await?;
    let chapter = tx.chapter(course_id, chapter_id).await?;
    if let Some(reason) = chapter.publish_blocker() {
        return Err(Error::NotPublishable {
            kind: Entity::Chapter,
            id: chapter_id.to_string(),
            reason,
        });
    }
    let chapter = tx.set_chapter_published(course_id, chapter_id, true).await?;
    tx.commit().await?;
    info!("published chapter {chapter_id} of course {course_id}");
    Ok(chapter)
}

pub async fn publish_course<S: CourseStore>(store: &S, course_id: &str) -> Result<Course> {
    let mut tx = store.begin().await?;
    let course = tx.course(course_id).await?;
    let not_publishable = |reason| Error::NotPublishable {
        kind: Entity::Course,
        id: course_id.to_string(),
        reason,
    };
    if course.description.as_deref().is_none_or(|d| d.trim().is_empty()) {
        return Err(not_publishable("missing description"));
    }
    if tx.count_published_chapters(course_id).await? == 0 {
        return Err(not_publishable("no published chapters"));
    }
    tx.set_course_published(course_id, true).await?;
    let course = tx.course(course_id).await?;
    tx.commit().await?;
    info!("published course {course_id}");
    Ok(course)
}

pub async fn unpublish_course<S: CourseStore>(store: &S, course_id: &str) -> Result<Course> {
    let mut tx = store.begin().await?;
    tx.set_course_published(course_id, false).await?;
    let course = tx.course(course_id).await?;
    tx.commit().await?;
    info!("unpublished course {course_id}");
    Ok(course)
}
