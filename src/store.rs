//! Persistence boundary.
//!
//! The progress, dashboard and publication logic only talks to the database
//! through these two traits. [`sqlite::SqliteStore`] is the production
//! implementation.

pub mod sqlite;

use std::future::Future;

use crate::error::Result;
use crate::model::{Chapter, Course, Purchase, UserProgress};

pub trait CourseStore: Send + Sync {
    type Tx: PublicationTx;

    fn course(&self, course_id: &str) -> impl Future<Output = Result<Option<Course>>> + Send;

    /// Published chapters of a course, ordered by position.
    fn published_chapters(&self, course_id: &str)
    -> impl Future<Output = Result<Vec<Chapter>>> + Send;

    /// Completed progress rows of `user_id`, restricted to `chapter_ids`.
    fn completed_progress(
        &self,
        user_id: &str,
        chapter_ids: &[String],
    ) -> impl Future<Output = Result<Vec<UserProgress>>> + Send;

    /// A published chapter of `course_id`, `None` when missing or a draft.
    fn published_chapter(
        &self,
        course_id: &str,
        chapter_id: &str,
    ) -> impl Future<Output = Result<Option<Chapter>>> + Send;

    /// First published chapter of the course positioned after `position`.
    fn next_published_chapter(
        &self,
        course_id: &str,
        position: i64,
    ) -> impl Future<Output = Result<Option<Chapter>>> + Send;

    /// Progress row of `(user_id, chapter_id)`, completed or not.
    fn progress(
        &self,
        user_id: &str,
        chapter_id: &str,
    ) -> impl Future<Output = Result<Option<UserProgress>>> + Send;

    fn purchase(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> impl Future<Output = Result<Option<Purchase>>> + Send;

    /// Purchased courses in purchase order.
    fn purchased_courses(&self, user_id: &str) -> impl Future<Output = Result<Vec<Course>>> + Send;

    /// Insert or update the completion flag of `(user_id, chapter_id)`.
    fn upsert_progress(
        &self,
        user_id: &str,
        chapter_id: &str,
        is_completed: bool,
    ) -> impl Future<Output = Result<UserProgress>> + Send;

    /// Start a unit of work for publication changes.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx>> + Send;
}

/// Publication changes that must be applied together. Dropping the
/// transaction without [`PublicationTx::commit`] discards every change.
pub trait PublicationTx: Send {
    fn course(&mut self, course_id: &str) -> impl Future<Output = Result<Course>> + Send;

    /// Fails with `NotFound` or `Mismatch` unless the chapter belongs to the course.
    fn chapter(
        &mut self,
        course_id: &str,
        chapter_id: &str,
    ) -> impl Future<Output = Result<Chapter>> + Send;

    /// Set the chapter flag and return the chapter as stored afterwards.
    fn set_chapter_published(
        &mut self,
        course_id: &str,
        chapter_id: &str,
        is_published: bool,
    ) -> impl Future<Output = Result<Chapter>> + Send;

    /// Set the course flag. Returns whether the flag changed.
    fn set_course_published(
        &mut self,
        course_id: &str,
        is_published: bool,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn count_published_chapters(&mut self, course_id: &str)
    -> impl Future<Output = Result<i64>> + Send;

    fn delete_chapter(
        &mut self,
        course_id: &str,
        chapter_id: &str,
    ) -> impl Future<Output = Result<Chapter>> + Send;

    fn commit(self) -> impl Future<Output = Result<()>> + Send;
}
