use tracing::warn;

use crate::access::{ChapterView, chapter_view};
use crate::auth::{Authorizer, Identity};
use crate::config::ReadErrorPolicy;
use crate::dashboard::{DashboardCourses, partition_dashboard};
use crate::error::{Error, Result};
use crate::model::{Chapter, Course, UserProgress};
use crate::progress::compute_progress;
use crate::publication::{self, ChapterWithdrawal};
use crate::store::CourseStore;

/// Entry points for request handlers. Every call names the identity it acts
/// for; edits are checked against the [`Authorizer`] before touching the store.
pub struct Courses<S, A> {
    store: S,
    authorizer: A,
    on_read_error: ReadErrorPolicy,
}

impl<S: CourseStore, A: Authorizer> Courses<S, A> {
    pub fn new(store: S, authorizer: A, on_read_error: ReadErrorPolicy) -> Self {
        Self {
            store,
            authorizer,
            on_read_error,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn progress(&self, identity: &Identity, course_id: &str) -> Result<f64> {
        compute_progress(&self.store, &identity.user_id, course_id, self.on_read_error).await
    }

    pub async fn dashboard(&self, identity: &Identity) -> Result<DashboardCourses> {
        partition_dashboard(&self.store, &identity.user_id, self.on_read_error).await
    }

    pub async fn chapter(
        &self,
        identity: &Identity,
        course_id: &str,
        chapter_id: &str,
    ) -> Result<ChapterView> {
        chapter_view(&self.store, &identity.user_id, course_id, chapter_id).await
    }

    pub async fn set_chapter_completed(
        &self,
        identity: &Identity,
        chapter_id: &str,
        is_completed: bool,
    ) -> Result<UserProgress> {
        self.store
            .upsert_progress(&identity.user_id, chapter_id, is_completed)
            .await
    }

    pub async fn unpublish_chapter(
        &self,
        identity: &Identity,
        course_id: &str,
        chapter_id: &str,
    ) -> Result<ChapterWithdrawal> {
        self.authorize_edit(identity, course_id).await?;
        publication::on_chapter_unpublished(&self.store, course_id, chapter_id).await
    }

    pub async fn delete_chapter(
        &self,
        identity: &Identity,
        course_id: &str,
        chapter_id: &str,
    ) -> Result<ChapterWithdrawal> {
        self.authorize_edit(identity, course_id).await?;
        publication::on_chapter_deleted(&self.store, course_id, chapter_id).await
    }

    pub async fn publish_chapter(
        &self,
        identity: &Identity,
        course_id: &str,
        chapter_id: &str,
    ) -> Result<Chapter> {
        self.authorize_edit(identity, course_id).await?;
        publication::publish_chapter(&self.store, course_id, chapter_id).await
    }

    pub async fn publish_course(&self, identity: &Identity, course_id: &str) -> Result<Course> {
        self.authorize_edit(identity, course_id).await?;
        publication::publish_course(&self.store, course_id).await
    }

    pub async fn unpublish_course(&self, identity: &Identity, course_id: &str) -> Result<Course> {
        self.authorize_edit(identity, course_id).await?;
        publication::unpublish_course(&self.store, course_id).await
    }

    async fn authorize_edit(&self, identity: &Identity, course_id: &str) -> Result<Course> {
        let course = self
            .store
            .course(course_id)
            .await?
            .ok_or_else(|| Error::course_not_found(course_id))?;
        if !self.authorizer.can_edit_course(identity, &course) {
            warn!("{} tried to edit course {course_id}", identity.user_id);
            return Err(Error::Forbidden {
                user_id: identity.user_id.clone(),
                course_id: course_id.to_string(),
            });
        }
        Ok(course)
    }
}
