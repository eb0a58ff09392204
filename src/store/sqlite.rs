use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use tracing::info;

use super::{CourseStore, PublicationTx};
use crate::error::{Error, Result};
use crate::model::{Chapter, Course, Purchase, UserProgress};
use crate::utils::now_utc;

const COURSE_COLUMNS: &str = "id, user_id, title, description, image_url, price, category_id, is_published, created_at, updated_at";
const CHAPTER_COLUMNS: &str = "id, course_id, title, description, video_url, position, is_published, is_free, created_at, updated_at";
const PROGRESS_COLUMNS: &str = "id, user_id, chapter_id, is_completed, created_at, updated_at";
const PURCHASE_COLUMNS: &str = "id, user_id, course_id, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pub database: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let database = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(Self::new(database))
    }

    pub fn new(database: SqlitePool) -> Self {
        Self { database }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.database).await?;
        info!("database schema is up to date");
        Ok(())
    }
}

impl CourseStore for SqliteStore {
    type Tx = SqliteTx;

    async fn course(&self, course_id: &str) -> Result<Option<Course>> {
        let course = sqlx::query_as::<_, Course>(&format!(
            "select {COURSE_COLUMNS} from course where id = ?"
        ))
        .bind(course_id)
        .fetch_optional(&self.database)
        .await?;
        Ok(course)
    }

    async fn published_chapters(&self, course_id: &str) -> Result<Vec<Chapter>> {
        let chapters = sqlx::query_as::<_, Chapter>(&format!(
            "select {CHAPTER_COLUMNS} from chapter where course_id = ? and is_published = 1 order by position asc, id asc"
        ))
        .bind(course_id)
        .fetch_all(&self.database)
        .await?;
        Ok(chapters)
    }

    async fn completed_progress(
        &self,
        user_id: &str,
        chapter_ids: &[String],
    ) -> Result<Vec<UserProgress>> {
        if chapter_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "select {PROGRESS_COLUMNS} from user_progress where is_completed = 1 and user_id = "
        ));
        query.push_bind(user_id).push(" and chapter_id in (");
        let mut ids = query.separated(", ");
        for chapter_id in chapter_ids {
            ids.push_bind(chapter_id.as_str());
        }
        ids.push_unseparated(")");
        let progress = query
            .build_query_as::<UserProgress>()
            .fetch_all(&self.database)
            .await?;
        Ok(progress)
    }

    async fn published_chapter(&self, course_id: &str, chapter_id: &str) -> Result<Option<Chapter>> {
        let chapter = sqlx::query_as::<_, Chapter>(&format!(
            "select {CHAPTER_COLUMNS} from chapter where id = ? and course_id = ? and is_published = 1"
        ))
        .bind(chapter_id)
        .bind(course_id)
        .fetch_optional(&self.database)
        .await?;
        Ok(chapter)
    }

    async fn next_published_chapter(&self, course_id: &str, position: i64) -> Result<Option<Chapter>> {
        let chapter = sqlx::query_as::<_, Chapter>(&format!(
            "select {CHAPTER_COLUMNS} from chapter where course_id = ? and is_published = 1 and position > ? \
             order by position asc, id asc limit 1"
        ))
        .bind(course_id)
        .bind(position)
        .fetch_optional(&self.database)
        .await?;
        Ok(chapter)
    }

    async fn progress(&self, user_id: &str, chapter_id: &str) -> Result<Option<UserProgress>> {
        let progress = sqlx::query_as::<_, UserProgress>(&format!(
            "select {PROGRESS_COLUMNS} from user_progress where user_id = ? and chapter_id = ?"
        ))
        .bind(user_id)
        .bind(chapter_id)
        .fetch_optional(&self.database)
        .await?;
        Ok(progress)
    }

    async fn purchase(&self, user_id: &str, course_id: &str) -> Result<Option<Purchase>> {
        let purchase = sqlx::query_as::<_, Purchase>(&format!(
            "select {PURCHASE_COLUMNS} from purchase where user_id = ? and course_id = ?"
        ))
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.database)
        .await?;
        Ok(purchase)
    }

    async fn purchased_courses(&self, user_id: &str) -> Result<Vec<Course>> {
        let courses = sqlx::query_as::<_, Course>(
            "select course.id, course.user_id, course.title, course.description, course.image_url, \
             course.price, course.category_id, course.is_published, course.created_at, course.updated_at \
             from course inner join purchase on purchase.course_id = course.id \
             where purchase.user_id = ? order by purchase.created_at asc, purchase.rowid asc",
        )
        .bind(user_id)
        .fetch_all(&self.database)
        .await?;
        Ok(courses)
    }

    async fn upsert_progress(
        &self,
        user_id: &str,
        chapter_id: &str,
        is_completed: bool,
    ) -> Result<UserProgress> {
        let exists = sqlx::query_scalar::<_, i64>("select count(*) from chapter where id = ?")
            .bind(chapter_id)
            .fetch_one(&self.database)
            .await?;
        if exists == 0 {
            return Err(Error::chapter_not_found(chapter_id));
        }
        let now = now_utc();
        let progress = sqlx::query_as::<_, UserProgress>(&format!(
            "insert into user_progress (id, user_id, chapter_id, is_completed, created_at, updated_at) \
             values (?, ?, ?, ?, ?, ?) \
             on conflict (user_id, chapter_id) do update set \
             is_completed = excluded.is_completed, updated_at = excluded.updated_at \
             returning {PROGRESS_COLUMNS}"
        ))
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(chapter_id)
        .bind(is_completed)
        .bind(now)
        .bind(now)
        .fetch_one(&self.database)
        .await?;
        Ok(progress)
    }

    async fn begin(&self) -> Result<SqliteTx> {
        Ok(SqliteTx {
            tx: self.database.begin().await?,
        })
    }
}

/// A deferred SQLite transaction. Chapter mutations issue their write first so
/// the write lock is held before anything is counted.
pub struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

impl SqliteTx {
    /// Explain why no chapter `chapter_id` exists under `course_id`.
    async fn missing_chapter(&mut self, course_id: &str, chapter_id: &str) -> Result<Error> {
        let course = sqlx::query_scalar::<_, i64>("select count(*) from course where id = ?")
            .bind(course_id)
            .fetch_one(&mut *self.tx)
            .await?;
        if course == 0 {
            return Ok(Error::course_not_found(course_id));
        }
        let chapter = sqlx::query_scalar::<_, i64>("select count(*) from chapter where id = ?")
            .bind(chapter_id)
            .fetch_one(&mut *self.tx)
            .await?;
        if chapter == 0 {
            return Ok(Error::chapter_not_found(chapter_id));
        }
        Ok(Error::Mismatch {
            course_id: course_id.to_string(),
            chapter_id: chapter_id.to_string(),
        })
    }
}

impl PublicationTx for SqliteTx {
    async fn course(&mut self, course_id: &str) -> Result<Course> {
        sqlx::query_as::<_, Course>(&format!(
            "select {COURSE_COLUMNS} from course where id = ?"
        ))
        .bind(course_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| Error::course_not_found(course_id))
    }

    async fn chapter(&mut self, course_id: &str, chapter_id: &str) -> Result<Chapter> {
        let chapter = sqlx::query_as::<_, Chapter>(&format!(
            "select {CHAPTER_COLUMNS} from chapter where id = ? and course_id = ?"
        ))
        .bind(chapter_id)
        .bind(course_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        match chapter {
            Some(chapter) => Ok(chapter),
            None => Err(self.missing_chapter(course_id, chapter_id).await?),
        }
    }

    async fn set_chapter_published(
        &mut self,
        course_id: &str,
        chapter_id: &str,
        is_published: bool,
    ) -> Result<Chapter> {
        // updated_at only moves when the flag actually changes
        let chapter = sqlx::query_as::<_, Chapter>(&format!(
            "update chapter set \
             updated_at = case when is_published = ? then updated_at else ? end, \
             is_published = ? \
             where id = ? and course_id = ? \
             returning {CHAPTER_COLUMNS}"
        ))
        .bind(is_published)
        .bind(now_utc())
        .bind(is_published)
        .bind(chapter_id)
        .bind(course_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        match chapter {
            Some(chapter) => Ok(chapter),
            None => Err(self.missing_chapter(course_id, chapter_id).await?),
        }
    }

    async fn set_course_published(&mut self, course_id: &str, is_published: bool) -> Result<bool> {
        let result = sqlx::query(
            "update course set is_published = ?, updated_at = ? where id = ? and is_published <> ?",
        )
        .bind(is_published)
        .bind(now_utc())
        .bind(course_id)
        .bind(is_published)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        // unchanged: either already in that state or missing
        self.course(course_id).await?;
        Ok(false)
    }

    async fn count_published_chapters(&mut self, course_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "select count(*) from chapter where course_id = ? and is_published = 1",
        )
        .bind(course_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn delete_chapter(&mut self, course_id: &str, chapter_id: &str) -> Result<Chapter> {
        let chapter = sqlx::query_as::<_, Chapter>(&format!(
            "delete from chapter where id = ? and course_id = ? returning {CHAPTER_COLUMNS}"
        ))
        .bind(chapter_id)
        .bind(course_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        match chapter {
            Some(chapter) => Ok(chapter),
            None => Err(self.missing_chapter(course_id, chapter_id).await?),
        }
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::test_db;
    use super::*;

    #[tokio::test]
    async fn migrate_twice_is_fine() {
        let db = test_db().await;
        db.store.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn published_chapters_skip_drafts() {
        let db = test_db().await;
        db.add_course("c", "teacher", true).await;
        db.add_chapter("c", "b", 2, true).await;
        db.add_chapter("c", "a", 1, true).await;
        db.add_chapter("c", "draft", 3, false).await;
        let ids: Vec<_> = db
            .store
            .published_chapters("c")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn completed_progress_filters_by_user_and_chapters() {
        let db = test_db().await;
        db.add_course("c", "teacher", true).await;
        db.add_chapter("c", "a", 1, true).await;
        db.add_chapter("c", "b", 2, true).await;
        db.add_chapter("c", "x", 3, true).await;
        db.complete("learner", "a").await;
        db.complete("learner", "x").await;
        db.complete("other", "b").await;
        db.store.upsert_progress("learner", "b", false).await.unwrap();

        let ids = vec!["a".to_string(), "b".to_string()];
        let progress = db.store.completed_progress("learner", &ids).await.unwrap();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].chapter_id, "a");
        assert!(db.store.completed_progress("learner", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_progress_keeps_one_row() {
        let db = test_db().await;
        db.add_course("c", "teacher", true).await;
        db.add_chapter("c", "a", 1, true).await;
        let first = db.store.upsert_progress("learner", "a", true).await.unwrap();
        let second = db.store.upsert_progress("learner", "a", false).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(!second.is_completed);
        let rows = sqlx::query_scalar::<_, i64>("select count(*) from user_progress")
            .fetch_one(&db.store.database)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn upsert_progress_on_missing_chapter() {
        let db = test_db().await;
        let err = db.store.upsert_progress("learner", "nope", true).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn purchased_courses_in_purchase_order() {
        let db = test_db().await;
        db.add_course("c1", "teacher", true).await;
        db.add_course("c2", "teacher", true).await;
        db.add_course("c3", "teacher", true).await;
        db.add_purchase("learner", "c2").await;
        db.add_purchase("learner", "c1").await;
        db.add_purchase("other", "c3").await;
        let ids: Vec<_> = db
            .store
            .purchased_courses("learner")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["c2", "c1"]);
    }

    #[tokio::test]
    async fn chapter_lookup_distinguishes_missing_and_mismatch() {
        let db = test_db().await;
        db.add_course("c1", "teacher", true).await;
        db.add_course("c2", "teacher", true).await;
        db.add_chapter("c2", "a", 1, true).await;
        let mut tx = db.store.begin().await.unwrap();
        assert!(matches!(
            tx.chapter("missing", "a").await,
            Err(Error::NotFound { kind: crate::error::Entity::Course, .. })
        ));
        assert!(matches!(
            tx.chapter("c1", "missing").await,
            Err(Error::NotFound { kind: crate::error::Entity::Chapter, .. })
        ));
        assert!(matches!(tx.chapter("c1", "a").await, Err(Error::Mismatch { .. })));
        assert_eq!(tx.chapter("c2", "a").await.unwrap().id, "a");
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let db = test_db().await;
        db.add_course("c", "teacher", true).await;
        db.add_chapter("c", "a", 1, true).await;
        {
            let mut tx = db.store.begin().await.unwrap();
            tx.set_chapter_published("c", "a", false).await.unwrap();
            assert!(tx.set_course_published("c", false).await.unwrap());
        }
        assert!(db.chapter("a").await.is_published);
        assert!(db.course("c").await.is_published);
    }

    #[tokio::test]
    async fn unchanged_flag_keeps_updated_at() {
        let db = test_db().await;
        db.add_course("c", "teacher", false).await;
        db.add_chapter("c", "a", 1, false).await;
        let before = db.chapter("a").await;
        let mut tx = db.store.begin().await.unwrap();
        let after = tx.set_chapter_published("c", "a", false).await.unwrap();
        assert!(!tx.set_course_published("c", false).await.unwrap());
        tx.commit().await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn next_published_chapter_skips_drafts() {
        let db = test_db().await;
        db.add_course("c", "teacher", true).await;
        db.add_chapter("c", "a", 1, true).await;
        db.add_chapter("c", "draft", 2, false).await;
        db.add_chapter("c", "d", 4, true).await;
        db.add_chapter("c", "b", 3, true).await;
        let next = db.store.next_published_chapter("c", 1).await.unwrap().unwrap();
        assert_eq!(next.id, "b");
        let next = db.store.next_published_chapter("c", 3).await.unwrap().unwrap();
        assert_eq!(next.id, "d");
        assert!(db.store.next_published_chapter("c", 4).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn published_chapter_hides_drafts_and_foreign_chapters() {
        let db = test_db().await;
        db.add_course("c", "teacher", true).await;
        db.add_course("other", "teacher", true).await;
        db.add_chapter("c", "a", 1, true).await;
        db.add_chapter("c", "draft", 2, false).await;
        assert!(db.store.published_chapter("c", "a").await.unwrap().is_some());
        assert!(db.store.published_chapter("c", "draft").await.unwrap().is_none());
        assert!(db.store.published_chapter("other", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn purchase_and_progress_lookup() {
        let db = test_db().await;
        db.add_course("c", "teacher", true).await;
        db.add_chapter("c", "a", 1, true).await;
        db.add_purchase("learner", "c").await;
        db.store.upsert_progress("learner", "a", false).await.unwrap();
        assert_eq!(
            db.store.purchase("learner", "c").await.unwrap().unwrap().course_id,
            "c"
        );
        assert!(db.store.purchase("other", "c").await.unwrap().is_none());
        let progress = db.store.progress("learner", "a").await.unwrap().unwrap();
        assert!(!progress.is_completed);
        assert!(db.store.progress("other", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn closed_pool_is_unavailable() {
        let db = test_db().await;
        db.close().await;
        let err = db.store.published_chapters("c").await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
