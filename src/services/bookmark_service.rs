use rusqlite::Connection;

use crate::data::query::BookmarkQuery;
use crate::data::{repository, Database};
use crate::error::AppError;
use crate::models::bookmark::{
    BookmarkPatch, BookmarkRecord, BookmarkUpdate, Collection, NewBookmark,
};

/// Owns bookmark records. Each call runs on the blocking pool against the
/// shared store handle; multi-record writes are single transactions.
#[derive(Clone)]
pub struct BookmarkStore {
    db: Database,
}

impl BookmarkStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, AppError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| AppError::General(format!("store task failed: {e}")))?
    }

    pub async fn create(&self, new: NewBookmark) -> Result<BookmarkRecord, AppError> {
        self.run(move |conn| repository::insert_bookmark(conn, &new))
            .await
    }

    pub async fn get(&self, id: &str, user: &str) -> Result<BookmarkRecord, AppError> {
        let (id, user) = (id.to_string(), user.to_string());
        self.run(move |conn| {
            repository::get_bookmark(conn, &id, &user)?
                .ok_or_else(|| AppError::NotFound(format!("bookmark {id}")))
        })
        .await
    }

    /// Replaces every tag `user` holds on `update.path`, whatever its
    /// collection, with one record per category.
    pub async fn update(
        &self,
        user: &str,
        update: BookmarkUpdate,
    ) -> Result<Vec<BookmarkRecord>, AppError> {
        let user = user.to_string();
        let records = self
            .run(move |conn| repository::replace_path_tags(conn, &user, &update))
            .await?;
        log::info!("retagged path with {} bookmark(s)", records.len());
        Ok(records)
    }

    pub async fn patch(
        &self,
        id: &str,
        user: &str,
        patch: BookmarkPatch,
    ) -> Result<BookmarkRecord, AppError> {
        let (id, user) = (id.to_string(), user.to_string());
        self.run(move |conn| repository::update_bookmark(conn, &id, &user, &patch))
            .await
    }

    pub async fn remove(
        &self,
        path: &str,
        collection: Collection,
        category: &str,
        user: &str,
    ) -> Result<(), AppError> {
        let (path, category, user) = (path.to_string(), category.to_string(), user.to_string());
        self.run(move |conn| repository::delete_tag(conn, &user, &path, collection, &category))
            .await
    }

    pub async fn remove_by_id(&self, id: &str, user: &str) -> Result<(), AppError> {
        let (id, user) = (id.to_string(), user.to_string());
        self.run(move |conn| match repository::delete_by_id(conn, &id, &user)? {
            0 => Err(AppError::NotFound(format!("bookmark {id}"))),
            _ => Ok(()),
        })
        .await
    }

    pub async fn list_by_path(
        &self,
        path: &str,
        user: &str,
    ) -> Result<Vec<BookmarkRecord>, AppError> {
        self.query(BookmarkQuery::new().user(user).path(path)).await
    }

    pub async fn list_by_collection(
        &self,
        collection: Collection,
        user: &str,
    ) -> Result<Vec<BookmarkRecord>, AppError> {
        self.query(BookmarkQuery::new().user(user).collection(collection))
            .await
    }

    pub async fn list_categories(&self, user: &str) -> Result<Vec<String>, AppError> {
        let user = user.to_string();
        self.run(move |conn| repository::list_categories(conn, &user))
            .await
    }

    pub async fn query(&self, query: BookmarkQuery) -> Result<Vec<BookmarkRecord>, AppError> {
        self.run(move |conn| repository::query_bookmarks(conn, &query))
            .await
    }

    /// Cascade for a deleted path, including tags below it.
    pub async fn remove_by_path(&self, path: &str, user: &str) -> Result<usize, AppError> {
        let (path, user) = (path.to_string(), user.to_string());
        self.run(move |conn| repository::delete_by_path(conn, &user, &path))
            .await
    }

    /// Follows a rename of `old` to `new`, including tags below it.
    pub async fn rename_path(&self, old: &str, new: &str, user: &str) -> Result<usize, AppError> {
        let (old, new, user) = (old.to_string(), new.to_string(), user.to_string());
        self.run(move |conn| repository::rename_path(conn, &user, &old, &new))
            .await
    }
}
