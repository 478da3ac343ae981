use serde::Serialize;

use crate::error::AppError;
use crate::models::bookmark::{BookmarkRecord, Collection};
use crate::models::file_entry::FileEntry;
use crate::scope_path;
use crate::services::bookmark_service::BookmarkStore;
use crate::services::file_service::FileStore;

/// A bookmark joined with the live stat of the path it points at.
#[derive(Debug, Clone, Serialize)]
pub struct BookmarkedEntry {
    #[serde(flatten)]
    pub entry: FileEntry,
    pub bookmark: BookmarkRecord,
}

/// Pairs filesystem mutations with the bookmark updates that keep stored
/// paths valid. The filesystem change runs first; when it fails nothing else
/// happens. When the bookmark step fails afterwards the filesystem change
/// stays and the error is returned.
#[derive(Clone)]
pub struct PathMutationCoordinator {
    files: FileStore,
    bookmarks: BookmarkStore,
}

impl PathMutationCoordinator {
    pub fn new(files: FileStore, bookmarks: BookmarkStore) -> Self {
        Self { files, bookmarks }
    }

    pub async fn delete_path(&self, path: &str, user: &str) -> Result<(), AppError> {
        self.files.delete(path).await?;
        match self.bookmarks.remove_by_path(&scope_path::normalize(path), user).await {
            Ok(removed) => {
                log::info!("deleted {path}, dropped {removed} bookmark(s)");
                Ok(())
            }
            Err(e) => {
                log::error!("deleted {path} but bookmark cascade failed: {e}");
                Err(e)
            }
        }
    }

    /// Bookmarks follow the path only in rename mode.
    pub async fn move_path(
        &self,
        source: &str,
        target: &str,
        rename: bool,
        user: &str,
    ) -> Result<FileEntry, AppError> {
        let moved = self.files.move_path(source, target, rename).await?;
        if !rename {
            return Ok(moved);
        }
        let source = scope_path::normalize(source);
        match self.bookmarks.rename_path(&source, &moved.path, user).await {
            Ok(renamed) => {
                log::info!("renamed {source} to {}, moved {renamed} bookmark(s)", moved.path);
                Ok(moved)
            }
            Err(e) => {
                log::error!(
                    "renamed {source} to {} but bookmark update failed: {e}",
                    moved.path
                );
                Err(e)
            }
        }
    }

    /// Lists a collection with live stats. Bookmarks whose path can no longer
    /// be stat'ed are removed and left out of the result.
    pub async fn get_collection(
        &self,
        collection: Collection,
        user: &str,
    ) -> Result<Vec<BookmarkedEntry>, AppError> {
        let records = self.bookmarks.list_by_collection(collection, user).await?;
        let mut entries = Vec::with_capacity(records.len());
        for bookmark in records {
            match self.files.stat(&bookmark.path).await {
                Ok(entry) => entries.push(BookmarkedEntry { entry, bookmark }),
                Err(e) => {
                    log::warn!(
                        "dropping stale {collection} bookmark on {}: {e}",
                        bookmark.path
                    );
                    if let Err(e) = self.bookmarks.remove_by_id(&bookmark.id, user).await {
                        if !e.is_not_found() {
                            return Err(e);
                        }
                    }
                }
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Database;
    use crate::models::bookmark::{BookmarkUpdate, FileType, NewBookmark};
    use crate::scope_path::SandboxRoot;

    struct Fixture {
        _dir: tempfile::TempDir,
        db: Database,
        files: FileStore,
        bookmarks: BookmarkStore,
        coordinator: PathMutationCoordinator,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let files = FileStore::new(SandboxRoot::new(dir.path()).unwrap());
        let bookmarks = BookmarkStore::new(db.clone());
        let coordinator = PathMutationCoordinator::new(files.clone(), bookmarks.clone());
        Fixture {
            _dir: dir,
            db,
            files,
            bookmarks,
            coordinator,
        }
    }

    fn tag(path: &str, collection: Collection, category: &str) -> NewBookmark {
        NewBookmark {
            path: path.to_string(),
            file_type: FileType::File,
            user: "default".to_string(),
            collection,
            category: category.to_string(),
        }
    }

    #[tokio::test]
    async fn test_rename_moves_bookmarks() {
        let f = fixture();
        f.files.create_file("a.mp3").await.unwrap();
        f.bookmarks.create(tag("a.mp3", Collection::Star, "default")).await.unwrap();
        f.bookmarks.create(tag("a.mp3", Collection::Audio, "jazz")).await.unwrap();

        f.coordinator
            .move_path("a.mp3", "b.mp3", true, "default")
            .await
            .unwrap();

        assert!(f.bookmarks.list_by_path("a.mp3", "default").await.unwrap().is_empty());
        let moved = f.bookmarks.list_by_path("b.mp3", "default").await.unwrap();
        assert_eq!(moved.len(), 2);
    }

    #[tokio::test]
    async fn test_plain_move_leaves_bookmarks() {
        let f = fixture();
        f.files.create_file("a.mp3").await.unwrap();
        f.files.create_directory("dir").await.unwrap();
        f.bookmarks.create(tag("a.mp3", Collection::Star, "default")).await.unwrap();

        let moved = f
            .coordinator
            .move_path("a.mp3", "dir", false, "default")
            .await
            .unwrap();
        assert_eq!(moved.path, "dir/a.mp3");
        assert_eq!(f.bookmarks.list_by_path("a.mp3", "default").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_move_keeps_bookmarks() {
        let f = fixture();
        f.files.create_file("a.mp3").await.unwrap();
        f.files.create_file("b.mp3").await.unwrap();
        f.bookmarks.create(tag("a.mp3", Collection::Star, "default")).await.unwrap();

        let err = f
            .coordinator
            .move_path("a.mp3", "b.mp3", true, "default")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
        assert_eq!(f.bookmarks.list_by_path("a.mp3", "default").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let f = fixture();
        f.files.create_file("music/a.mp3").await.unwrap();
        f.bookmarks.create(tag("music", Collection::Star, "default")).await.unwrap();
        f.bookmarks.create(tag("music/a.mp3", Collection::Audio, "default")).await.unwrap();

        f.coordinator.delete_path("music", "default").await.unwrap();
        assert!(f.bookmarks.list_by_path("music", "default").await.unwrap().is_empty());
        assert!(f.bookmarks.list_by_path("music/a.mp3", "default").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_metadata() {
        let f = fixture();
        f.bookmarks.create(tag("ghost.txt", Collection::Star, "default")).await.unwrap();
        let err = f.coordinator.delete_path("ghost.txt", "default").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(f.bookmarks.list_by_path("ghost.txt", "default").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_reports_cascade_failure_without_rollback() {
        let f = fixture();
        f.files.create_file("a.txt").await.unwrap();
        f.db.close().unwrap();

        let err = f.coordinator.delete_path("a.txt", "default").await.unwrap_err();
        assert!(matches!(err, AppError::StoreClosed));
        assert!(f.files.stat("a.txt").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_through_alias_cascades() {
        let f = fixture();
        f.files.create_file("docs/a.txt").await.unwrap();
        f.bookmarks
            .create(tag("docs/../docs/a.txt", Collection::Star, "default"))
            .await
            .unwrap();

        f.coordinator
            .delete_path("docs/../docs/a.txt", "default")
            .await
            .unwrap();
        assert!(f
            .bookmarks
            .list_by_path("docs/../docs/a.txt", "default")
            .await
            .unwrap()
            .is_empty());
        assert!(f.bookmarks.list_by_path("docs/a.txt", "default").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rename_through_alias_moves_bookmarks() {
        let f = fixture();
        f.files.create_file("a.txt").await.unwrap();
        f.bookmarks
            .create(tag("docs/../a.txt", Collection::Star, "default"))
            .await
            .unwrap();

        f.coordinator
            .move_path("x/../a.txt", "b.txt", true, "default")
            .await
            .unwrap();
        assert!(f.bookmarks.list_by_path("a.txt", "default").await.unwrap().is_empty());
        assert_eq!(f.bookmarks.list_by_path("b.txt", "default").await.unwrap().len(), 1);

        let entries = f
            .coordinator
            .get_collection(Collection::Star, "default")
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].bookmark.path, "b.txt");
    }

    #[tokio::test]
    async fn test_get_collection_heals_stale_entries() {
        let f = fixture();
        f.files.create_file("live.mp4").await.unwrap();
        f.bookmarks.create(tag("live.mp4", Collection::Video, "default")).await.unwrap();
        f.bookmarks.create(tag("gone.mp4", Collection::Video, "default")).await.unwrap();
        let err = f
            .bookmarks
            .update(
                "default",
                BookmarkUpdate {
                    path: "../outside.mp4".to_string(),
                    file_type: FileType::File,
                    collection: Collection::Video,
                    categories: vec!["default".to_string()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));

        let entries = f
            .coordinator
            .get_collection(Collection::Video, "default")
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry.name, "live.mp4");
        assert_eq!(entries[0].bookmark.path, "live.mp4");

        let remaining = f
            .bookmarks
            .list_by_collection(Collection::Video, "default")
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
    }
}
