use crate::data::Database;
use crate::error::AppError;
use crate::scope_path::SandboxRoot;
use crate::services::bookmark_service::BookmarkStore;
use crate::services::file_service::FileStore;
use crate::services::path_mutation_service::PathMutationCoordinator;

/// Shared by every request handler. Cloning is cheap; all clones point at
/// the same store handle and sandbox.
#[derive(Clone)]
pub struct AppState {
    pub files: FileStore,
    pub bookmarks: BookmarkStore,
    pub mutations: PathMutationCoordinator,
    pub user: String,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(sandbox: SandboxRoot, db: Database, user: impl Into<String>) -> Self {
        let files = FileStore::new(sandbox);
        let bookmarks = BookmarkStore::new(db);
        let mutations = PathMutationCoordinator::new(files.clone(), bookmarks.clone());
        Self {
            files,
            bookmarks,
            mutations,
            user: user.into(),
            max_upload_bytes: crate::config::DEFAULT_MAX_UPLOAD_MB
                .saturating_mul(1024 * 1024)
                .try_into()
                .unwrap_or(usize::MAX),
        }
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> (tempfile::TempDir, Self) {
        let dir = tempfile::tempdir().unwrap();
        let state = Self::new(
            SandboxRoot::new(dir.path()).unwrap(),
            Database::open_in_memory().unwrap(),
            "default",
        );
        (dir, state)
    }
}

/// Opens the store and sandbox described by `config`.
pub fn build(config: &crate::config::AppConfig) -> Result<(AppState, Database), AppError> {
    let root = config.sandbox_root_path();
    std::fs::create_dir_all(&root)?;
    let sandbox = SandboxRoot::new(&root)?;
    let db = Database::open(config.database_path())?;
    let state = AppState::new(sandbox, db.clone(), config.default_user.clone())
        .with_max_upload_bytes(config.max_upload_bytes());
    Ok((state, db))
}
