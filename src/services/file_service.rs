use std::fs::Metadata;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tokio::fs;
use tokio::task::JoinSet;
use walkdir::WalkDir;

use crate::error::AppError;
use crate::models::file_entry::{FileEntry, FolderListing};
use crate::scope_path::{self, SandboxRoot};

/// An uploaded file already spooled to a temporary file, waiting to be
/// placed into a directory. The spool is removed on drop unless it was
/// persisted.
#[derive(Debug)]
pub struct IncomingFile {
    pub original_filename: String,
    pub spooled: TempPath,
    pub size: u64,
}

/// Filesystem operations on sandbox-relative paths. Knows nothing about
/// bookmarks.
#[derive(Debug, Clone)]
pub struct FileStore {
    sandbox: SandboxRoot,
}

impl FileStore {
    pub fn new(sandbox: SandboxRoot) -> Self {
        Self { sandbox }
    }

    pub fn sandbox(&self) -> &SandboxRoot {
        &self.sandbox
    }

    async fn metadata(&self, absolute: &Path, path: &str) -> Result<Metadata, AppError> {
        fs::metadata(absolute)
            .await
            .map_err(|e| AppError::from_io(e, path))
    }

    async fn exists(&self, absolute: &Path, path: &str) -> Result<bool, AppError> {
        fs::try_exists(absolute)
            .await
            .map_err(|e| AppError::from_io(e, path))
    }

    fn entry(&self, absolute: &Path, metadata: &Metadata, parent: Option<String>) -> FileEntry {
        let name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = self.sandbox.relative_of(absolute).unwrap_or_default();
        FileEntry::from_metadata(name, path, metadata, parent)
    }

    async fn entry_at(&self, absolute: &Path, path: &str) -> Result<FileEntry, AppError> {
        let metadata = self.metadata(absolute, path).await?;
        Ok(self.entry(absolute, &metadata, None))
    }

    pub async fn stat(&self, path: &str) -> Result<FileEntry, AppError> {
        let absolute = self.sandbox.authorize(path)?;
        self.entry_at(&absolute, path).await
    }

    /// Direct children of a directory, directories first.
    pub async fn list(&self, path: &str) -> Result<Vec<FileEntry>, AppError> {
        let absolute = self.sandbox.authorize(path)?;
        let metadata = self.metadata(&absolute, path).await?;
        if !metadata.is_dir() {
            return Err(AppError::UnsupportedOperation(format!(
                "not a directory: {path}"
            )));
        }

        let parent = self.sandbox.relative_of(&absolute);
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&absolute)
            .await
            .map_err(|e| AppError::from_io(e, path))?;
        while let Some(child) = dir.next_entry().await? {
            let child_path = child.path();
            match fs::metadata(&child_path).await {
                Ok(metadata) => entries.push(self.entry(&child_path, &metadata, parent.clone())),
                Err(e) => log::warn!("skipping {}: {e}", child_path.display()),
            }
        }

        entries.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Ok(entries)
    }

    pub async fn folder(&self, path: &str) -> Result<FolderListing, AppError> {
        let entry = self.stat(path).await?;
        let children = self.list(path).await?;
        Ok(FolderListing { entry, children })
    }

    /// Opens a file for streaming. Picking a download name is up to the caller.
    pub async fn read(&self, path: &str) -> Result<fs::File, AppError> {
        let absolute = self.sandbox.authorize(path)?;
        let metadata = self.metadata(&absolute, path).await?;
        if !metadata.is_file() {
            return Err(AppError::UnsupportedOperation(format!("not a file: {path}")));
        }
        fs::File::open(&absolute)
            .await
            .map_err(|e| AppError::from_io(e, path))
    }

    /// Creates an empty file, along with missing parent directories.
    pub async fn create_file(&self, path: &str) -> Result<FileEntry, AppError> {
        let absolute = self.sandbox.authorize_parent(path)?;
        if self.exists(&absolute, path).await? {
            return Err(AppError::AlreadyExists(path.to_string()));
        }
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::from_io(e, path))?;
        }
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&absolute)
            .await
            .map_err(|e| AppError::from_io(e, path))?;

        log::info!("created file {path}");
        self.entry_at(&absolute, path).await
    }

    /// Non-recursive: the parent directory must already exist.
    pub async fn create_directory(&self, path: &str) -> Result<FileEntry, AppError> {
        let absolute = self.sandbox.authorize_parent(path)?;
        if self.exists(&absolute, path).await? {
            return Err(AppError::AlreadyExists(path.to_string()));
        }
        fs::create_dir(&absolute)
            .await
            .map_err(|e| AppError::from_io(e, path))?;

        log::info!("created directory {path}");
        self.entry_at(&absolute, path).await
    }

    /// Overwrites the content of an existing file.
    pub async fn write(&self, path: &str, data: &[u8]) -> Result<FileEntry, AppError> {
        let absolute = self.sandbox.authorize_entry(path)?;
        let metadata = self.metadata(&absolute, path).await?;
        if !metadata.is_file() {
            return Err(AppError::UnsupportedOperation(format!("not a file: {path}")));
        }
        fs::write(&absolute, data)
            .await
            .map_err(|e| AppError::from_io(e, path))?;

        log::info!("wrote {} bytes to {path}", data.len());
        self.entry_at(&absolute, path).await
    }

    /// Copies `source` into the `target` directory as `target/basename(source)`.
    /// A file collision fails; a directory copy merges into an existing one.
    /// A directory source is placed under `target` as a whole, the same as a
    /// file source, instead of spilling its contents into `target` the way
    /// `cp -r src/. target` does.
    pub async fn copy(&self, source: &str, target: &str) -> Result<FileEntry, AppError> {
        let source_abs = self.sandbox.authorize_entry(source)?;
        let target_abs = self.sandbox.authorize(target)?;
        let source_meta = self.metadata(&source_abs, source).await?;
        let target_meta = self.metadata(&target_abs, target).await?;
        if !target_meta.is_dir() {
            return Err(AppError::UnsupportedOperation(format!(
                "target path should be a directory: {target}"
            )));
        }

        let destination = target_abs.join(file_name(&source_abs, source)?);
        let destination_rel = self.sandbox.relative_of(&destination).unwrap_or_default();

        if source_meta.is_dir() {
            if destination.starts_with(&source_abs) {
                return Err(AppError::UnsupportedOperation(format!(
                    "cannot copy {source} into itself"
                )));
            }
            let (from, to) = (source_abs.clone(), destination.clone());
            let copied = tokio::task::spawn_blocking(move || copy_dir_recursive(&from, &to))
                .await
                .map_err(|e| AppError::General(format!("copy task failed: {e}")))??;
            log::info!("copied directory {source} to {destination_rel} ({copied} files)");
        } else {
            if self.exists(&destination, &destination_rel).await? {
                return Err(AppError::AlreadyExists(destination_rel));
            }
            fs::copy(&source_abs, &destination)
                .await
                .map_err(|e| AppError::from_io(e, source))?;
            log::info!("copied {source} to {destination_rel}");
        }

        self.entry_at(&destination, &destination_rel).await
    }

    /// Without `rename`, `target` must be an existing directory (the source
    /// lands inside it) or, for a file source, an existing file to replace.
    /// With `rename`, `target` is the literal new location and must not exist.
    pub async fn move_path(
        &self,
        source: &str,
        target: &str,
        rename: bool,
    ) -> Result<FileEntry, AppError> {
        let source_abs = self.sandbox.authorize_entry(source)?;
        let source_meta = self.metadata(&source_abs, source).await?;

        let destination = if rename {
            let target_abs = self.sandbox.authorize_entry(target)?;
            if self.exists(&target_abs, target).await? {
                return Err(AppError::AlreadyExists(target.to_string()));
            }
            target_abs
        } else {
            let target_abs = self.sandbox.authorize(target)?;
            let target_meta = self.metadata(&target_abs, target).await?;
            if target_meta.is_dir() {
                target_abs.join(file_name(&source_abs, source)?)
            } else if source_meta.is_dir() {
                return Err(AppError::UnsupportedOperation(
                    "only support moving file to file, folder to folder".to_string(),
                ));
            } else {
                target_abs
            }
        };
        let destination_rel = self.sandbox.relative_of(&destination).unwrap_or_default();

        if destination == source_abs {
            return self.entry_at(&destination, &destination_rel).await;
        }
        if source_meta.is_dir() && destination.starts_with(&source_abs) {
            return Err(AppError::UnsupportedOperation(format!(
                "cannot move {source} into itself"
            )));
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::from_io(e, &destination_rel))?;
        }
        remove_existing(&destination, &destination_rel).await?;
        fs::rename(&source_abs, &destination)
            .await
            .map_err(|e| AppError::from_io(e, source))?;

        log::info!("moved {source} to {destination_rel}");
        self.entry_at(&destination, &destination_rel).await
    }

    /// Recursive delete of a file or directory.
    pub async fn delete(&self, path: &str) -> Result<(), AppError> {
        let absolute = self.sandbox.authorize_entry(path)?;
        let metadata = fs::symlink_metadata(&absolute)
            .await
            .map_err(|e| AppError::from_io(e, path))?;
        let removed = if metadata.is_dir() {
            fs::remove_dir_all(&absolute).await
        } else {
            fs::remove_file(&absolute).await
        };
        removed.map_err(|e| AppError::from_io(e, path))?;

        log::info!("deleted {path}");
        Ok(())
    }

    /// Places a spooled upload into directory `path`, replacing any file of
    /// the same name. The spool is renamed into place; across filesystems it
    /// is copied instead.
    pub async fn upload(&self, path: &str, file: IncomingFile) -> Result<FileEntry, AppError> {
        let dir = self.sandbox.authorize(path)?;
        let metadata = self.metadata(&dir, path).await?;
        if !metadata.is_dir() {
            return Err(AppError::UnsupportedOperation(format!(
                "not a directory: {path}"
            )));
        }

        let IncomingFile {
            original_filename,
            spooled,
            size,
        } = file;
        let name = sanitize_filename(&original_filename)?;
        let destination = dir.join(&name);
        let destination_rel = self.sandbox.relative_of(&destination).unwrap_or_default();
        if let Err(e) = spooled.persist(&destination) {
            log::debug!("rename of upload spool failed ({}), copying", e.error);
            let spooled = e.path;
            fs::copy(&spooled, &destination)
                .await
                .map_err(|e| AppError::from_io(e, &destination_rel))?;
        }

        log::info!("uploaded {destination_rel} ({size} bytes)");
        self.entry_at(&destination, &destination_rel).await
    }

    /// Uploads every file concurrently and waits for all of them. Any failure
    /// fails the whole batch; files that did land stay in place.
    pub async fn upload_all(
        &self,
        path: &str,
        files: Vec<IncomingFile>,
    ) -> Result<Vec<FileEntry>, AppError> {
        let total = files.len();
        let mut tasks = JoinSet::new();
        for file in files {
            let store = self.clone();
            let path = path.to_string();
            tasks.spawn(async move {
                let name = file.original_filename.clone();
                (name, store.upload(&path, file).await)
            });
        }

        let mut uploaded = Vec::with_capacity(total);
        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(entry))) => uploaded.push(entry),
                Ok((name, Err(e))) => {
                    log::warn!("upload of {name} into {path} failed: {e}");
                    failed += 1;
                }
                Err(e) => {
                    log::warn!("upload task into {path} failed: {e}");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(AppError::General(format!(
                "Failed to upload some files ({failed} of {total})"
            )));
        }
        Ok(uploaded)
    }
}

fn file_name(absolute: &Path, path: &str) -> Result<PathBuf, AppError> {
    absolute
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| AppError::InvalidPath(path.to_string()))
}

fn sanitize_filename(name: &str) -> Result<String, AppError> {
    let name = scope_path::basename(name);
    if name.is_empty() || name == ".." {
        return Err(AppError::InvalidPath(format!("bad upload filename: {name:?}")));
    }
    Ok(name)
}

async fn remove_existing(absolute: &Path, path: &str) -> Result<(), AppError> {
    let metadata = match fs::symlink_metadata(absolute).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(AppError::from_io(e, path)),
    };
    let removed = if metadata.is_dir() {
        fs::remove_dir_all(absolute).await
    } else {
        fs::remove_file(absolute).await
    };
    removed.map_err(|e| AppError::from_io(e, path))
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<u64, AppError> {
    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| AppError::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| AppError::General(e.to_string()))?;
        let dest_path = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest_path)?;
        } else {
            std::fs::copy(entry.path(), &dest_path)?;
            copied += 1;
        }
    }
    Ok(copied)
}
