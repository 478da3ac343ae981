use std::path::{Component, Path, PathBuf};

use crate::error::AppError;

/// Normalizes a caller-supplied relative path: backslashes become `/`,
/// empty and `.` segments are dropped, leading and trailing slashes go away
/// and `..` cancels the segment before it. Resolves the same way as
/// [`SandboxRoot::resolve`], so both sides agree on one key per location.
/// A `..` with nothing left to cancel is kept, which marks an escape.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let replaced = path.replace('\\', "/");
    for segment in replaced.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            name => segments.push(name),
        }
    }
    segments.join("/")
}

/// [`normalize`]d form of a path that is about to be stored. Paths that
/// climb above the root are refused.
pub fn canonical(path: &str) -> Result<String, AppError> {
    let normalized = normalize(path);
    if normalized == ".." || normalized.starts_with("../") {
        return Err(AppError::PermissionDenied(path.to_string()));
    }
    Ok(normalized)
}

pub fn basename(path: &str) -> String {
    normalize(path)
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// The single base directory every relative path is resolved against.
#[derive(Debug, Clone)]
pub struct SandboxRoot {
    root: PathBuf,
}

impl SandboxRoot {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, AppError> {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Err(AppError::InvalidPath("sandbox root is empty".to_string()));
        }
        let absolute = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        Ok(Self {
            root: lexical_normalize(&absolute),
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Joins `relative` onto the root without touching the filesystem.
    /// An empty path resolves to the root itself. Leading slashes are treated
    /// as relative, so `/etc` lands at `<root>/etc`.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        let mut resolved = self.root.clone();
        for segment in relative.replace('\\', "/").split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    resolved.pop();
                }
                name => resolved.push(name),
            }
        }
        resolved
    }

    /// Computes the path from the root to `absolute`; the target is outside
    /// the sandbox when that path starts with a parent-directory step.
    /// Symlinks are not followed.
    pub fn is_within_sandbox(&self, absolute: &Path) -> bool {
        let target = lexical_normalize(absolute);
        let root: Vec<Component> = self.root.components().collect();
        let target: Vec<Component> = target.components().collect();

        let common = root
            .iter()
            .zip(target.iter())
            .take_while(|(a, b)| a == b)
            .count();

        // Any root component left unmatched means the relative path opens with `..`.
        common == root.len()
    }

    /// Relative POSIX-style path of an absolute path inside the sandbox.
    pub fn relative_of(&self, absolute: &Path) -> Option<String> {
        absolute.strip_prefix(&self.root).ok().map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
    }

    /// Resolves and checks a path that must lie inside the sandbox.
    pub fn authorize(&self, relative: &str) -> Result<PathBuf, AppError> {
        let absolute = self.resolve(relative);
        if !self.is_within_sandbox(&absolute) {
            return Err(AppError::PermissionDenied(relative.to_string()));
        }
        Ok(absolute)
    }

    /// Like [`authorize`](Self::authorize) but refuses the root itself, for
    /// operations that would replace or remove the path.
    pub fn authorize_entry(&self, relative: &str) -> Result<PathBuf, AppError> {
        let absolute = self.authorize(relative)?;
        if absolute == self.root {
            return Err(AppError::PermissionDenied(format!(
                "{relative} (sandbox root)"
            )));
        }
        Ok(absolute)
    }

    /// For creations: the target does not exist yet, so the check applies to
    /// its parent directory.
    pub fn authorize_parent(&self, relative: &str) -> Result<PathBuf, AppError> {
        let absolute = self.resolve(relative);
        let allowed = absolute
            .parent()
            .map(|parent| self.is_within_sandbox(parent))
            .unwrap_or(false);
        if !allowed {
            return Err(AppError::PermissionDenied(relative.to_string()));
        }
        Ok(absolute)
    }
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
