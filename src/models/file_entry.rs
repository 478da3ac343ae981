use serde::{Deserialize, Serialize};

/// One filesystem node, read fresh from metadata on every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_file: bool,
    pub is_directory: bool,
    pub size: u64,
    pub modified_at: Option<String>,
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl FileEntry {
    pub fn from_metadata(
        name: String,
        path: String,
        metadata: &std::fs::Metadata,
        parent: Option<String>,
    ) -> Self {
        Self {
            name,
            path,
            is_file: metadata.is_file(),
            is_directory: metadata.is_dir(),
            size: metadata.len(),
            modified_at: metadata
                .modified()
                .ok()
                .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339()),
            created_at: metadata
                .created()
                .ok()
                .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339()),
            parent,
        }
    }
}

/// A directory's own stat with its direct children nested under it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderListing {
    #[serde(flatten)]
    pub entry: FileEntry,
    pub children: Vec<FileEntry>,
}
