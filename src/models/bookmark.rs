use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORY: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Star,
    Audio,
    Video,
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Star => write!(f, "star"),
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

impl std::str::FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "star" => Ok(Self::Star),
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            _ => Err(format!("unknown collection: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Directory,
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

impl std::str::FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "directory" => Ok(Self::Directory),
            _ => Err(format!("unknown file type: {s}")),
        }
    }
}

/// A tag attached to a sandbox-relative path. `(user, path, collection,
/// category)` is unique across the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub id: String,
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub user: String,
    pub collection: Collection,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBookmark {
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub user: String,
    pub collection: Collection,
    #[serde(default = "default_category")]
    pub category: String,
}

/// Replaces every tag a user holds on `path` with one record per category.
#[derive(Debug, Clone, Deserialize)]
pub struct BookmarkUpdate {
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub collection: Collection,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Field-level edit of a single record; `None` leaves the field as is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookmarkPatch {
    pub path: Option<String>,
    #[serde(rename = "type")]
    pub file_type: Option<FileType>,
    pub collection: Option<Collection>,
    pub category: Option<String>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}
