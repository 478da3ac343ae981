use crate::models::bookmark::{BookmarkRecord, Collection, FileType};
use crate::scope_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkField {
    User,
    Path,
    FileType,
    Collection,
    Category,
}

impl BookmarkField {
    fn column(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Path => "path",
            Self::FileType => "file_type",
            Self::Collection => "collection",
            Self::Category => "category",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub field: BookmarkField,
    pub value: String,
}

/// Conjunction of equality clauses over bookmark fields. Column names come
/// from [`BookmarkField`] and values are always bound as parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkQuery {
    clauses: Vec<Clause>,
}

impl BookmarkQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: BookmarkField, value: impl Into<String>) -> Self {
        let value = value.into();
        let value = match field {
            BookmarkField::Path => scope_path::normalize(&value),
            _ => value,
        };
        self.clauses.push(Clause { field, value });
        self
    }

    pub fn user(self, user: impl Into<String>) -> Self {
        self.eq(BookmarkField::User, user)
    }

    pub fn path(self, path: impl Into<String>) -> Self {
        self.eq(BookmarkField::Path, path)
    }

    pub fn file_type(self, file_type: FileType) -> Self {
        self.eq(BookmarkField::FileType, file_type.to_string())
    }

    pub fn collection(self, collection: Collection) -> Self {
        self.eq(BookmarkField::Collection, collection.to_string())
    }

    pub fn category(self, category: impl Into<String>) -> Self {
        self.eq(BookmarkField::Category, category)
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Renders `WHERE ...` (empty when there are no clauses) and its values.
    pub(crate) fn to_sql(&self) -> (String, Vec<String>) {
        if self.clauses.is_empty() {
            return (String::new(), Vec::new());
        }
        let conditions: Vec<String> = self
            .clauses
            .iter()
            .enumerate()
            .map(|(i, clause)| format!("{} = ?{}", clause.field.column(), i + 1))
            .collect();
        let values = self.clauses.iter().map(|c| c.value.clone()).collect();
        (format!("WHERE {}", conditions.join(" AND ")), values)
    }

    pub fn matches(&self, record: &BookmarkRecord) -> bool {
        self.clauses.iter().all(|clause| {
            let actual = match clause.field {
                BookmarkField::User => record.user.clone(),
                BookmarkField::Path => record.path.clone(),
                BookmarkField::FileType => record.file_type.to_string(),
                BookmarkField::Collection => record.collection.to_string(),
                BookmarkField::Category => record.category.clone(),
            };
            actual == clause.value
        })
    }
}
