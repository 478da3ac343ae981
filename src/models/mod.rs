pub mod bookmark;
pub mod file_entry;
