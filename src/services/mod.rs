pub mod bookmark_service;
pub mod file_service;
pub mod path_mutation_service;
