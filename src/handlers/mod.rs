pub mod catalog_handlers;
pub mod file_handlers;
pub mod health_handlers;
pub mod import_handlers;
