pub mod base;
pub mod disk;
pub mod error_log;

pub use base::StorageError;
pub use disk::{sanitize_file_name, HtmlStorage};
pub use error_log::{ErrorLog, ErrorLogEntry};
