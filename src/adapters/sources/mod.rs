//! External record sources.

pub mod json_file;
pub mod wordpress;

pub use json_file::JsonFileSource;
pub use wordpress::WordPressSource;
