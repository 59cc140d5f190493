pub mod models;
mod queries;
mod sqlite;

pub use queries::NewMediaFile;
pub use sqlite::Database;
