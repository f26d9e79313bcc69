//! SQLite persistence for articles and the per-symbol reference tables.

mod articles;
mod db;
mod types;

pub use db::Database;
pub use types::{Article, ArticleDraft, InsertOutcome, StorageError};
