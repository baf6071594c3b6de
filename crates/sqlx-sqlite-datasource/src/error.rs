//! Error types for sqlx-sqlite-datasource

use thiserror::Error;

/// Errors that may occur when creating, using or tearing down a datasource
#[derive(Error, Debug)]
pub enum Error {
   /// IO error when accessing database files. Standard library IO errors
   /// are converted to this variant.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Error from the sqlx library. Standard sqlx errors are converted to this variant
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// Configuration could not be parsed
   #[error("Invalid datasource configuration: {0}")]
   InvalidConfig(#[from] serde_json::Error),

   /// The datasource configuration names no database file
   #[error("Datasource '{0}' does not configure a 'url' or 'path'")]
   MissingPath(String),

   /// Datasource names must not be blank
   #[error("Datasource name must not be blank")]
   BlankName,

   /// Database has been closed and cannot be used
   #[error("Database has been closed")]
   DatabaseClosed,
}
