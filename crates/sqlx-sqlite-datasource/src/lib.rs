//! # sqlx-sqlite-datasource
//!
//! Named SQLite datasources on top of SQLx.
//!
//! ## Core Types
//!
//! - **[`DataSourcesConfig`]**: Datasource configuration (`dataSource` + `dataSources` blocks)
//! - **[`ConfigSnapshot`]**: Immutable key/value configuration resolved for one name
//! - **[`ConfigurationProvider`]**: Lists datasource names and resolves their snapshots
//! - **[`SqliteDatabase`]**: Read pool plus a single-connection write pool
//! - **[`DataSourceFactory`]** / **[`SqliteDataSourceFactory`]**: Open and close pools per name
//! - **[`DataSourceStorage`]**: At most one open pool per datasource name
//! - **[`Error`]**: Error type for datasource operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use sqlx_sqlite_datasource::{DataSourceStorage, DataSourcesConfig, SqliteDataSourceFactory};
//!
//! # async fn example() -> sqlx_sqlite_datasource::Result<()> {
//! let config = DataSourcesConfig::from_json(r#"{ "dataSource": { "url": "sqlite:app.db" } }"#)?;
//! let storage = DataSourceStorage::new(Arc::new(SqliteDataSourceFactory::new(Arc::new(config))));
//!
//! let db = storage.get_or_create("default").await?;
//! let again = storage.get_or_create("default").await?;
//! assert!(Arc::ptr_eq(&db, &again));
//!
//! storage.close("default").await?;
//! # Ok(())
//! # }
//! ```
mod config;
mod database;
mod error;
mod factory;
mod write_guard;

pub use config::{
   ConfigSnapshot, ConfigurationProvider, DEFAULT_DATASOURCE, DataSourcesConfig,
   SqliteDatabaseConfig,
};
pub use database::SqliteDatabase;
pub use error::Error;
pub use factory::{DataSourceFactory, DataSourceStorage, SqliteDataSourceFactory};
pub use write_guard::WriteGuard;

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
