//! Named, lazily created sessions over pooled SQLite datasources.
//!
//! This crate sits between the datasource layer (`sqlx-sqlite-datasource`)
//! and application-level code (e.g., a Tauri plugin). It provides:
//!
//! - [`SessionRegistry`]: one cached [`Session`] per datasource name, created on first use
//! - [`SessionFactory`] / [`DefaultSessionFactory`]: session construction and teardown
//! - [`QuirksRegistry`]: vendor quirks strategies selected by name from configuration
//! - [`SessionBootstrap`]: application hooks run on creation and destruction
//! - [`SessionEvent`] and [`EventSink`]: lifecycle notifications
//! - [`StorageMonitor`]: read-only view of the session cache
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sqlx_sqlite_sessions::{
//!    BroadcastEventSink, DataSourcesConfig, DefaultSessionFactory, SessionRegistry,
//!    SqliteDataSourceFactory,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DataSourcesConfig::from_json(r#"{
//!    "dataSource": { "url": "sqlite:app.db", "connect_on_startup": true },
//!    "dataSources": { "reporting": { "url": "sqlite:reports.db", "quirks": "postgres" } }
//! }"#)?;
//!
//! let events = Arc::new(BroadcastEventSink::default());
//! let mut rx = events.subscribe();
//!
//! let factory = DefaultSessionFactory::new(Arc::new(SqliteDataSourceFactory::new(Arc::new(config))))
//!    .with_event_sink(events.clone());
//! let registry = SessionRegistry::new(Arc::new(factory));
//!
//! registry.connect_on_startup().await?;
//! let session = registry.acquire("reporting").await?;
//! assert_eq!(session.quirks().name(), "postgres");
//!
//! while let Ok(event) = rx.try_recv() {
//!    println!("{} {}", event.kind().as_str(), event.name());
//! }
//!
//! registry.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod error;
pub mod events;
pub mod factory;
pub mod monitor;
pub mod quirks;
pub mod registry;
pub mod session;

pub use bootstrap::{Bootstraps, SessionBootstrap};
pub use error::{BoxError, Error, HookPhase, Result};
pub use events::{BroadcastEventSink, EventSink, NoopEventSink, SessionEvent, SessionEventKind};
pub use factory::{DefaultSessionFactory, SessionFactory};
pub use monitor::{StorageMonitor, StorageSnapshot};
pub use quirks::{
   Db2Quirks, NoQuirks, OracleQuirks, PostgresQuirks, QUIRKS_KEY, Quirks, QuirksConstructor,
   QuirksRegistry,
};
pub use registry::{CONNECT_ON_STARTUP_KEY, SessionRegistry};
pub use session::Session;

// Re-export commonly used types from dependencies
pub use sqlx_sqlite_datasource::{
   ConfigSnapshot, ConfigurationProvider, DEFAULT_DATASOURCE, DataSourceFactory,
   DataSourcesConfig, SqliteDataSourceFactory, SqliteDatabase, SqliteDatabaseConfig,
};
pub use sqlx_sqlite_datasource::Error as DataSourceError;
