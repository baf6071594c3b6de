//! Creation, teardown and per-name storage of pooled SQLite datasources

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::config::{ConfigSnapshot, ConfigurationProvider, SqliteDatabaseConfig};
use crate::database::{SqliteDatabase, is_memory_database};
use crate::{Error, Result};

/// Builds and tears down the pooled database behind a datasource name.
///
/// The trait is object safe so factories can be swapped behind an
/// `Arc<dyn DataSourceFactory>`.
pub trait DataSourceFactory: ConfigurationProvider {
   /// Open the pooled database configured for `name`
   fn create<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Arc<SqliteDatabase>>>;

   /// Close a database previously returned by `create`
   fn destroy<'a>(
      &'a self,
      name: &'a str,
      database: Arc<SqliteDatabase>,
   ) -> BoxFuture<'a, Result<()>>;
}

/// Opens SQLite pools from datasource configuration.
///
/// The database location comes from the `path` key, or from `url` with an
/// optional `sqlite:` / `sqlite://` prefix. `path` wins when both are
/// present. Relative locations are resolved against the base directory when
/// one is set.
pub struct SqliteDataSourceFactory {
   provider: Arc<dyn ConfigurationProvider>,
   base_dir: Option<PathBuf>,
}

impl SqliteDataSourceFactory {
   pub fn new(provider: Arc<dyn ConfigurationProvider>) -> Self {
      Self {
         provider,
         base_dir: None,
      }
   }

   /// Resolve relative database paths against `dir`
   pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
      self.base_dir = Some(dir.into());
      self
   }

   /// Database file location for `name` given its configuration
   pub fn resolve_path(&self, name: &str, config: &ConfigSnapshot) -> Result<PathBuf> {
      let raw = match config.get_str("path") {
         Some(path) if !path.trim().is_empty() => path.trim(),
         _ => config
            .get_str("url")
            .map(|url| {
               let url = url.trim();
               url.strip_prefix("sqlite://")
                  .or_else(|| url.strip_prefix("sqlite:"))
                  .unwrap_or(url)
            })
            .filter(|path| !path.is_empty())
            .ok_or_else(|| Error::MissingPath(name.to_string()))?,
      };

      let path = Path::new(raw);
      match &self.base_dir {
         Some(base) if path.is_relative() && !is_memory_database(path) => Ok(base.join(path)),
         _ => Ok(path.to_path_buf()),
      }
   }
}

impl ConfigurationProvider for SqliteDataSourceFactory {
   fn datasource_names(&self) -> Vec<String> {
      self.provider.datasource_names()
   }

   fn configuration_for(&self, name: &str) -> ConfigSnapshot {
      self.provider.configuration_for(name)
   }
}

impl DataSourceFactory for SqliteDataSourceFactory {
   fn create<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Arc<SqliteDatabase>>> {
      Box::pin(async move {
         if name.trim().is_empty() {
            return Err(Error::BlankName);
         }

         let config = self.configuration_for(name);
         let path = self.resolve_path(name, &config)?;
         let pool_config = SqliteDatabaseConfig::from_snapshot(&config);

         trace!(datasource = %name, ?pool_config, "Creating datasource");
         SqliteDatabase::connect(name, &path, Some(pool_config)).await
      })
   }

   fn destroy<'a>(
      &'a self,
      name: &'a str,
      database: Arc<SqliteDatabase>,
   ) -> BoxFuture<'a, Result<()>> {
      Box::pin(async move {
         trace!(datasource = %name, "Destroying datasource");
         database.close().await
      })
   }
}

/// Holds at most one open pooled database per datasource name.
pub struct DataSourceStorage {
   factory: Arc<dyn DataSourceFactory>,
   databases: RwLock<HashMap<String, Arc<SqliteDatabase>>>,
}

impl DataSourceStorage {
   pub fn new(factory: Arc<dyn DataSourceFactory>) -> Self {
      Self {
         factory,
         databases: RwLock::new(HashMap::new()),
      }
   }

   /// The factory used to open and close databases
   pub fn factory(&self) -> &Arc<dyn DataSourceFactory> {
      &self.factory
   }

   /// Database currently stored for `name`
   pub async fn get(&self, name: &str) -> Option<Arc<SqliteDatabase>> {
      self.databases.read().await.get(name).cloned()
   }

   /// Return the stored database for `name`, opening one through the factory
   /// when none exists.
   ///
   /// Opening happens outside the map lock. When two callers race on the same
   /// name, the loser closes its freshly opened database and returns the
   /// winner's.
   pub async fn get_or_create(&self, name: &str) -> Result<Arc<SqliteDatabase>> {
      if let Some(db) = self.get(name).await {
         return Ok(db);
      }

      let created = self.factory.create(name).await?;

      let mut databases = self.databases.write().await;
      if let Some(existing) = databases.get(name) {
         let existing = Arc::clone(existing);
         drop(databases);

         debug!(datasource = %name, "Datasource created concurrently; discarding duplicate");
         if let Err(e) = self.factory.destroy(name, created).await {
            warn!(datasource = %name, "Failed to close duplicate datasource: {}", e);
         }
         return Ok(existing);
      }

      databases.insert(name.to_string(), Arc::clone(&created));
      Ok(created)
   }

   /// Remove the database stored for `name` and close it.
   ///
   /// Returns `false` when nothing was stored under `name`.
   pub async fn close(&self, name: &str) -> Result<bool> {
      let removed = self.databases.write().await.remove(name);

      match removed {
         Some(db) => {
            self.factory.destroy(name, db).await?;
            Ok(true)
         }
         None => Ok(false),
      }
   }

   /// Names that currently have an open database, sorted
   pub async fn names(&self) -> Vec<String> {
      let mut names: Vec<String> = self.databases.read().await.keys().cloned().collect();
      names.sort();
      names
   }

   pub async fn len(&self) -> usize {
      self.databases.read().await.len()
   }

   pub async fn is_empty(&self) -> bool {
      self.databases.read().await.is_empty()
   }
}
