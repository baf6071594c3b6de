use std::fmt;
use std::sync::Arc;

use sqlx::{Pool, Sqlite};
use sqlx_sqlite_datasource::{SqliteDatabase, WriteGuard};
use uuid::Uuid;

use crate::quirks::Quirks;

/// Reusable handle to one datasource.
///
/// A session pairs the pooled database of a datasource with the quirks
/// strategy configured for it. The registry hands out `Arc<Session>` clones;
/// every clone refers to the same handle until the datasource is released,
/// after which the pools behind a stale clone report
/// [`DatabaseClosed`](sqlx_sqlite_datasource::Error::DatabaseClosed).
pub struct Session {
   id: Uuid,
   name: String,
   database: Arc<SqliteDatabase>,
   quirks: Arc<dyn Quirks>,
}

impl Session {
   pub fn new(name: impl Into<String>, database: Arc<SqliteDatabase>, quirks: Arc<dyn Quirks>) -> Self {
      Self {
         id: Uuid::new_v4(),
         name: name.into(),
         database,
         quirks,
      }
   }

   /// Unique id of this handle; a re-created session gets a new one
   pub fn id(&self) -> Uuid {
      self.id
   }

   /// Datasource name
   pub fn name(&self) -> &str {
      &self.name
   }

   pub fn database(&self) -> &Arc<SqliteDatabase> {
      &self.database
   }

   pub fn quirks(&self) -> &dyn Quirks {
      self.quirks.as_ref()
   }

   /// Pool for read queries
   pub fn read_pool(&self) -> sqlx_sqlite_datasource::Result<&Pool<Sqlite>> {
      self.database.read_pool()
   }

   /// Exclusive writer for write queries
   pub async fn acquire_writer(&self) -> sqlx_sqlite_datasource::Result<WriteGuard> {
      self.database.acquire_writer().await
   }
}

impl fmt::Debug for Session {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Session")
         .field("id", &self.id)
         .field("name", &self.name)
         .field("path", &self.database.path())
         .field("quirks", &self.quirks.name())
         .finish()
   }
}
