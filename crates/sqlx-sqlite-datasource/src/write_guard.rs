//! Exclusive write connection for a datasource

use sqlx::Sqlite;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteConnection;
use std::ops::{Deref, DerefMut};

/// RAII guard over the single write connection of a datasource.
///
/// The connection goes back to the write pool when the guard is dropped.
/// Derefs to `SqliteConnection` so it can be passed to sqlx queries as
/// `&mut *guard`.
#[derive(Debug)]
pub struct WriteGuard {
   datasource: String,
   conn: PoolConnection<Sqlite>,
}

impl WriteGuard {
   pub(crate) fn new(datasource: &str, conn: PoolConnection<Sqlite>) -> Self {
      Self {
         datasource: datasource.to_string(),
         conn,
      }
   }

   /// Name of the datasource the connection belongs to
   pub fn datasource(&self) -> &str {
      &self.datasource
   }
}

impl Deref for WriteGuard {
   type Target = SqliteConnection;

   fn deref(&self) -> &Self::Target {
      &self.conn
   }
}

impl DerefMut for WriteGuard {
   fn deref_mut(&mut self) -> &mut Self::Target {
      &mut self.conn
   }
}
