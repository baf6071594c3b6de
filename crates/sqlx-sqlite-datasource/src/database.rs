//! Pooled SQLite database backing one named datasource

use crate::Result;
use crate::config::SqliteDatabaseConfig;
use crate::error::Error;
use crate::write_guard::WriteGuard;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{ConnectOptions, Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Returns true for paths that denote an in-memory database
pub(crate) fn is_memory_database(path: &Path) -> bool {
   path.as_os_str() == ":memory:"
}

/// SQLite database with a pool of read-only connections and a single write connection.
///
/// Instances are not cached here; caching per datasource name is the job of
/// [`DataSourceStorage`](crate::DataSourceStorage).
///
/// # Example
///
/// ```no_run
/// use sqlx_sqlite_datasource::SqliteDatabase;
///
/// # async fn example() -> Result<(), sqlx_sqlite_datasource::Error> {
/// let db = SqliteDatabase::connect("default", "app.db", None).await?;
///
/// let rows = sqlx::query("SELECT * FROM users")
///     .fetch_all(db.read_pool()?)
///     .await?;
///
/// let mut writer = db.acquire_writer().await?;
/// sqlx::query("INSERT INTO users (name) VALUES (?)")
///     .bind("Alice")
///     .execute(&mut *writer)
///     .await?;
///
/// db.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqliteDatabase {
   /// Datasource name this database was created for
   name: String,

   /// Pool of read-only connections for concurrent reads
   read_pool: Pool<Sqlite>,

   /// Single read-write connection pool (max_connections=1) for serialized writes
   write_conn: Pool<Sqlite>,

   /// Set on first write
   wal_initialized: AtomicBool,

   closed: AtomicBool,

   path: PathBuf,
}

impl SqliteDatabase {
   /// Open the database file at `path` for the datasource `name`.
   ///
   /// The file is created when missing. WAL mode is enabled when
   /// `acquire_writer()` is first called. Pass `None` as `custom_config`
   /// to use the default pool settings.
   pub async fn connect(
      name: &str,
      path: impl AsRef<Path>,
      custom_config: Option<SqliteDatabaseConfig>,
   ) -> Result<Arc<Self>> {
      let config = custom_config.unwrap_or_default();
      let path = path.as_ref();

      if path.as_os_str().is_empty() {
         return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Database path cannot be empty",
         )));
      }

      // Read-only pool connections cannot create the file, so a short-lived
      // read-write connection creates it first.
      if !path.exists() && !is_memory_database(path) {
         let conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .read_only(false)
            .connect()
            .await?;
         drop(conn);
      }

      let idle_timeout = Some(Duration::from_secs(config.idle_timeout_secs));

      let read_pool = SqlitePoolOptions::new()
         .max_connections(config.max_read_connections)
         .min_connections(0)
         .idle_timeout(idle_timeout)
         .connect_with(SqliteConnectOptions::new().filename(path).read_only(true))
         .await?;

      let write_conn = SqlitePoolOptions::new()
         .max_connections(1)
         .min_connections(0)
         .idle_timeout(idle_timeout)
         .connect_with(SqliteConnectOptions::new().filename(path).read_only(false))
         .await?;

      debug!(datasource = %name, path = %path.display(), "Opened SQLite pools");

      Ok(Arc::new(Self {
         name: name.to_string(),
         read_pool,
         write_conn,
         wal_initialized: AtomicBool::new(false),
         closed: AtomicBool::new(false),
         path: path.to_path_buf(),
      }))
   }

   /// Datasource name this database belongs to
   pub fn name(&self) -> &str {
      &self.name
   }

   /// Location of the database file
   pub fn path(&self) -> &Path {
      &self.path
   }

   pub fn is_closed(&self) -> bool {
      self.closed.load(Ordering::SeqCst)
   }

   /// Get a reference to the connection pool for executing read queries
   pub fn read_pool(&self) -> Result<&Pool<Sqlite>> {
      if self.is_closed() {
         return Err(Error::DatabaseClosed);
      }
      Ok(&self.read_pool)
   }

   /// Acquire exclusive write access to the database
   ///
   /// Only one writer can exist at a time. The first call switches the
   /// database to WAL mode.
   pub async fn acquire_writer(&self) -> Result<WriteGuard> {
      if self.is_closed() {
         return Err(Error::DatabaseClosed);
      }

      let mut conn = self.write_conn.acquire().await?;

      if !self.wal_initialized.load(Ordering::SeqCst) {
         sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&mut *conn)
            .await?;

         // https://www.sqlite.org/wal.html#performance_considerations
         sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&mut *conn)
            .await?;

         self.wal_initialized.store(true, Ordering::SeqCst);
      }

      Ok(WriteGuard::new(&self.name, conn))
   }

   /// Close both pools.
   ///
   /// Waits for outstanding readers to be returned and checkpoints the WAL
   /// when writes happened. Closing twice is harmless.
   pub async fn close(&self) -> Result<()> {
      if self.closed.swap(true, Ordering::SeqCst) {
         return Ok(());
      }

      self.read_pool.close().await;

      if self.wal_initialized.load(Ordering::SeqCst)
         && let Ok(mut conn) = self.write_conn.acquire().await
      {
         let _ = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&mut *conn)
            .await;
      }

      self.write_conn.close().await;

      debug!(datasource = %self.name, "Closed SQLite pools");
      Ok(())
   }
}
