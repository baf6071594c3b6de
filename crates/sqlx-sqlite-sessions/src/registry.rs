//! Named session registry: one lazily created session per datasource name.

use std::collections::HashMap;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;

use parking_lot::Mutex;
use sqlx_sqlite_datasource::DEFAULT_DATASOURCE;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tracing::{debug, error, info, trace};

use crate::error::BoxError;
use crate::factory::SessionFactory;
use crate::monitor::StorageMonitor;
use crate::session::Session;
use crate::{Error, Result};

/// Configuration key that asks for a session to be opened at startup.
pub const CONNECT_ON_STARTUP_KEY: &str = "connect_on_startup";

/// Per-name state.
///
/// `lifecycle` serializes creation and destruction. Lookups only touch
/// `state`, which is never held across an await, so they never queue behind
/// a pending creation or release.
#[derive(Default)]
struct Slot {
   lifecycle: AsyncMutex<()>,
   state: Mutex<SlotState>,
   /// Signalled when the last `with_session` user leaves
   idle: Notify,
}

#[derive(Default)]
struct SlotState {
   session: Option<Arc<Session>>,
   users: usize,
}

impl Slot {
   fn is_vacant(&self) -> bool {
      self.state.lock().session.is_none()
   }

   /// Cached session, registered as in use
   fn enter(self: &Arc<Self>) -> Option<(Arc<Session>, InUse)> {
      let mut state = self.state.lock();
      let session = Arc::clone(state.session.as_ref()?);
      state.users += 1;
      Some((session, InUse(Arc::clone(self))))
   }

   fn store_and_enter(self: &Arc<Self>, session: Arc<Session>) -> (Arc<Session>, InUse) {
      let mut state = self.state.lock();
      state.session = Some(Arc::clone(&session));
      state.users += 1;
      (session, InUse(Arc::clone(self)))
   }

   /// Wait until no `with_session` call uses the session, then take it out.
   async fn take_when_idle(&self) -> Option<Arc<Session>> {
      loop {
         let mut idle = pin!(self.idle.notified());
         idle.as_mut().enable();

         {
            let mut state = self.state.lock();
            if state.users == 0 {
               return state.session.take();
            }
         }

         idle.await;
      }
   }
}

/// Marks the session of a slot as in use until dropped.
struct InUse(Arc<Slot>);

impl Drop for InUse {
   fn drop(&mut self) {
      let mut state = self.0.state.lock();
      state.users -= 1;
      if state.users == 0 {
         self.0.idle.notify_waiters();
      }
   }
}

/// Owns the sessions of all datasources.
///
/// - `acquire` returns the cached session for a name or creates it through
///   the [`SessionFactory`]. Concurrent acquires of one name create a single
///   session; different names never wait on each other.
/// - `release` destroys and evicts the session; releasing a name with no
///   session is a no-op.
/// - `with_session` runs a callback against the session and wraps every
///   failure into [`Error::Operation`].
///
/// The registry is an ordinary value: construct it once and pass it (usually
/// as `Arc<SessionRegistry>`) to whatever needs database access.
pub struct SessionRegistry {
   factory: Arc<dyn SessionFactory>,
   slots: Mutex<HashMap<String, Arc<Slot>>>,
}

fn validate(name: &str) -> Result<()> {
   if name.trim().is_empty() {
      return Err(Error::InvalidName);
   }
   Ok(())
}

impl SessionRegistry {
   pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
      Self {
         factory,
         slots: Mutex::new(HashMap::new()),
      }
   }

   pub fn factory(&self) -> &Arc<dyn SessionFactory> {
      &self.factory
   }

   fn slot(&self, name: &str) -> Arc<Slot> {
      Arc::clone(self.slots.lock().entry(name.to_string()).or_default())
   }

   fn existing_slot(&self, name: &str) -> Option<Arc<Slot>> {
      self.slots.lock().get(name).cloned()
   }

   /// Forget the slot for `name` once it holds no session and nobody else
   /// references it. Callers drop their own handle first.
   fn prune(&self, name: &str) {
      let mut slots = self.slots.lock();
      if let Some(slot) = slots.get(name)
         && Arc::strong_count(slot) == 1
         && slot.is_vacant()
      {
         slots.remove(name);
      }
   }

   /// Session in `slot` registered as in use, creating it first when the
   /// slot is empty.
   async fn enter_or_create(&self, name: &str, slot: &Arc<Slot>) -> Result<(Arc<Session>, InUse)> {
      if let Some(entered) = slot.enter() {
         return Ok(entered);
      }

      let _lifecycle = slot.lifecycle.lock().await;
      if let Some(entered) = slot.enter() {
         return Ok(entered);
      }

      trace!(datasource = %name, "Creating session");
      let session = self.factory.create(name).await?;
      Ok(slot.store_and_enter(session))
   }

   /// [`enter_or_create`](Self::enter_or_create) on the slot for `name`,
   /// dropping the slot again when creation fails.
   async fn enter(&self, name: &str) -> Result<(Arc<Session>, InUse)> {
      let slot = self.slot(name);
      let entered = self.enter_or_create(name, &slot).await;
      drop(slot);

      if entered.is_err() {
         self.prune(name);
      }
      entered
   }

   /// Session for `name`, created on first use.
   ///
   /// On failure nothing is cached and the next call tries again.
   pub async fn acquire(&self, name: &str) -> Result<Arc<Session>> {
      validate(name)?;
      let (session, _in_use) = self.enter(name).await?;
      Ok(session)
   }

   /// Session for the default datasource
   pub async fn acquire_default(&self) -> Result<Arc<Session>> {
      self.acquire(DEFAULT_DATASOURCE).await
   }

   /// Run `f` with the session for `name`, creating the session when needed.
   ///
   /// Any failure, whether from acquiring the session or from `f` itself, is
   /// returned as [`Error::Operation`] carrying `name` and the original cause.
   ///
   /// A [`release`](Self::release) of the same name waits until `f` has
   /// finished. `f` may acquire or use the session again, but must not
   /// release it.
   ///
   /// ```no_run
   /// # async fn example(registry: &sqlx_sqlite_sessions::SessionRegistry) -> sqlx_sqlite_sessions::Result<()> {
   /// let count: i64 = registry
   ///    .with_session("reporting", |_name, session| async move {
   ///       let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reports")
   ///          .fetch_one(session.read_pool()?)
   ///          .await?;
   ///       Ok::<_, sqlx_sqlite_sessions::BoxError>(count)
   ///    })
   ///    .await?;
   /// # Ok(())
   /// # }
   /// ```
   pub async fn with_session<F, Fut, T, E>(&self, name: &str, f: F) -> Result<T>
   where
      F: FnOnce(String, Arc<Session>) -> Fut,
      Fut: Future<Output = std::result::Result<T, E>>,
      E: Into<BoxError>,
   {
      validate(name).map_err(|e| Error::operation(name, e))?;

      let (session, _in_use) = self
         .enter(name)
         .await
         .map_err(|e| Error::operation(name, e))?;

      debug!(datasource = %name, "Executing statements on datasource");
      f(name.to_string(), session)
         .await
         .map_err(|e| Error::operation(name, e))
   }

   /// [`with_session`](Self::with_session) for the default datasource
   pub async fn with_default_session<F, Fut, T, E>(&self, f: F) -> Result<T>
   where
      F: FnOnce(String, Arc<Session>) -> Fut,
      Fut: Future<Output = std::result::Result<T, E>>,
      E: Into<BoxError>,
   {
      self.with_session(DEFAULT_DATASOURCE, f).await
   }

   /// Destroy and evict the session for `name`.
   ///
   /// Waits for running [`with_session`](Self::with_session) calls on the
   /// same name. Returns `false` when no session existed. The session is
   /// evicted even when teardown reports an error, so a failed release never
   /// leaves a half-destroyed session behind; the error is still returned.
   pub async fn release(&self, name: &str) -> Result<bool> {
      validate(name)?;

      let Some(slot) = self.existing_slot(name) else {
         return Ok(false);
      };

      let released = {
         let _lifecycle = slot.lifecycle.lock().await;
         match slot.take_when_idle().await {
            Some(session) => {
               trace!(datasource = %name, session = %session.id(), "Releasing session");
               self.factory.destroy(name, session).await.map(|()| true)
            }
            None => Ok(false),
         }
      };

      drop(slot);
      self.prune(name);
      released
   }

   /// Release the default datasource
   pub async fn release_default(&self) -> Result<bool> {
      self.release(DEFAULT_DATASOURCE).await
   }

   /// Release every configured datasource and any other name that currently
   /// holds a session.
   ///
   /// All names are attempted even when some fail; the first failure is
   /// returned. Returns the names whose sessions were destroyed.
   pub async fn release_all(&self) -> Result<Vec<String>> {
      let mut names = self.factory.datasource_names();
      for name in self.active_names() {
         if !names.contains(&name) {
            names.push(name);
         }
      }

      let mut released = Vec::new();
      let mut first_error = None;

      for name in names {
         match self.release(&name).await {
            Ok(true) => released.push(name),
            Ok(false) => {}
            Err(e) => {
               error!(datasource = %name, "Failed to release session: {}", e);
               first_error.get_or_insert(e);
            }
         }
      }

      match first_error {
         Some(e) => Err(e),
         None => Ok(released),
      }
   }

   /// Startup hook: acquire every datasource configured with
   /// `connect_on_startup = true`. Returns the names that were connected.
   pub async fn connect_on_startup(&self) -> Result<Vec<String>> {
      let mut connected = Vec::new();

      for name in self.factory.datasource_names() {
         let config = self.factory.configuration_for(&name);
         if config.get_bool(CONNECT_ON_STARTUP_KEY, false) {
            self.acquire(&name).await?;
            info!(datasource = %name, "Connected on startup");
            connected.push(name);
         }
      }

      Ok(connected)
   }

   /// Shutdown hook: release everything
   pub async fn shutdown(&self) -> Result<Vec<String>> {
      let released = self.release_all().await?;
      debug!("Released {} session(s) on shutdown", released.len());
      Ok(released)
   }

   /// Read-only view of this registry's cache
   pub fn monitor(self: &Arc<Self>) -> StorageMonitor {
      StorageMonitor::new(Arc::clone(self))
   }

   /// Whether `name` currently holds a session. Never waits for a pending
   /// creation or release.
   pub fn is_active(&self, name: &str) -> bool {
      self.existing_slot(name).is_some_and(|slot| !slot.is_vacant())
   }

   /// Names that currently hold a session, sorted
   pub fn active_names(&self) -> Vec<String> {
      let mut names: Vec<String> = self
         .slots
         .lock()
         .iter()
         .filter(|(_, slot)| !slot.is_vacant())
         .map(|(name, _)| name.clone())
         .collect();
      names.sort();
      names
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::factory::DefaultSessionFactory;
   use serde_json::json;
   use sqlx_sqlite_datasource::{DataSourcesConfig, SqliteDataSourceFactory};
   use tempfile::TempDir;

   fn registry(temp: &TempDir) -> SessionRegistry {
      let config = DataSourcesConfig::from_value(json!({
         "dataSource": { "path": "main.db" },
         "dataSources": { "broken": { "path": "" } }
      }))
      .unwrap();
      let datasources = SqliteDataSourceFactory::new(Arc::new(config)).with_base_dir(temp.path());
      SessionRegistry::new(Arc::new(DefaultSessionFactory::new(Arc::new(datasources))))
   }

   #[tokio::test]
   async fn test_failed_creations_leave_no_slots() {
      let temp = TempDir::new().unwrap();
      let registry = registry(&temp);

      for i in 0..16 {
         assert!(registry.acquire(&format!("unknown-{i}")).await.is_err());
      }
      let result = registry
         .with_session("broken", |_, _| async { Ok::<_, BoxError>(()) })
         .await;
      assert!(result.is_err());

      assert!(registry.slots.lock().is_empty());
   }

   #[tokio::test]
   async fn test_release_drops_slot() {
      let temp = TempDir::new().unwrap();
      let registry = registry(&temp);

      registry.acquire_default().await.unwrap();
      assert_eq!(registry.slots.lock().len(), 1);

      assert!(registry.release_default().await.unwrap());
      assert!(registry.slots.lock().is_empty());

      // a second release finds nothing and creates nothing
      assert!(!registry.release_default().await.unwrap());
      assert!(registry.slots.lock().is_empty());
   }
}
