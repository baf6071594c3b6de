//! Building and tearing down sessions, with lifecycle events and bootstrap hooks.

use std::sync::Arc;

use futures::future::BoxFuture;
use sqlx_sqlite_datasource::{
   ConfigSnapshot, ConfigurationProvider, DataSourceFactory, DataSourceStorage,
};
use tracing::{debug, warn};

use crate::bootstrap::Bootstraps;
use crate::events::{EventSink, NoopEventSink, SessionEvent};
use crate::quirks::QuirksRegistry;
use crate::session::Session;
use crate::{Error, Result};

/// Creates and destroys the session for a datasource name.
///
/// Caching is not the factory's concern: [`SessionRegistry`](crate::SessionRegistry)
/// guarantees that `create` and `destroy` are called at most once per
/// lifecycle of a name.
pub trait SessionFactory: ConfigurationProvider {
   fn create<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Arc<Session>>>;

   fn destroy<'a>(&'a self, name: &'a str, session: Arc<Session>) -> BoxFuture<'a, Result<()>>;
}

/// Session factory backed by pooled SQLite datasources.
///
/// `create` runs, in order: resolve the configuration snapshot, emit
/// `ConnectStart`, resolve the quirks strategy, open (or reuse) the pooled
/// datasource, run bootstrap `init` hooks, emit `ConnectEnd`.
///
/// `destroy` runs: emit `DisconnectStart`, run bootstrap `destroy` hooks,
/// close the pooled datasource, emit `DisconnectEnd`. The datasource is
/// closed even when a destroy hook fails; the hook error is reported after
/// teardown completes.
pub struct DefaultSessionFactory {
   storage: DataSourceStorage,
   quirks: Arc<QuirksRegistry>,
   bootstraps: Arc<Bootstraps>,
   events: Arc<dyn EventSink>,
}

impl DefaultSessionFactory {
   pub fn new(datasources: Arc<dyn DataSourceFactory>) -> Self {
      Self {
         storage: DataSourceStorage::new(datasources),
         quirks: Arc::new(QuirksRegistry::new()),
         bootstraps: Arc::new(Bootstraps::new()),
         events: Arc::new(NoopEventSink),
      }
   }

   pub fn with_quirks(mut self, quirks: Arc<QuirksRegistry>) -> Self {
      self.quirks = quirks;
      self
   }

   pub fn with_bootstraps(mut self, bootstraps: Arc<Bootstraps>) -> Self {
      self.bootstraps = bootstraps;
      self
   }

   pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
      self.events = events;
      self
   }

   pub fn quirks(&self) -> &Arc<QuirksRegistry> {
      &self.quirks
   }

   pub fn bootstraps(&self) -> &Arc<Bootstraps> {
      &self.bootstraps
   }

   /// Pooled datasources opened for sessions
   pub fn storage(&self) -> &DataSourceStorage {
      &self.storage
   }

   async fn build(&self, name: &str, config: &ConfigSnapshot) -> Result<Arc<Session>> {
      let quirks = self.quirks.resolve(name, config)?;

      let existed = self.storage.get(name).await.is_some();
      let database = self
         .storage
         .get_or_create(name)
         .await
         .map_err(|e| Error::creation(name, e))?;

      let session = Arc::new(Session::new(name, database, quirks));

      if let Err(e) = self.bootstraps.run_init(name, &session).await {
         // leave no pool behind that this call opened
         if !existed && let Err(close_err) = self.storage.close(name).await {
            warn!(datasource = %name, "Failed to close datasource after init failure: {}", close_err);
         }
         return Err(e);
      }

      Ok(session)
   }
}

impl ConfigurationProvider for DefaultSessionFactory {
   fn datasource_names(&self) -> Vec<String> {
      self.storage.factory().datasource_names()
   }

   fn configuration_for(&self, name: &str) -> ConfigSnapshot {
      self.storage.factory().configuration_for(name)
   }
}

impl SessionFactory for DefaultSessionFactory {
   fn create<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Arc<Session>>> {
      Box::pin(async move {
         if name.trim().is_empty() {
            return Err(Error::InvalidName);
         }

         let config = self.configuration_for(name);
         self.events.publish(&SessionEvent::connect_start(name, config.clone()));

         let session = self.build(name, &config).await?;

         debug!(datasource = %name, session = %session.id(), quirks = session.quirks().name(), "Session created");
         self
            .events
            .publish(&SessionEvent::connect_end(name, config, Arc::clone(&session)));

         Ok(session)
      })
   }

   fn destroy<'a>(&'a self, name: &'a str, session: Arc<Session>) -> BoxFuture<'a, Result<()>> {
      Box::pin(async move {
         let config = self.configuration_for(name);
         self.events.publish(&SessionEvent::disconnect_start(
            name,
            config.clone(),
            Arc::clone(&session),
         ));

         let hooks = self.bootstraps.run_destroy(name, &session).await;

         let closed = self
            .storage
            .close(name)
            .await
            .map_err(|e| Error::ResourceDestruction {
               name: name.to_string(),
               source: Box::new(e),
            });

         debug!(datasource = %name, session = %session.id(), "Session destroyed");
         self.events.publish(&SessionEvent::disconnect_end(name, config));

         hooks?;
         closed?;
         Ok(())
      })
   }
}
