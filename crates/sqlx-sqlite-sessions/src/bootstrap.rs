//! Application hooks run once per session creation and once per destruction.

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::error::{BoxError, HookPhase};
use crate::session::Session;
use crate::{Error, Result};

/// Custom initialization and cleanup for sessions.
///
/// Both methods default to doing nothing, so implementors only override
/// the half they need.
///
/// ```
/// use futures::future::BoxFuture;
/// use sqlx_sqlite_sessions::{BoxError, Session, SessionBootstrap};
///
/// struct CreateSchema;
///
/// impl SessionBootstrap for CreateSchema {
///    fn init<'a>(&'a self, _name: &'a str, session: &'a Session) -> BoxFuture<'a, Result<(), BoxError>> {
///       Box::pin(async move {
///          let mut writer = session.acquire_writer().await?;
///          sqlx::query("CREATE TABLE IF NOT EXISTS kv (k TEXT PRIMARY KEY, v TEXT)")
///             .execute(&mut *writer)
///             .await?;
///          Ok(())
///       })
///    }
/// }
/// ```
pub trait SessionBootstrap: Send + Sync {
   fn init<'a>(&'a self, name: &'a str, session: &'a Session) -> BoxFuture<'a, std::result::Result<(), BoxError>> {
      let _ = (name, session);
      Box::pin(async { Ok(()) })
   }

   fn destroy<'a>(&'a self, name: &'a str, session: &'a Session) -> BoxFuture<'a, std::result::Result<(), BoxError>> {
      let _ = (name, session);
      Box::pin(async { Ok(()) })
   }
}

/// Ordered list of bootstrap hooks.
#[derive(Default)]
pub struct Bootstraps {
   hooks: RwLock<Vec<Arc<dyn SessionBootstrap>>>,
}

impl Bootstraps {
   pub fn new() -> Self {
      Self::default()
   }

   /// Append a hook; hooks run in registration order
   pub fn register(&self, hook: Arc<dyn SessionBootstrap>) {
      self.hooks.write().push(hook);
   }

   pub fn len(&self) -> usize {
      self.hooks.read().len()
   }

   pub fn is_empty(&self) -> bool {
      self.hooks.read().is_empty()
   }

   fn snapshot(&self) -> Vec<Arc<dyn SessionBootstrap>> {
      self.hooks.read().clone()
   }

   /// Run every `init` hook in order, stopping at the first failure
   pub async fn run_init(&self, name: &str, session: &Session) -> Result<()> {
      for (index, hook) in self.snapshot().into_iter().enumerate() {
         trace!(datasource = %name, hook = index, "Running bootstrap init");
         hook.init(name, session).await.map_err(|source| {
            warn!(datasource = %name, hook = index, "Bootstrap init failed: {}", source);
            hook_error(name, HookPhase::Init, source)
         })?;
      }
      Ok(())
   }

   /// Run every `destroy` hook in order, stopping at the first failure
   pub async fn run_destroy(&self, name: &str, session: &Session) -> Result<()> {
      for (index, hook) in self.snapshot().into_iter().enumerate() {
         trace!(datasource = %name, hook = index, "Running bootstrap destroy");
         hook.destroy(name, session).await.map_err(|source| {
            warn!(datasource = %name, hook = index, "Bootstrap destroy failed: {}", source);
            hook_error(name, HookPhase::Destroy, source)
         })?;
      }
      Ok(())
   }
}

fn hook_error(name: &str, phase: HookPhase, source: BoxError) -> Error {
   Error::Hook {
      name: name.to_string(),
      phase,
      source,
   }
}
