use std::sync::Arc;

use serde::Serialize;

use crate::registry::SessionRegistry;

/// Point-in-time view of the session cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSnapshot {
   pub storage_name: String,
   pub size: usize,
   pub keys: Vec<String>,
}

/// Read-only introspection of a [`SessionRegistry`] for operational visibility.
#[derive(Clone)]
pub struct StorageMonitor {
   registry: Arc<SessionRegistry>,
}

impl StorageMonitor {
   pub const STORAGE_NAME: &'static str = "sessions";

   pub fn new(registry: Arc<SessionRegistry>) -> Self {
      Self { registry }
   }

   /// Current cache contents. Never waits for a pending creation or release.
   pub fn snapshot(&self) -> StorageSnapshot {
      let keys = self.registry.active_names();
      StorageSnapshot {
         storage_name: Self::STORAGE_NAME.to_string(),
         size: keys.len(),
         keys,
      }
   }
}
