//! Session plugin commands
//!
//! This module implements the Tauri command handlers that the frontend calls.
//! Every command goes through the [`Sessions`] state managed by the plugin.

use serde::Serialize;
use sqlx_sqlite_sessions::{ConfigurationProvider, DEFAULT_DATASOURCE, StorageSnapshot};
use uuid::Uuid;

use tauri::State;

use crate::{Result, Sessions};

/// Summary of a live session returned to the frontend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
   pub name: String,
   pub session_id: Uuid,
   pub quirks: String,
}

fn datasource(name: Option<String>) -> String {
   name.unwrap_or_else(|| DEFAULT_DATASOURCE.to_string())
}

/// List the configured datasource names.
#[tauri::command]
pub async fn datasource_names(sessions: State<'_, Sessions>) -> Result<Vec<String>> {
   Ok(sessions.registry.factory().datasource_names())
}

/// Acquire the session for `name` (or the default datasource), creating it on first use.
#[tauri::command]
pub async fn connect(sessions: State<'_, Sessions>, name: Option<String>) -> Result<SessionInfo> {
   let session = sessions.registry.acquire(&datasource(name)).await?;

   Ok(SessionInfo {
      name: session.name().to_string(),
      session_id: session.id(),
      quirks: session.quirks().name().to_string(),
   })
}

/// Release the session for `name` (or the default datasource).
///
/// Returns `false` when no session was active.
#[tauri::command]
pub async fn close(sessions: State<'_, Sessions>, name: Option<String>) -> Result<bool> {
   Ok(sessions.registry.release(&datasource(name)).await?)
}

/// Release every active session, returning the names that were released.
#[tauri::command]
pub async fn close_all(sessions: State<'_, Sessions>) -> Result<Vec<String>> {
   Ok(sessions.registry.release_all().await?)
}

/// Snapshot of the session cache.
#[tauri::command]
pub async fn storage(sessions: State<'_, Sessions>) -> Result<StorageSnapshot> {
   Ok(sessions.registry.monitor().snapshot())
}
