use std::fs::create_dir_all;
use std::path::PathBuf;

use tauri::{AppHandle, Manager, Runtime};

use crate::Error;

/// Directory relative datasource paths are resolved against.
///
/// This is `app_config_dir()` (e.g., `Library/Application Support/${bundleIdentifier}`
/// on iOS). The directory is created when missing. Absolute paths and
/// `:memory:` in datasource configuration are used unchanged.
pub fn database_base_dir<R: Runtime>(app: &AppHandle<R>) -> Result<PathBuf, Error> {
   let app_path = app
      .path()
      .app_config_dir()
      .map_err(|_| Error::InvalidPath("No app config path found".to_string()))?;

   create_dir_all(&app_path)?;

   Ok(app_path)
}
