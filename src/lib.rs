use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sqlx_sqlite_sessions::{
   Bootstraps, DataSourcesConfig, DefaultSessionFactory, EventSink, Quirks, QuirksRegistry,
   SessionBootstrap, SessionEvent, SessionRegistry, SqliteDataSourceFactory,
};
use tauri::{
   AppHandle, Emitter, Manager, RunEvent, Runtime,
   plugin::{Builder as PluginBuilder, TauriPlugin},
};
use tracing::{debug, error, info, warn};

mod commands;
mod error;
mod resolve;

pub use commands::SessionInfo;
pub use error::{Error, Result};
pub use sqlx_sqlite_sessions;

/// Prefix of the frontend event names, followed by the event kind
/// (e.g. `sqlx-sessions://connect-end`).
pub const EVENT_PREFIX: &str = "sqlx-sessions://";

/// Seconds the exit handler waits for sessions to be released.
const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Session registry managed by the plugin.
#[derive(Clone)]
pub struct Sessions {
   pub registry: Arc<SessionRegistry>,
   shut_down: Arc<AtomicBool>,
}

impl Sessions {
   fn new(registry: Arc<SessionRegistry>) -> Self {
      Self {
         registry,
         shut_down: Arc::new(AtomicBool::new(false)),
      }
   }
}

/// Forwards session lifecycle events to the frontend.
pub struct TauriEventSink<R: Runtime> {
   app: AppHandle<R>,
}

impl<R: Runtime> TauriEventSink<R> {
   pub fn new(app: AppHandle<R>) -> Self {
      Self { app }
   }
}

impl<R: Runtime> EventSink for TauriEventSink<R> {
   fn publish(&self, event: &SessionEvent) {
      let name = format!("{EVENT_PREFIX}{}", event.kind().as_str());
      if let Err(e) = self.app.emit(&name, event.clone()) {
         warn!("Failed to emit {} for {}: {}", name, event.name(), e);
      }
   }
}

/// Builder for the sessions plugin.
///
/// Datasources come from [`Builder::config`] or, when none is given, from the
/// plugin's block in `tauri.conf.json`:
///
/// ```json
/// {
///   "plugins": {
///     "sqlx-sessions": {
///       "dataSource": { "url": "sqlite:app.db", "connect_on_startup": true },
///       "dataSources": { "reporting": { "path": "reports.db", "quirks": "postgres" } }
///     }
///   }
/// }
/// ```
///
/// Relative paths resolve against the app config directory.
///
/// # Example
///
/// ```ignore
/// // `ignore` because tauri::generate_context!() requires tauri.conf.json at compile time.
/// use tauri_plugin_sqlx_sessions::Builder;
///
/// # fn main() {
/// tauri::Builder::default()
///     .plugin(Builder::new().build())
///     .run(tauri::generate_context!())
///     .expect("error while running tauri application");
/// # }
/// ```
pub struct Builder {
   config: Option<DataSourcesConfig>,
   quirks: Arc<QuirksRegistry>,
   bootstraps: Arc<Bootstraps>,
}

impl Default for Builder {
   fn default() -> Self {
      Self::new()
   }
}

impl Builder {
   /// Create a new builder instance.
   pub fn new() -> Self {
      Self {
         config: None,
         quirks: Arc::new(QuirksRegistry::new()),
         bootstraps: Arc::new(Bootstraps::new()),
      }
   }

   /// Use `config` instead of the `tauri.conf.json` plugin block.
   pub fn config(mut self, config: DataSourcesConfig) -> Self {
      self.config = Some(config);
      self
   }

   /// Make a custom quirks strategy selectable by `name` in datasource configuration.
   pub fn register_quirks<F>(self, name: impl Into<String>, constructor: F) -> Self
   where
      F: Fn() -> Arc<dyn Quirks> + Send + Sync + 'static,
   {
      self.quirks.register(name, constructor);
      self
   }

   /// Register a hook run after every session is created and before it is destroyed.
   ///
   /// Hooks run in registration order.
   pub fn bootstrap(self, hook: impl SessionBootstrap + 'static) -> Self {
      self.bootstraps.register(Arc::new(hook));
      self
   }

   /// Build the plugin with command registration and state management.
   pub fn build<R: Runtime>(self) -> TauriPlugin<R, Option<DataSourcesConfig>> {
      let Builder {
         config,
         quirks,
         bootstraps,
      } = self;

      PluginBuilder::<R, Option<DataSourcesConfig>>::new("sqlx-sessions")
         .invoke_handler(tauri::generate_handler![
            commands::datasource_names,
            commands::connect,
            commands::close,
            commands::close_all,
            commands::storage,
         ])
         .setup(move |app, api| {
            let config = config.or_else(|| api.config().clone()).unwrap_or_default();
            let base_dir = resolve::database_base_dir(app)?;
            let events = Arc::new(TauriEventSink::new(app.clone()));

            let registry = Arc::new(build_registry(config, base_dir, quirks, bootstraps, events));
            app.manage(Sessions::new(Arc::clone(&registry)));

            tauri::async_runtime::spawn(async move {
               match registry.connect_on_startup().await {
                  Ok(names) if !names.is_empty() => {
                     info!("Connected {} datasource(s) on startup: {:?}", names.len(), names)
                  }
                  Ok(_) => {}
                  Err(e) => error!("Startup connection failed: {}", e),
               }
            });

            debug!("Sessions plugin initialized");
            Ok(())
         })
         .on_event(|app, event| match event {
            RunEvent::ExitRequested { api, code, .. } => {
               let sessions = app.state::<Sessions>().inner().clone();

               // Second pass comes from our own exit() below
               if sessions.shut_down.swap(true, Ordering::SeqCst) {
                  return;
               }

               info!("App exit requested (code: {:?}) - releasing sessions", code);
               api.prevent_exit();

               let app_handle = app.clone();

               let handle = match tokio::runtime::Handle::try_current() {
                  Ok(h) => h,
                  Err(_) => {
                     warn!("No tokio runtime available for cleanup");
                     app_handle.exit(code.unwrap_or(0));
                     return;
                  }
               };

               // block_in_place panics on current_thread runtime
               let cleanup_result = std::thread::spawn(move || {
                  handle.block_on(async {
                     let timeout_result = tokio::time::timeout(
                        std::time::Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
                        sessions.registry.shutdown(),
                     )
                     .await;

                     match timeout_result {
                        Ok(Ok(released)) => debug!("Released {} session(s)", released.len()),
                        Ok(Err(e)) => warn!("Error releasing sessions: {}", e),
                        Err(_) => warn!(
                           "Session shutdown timed out after {} seconds",
                           SHUTDOWN_TIMEOUT_SECS
                        ),
                     }
                  })
               })
               .join();

               if let Err(e) = cleanup_result {
                  error!("Session cleanup thread panicked: {:?}", e);
               }

               app_handle.exit(code.unwrap_or(0));
            }
            RunEvent::Exit => {
               let sessions = app.state::<Sessions>();
               if !sessions.shut_down.load(Ordering::SeqCst) {
                  warn!("Exit event fired before sessions were released - cleanup was skipped");
               }
            }
            _ => {}
         })
         .build()
   }
}

/// Initializes the plugin with default configuration.
pub fn init<R: Runtime>() -> TauriPlugin<R, Option<DataSourcesConfig>> {
   Builder::new().build()
}

fn build_registry(
   config: DataSourcesConfig,
   base_dir: PathBuf,
   quirks: Arc<QuirksRegistry>,
   bootstraps: Arc<Bootstraps>,
   events: Arc<dyn EventSink>,
) -> SessionRegistry {
   let datasources = SqliteDataSourceFactory::new(Arc::new(config)).with_base_dir(base_dir);
   let factory = DefaultSessionFactory::new(Arc::new(datasources))
      .with_quirks(quirks)
      .with_bootstraps(bootstraps)
      .with_event_sink(events);

   SessionRegistry::new(Arc::new(factory))
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;
   use sqlx_sqlite_sessions::{BroadcastEventSink, SessionEventKind};
   use tempfile::TempDir;

   fn config() -> DataSourcesConfig {
      DataSourcesConfig::from_value(json!({
         "dataSource": { "path": "main.db", "connect_on_startup": true },
         "dataSources": { "reports": { "path": "reports.db", "connect_on_startup": false } }
      }))
      .unwrap()
   }

   #[tokio::test]
   async fn test_relative_paths_resolve_against_base_dir() {
      let temp = TempDir::new().unwrap();
      let registry = build_registry(
         config(),
         temp.path().to_path_buf(),
         Arc::new(QuirksRegistry::new()),
         Arc::new(Bootstraps::new()),
         Arc::new(BroadcastEventSink::default()),
      );

      let session = registry.acquire("reports").await.unwrap();
      assert_eq!(session.database().path(), temp.path().join("reports.db"));

      registry.shutdown().await.unwrap();
   }

   #[tokio::test]
   async fn test_startup_connects_flagged_datasources() {
      let temp = TempDir::new().unwrap();
      let events = Arc::new(BroadcastEventSink::default());
      let mut rx = events.subscribe();
      let registry = build_registry(
         config(),
         temp.path().to_path_buf(),
         Arc::new(QuirksRegistry::new()),
         Arc::new(Bootstraps::new()),
         events,
      );

      let connected = registry.connect_on_startup().await.unwrap();
      assert_eq!(connected, vec!["default".to_string()]);
      assert!(!registry.is_active("reports"));

      let first = rx.try_recv().unwrap();
      assert_eq!(first.kind(), SessionEventKind::ConnectStart);
      assert_eq!(first.name(), "default");

      let released = registry.shutdown().await.unwrap();
      assert_eq!(released, vec!["default".to_string()]);
   }

   #[test]
   fn test_builder_registers_custom_quirks() {
      #[derive(Debug)]
      struct Shouting;

      impl Quirks for Shouting {
         fn name(&self) -> &str {
            "shouting"
         }

         fn normalize_column_name(&self, column: &str) -> String {
            column.to_uppercase()
         }
      }

      let builder = Builder::new().register_quirks("shouting", || Arc::new(Shouting));
      let quirks = builder.quirks.lookup(Some("shouting")).unwrap();
      assert_eq!(quirks.normalize_column_name("id"), "ID");
   }
}
