//! Vendor quirks strategies and the table used to select them by name.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use sqlx_sqlite_datasource::ConfigSnapshot;
use tracing::trace;

use crate::{Error, Result};

/// Configuration key holding the quirks selector.
pub const QUIRKS_KEY: &str = "quirks";

/// Adapts identifier handling and key generation to a database vendor.
pub trait Quirks: Send + Sync + fmt::Debug {
   /// Name the strategy is registered under
   fn name(&self) -> &str;

   /// Column name as it should appear in mapped results
   fn normalize_column_name(&self, column: &str) -> String {
      column.to_string()
   }

   /// Quote an identifier for use in generated SQL
   fn quote_identifier(&self, identifier: &str) -> String {
      format!("\"{}\"", identifier.replace('"', "\"\""))
   }

   /// Whether inserts report generated keys without being asked
   fn returns_generated_keys_by_default(&self) -> bool {
      true
   }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoQuirks;

impl Quirks for NoQuirks {
   fn name(&self) -> &str {
      "none"
   }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Db2Quirks;

impl Quirks for Db2Quirks {
   fn name(&self) -> &str {
      "db2"
   }

   fn normalize_column_name(&self, column: &str) -> String {
      column.to_uppercase()
   }

   fn returns_generated_keys_by_default(&self) -> bool {
      false
   }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OracleQuirks;

impl Quirks for OracleQuirks {
   fn name(&self) -> &str {
      "oracle"
   }

   fn normalize_column_name(&self, column: &str) -> String {
      column.to_uppercase()
   }

   fn returns_generated_keys_by_default(&self) -> bool {
      false
   }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresQuirks;

impl Quirks for PostgresQuirks {
   fn name(&self) -> &str {
      "postgres"
   }

   fn normalize_column_name(&self, column: &str) -> String {
      column.to_lowercase()
   }

   fn returns_generated_keys_by_default(&self) -> bool {
      false
   }
}

/// Builds a quirks strategy instance.
pub type QuirksConstructor = Arc<dyn Fn() -> Arc<dyn Quirks> + Send + Sync>;

fn builtin<Q: Quirks + Default + 'static>() -> QuirksConstructor {
   Arc::new(|| -> Arc<dyn Quirks> { Arc::new(Q::default()) })
}

/// Maps quirks selectors to constructors.
///
/// Built-in strategies (`none`, `db2`, `oracle`, `postgres`) are always
/// present and match case-insensitively. Additional strategies are
/// registered under an exact name, typically at application startup.
pub struct QuirksRegistry {
   builtins: IndexMap<&'static str, QuirksConstructor>,
   custom: RwLock<IndexMap<String, QuirksConstructor>>,
}

impl Default for QuirksRegistry {
   fn default() -> Self {
      Self::new()
   }
}

impl fmt::Debug for QuirksRegistry {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("QuirksRegistry")
         .field("names", &self.names())
         .finish()
   }
}

impl QuirksRegistry {
   pub fn new() -> Self {
      let mut builtins: IndexMap<&'static str, QuirksConstructor> = IndexMap::new();
      builtins.insert("none", builtin::<NoQuirks>());
      builtins.insert("db2", builtin::<Db2Quirks>());
      builtins.insert("oracle", builtin::<OracleQuirks>());
      builtins.insert("postgres", builtin::<PostgresQuirks>());

      Self {
         builtins,
         custom: RwLock::new(IndexMap::new()),
      }
   }

   /// Register a strategy under `name`, replacing any earlier registration
   /// with the same name. Built-in names cannot be overridden.
   pub fn register<F>(&self, name: impl Into<String>, constructor: F)
   where
      F: Fn() -> Arc<dyn Quirks> + Send + Sync + 'static,
   {
      let name = name.into();
      trace!(quirks = %name, "Registering quirks strategy");
      self.custom.write().insert(name, Arc::new(constructor));
   }

   /// All selectable names: built-ins first, then registrations in order
   pub fn names(&self) -> Vec<String> {
      self
         .builtins
         .keys()
         .map(|name| name.to_string())
         .chain(self.custom.read().keys().cloned())
         .collect()
   }

   /// Build the strategy for `selector`.
   ///
   /// `None`, blank, `"null"` and `"none"` select [`NoQuirks`].
   pub fn lookup(&self, selector: Option<&str>) -> Option<Arc<dyn Quirks>> {
      let selector = match selector.map(str::trim) {
         None => return Some(Arc::new(NoQuirks)),
         Some(s) if s.is_empty() || s == "null" => return Some(Arc::new(NoQuirks)),
         Some(s) => s,
      };

      if let Some(constructor) = self.builtins.get(selector.to_ascii_lowercase().as_str()) {
         return Some(constructor());
      }

      self.custom.read().get(selector).map(|constructor| constructor())
   }

   /// Resolve the strategy configured for datasource `name`.
   ///
   /// Fails with [`Error::Configuration`] when the `quirks` value is neither
   /// a built-in nor a registered name.
   pub fn resolve(&self, name: &str, config: &ConfigSnapshot) -> Result<Arc<dyn Quirks>> {
      let selector = match config.get(QUIRKS_KEY) {
         None | Some(JsonValue::Null) => None,
         Some(JsonValue::String(s)) => Some(s.clone()),
         Some(other) => Some(other.to_string()),
      };

      self
         .lookup(selector.as_deref())
         .ok_or_else(|| Error::Configuration {
            name: name.to_string(),
            message: format!(
               "invalid quirks '{}'",
               selector.as_deref().unwrap_or_default()
            ),
         })
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   fn snapshot(quirks: JsonValue) -> ConfigSnapshot {
      [(QUIRKS_KEY.to_string(), quirks)].into_iter().collect()
   }

   #[test]
   fn test_absent_blank_and_none_select_no_quirks() {
      let registry = QuirksRegistry::new();

      let absent = registry
         .resolve("default", &ConfigSnapshot::default())
         .unwrap();
      assert_eq!(absent.name(), "none");

      for value in [json!(""), json!("   "), json!(null), json!("null"), json!("none"), json!("NONE")] {
         assert_eq!(
            registry.resolve("default", &snapshot(value)).unwrap().name(),
            "none"
         );
      }
   }

   #[test]
   fn test_builtins_match_case_insensitively() {
      let registry = QuirksRegistry::new();

      let postgres = registry.resolve("default", &snapshot(json!("postgres"))).unwrap();
      assert_eq!(postgres.name(), "postgres");
      assert!(!postgres.returns_generated_keys_by_default());
      assert_eq!(postgres.normalize_column_name("UserId"), "userid");

      let oracle = registry.resolve("default", &snapshot(json!("Oracle"))).unwrap();
      assert_eq!(oracle.name(), "oracle");
      assert_eq!(oracle.normalize_column_name("userId"), "USERID");

      assert_eq!(
         registry.resolve("default", &snapshot(json!("DB2"))).unwrap().name(),
         "db2"
      );
   }

   #[test]
   fn test_unknown_selector_is_configuration_error() {
      let registry = QuirksRegistry::new();
      let err = registry
         .resolve("reporting", &snapshot(json!("not-a-real-class")))
         .unwrap_err();

      match err {
         Error::Configuration { name, message } => {
            assert_eq!(name, "reporting");
            assert!(message.contains("not-a-real-class"));
         }
         other => panic!("expected configuration error, got {other:?}"),
      }

      assert!(registry.resolve("reporting", &snapshot(json!(42))).is_err());
   }

   #[derive(Debug)]
   struct SqliteQuirks;

   impl Quirks for SqliteQuirks {
      fn name(&self) -> &str {
         "com.example.SqliteQuirks"
      }

      fn quote_identifier(&self, identifier: &str) -> String {
         format!("[{identifier}]")
      }
   }

   #[test]
   fn test_registered_strategy_resolves_by_exact_name() {
      let registry = QuirksRegistry::new();
      registry.register("com.example.SqliteQuirks", || Arc::new(SqliteQuirks));

      let quirks = registry
         .resolve("default", &snapshot(json!("com.example.SqliteQuirks")))
         .unwrap();
      assert_eq!(quirks.quote_identifier("user"), "[user]");

      assert!(
         registry
            .resolve("default", &snapshot(json!("com.example.sqlitequirks")))
            .is_err()
      );
      assert_eq!(registry.names().last().unwrap(), "com.example.SqliteQuirks");
   }

   #[test]
   fn test_default_quote_identifier_escapes_quotes() {
      assert_eq!(NoQuirks.quote_identifier("a\"b"), "\"a\"\"b\"");
   }
}
