//! Datasource configuration: per-name snapshots and SQLite pool settings

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::Result;

/// Name of the datasource configured by the top-level `dataSource` block.
pub const DEFAULT_DATASOURCE: &str = "default";

/// Immutable key/value configuration resolved for one datasource.
///
/// Cloning is cheap; all clones share the same underlying map. Keys keep the
/// order in which they appear in the configuration source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot(Arc<IndexMap<String, JsonValue>>);

impl ConfigSnapshot {
   /// Raw value stored under `key`
   pub fn get(&self, key: &str) -> Option<&JsonValue> {
      self.0.get(key)
   }

   /// String value stored under `key`, if it is a JSON string
   pub fn get_str(&self, key: &str) -> Option<&str> {
      self.0.get(key).and_then(JsonValue::as_str)
   }

   /// Boolean value stored under `key`.
   ///
   /// Accepts JSON booleans as well as the strings `"true"` and `"false"`
   /// (any case). Anything else yields `default`.
   pub fn get_bool(&self, key: &str, default: bool) -> bool {
      match self.0.get(key) {
         Some(JsonValue::Bool(b)) => *b,
         Some(JsonValue::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => default,
         },
         _ => default,
      }
   }

   /// Unsigned integer stored under `key`, either as a JSON number or a numeric string
   pub fn get_u64(&self, key: &str, default: u64) -> u64 {
      match self.0.get(key) {
         Some(JsonValue::Number(n)) => n.as_u64().unwrap_or(default),
         Some(JsonValue::String(s)) => s.trim().parse().unwrap_or(default),
         _ => default,
      }
   }

   /// Nested object stored under `key` as its own snapshot (empty when absent)
   pub fn section(&self, key: &str) -> ConfigSnapshot {
      match self.0.get(key) {
         Some(JsonValue::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<IndexMap<_, _>>()
            .into(),
         _ => ConfigSnapshot::default(),
      }
   }

   pub fn keys(&self) -> impl Iterator<Item = &str> {
      self.0.keys().map(String::as_str)
   }

   pub fn len(&self) -> usize {
      self.0.len()
   }

   pub fn is_empty(&self) -> bool {
      self.0.is_empty()
   }
}

impl From<IndexMap<String, JsonValue>> for ConfigSnapshot {
   fn from(map: IndexMap<String, JsonValue>) -> Self {
      Self(Arc::new(map))
   }
}

impl FromIterator<(String, JsonValue)> for ConfigSnapshot {
   fn from_iter<I: IntoIterator<Item = (String, JsonValue)>>(iter: I) -> Self {
      Self(Arc::new(iter.into_iter().collect()))
   }
}

impl Serialize for ConfigSnapshot {
   fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
   where
      S: Serializer,
   {
      self.0.as_ref().serialize(serializer)
   }
}

/// Supplies datasource names and their configuration.
///
/// Looking up a name that is not configured yields an empty snapshot, never an error.
pub trait ConfigurationProvider: Send + Sync {
   /// All configured datasource names, in configuration order
   fn datasource_names(&self) -> Vec<String>;

   /// Configuration snapshot for `name`
   fn configuration_for(&self, name: &str) -> ConfigSnapshot;
}

/// Datasource configuration as it appears in an application config file.
///
/// ```json
/// {
///   "dataSource": { "url": "sqlite:app.db", "pool": { "max_read_connections": 4 } },
///   "dataSources": {
///     "reporting": { "url": "sqlite:reports.db", "quirks": "postgres" }
///   }
/// }
/// ```
///
/// The `dataSource` block configures [`DEFAULT_DATASOURCE`] and also provides
/// inherited defaults for every named block. Inheritance is shallow: a named
/// block that sets `pool` replaces the whole `pool` object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourcesConfig {
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub data_source: Option<IndexMap<String, JsonValue>>,

   #[serde(default)]
   pub data_sources: IndexMap<String, IndexMap<String, JsonValue>>,
}

impl DataSourcesConfig {
   /// Parse configuration from a JSON document
   pub fn from_json(json: &str) -> Result<Self> {
      Ok(serde_json::from_str(json)?)
   }

   /// Parse configuration from an already decoded JSON value
   pub fn from_value(value: JsonValue) -> Result<Self> {
      Ok(serde_json::from_value(value)?)
   }

   /// Add or replace a named datasource block
   pub fn with_datasource(
      mut self,
      name: impl Into<String>,
      settings: IndexMap<String, JsonValue>,
   ) -> Self {
      let name = name.into();
      if name == DEFAULT_DATASOURCE {
         self.data_source = Some(settings);
      } else {
         self.data_sources.insert(name, settings);
      }
      self
   }
}

impl ConfigurationProvider for DataSourcesConfig {
   fn datasource_names(&self) -> Vec<String> {
      let mut names = Vec::with_capacity(self.data_sources.len() + 1);
      if self.data_source.is_some() {
         names.push(DEFAULT_DATASOURCE.to_string());
      }
      for name in self.data_sources.keys() {
         if !names.contains(name) {
            names.push(name.clone());
         }
      }
      names
   }

   fn configuration_for(&self, name: &str) -> ConfigSnapshot {
      let named = self.data_sources.get(name);

      if named.is_none() && (name != DEFAULT_DATASOURCE || self.data_source.is_none()) {
         return ConfigSnapshot::default();
      }

      let mut merged = self.data_source.clone().unwrap_or_default();
      if let Some(named) = named {
         for (key, value) in named {
            merged.insert(key.clone(), value.clone());
         }
      }
      merged.into()
   }
}

/// Pool settings for one SQLite datasource
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_datasource::SqliteDatabaseConfig;
///
/// let config = SqliteDatabaseConfig {
///     max_read_connections: 3,
///     ..Default::default()
/// };
/// assert_eq!(config.idle_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteDatabaseConfig {
   /// Maximum number of concurrent read connections
   ///
   /// Default: 6
   pub max_read_connections: u32,

   /// Idle timeout for both read and write connections (in seconds)
   ///
   /// Default: 30
   pub idle_timeout_secs: u64,
}

impl SqliteDatabaseConfig {
   /// Read pool settings from the `pool` section of a datasource snapshot,
   /// falling back to defaults for missing keys
   pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Self {
      let defaults = Self::default();
      let pool = snapshot.section("pool");

      let max_read_connections = pool
         .get_u64("max_read_connections", defaults.max_read_connections as u64)
         .clamp(1, u32::MAX as u64) as u32;

      Self {
         max_read_connections,
         idle_timeout_secs: pool.get_u64("idle_timeout_secs", defaults.idle_timeout_secs),
      }
   }
}

impl Default for SqliteDatabaseConfig {
   fn default() -> Self {
      Self {
         max_read_connections: 6,
         idle_timeout_secs: 30,
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   fn sample() -> DataSourcesConfig {
      DataSourcesConfig::from_value(json!({
         "dataSource": { "url": "sqlite:main.db", "connect_on_startup": "TRUE" },
         "dataSources": {
            "reporting": { "url": "sqlite:reports.db", "quirks": "postgres" },
            "archive": { "path": "archive.db", "pool": { "max_read_connections": 2 } }
         }
      }))
      .unwrap()
   }

   #[test]
   fn test_names_default_first_then_file_order() {
      assert_eq!(
         sample().datasource_names(),
         vec!["default", "reporting", "archive"]
      );
   }

   #[test]
   fn test_named_block_inherits_default_block() {
      let reporting = sample().configuration_for("reporting");
      assert_eq!(reporting.get_str("url"), Some("sqlite:reports.db"));
      assert_eq!(reporting.get_str("quirks"), Some("postgres"));
      assert!(reporting.get_bool("connect_on_startup", false));
   }

   #[test]
   fn test_unknown_name_yields_empty_snapshot() {
      assert!(sample().configuration_for("missing").is_empty());
      assert!(
         DataSourcesConfig::default()
            .configuration_for(DEFAULT_DATASOURCE)
            .is_empty()
      );
   }

   #[test]
   fn test_get_bool_accepts_strings_and_falls_back() {
      let snapshot: ConfigSnapshot = [
         ("a".to_string(), json!(true)),
         ("b".to_string(), json!("False")),
         ("c".to_string(), json!("maybe")),
      ]
      .into_iter()
      .collect();

      assert!(snapshot.get_bool("a", false));
      assert!(!snapshot.get_bool("b", true));
      assert!(snapshot.get_bool("c", true));
      assert!(!snapshot.get_bool("missing", false));
   }

   #[test]
   fn test_pool_settings_from_snapshot() {
      let archive = sample().configuration_for("archive");
      let config = SqliteDatabaseConfig::from_snapshot(&archive);
      assert_eq!(config.max_read_connections, 2);
      assert_eq!(config.idle_timeout_secs, 30);

      let config = SqliteDatabaseConfig::from_snapshot(&ConfigSnapshot::default());
      assert_eq!(config, SqliteDatabaseConfig::default());
   }

   #[test]
   fn test_with_datasource_routes_default_to_single_block() {
      let mut settings = IndexMap::new();
      settings.insert("path".to_string(), json!(":memory:"));

      let config = DataSourcesConfig::default()
         .with_datasource(DEFAULT_DATASOURCE, settings.clone())
         .with_datasource("other", settings);

      assert!(config.data_source.is_some());
      assert_eq!(config.datasource_names(), vec!["default", "other"]);
   }
}
