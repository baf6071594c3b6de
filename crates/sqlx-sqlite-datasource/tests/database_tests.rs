use serde_json::json;
use sqlx_sqlite_datasource::{
   ConfigurationProvider, DataSourceFactory, DataSourceStorage, DataSourcesConfig, Error,
   SqliteDataSourceFactory, SqliteDatabase,
};
use std::sync::Arc;
use tempfile::TempDir;

fn create_storage(temp: &TempDir) -> DataSourceStorage {
   let config = DataSourcesConfig::from_value(json!({
      "dataSource": { "path": "main.db" },
      "dataSources": {
         "reporting": { "path": "reporting.db", "pool": { "max_read_connections": 2 } },
         "broken": { "quirks": "none", "path": "" , "url": "" }
      }
   }))
   .unwrap();

   let factory = SqliteDataSourceFactory::new(Arc::new(config)).with_base_dir(temp.path());
   DataSourceStorage::new(Arc::new(factory))
}

#[tokio::test]
async fn test_get_or_create_caches_per_name() {
   let temp = TempDir::new().unwrap();
   let storage = create_storage(&temp);

   let db1 = storage.get_or_create("default").await.unwrap();
   let db2 = storage.get_or_create("default").await.unwrap();
   assert!(Arc::ptr_eq(&db1, &db2), "Same name should return cached pool");

   let reporting = storage.get_or_create("reporting").await.unwrap();
   assert!(!Arc::ptr_eq(&db1, &reporting));
   assert_eq!(reporting.name(), "reporting");
   assert_eq!(reporting.path(), temp.path().join("reporting.db"));
   assert!(temp.path().join("main.db").exists());

   assert_eq!(storage.names().await, vec!["default", "reporting"]);
}

#[tokio::test]
async fn test_close_removes_and_closes() {
   let temp = TempDir::new().unwrap();
   let storage = create_storage(&temp);

   let db = storage.get_or_create("default").await.unwrap();
   assert!(storage.close("default").await.unwrap());
   assert!(db.is_closed());
   assert!(storage.get("default").await.is_none());

   // nothing left to close
   assert!(!storage.close("default").await.unwrap());

   // a fresh pool is opened after close
   let reopened = storage.get_or_create("default").await.unwrap();
   assert!(!Arc::ptr_eq(&db, &reopened));
   assert!(!reopened.is_closed());
}

#[tokio::test]
async fn test_missing_path_is_reported() {
   let temp = TempDir::new().unwrap();
   let storage = create_storage(&temp);

   let result = storage.get_or_create("broken").await;
   assert!(matches!(result, Err(Error::MissingPath(name)) if name == "broken"));
   assert!(storage.is_empty().await);
}

#[tokio::test]
async fn test_blank_name_rejected_by_factory() {
   let temp = TempDir::new().unwrap();
   let storage = create_storage(&temp);

   let result = storage.factory().create("  ").await;
   assert!(matches!(result, Err(Error::BlankName)));
}

#[tokio::test]
async fn test_concurrent_get_or_create_yields_single_pool() {
   let temp = TempDir::new().unwrap();
   let storage = Arc::new(create_storage(&temp));

   let handles: Vec<_> = (0..4)
      .map(|_| {
         let storage = Arc::clone(&storage);
         tokio::spawn(async move { storage.get_or_create("reporting").await.unwrap() })
      })
      .collect();

   let mut pools = Vec::new();
   for handle in handles {
      pools.push(handle.await.unwrap());
   }

   for pool in &pools[1..] {
      assert!(Arc::ptr_eq(&pools[0], pool));
   }
   assert_eq!(storage.len().await, 1);
}

#[tokio::test]
async fn test_factory_exposes_configuration() {
   let temp = TempDir::new().unwrap();
   let storage = create_storage(&temp);

   let factory = storage.factory();
   assert_eq!(
      factory.datasource_names(),
      vec!["default", "reporting", "broken"]
   );
   assert_eq!(
      factory.configuration_for("reporting").get_str("path"),
      Some("reporting.db")
   );
}

#[tokio::test]
async fn test_write_then_read_through_pools() {
   let temp = TempDir::new().unwrap();
   let db = SqliteDatabase::connect("default", temp.path().join("rw.db"), None)
      .await
      .unwrap();

   let mut writer = db.acquire_writer().await.unwrap();
   sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
      .execute(&mut *writer)
      .await
      .unwrap();
   sqlx::query("INSERT INTO t (name) VALUES (?)")
      .bind("Alice")
      .execute(&mut *writer)
      .await
      .unwrap();
   drop(writer);

   let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM t")
      .fetch_one(db.read_pool().unwrap())
      .await
      .unwrap();
   assert_eq!(count, 1);

   db.close().await.unwrap();
}
