#![allow(dead_code)]

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use health_storage::config::StorageConfig;
use health_storage::db::{self, Database, Document};
use serde_json::Value;

/// A fresh SQLite file under the system temp dir, removed on drop.
pub struct TempDb {
    pub path: PathBuf,
    pub url: String,
}

impl TempDb {
    pub fn new(label: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before UNIX_EPOCH")
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!(
            "health-storage-{label}-{}-{nanos}.sqlite",
            std::process::id()
        ));
        let url = format!("sqlite:{}", path.display());
        Self { path, url }
    }

    pub fn config(&self) -> StorageConfig {
        let mut cfg = StorageConfig::new(self.url.clone());
        cfg.timeout_secs = 5;
        cfg
    }

    pub async fn connect(&self) -> Database {
        db::connect(&self.url, "health", Duration::from_secs(5))
            .await
            .expect("connect to temp database")
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", self.path.display()));
        }
    }
}

pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
