//! Module settings: loaded once per module instance, written back only when changed.

use crate::config::ModuleDescriptor;
use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const SETTINGS_VERSION: u32 = 1;

/// Persisted settings for one module type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettingsBlob {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub values: Map<String, Value>,
}

fn current_version() -> u32 {
    SETTINGS_VERSION
}

impl SettingsBlob {
    pub fn new(values: Map<String, Value>) -> Self {
        SettingsBlob {
            version: SETTINGS_VERSION,
            values,
        }
    }
}

/// Key-value storage of settings blobs keyed by module type.
#[async_trait]
pub trait SettingsPersistence: Send + Sync {
    async fn read(&self, module_type: &str) -> Result<Option<SettingsBlob>, AppError>;
    async fn write(&self, module_type: &str, blob: &SettingsBlob) -> Result<(), AppError>;
    /// First-time seed.
    async fn insert(&self, module_type: &str, blob: &SettingsBlob) -> Result<(), AppError>;
}

pub struct SettingsStore {
    module_type: String,
    fields: BTreeMap<String, String>,
    values: Map<String, Value>,
    dirty: bool,
    persistence: Arc<dyn SettingsPersistence>,
}

impl SettingsStore {
    /// Read the stored blob, or seed and persist defaults when there is none.
    /// Modules without settings fields do no I/O.
    pub async fn load(
        module: &ModuleDescriptor,
        persistence: Arc<dyn SettingsPersistence>,
    ) -> Result<Self, AppError> {
        let mut store = SettingsStore {
            module_type: module.module_type.clone(),
            fields: module.settings_fields.clone(),
            values: Map::new(),
            dirty: false,
            persistence,
        };
        if store.fields.is_empty() {
            return Ok(store);
        }

        match store.persistence.read(&store.module_type).await? {
            Some(blob) => {
                if blob.version > SETTINGS_VERSION {
                    tracing::warn!(
                        module = %store.module_type,
                        version = blob.version,
                        "settings written by a newer version"
                    );
                }
                store.values = blob.values;
                for (k, v) in &module.default_settings {
                    store.values.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
            None => {
                store.values = module.default_settings.clone();
                let blob = SettingsBlob::new(store.values.clone());
                store.persistence.insert(&store.module_type, &blob).await?;
                tracing::info!(module = %store.module_type, "seeded default settings");
            }
        }
        Ok(store)
    }

    /// All settings as an object, or `None` when there are none.
    pub fn all(&self) -> Option<Value> {
        if self.values.is_empty() {
            return None;
        }
        Some(Value::Object(self.values.clone()))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(&name.to_lowercase())
    }

    /// Store a declared setting. Undeclared names are refused and leave the store clean.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        let key = name.to_lowercase();
        if !self.fields.contains_key(&key) {
            return false;
        }
        self.values.insert(key, value);
        self.dirty = true;
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Write back if changed. Returns whether a write happened.
    pub async fn flush(&mut self) -> Result<bool, AppError> {
        if !self.dirty {
            return Ok(false);
        }
        let blob = SettingsBlob::new(self.values.clone());
        self.persistence.write(&self.module_type, &blob).await?;
        self.dirty = false;
        tracing::info!(module = %self.module_type, "settings saved");
        Ok(true)
    }
}

/// A dirty store dropped inside a runtime schedules its own write; outside one the change is lost.
impl Drop for SettingsStore {
    fn drop(&mut self) {
        if !self.dirty {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(module = %self.module_type, "settings changed but never flushed");
            return;
        };
        let module_type = std::mem::take(&mut self.module_type);
        let blob = SettingsBlob::new(std::mem::take(&mut self.values));
        let persistence = self.persistence.clone();
        handle.spawn(async move {
            match persistence.write(&module_type, &blob).await {
                Ok(()) => tracing::info!(module = %module_type, "settings saved on drop"),
                Err(e) => tracing::warn!(module = %module_type, error = %e, "settings write on drop failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, AdminConfig};
    use crate::memory::MemorySettingsPersistence;
    use serde_json::json;

    fn module(settings: bool) -> ModuleDescriptor {
        let mut m = json!({
            "type": "Widget",
            "columns": [{ "name": "WidgetID", "type": "int", "key": "Primary" }]
        });
        if settings {
            m["settings_fields"] = json!({ "PageSize": "Rows per page", "Theme": "Color theme" });
            m["default_settings"] = json!({ "PageSize": 25 });
        }
        let config: AdminConfig = serde_json::from_value(json!({ "modules": [m] })).unwrap();
        resolve(&config).unwrap().modules.remove(0)
    }

    #[tokio::test]
    async fn no_fields_means_no_io() {
        let p = Arc::new(MemorySettingsPersistence::default());
        let store = SettingsStore::load(&module(false), p.clone()).await.unwrap();
        assert!(store.all().is_none());
        assert_eq!((p.reads(), p.inserts(), p.writes()), (0, 0, 0));
    }

    #[tokio::test]
    async fn first_load_seeds_defaults_once() {
        let p = Arc::new(MemorySettingsPersistence::default());
        let store = SettingsStore::load(&module(true), p.clone()).await.unwrap();
        assert_eq!(store.get("pagesize"), Some(&json!(25)));
        assert_eq!(p.inserts(), 1);
        assert_eq!(p.writes(), 0);

        let _again = SettingsStore::load(&module(true), p.clone()).await.unwrap();
        assert_eq!(p.inserts(), 1);
        assert_eq!(p.reads(), 2);
    }

    #[tokio::test]
    async fn undeclared_setting_is_refused() {
        let p = Arc::new(MemorySettingsPersistence::default());
        let mut store = SettingsStore::load(&module(true), p.clone()).await.unwrap();
        assert!(!store.set("Colour", json!("red")));
        assert!(!store.is_dirty());
        assert!(!store.flush().await.unwrap());
        assert_eq!(p.writes(), 0);
    }

    #[tokio::test]
    async fn flush_after_set_writes_exactly_once() {
        let p = Arc::new(MemorySettingsPersistence::default());
        let mut store = SettingsStore::load(&module(true), p.clone()).await.unwrap();
        assert!(store.set("Theme", json!("dark")));
        assert!(store.set("PAGESIZE", json!(50)));
        assert!(store.flush().await.unwrap());
        assert!(!store.flush().await.unwrap());
        assert_eq!(p.writes(), 1);
        let saved = p.read("Widget").await.unwrap().unwrap();
        assert_eq!(saved.values.get("theme"), Some(&json!("dark")));
        assert_eq!(saved.values.get("pagesize"), Some(&json!(50)));
    }

    #[tokio::test]
    async fn dropped_dirty_store_still_writes() {
        let p = Arc::new(MemorySettingsPersistence::default());
        let mut store = SettingsStore::load(&module(true), p.clone()).await.unwrap();
        store.set("Theme", json!("light"));
        drop(store);
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(p.writes(), 1);
        let saved = p.read("Widget").await.unwrap().unwrap();
        assert_eq!(saved.values.get("theme"), Some(&json!("light")));
    }

    #[tokio::test]
    async fn flushed_store_does_not_write_again_on_drop() {
        let p = Arc::new(MemorySettingsPersistence::default());
        let mut store = SettingsStore::load(&module(true), p.clone()).await.unwrap();
        store.set("Theme", json!("light"));
        store.flush().await.unwrap();
        drop(store);
        tokio::task::yield_now().await;
        assert_eq!(p.writes(), 1);
    }
}
