//! In-memory collaborators for tests and database-less deployments.

use crate::config::ModuleDescriptor;
use crate::error::AppError;
use crate::record::{value_id, value_text, values_match, Criteria, Record, RecordStore};
use crate::session::{SessionProvider, SessionStore};
use crate::settings::{SettingsBlob, SettingsPersistence};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<'a, T>(m: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, AppError> {
    m.lock()
        .map_err(|_| AppError::Persistence(format!("{} lock poisoned", what)))
}

type Rows = BTreeMap<i64, Map<String, Value>>;

/// Rows per module type (lower-cased), keyed by id.
#[derive(Default)]
pub struct MemoryRecordStore {
    tables: Mutex<HashMap<String, Rows>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row directly, assigning the next id when the row has none.
    pub fn seed(&self, module: &ModuleDescriptor, values: Value) -> Result<i64, AppError> {
        let Value::Object(mut values) = values else {
            return Err(AppError::BadRequest("seed row must be an object".into()));
        };
        let mut tables = lock(&self.tables, "record")?;
        let rows = tables.entry(module.module_type.to_lowercase()).or_default();
        let id = match values.get(&module.id_column).and_then(value_id) {
            Some(id) if id > 0 => id,
            _ => rows.keys().next_back().copied().unwrap_or(0) + 1,
        };
        values.insert(module.id_column.clone(), Value::from(id));
        rows.insert(id, values);
        Ok(id)
    }

    pub fn count(&self, module_type: &str) -> usize {
        self.tables
            .lock()
            .map(|t| t.get(&module_type.to_lowercase()).map(|r| r.len()).unwrap_or(0))
            .unwrap_or(0)
    }
}

fn matches(row: &Map<String, Value>, criteria: &Criteria) -> bool {
    criteria.iter().all(|(col, wanted)| {
        let stored = row.get(col).unwrap_or(&Value::Null);
        match wanted {
            Value::Array(options) => options.iter().any(|o| values_match(stored, o)),
            other => values_match(stored, other),
        }
    })
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.and_then(value_text);
    let b = b.and_then(value_text);
    match (a.as_deref().map(str::parse::<f64>), b.as_deref().map(str::parse::<f64>)) {
        (Some(Ok(x)), Some(Ok(y))) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(&b),
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn load(&self, module: &ModuleDescriptor, id: i64) -> Result<Option<Record>, AppError> {
        let tables = lock(&self.tables, "record")?;
        Ok(tables
            .get(&module.module_type.to_lowercase())
            .and_then(|rows| rows.get(&id))
            .map(|values| Record::from_values(module, values.clone())))
    }

    async fn search(
        &self,
        module: &ModuleDescriptor,
        criteria: &Criteria,
        sort_column: Option<&str>,
    ) -> Result<Vec<Record>, AppError> {
        let tables = lock(&self.tables, "record")?;
        let Some(rows) = tables.get(&module.module_type.to_lowercase()) else {
            return Ok(Vec::new());
        };
        let mut found: Vec<&Map<String, Value>> = rows.values().filter(|r| matches(r, criteria)).collect();
        if let Some(sort) = sort_column.filter(|s| *s != module.id_column) {
            found.sort_by(|a, b| compare(a.get(sort), b.get(sort)));
        }
        Ok(found
            .into_iter()
            .map(|values| Record::from_values(module, values.clone()))
            .collect())
    }

    async fn save(&self, module: &ModuleDescriptor, record: &mut Record) -> Result<bool, AppError> {
        let mut tables = lock(&self.tables, "record")?;
        let rows = tables.entry(module.module_type.to_lowercase()).or_default();
        if record.id == 0 {
            let id = rows.keys().next_back().copied().unwrap_or(0) + 1;
            record.assign_id(id);
        }
        let mut values = rows.get(&record.id).cloned().unwrap_or_default();
        for (k, v) in record.values() {
            if module.has_column(k) {
                values.insert(k.clone(), v.clone());
            }
        }
        values.insert(module.id_column.clone(), Value::from(record.id));
        rows.insert(record.id, values);
        Ok(true)
    }

    async fn delete(&self, module: &ModuleDescriptor, record: &Record) -> Result<bool, AppError> {
        let mut tables = lock(&self.tables, "record")?;
        Ok(tables
            .get_mut(&module.module_type.to_lowercase())
            .and_then(|rows| rows.remove(&record.id))
            .is_some())
    }
}

/// Settings blobs in memory, counting every read, insert and write.
#[derive(Default)]
pub struct MemorySettingsPersistence {
    blobs: Mutex<HashMap<String, SettingsBlob>>,
    reads: AtomicUsize,
    inserts: AtomicUsize,
    writes: AtomicUsize,
}

impl MemorySettingsPersistence {
    pub fn reads(&self) -> usize {
        self.reads.load(AtomicOrdering::SeqCst)
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(AtomicOrdering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl SettingsPersistence for MemorySettingsPersistence {
    async fn read(&self, module_type: &str) -> Result<Option<SettingsBlob>, AppError> {
        self.reads.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(lock(&self.blobs, "settings")?.get(module_type).cloned())
    }

    async fn write(&self, module_type: &str, blob: &SettingsBlob) -> Result<(), AppError> {
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);
        lock(&self.blobs, "settings")?.insert(module_type.to_string(), blob.clone());
        Ok(())
    }

    async fn insert(&self, module_type: &str, blob: &SettingsBlob) -> Result<(), AppError> {
        self.inserts.fetch_add(1, AtomicOrdering::SeqCst);
        lock(&self.blobs, "settings")?
            .entry(module_type.to_string())
            .or_insert_with(|| blob.clone());
        Ok(())
    }
}

/// All sessions in memory, keyed by session id then key.
#[derive(Clone, Default)]
pub struct MemorySessions {
    inner: Arc<Mutex<HashMap<String, HashMap<String, Value>>>>,
}

impl MemorySessions {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionProvider for MemorySessions {
    fn session(&self, session_id: &str) -> Arc<dyn SessionStore> {
        Arc::new(MemorySession {
            id: session_id.to_string(),
            inner: Arc::clone(&self.inner),
        })
    }
}

pub struct MemorySession {
    id: String,
    inner: Arc<Mutex<HashMap<String, HashMap<String, Value>>>>,
}

#[async_trait]
impl SessionStore for MemorySession {
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        let sessions = lock(&self.inner, "session")?;
        Ok(sessions.get(&self.id).and_then(|s| s.get(key)).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), AppError> {
        lock(&self.inner, "session")?
            .entry(self.id.clone())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), AppError> {
        if let Some(s) = lock(&self.inner, "session")?.get_mut(&self.id) {
            s.remove(key);
        }
        Ok(())
    }
}
