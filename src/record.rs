//! Records and the persistence seam modules load, search, save and delete through.

use crate::config::ModuleDescriptor;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One row of an entity. `id == 0` means "not stored yet".
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub module_type: String,
    pub id_column: String,
    pub name_column: Option<String>,
    pub id: i64,
    values: Map<String, Value>,
}

impl Record {
    /// Empty record for a module.
    pub fn new(module: &ModuleDescriptor) -> Self {
        Record {
            module_type: module.module_type.clone(),
            id_column: module.id_column.clone(),
            name_column: module.name_column.clone(),
            id: 0,
            values: Map::new(),
        }
    }

    /// Record built from stored column values; the id is read from the id column.
    pub fn from_values(module: &ModuleDescriptor, values: Map<String, Value>) -> Self {
        let mut r = Record::new(module);
        r.set_all(values);
        r
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        if column == self.id_column {
            self.id = value_id(&value).unwrap_or(self.id);
        }
        self.values.insert(column, value);
    }

    pub fn set_all(&mut self, values: Map<String, Value>) {
        for (k, v) in values {
            self.set(k, v);
        }
    }

    pub fn assign_id(&mut self, id: i64) {
        self.id = id;
        self.values.insert(self.id_column.clone(), Value::from(id));
    }

    /// Display name from the name column, if the entity has one.
    pub fn name(&self) -> Option<String> {
        self.name_column
            .as_deref()
            .and_then(|c| self.values.get(c))
            .and_then(value_text)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Column-keyed JSON object including the id column.
    pub fn to_json(&self) -> Value {
        let mut map = self.values.clone();
        if self.id > 0 {
            map.insert(self.id_column.clone(), Value::from(self.id));
        }
        Value::Object(map)
    }
}

/// Integer id from a stored or posted value.
pub fn value_id(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text form of a value as it appears in forms and criteria. `null` has none.
pub fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(true) => Some("1".into()),
        Value::Bool(false) => Some("0".into()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Loose equality used for criteria: `true == "1"`, `3 == "3"`. Stored booleans also match "true"/"false".
pub fn values_match(stored: &Value, wanted: &Value) -> bool {
    if let (Value::Bool(flag), Some(w)) = (stored, value_text(wanted)) {
        if w.eq_ignore_ascii_case("true") {
            return *flag;
        }
        if w.eq_ignore_ascii_case("false") {
            return !*flag;
        }
    }
    match (value_text(stored), value_text(wanted)) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(&b),
        (None, None) => true,
        _ => false,
    }
}

pub fn is_truthy(text: &str) -> bool {
    !(text.is_empty() || text == "0" || text.eq_ignore_ascii_case("false"))
}

/// Exact-match search criteria; an array value matches any of its elements.
pub type Criteria = BTreeMap<String, Value>;

/// Drop empty terms the way a blank search field means "any".
pub fn clean_criteria(raw: &Map<String, Value>) -> Criteria {
    raw.iter()
        .filter(|(_, v)| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
            _ => true,
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Record persistence collaborator.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Record by id, `None` when it does not exist.
    async fn load(&self, module: &ModuleDescriptor, id: i64) -> Result<Option<Record>, AppError>;

    /// Records matching all criteria, ordered by `sort_column` (id column when `None`).
    async fn search(
        &self,
        module: &ModuleDescriptor,
        criteria: &Criteria,
        sort_column: Option<&str>,
    ) -> Result<Vec<Record>, AppError>;

    /// Insert (id 0) or update. New records get their id assigned.
    async fn save(&self, module: &ModuleDescriptor, record: &mut Record) -> Result<bool, AppError>;

    async fn delete(&self, module: &ModuleDescriptor, record: &Record) -> Result<bool, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, AdminConfig};
    use serde_json::json;

    fn widget() -> ModuleDescriptor {
        let config: AdminConfig = serde_json::from_value(json!({ "modules": [{
            "type": "Widget",
            "columns": [
                { "name": "WidgetID", "type": "int(10)", "key": "Primary" },
                { "name": "Name", "type": "varchar(255)" }
            ]
        }]}))
        .unwrap();
        resolve(&config).unwrap().modules.remove(0)
    }

    #[test]
    fn id_column_sets_record_id() {
        let mut values = Map::new();
        values.insert("WidgetID".into(), json!("12"));
        values.insert("Name".into(), json!("Sprocket"));
        let r = Record::from_values(&widget(), values);
        assert_eq!(r.id, 12);
        assert_eq!(r.name().as_deref(), Some("Sprocket"));
    }

    #[test]
    fn blank_criteria_are_dropped() {
        let raw = json!({ "Name": "", "Active": "1", "Tags": [] });
        let c = clean_criteria(raw.as_object().unwrap());
        assert_eq!(c.len(), 1);
        assert!(c.contains_key("Active"));
    }

    #[test]
    fn loose_matching() {
        assert!(values_match(&json!(true), &json!("1")));
        assert!(values_match(&json!(3), &json!("3")));
        assert!(values_match(&json!(1), &json!(true)));
        assert!(!values_match(&json!("a"), &json!("b")));
        assert!(values_match(&json!(false), &json!("false")));
    }

    #[test]
    fn text_never_matches_a_boolean_term() {
        assert!(!values_match(&json!("Sprocket"), &json!("true")));
        assert!(!values_match(&json!("Sprocket"), &json!(true)));
        assert!(values_match(&json!(true), &json!("TRUE")));
        assert!(!values_match(&json!(true), &json!("false")));
    }
}
