//! Posted form data normalized and checked against column kinds.

use crate::config::{ColumnDescriptor, ColumnKind, ModuleDescriptor};
use crate::error::AppError;
use crate::record::{is_truthy, value_text};
use crate::request::FormData;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

pub struct RequestValidator;

impl RequestValidator {
    /// The module's `Type[...]` section when posted that way, otherwise the top-level fields.
    pub fn posted_fields<'a>(module: &ModuleDescriptor, post: &'a FormData) -> &'a Map<String, Value> {
        post.section(&module.module_type).unwrap_or_else(|| post.as_map())
    }

    /// Data for a new record. Empty values are dropped; flag columns are set from presence.
    pub fn create_data(module: &ModuleDescriptor, post: &FormData) -> Result<Map<String, Value>, AppError> {
        normalize(module, post, |_| true)
    }

    /// Data for an existing record. Flag columns on the boolean ignore list are left alone.
    pub fn edit_data(module: &ModuleDescriptor, post: &FormData) -> Result<Map<String, Value>, AppError> {
        normalize(module, post, |c| !module.ignore.boolean.contains(&c.name))
    }

    /// One non-empty value checked against its column kind. `fields` supplies companions
    /// such as a password confirmation.
    pub fn validate_column(
        column: &ColumnDescriptor,
        value: &Value,
        fields: &Map<String, Value>,
    ) -> Result<(), AppError> {
        if is_empty(value) {
            return Err(AppError::Validation(format!("{} is required", column.name)));
        }
        validate_field(column, value, fields)
    }
}

fn normalize(
    module: &ModuleDescriptor,
    post: &FormData,
    flag_from_presence: impl Fn(&ColumnDescriptor) -> bool,
) -> Result<Map<String, Value>, AppError> {
    let fields = RequestValidator::posted_fields(module, post);
    let mut data = Map::new();
    for column in &module.columns {
        if column.name == module.id_column {
            continue;
        }
        if column.is_flag() && flag_from_presence(column) {
            data.insert(column.name.clone(), Value::Bool(flag_value(fields.get(&column.name))));
            continue;
        }
        let Some(value) = fields.get(&column.name) else {
            continue;
        };
        if is_empty(value) {
            continue;
        }
        validate_field(column, value, fields)?;
        data.insert(column.name.clone(), value.clone());
    }
    Ok(data)
}

fn flag_value(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(other) => value_text(other).is_some_and(|t| is_truthy(&t)),
        None => false,
    }
}

fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn validate_field(column: &ColumnDescriptor, v: &Value, fields: &Map<String, Value>) -> Result<(), AppError> {
    let name = &column.name;
    let text = value_text(v).unwrap_or_default();
    match &column.kind {
        ColumnKind::Enum { options } => {
            if !options.iter().any(|o| o.value == text) {
                let allowed: Vec<&str> = options.iter().map(|o| o.value.as_str()).collect();
                return Err(AppError::Validation(format!(
                    "{} must be one of: {}",
                    name,
                    allowed.join(", ")
                )));
            }
        }
        ColumnKind::Numeric => {
            if text.trim().parse::<f64>().is_err() {
                return Err(AppError::Validation(format!("{} must be a number", name)));
            }
        }
        ColumnKind::Date | ColumnKind::SearchDate => {
            let t = text.trim();
            let ok = NaiveDate::parse_from_str(t, "%Y-%m-%d").is_ok()
                || NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S").is_ok()
                || NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S").is_ok();
            if !ok {
                return Err(AppError::Validation(format!("{} must be a date (YYYY-MM-DD)", name)));
            }
        }
        ColumnKind::Password => {
            if let Some(confirm) = fields.get(&format!("{}2", name)) {
                if value_text(confirm).unwrap_or_default() != text {
                    return Err(AppError::Validation(format!("{} does not match its confirmation", name)));
                }
            }
        }
        _ => {}
    }
    Ok(())
}
