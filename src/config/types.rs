//! Raw admin config types as read from JSON.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Column default: any JSON scalar is accepted and kept as its string form.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnDefaultConfig(pub Option<String>);

impl<'de> Deserialize<'de> for ColumnDefaultConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::Null => Ok(ColumnDefaultConfig(None)),
            serde_json::Value::String(s) => Ok(ColumnDefaultConfig(Some(s))),
            serde_json::Value::Number(n) => Ok(ColumnDefaultConfig(Some(n.to_string()))),
            serde_json::Value::Bool(b) => Ok(ColumnDefaultConfig(Some(if b { "1" } else { "0" }.into()))),
            other => Err(serde::de::Error::custom(format!(
                "column default must be a string, number, boolean or null; got {}",
                type_name_of_json(&other)
            ))),
        }
    }
}

fn type_name_of_json(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    /// Declared type string, e.g. "varchar(255)", "enum('a','b')", "tinyint(1)".
    #[serde(rename = "type")]
    pub type_: String,
    /// Key role: "Primary"/"PRI" or "Unique"/"UNI".
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub default: Option<ColumnDefaultConfig>,
    /// Button values for `radio` columns.
    #[serde(default)]
    pub values: Vec<String>,
    /// PostgreSQL cast used when binding values (e.g. "bigint", "date").
    #[serde(default)]
    pub pg_type: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IgnoreConfig {
    #[serde(default)]
    pub create: Vec<String>,
    #[serde(default)]
    pub edit: Vec<String>,
    #[serde(default)]
    pub search: Vec<String>,
    #[serde(default)]
    pub view: Vec<String>,
    #[serde(default)]
    pub boolean: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleConfig {
    #[serde(rename = "type")]
    pub type_: String,
    /// Backing table; defaults to the module type.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub ignore: IgnoreConfig,
    #[serde(default)]
    pub column_order: Vec<String>,
    /// Columns whose search header offers an inline batch edit trigger.
    #[serde(default)]
    pub edit_columns: Vec<String>,
    /// Columns never offered for inline batch edit. Defaults to ["Name"].
    #[serde(default)]
    pub static_columns: Option<Vec<String>>,
    #[serde(default)]
    pub default_action: Option<String>,
    #[serde(default)]
    pub allowed_actions: Option<Vec<String>>,
    /// Permission component catalog (name -> description); defaults to search/edit/create/delete.
    #[serde(default)]
    pub components: Option<BTreeMap<String, String>>,
    /// Declared settings fields (name -> description).
    #[serde(default)]
    pub settings_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub default_settings: serde_json::Map<String, serde_json::Value>,
    /// Column holding a record's display name; defaults to "Name" when present.
    #[serde(default)]
    pub name_column: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default = "default_true")]
    pub visible_in_menu: bool,
    #[serde(default)]
    pub quick_search: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

/// A user's grants: components per module type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GrantConfig {
    pub user: String,
    pub module: String,
    pub components: Vec<String>,
}

/// The whole admin configuration document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
    /// Template roots searched in order.
    #[serde(default)]
    pub template_dirs: Vec<String>,
    #[serde(default)]
    pub grants: Vec<GrantConfig>,
    #[serde(default)]
    pub base_uri: Option<String>,
    /// Endpoint answering the state/city/zip cascade lookups.
    #[serde(default)]
    pub lookup_uri: Option<String>,
    #[serde(default)]
    pub use_popups: bool,
}
