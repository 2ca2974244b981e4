//! Load admin config from JSON and resolve it into the runtime model.

use crate::config::resolved::{Action, IgnoreLists, ModuleDescriptor, ResolvedModel, DEFAULT_ALLOWED_ACTIONS};
use crate::config::types::*;
use crate::config::{validate, ColumnDescriptor, KeyRole};
use crate::error::ConfigError;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Schema used for module tables when the config names none.
pub const DEFAULT_SCHEMA: &str = "public";

/// Build resolved model from admin config (validates first).
pub fn resolve(config: &AdminConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;
    let modules = config
        .modules
        .iter()
        .map(resolve_module)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ResolvedModel::new(modules))
}

fn default_components() -> BTreeMap<String, String> {
    [
        ("search", "This is the ability to search and display data."),
        ("edit", "The ability to edit existing data."),
        ("create", "The ability to create new data."),
        ("delete", "The ability to delete existing data."),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn named_items(items: &[(&str, &str)]) -> BTreeMap<String, String> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn to_set(names: &[String]) -> HashSet<String> {
    names.iter().cloned().collect()
}

fn parse_actions(module: &str, names: &[String]) -> Result<Vec<Action>, ConfigError> {
    names
        .iter()
        .map(|n| {
            n.parse::<Action>().map_err(|_| ConfigError::UnknownAction {
                module: module.to_string(),
                action: n.clone(),
            })
        })
        .collect()
}

fn resolve_module(m: &ModuleConfig) -> Result<ModuleDescriptor, ConfigError> {
    let columns: Vec<ColumnDescriptor> = m
        .columns
        .iter()
        .map(|c| {
            let mut d = ColumnDescriptor::new(c.name.clone(), c.type_.clone())
                .with_key(KeyRole::parse(c.key.as_deref()))
                .with_values(c.values.clone());
            d.default_value = c.default.as_ref().and_then(|d| d.0.clone());
            d.pg_type = c.pg_type.clone();
            d
        })
        .collect();

    let id_column = columns
        .iter()
        .find(|c| c.is_primary())
        .map(|c| c.name.clone())
        .ok_or_else(|| ConfigError::InvalidPrimaryKey {
            module: m.type_.clone(),
            reason: "no primary key column".into(),
        })?;

    let name_column = match &m.name_column {
        Some(n) => Some(n.clone()),
        None => columns.iter().find(|c| c.name == "Name").map(|c| c.name.clone()),
    };

    let mut allowed_actions = match &m.allowed_actions {
        Some(names) => parse_actions(&m.type_, names)?,
        None => DEFAULT_ALLOWED_ACTIONS.to_vec(),
    };
    let default_action = match &m.default_action {
        Some(a) => a.parse::<Action>().map_err(|_| ConfigError::UnknownAction {
            module: m.type_.clone(),
            action: a.clone(),
        })?,
        None => Action::List,
    };

    let mut components = m.components.clone().unwrap_or_else(default_components);
    let mut menu_items = named_items(&[("list", "List"), ("search", "Search"), ("create", "Create")]);
    let settings_fields: BTreeMap<String, String> = m
        .settings_fields
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.clone()))
        .collect();

    if !settings_fields.is_empty() {
        menu_items.insert("settings".into(), "Settings".into());
        if !allowed_actions.contains(&Action::Settings) {
            allowed_actions.push(Action::Settings);
        }
        components
            .entry("configure".into())
            .or_insert_with(|| "The ability to alter the module's configuration.".into());
    }

    let default_settings = m
        .default_settings
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.clone()))
        .collect();

    Ok(ModuleDescriptor {
        module_type: m.type_.clone(),
        schema_name: m.schema.clone().unwrap_or_else(|| DEFAULT_SCHEMA.into()),
        table_name: m.table.clone().unwrap_or_else(|| m.type_.clone()),
        id_column,
        name_column,
        columns,
        components,
        ignore: IgnoreLists {
            create: to_set(&m.ignore.create),
            edit: to_set(&m.ignore.edit),
            search: to_set(&m.ignore.search),
            view: to_set(&m.ignore.view),
            boolean: to_set(&m.ignore.boolean),
        },
        column_order: m.column_order.clone(),
        static_columns: m.static_columns.clone().unwrap_or_else(|| vec!["Name".into()]),
        edit_columns: m.edit_columns.clone(),
        allowed_actions,
        default_action,
        settings_fields,
        default_settings,
        group: m.group.clone().unwrap_or_else(|| "Admin".into()),
        visible_in_menu: m.visible_in_menu,
        menu_items,
        sub_menu_items: named_items(&[("view", "View"), ("edit", "Edit")]),
        quick_search: m.quick_search.clone(),
    })
}

/// Read an admin config JSON document from disk.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<AdminConfig, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading admin config");
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&text).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}
