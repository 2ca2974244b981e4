//! Config validation: unique names, one primary key, known actions and references.

use crate::config::{Action, AdminConfig, KeyRole, ModuleConfig};
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(config: &AdminConfig) -> Result<(), ConfigError> {
    let mut types = HashSet::new();
    for m in &config.modules {
        if m.type_.trim().is_empty() {
            return Err(ConfigError::Validation("module type must not be empty".into()));
        }
        if !types.insert(m.type_.to_lowercase()) {
            return Err(ConfigError::DuplicateModule(m.type_.clone()));
        }
        validate_module(m)?;
    }

    for g in &config.grants {
        if !types.contains(&g.module.to_lowercase()) {
            return Err(ConfigError::MissingReference {
                kind: "module",
                id: g.module.clone(),
            });
        }
    }

    Ok(())
}

fn validate_module(m: &ModuleConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    let mut primary = 0usize;
    for c in &m.columns {
        if !names.insert(c.name.as_str()) {
            return Err(ConfigError::DuplicateColumn {
                module: m.type_.clone(),
                column: c.name.clone(),
            });
        }
        if KeyRole::parse(c.key.as_deref()) == KeyRole::Primary {
            primary += 1;
        }
    }
    if primary != 1 {
        return Err(ConfigError::InvalidPrimaryKey {
            module: m.type_.clone(),
            reason: format!("expected exactly one primary key column, found {}", primary),
        });
    }

    for name in m.column_order.iter().chain(m.edit_columns.iter()) {
        if !names.contains(name.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "column",
                id: format!("{}.{}", m.type_, name),
            });
        }
    }

    if let Some(n) = &m.name_column {
        if !names.contains(n.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "column",
                id: format!("{}.{}", m.type_, n),
            });
        }
    }

    // The default action must itself be allowed.
    let allowed: Option<Vec<Action>> = match &m.allowed_actions {
        Some(list) => Some(
            list.iter()
                .map(|a| {
                    a.parse::<Action>().map_err(|_| ConfigError::UnknownAction {
                        module: m.type_.clone(),
                        action: a.clone(),
                    })
                })
                .collect::<Result<_, _>>()?,
        ),
        None => None,
    };
    if let Some(allowed) = &allowed {
        let default_name = m.default_action.as_deref().unwrap_or("list");
        let default = default_name.parse::<Action>().map_err(|_| ConfigError::UnknownAction {
            module: m.type_.clone(),
            action: default_name.to_string(),
        })?;
        if !allowed.contains(&default) {
            return Err(ConfigError::Validation(format!(
                "module {}: default action '{}' is not an allowed action",
                m.type_, default
            )));
        }
    }

    Ok(())
}
