//! Action dispatch: (method, action, sub-action) keys mapped to prepare handlers.

use super::Module;
use crate::config::{Action, ColumnDescriptor, ColumnKind};
use crate::error::AppError;
use crate::record::{clean_criteria, Criteria, Record};
use crate::request::Method;
use crate::service::RequestValidator;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Lookup key of a prepare handler. `None` method matches any method.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub method: Option<Method>,
    pub action: Action,
    pub sub_action: Option<String>,
}

impl HandlerKey {
    pub fn action(action: Action) -> Self {
        HandlerKey {
            method: None,
            action,
            sub_action: None,
        }
    }

    pub fn method(method: Method, action: Action) -> Self {
        HandlerKey {
            method: Some(method),
            action,
            sub_action: None,
        }
    }

    pub fn with_sub_action(mut self, sub_action: &str) -> Self {
        self.sub_action = Some(sub_action.to_lowercase());
        self
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(m) = self.method {
            write!(f, "{} ", m)?;
        }
        write!(f, "{}", self.action)?;
        if let Some(s) = &self.sub_action {
            write!(f, " {}", s)?;
        }
        Ok(())
    }
}

/// Handler keys to try, in order, without duplicates:
/// action+sub, action, method+action+sub, method+action.
pub fn candidate_keys(method: Method, action: Action, sub_action: Option<&str>) -> Vec<HandlerKey> {
    let sub = sub_action
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());
    let all = [
        HandlerKey { method: None, action, sub_action: sub.clone() },
        HandlerKey { method: None, action, sub_action: None },
        HandlerKey { method: Some(method), action, sub_action: sub },
        HandlerKey { method: Some(method), action, sub_action: None },
    ];
    let mut keys: Vec<HandlerKey> = Vec::with_capacity(all.len());
    for key in all {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Application-supplied prepare step.
#[async_trait]
pub trait PrepareHook: Send + Sync {
    async fn prepare(&self, module: &mut Module) -> Result<(), AppError>;
}

#[derive(Clone)]
pub enum PrepareHandler {
    List,
    GetCreate,
    GetEdit,
    GetSearch,
    View,
    GetSettings,
    PostCreate,
    PostEdit,
    PostSearch,
    PostSettings,
    EditColumn,
    Custom(Arc<dyn PrepareHook>),
}

impl fmt::Debug for PrepareHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrepareHandler::List => "List",
            PrepareHandler::GetCreate => "GetCreate",
            PrepareHandler::GetEdit => "GetEdit",
            PrepareHandler::GetSearch => "GetSearch",
            PrepareHandler::View => "View",
            PrepareHandler::GetSettings => "GetSettings",
            PrepareHandler::PostCreate => "PostCreate",
            PrepareHandler::PostEdit => "PostEdit",
            PrepareHandler::PostSearch => "PostSearch",
            PrepareHandler::PostSettings => "PostSettings",
            PrepareHandler::EditColumn => "EditColumn",
            PrepareHandler::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}

impl PrepareHandler {
    pub async fn run(&self, module: &mut Module) -> Result<(), AppError> {
        match self {
            PrepareHandler::List | PrepareHandler::PostSearch => module.prepare_post_search().await,
            PrepareHandler::GetCreate => module.prepare_get_create().await,
            PrepareHandler::GetEdit => module.prepare_get_edit().await,
            PrepareHandler::GetSearch => module.prepare_get_search().await,
            PrepareHandler::View => module.prepare_view().await,
            PrepareHandler::GetSettings => module.prepare_get_settings().await,
            PrepareHandler::PostCreate => module.prepare_post_create().await,
            PrepareHandler::PostEdit => module.prepare_post_edit().await,
            PrepareHandler::PostSettings => module.prepare_post_settings().await,
            PrepareHandler::EditColumn => module.prepare_edit_column().await,
            PrepareHandler::Custom(hook) => hook.prepare(module).await,
        }
    }
}

/// Handlers by key, shared by all modules, with per-module-type overrides.
#[derive(Clone, Debug, Default)]
pub struct HandlerRegistry {
    common: HashMap<HandlerKey, PrepareHandler>,
    per_module: HashMap<String, HashMap<HandlerKey, PrepareHandler>>,
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut r = Self::empty();
        r.register(HandlerKey::action(Action::List), PrepareHandler::List)
            .register(HandlerKey::method(Method::Get, Action::Create), PrepareHandler::GetCreate)
            .register(HandlerKey::method(Method::Get, Action::Edit), PrepareHandler::GetEdit)
            .register(HandlerKey::method(Method::Get, Action::Search), PrepareHandler::GetSearch)
            .register(HandlerKey::method(Method::Get, Action::View), PrepareHandler::View)
            .register(HandlerKey::action(Action::Item), PrepareHandler::View)
            .register(HandlerKey::method(Method::Get, Action::Settings), PrepareHandler::GetSettings)
            .register(HandlerKey::method(Method::Post, Action::Create), PrepareHandler::PostCreate)
            .register(HandlerKey::method(Method::Post, Action::Edit), PrepareHandler::PostEdit)
            .register(HandlerKey::method(Method::Post, Action::Search), PrepareHandler::PostSearch)
            .register(HandlerKey::method(Method::Post, Action::Settings), PrepareHandler::PostSettings)
            .register(HandlerKey::action(Action::EditColumn), PrepareHandler::EditColumn);
        r
    }

    pub fn register(&mut self, key: HandlerKey, handler: PrepareHandler) -> &mut Self {
        self.common.insert(key, handler);
        self
    }

    /// Handler used only by one module type; shadows the common one for the same key.
    pub fn register_for(&mut self, module_type: &str, key: HandlerKey, handler: PrepareHandler) -> &mut Self {
        self.per_module
            .entry(module_type.to_lowercase())
            .or_default()
            .insert(key, handler);
        self
    }

    pub fn lookup(&self, module_type: &str, key: &HandlerKey) -> Option<&PrepareHandler> {
        self.per_module
            .get(&module_type.to_lowercase())
            .and_then(|m| m.get(key))
            .or_else(|| self.common.get(key))
    }
}

fn columns_json(columns: &[ColumnDescriptor]) -> Value {
    Value::Array(
        columns
            .iter()
            .map(|c| serde_json::to_value(c).unwrap_or(Value::Null))
            .collect(),
    )
}

impl Module {
    /// Run every handler registered for the candidate keys. The first failure is recorded
    /// as the user-visible "failure" message and stops the remaining handlers.
    pub async fn prepare_template(&mut self) {
        let registry = Arc::clone(&self.env.handlers);
        let sub_action = self.request.sub_action();
        let keys = candidate_keys(self.request.method, self.current_action, sub_action.as_deref());
        for key in keys {
            let Some(handler) = registry.lookup(&self.descriptor.module_type, &key) else {
                continue;
            };
            tracing::debug!(module = %self.descriptor.module_type, handler = %key, kind = ?handler, "prepare");
            if let Err(e) = handler.run(self).await {
                tracing::warn!(module = %self.descriptor.module_type, handler = %key, error = %e, "prepare handler failed");
                self.set_template_data("failure", format!("Handler ({}) failed: {}", key, e));
                break;
            }
        }

        let summary = self.summary();
        self.set_template_data("module", summary);
        self.set_template_data("method", self.current_action.as_str());
        let current = if self.item.id > 0 { self.item.to_json() } else { Value::Null };
        self.set_template_data("currentItem", current);
    }

    fn columns_named(&self, names: &[String]) -> Vec<ColumnDescriptor> {
        names
            .iter()
            .filter_map(|n| self.descriptor.column(n).cloned())
            .collect()
    }

    fn posted_section(&self) -> Option<&Map<String, Value>> {
        self.request.post.section(&self.descriptor.module_type)
    }

    pub(crate) async fn prepare_get_create(&mut self) -> Result<(), AppError> {
        let d = &self.descriptor;
        let columns: Vec<ColumnDescriptor> = d
            .columns
            .iter()
            .filter(|c| c.name != d.id_column && !c.is_primary() && !d.ignore.create.contains(&c.name))
            .cloned()
            .collect();
        self.set_template_data("createColumns", columns_json(&columns));
        let form = self.render_fields(&columns, &Map::new()).await;
        self.set_template_data("createForm", form);
        Ok(())
    }

    pub(crate) async fn prepare_get_edit(&mut self) -> Result<(), AppError> {
        if !self.allow("edit").await || self.request.post.contains("No") {
            self.set_template_data("close", true);
            return Ok(());
        }
        let columns = self.columns_named(&self.get_columns(Some("edit")));
        self.set_template_data("idColumn", self.descriptor.id_column.clone());
        self.set_template_data("noID", self.item.id == 0);
        self.set_template_data("editColumns", columns_json(&columns));
        let values = self.item.values().clone();
        let form = self.render_fields(&columns, &values).await;
        self.set_template_data("editForm", form);
        Ok(())
    }

    pub(crate) async fn prepare_get_search(&mut self) -> Result<(), AppError> {
        let columns: Vec<ColumnDescriptor> = self
            .columns_named(&self.get_columns(Some("search")))
            .into_iter()
            .filter(|c| c.kind != ColumnKind::Password)
            .map(|c| match c.kind {
                ColumnKind::RichText => c.with_kind(ColumnKind::Text),
                ColumnKind::Date => c.with_kind(ColumnKind::SearchDate),
                _ => c,
            })
            .collect();
        self.set_template_data("searchColumns", columns_json(&columns));
        let values = self
            .request
            .query
            .section(&self.descriptor.module_type)
            .cloned()
            .unwrap_or_default();
        let form = self.render_fields(&columns, &values).await;
        self.set_template_data("searchForm", form);
        Ok(())
    }

    pub(crate) async fn prepare_view(&mut self) -> Result<(), AppError> {
        if self.item.id == 0 {
            return Err(AppError::NotFound(format!("{} not found", self.descriptor.module_type)));
        }
        let item = self.item.clone();
        let mut rows = Vec::new();
        for name in self.get_columns(Some("view")) {
            let value = self.column_value(&item, &name).await;
            rows.push(json!({ "column": name, "title": self.column_title(&name), "value": value }));
        }
        self.set_template_data("viewColumns", Value::Array(rows));
        self.set_template_data("item", item.to_json());
        Ok(())
    }

    pub(crate) async fn prepare_get_settings(&mut self) -> Result<(), AppError> {
        let module_type = self.descriptor.module_type.clone();
        let mut form = String::new();
        for (name, description) in self.settings_fields().clone() {
            let value = self
                .get_setting(Some(&name))
                .as_ref()
                .and_then(crate::record::value_text);
            let input = super::widget::text_input(
                &super::widget::field_name(&module_type, &name),
                &super::widget::field_id(&module_type, &name),
                value.as_deref(),
            );
            form.push_str(&super::widget::field(&description, &input));
        }
        self.set_template_data("settingsFields", json!(self.settings_fields()));
        self.set_template_data("settings", self.get_setting(None).unwrap_or(Value::Null));
        self.set_template_data("settingsForm", form);
        Ok(())
    }

    pub(crate) async fn prepare_post_create(&mut self) -> Result<(), AppError> {
        if !self.allow("create").await {
            return Err(AppError::PermissionDenied("Action (create) not allowed".into()));
        }
        let data = RequestValidator::create_data(&self.descriptor, &self.request.post)?;
        let mut record = Record::new(&self.descriptor);
        record.set_all(data);
        if !self.records.save(&self.descriptor, &mut record).await? {
            return Err(AppError::Persistence(format!(
                "This {} could not be created.",
                self.descriptor.module_type
            )));
        }
        tracing::info!(module = %self.descriptor.module_type, id = record.id, "created");
        self.item = record;
        self.set_template_data("success", format!("This {} has been created.", self.descriptor.module_type));
        Ok(())
    }

    pub(crate) async fn prepare_post_edit(&mut self) -> Result<(), AppError> {
        if !self.allow("edit").await {
            return Err(AppError::PermissionDenied("Action (update) not allowed".into()));
        }
        if self.item.id == 0 {
            return Err(AppError::NotFound(format!("{} not found", self.descriptor.module_type)));
        }
        let data = RequestValidator::edit_data(&self.descriptor, &self.request.post)?;
        self.item.set_all(data);
        let module_type = self.descriptor.module_type.clone();
        if self.records.save(&self.descriptor, &mut self.item).await? {
            self.set_template_data("success", format!("This {} update has been successful.", module_type));
        } else {
            self.set_template_data("failure", format!("This {} update has failed.", module_type));
        }
        self.session.clear(&super::edit_column::session_key(&module_type)).await?;
        self.current_action = Action::View;
        Ok(())
    }

    pub(crate) async fn prepare_post_search(&mut self) -> Result<(), AppError> {
        let raw = self
            .posted_section()
            .or_else(|| self.request.query.section(&self.descriptor.module_type))
            .cloned()
            .unwrap_or_default();
        let criteria: Criteria = clean_criteria(&raw)
            .into_iter()
            .filter(|(k, _)| self.descriptor.has_column(k))
            .collect();
        let sort = self.descriptor.id_column.clone();
        let found = self.records.search(&self.descriptor, &criteria, Some(&sort)).await?;

        if self.request.sub_action().as_deref() == Some("quick") && found.len() == 1 {
            let target = self.uri(&[&found[0].id.to_string()]);
            self.set_template_data("redirect", target);
        }

        let columns = self.get_columns(Some("search"));
        let mut headers = Vec::with_capacity(columns.len());
        for name in &columns {
            let header = self.search_grid_header(name).await;
            headers.push(json!({ "name": name, "title": self.column_title(name), "header": header }));
        }

        let mut rows = Vec::with_capacity(found.len());
        for record in &found {
            let mut cells = Vec::with_capacity(columns.len());
            for name in &columns {
                cells.push(self.column_value(record, name).await);
            }
            rows.push(json!({
                "id": record.id,
                "control": self.search_grid_row_control(record.id),
                "cells": cells,
            }));
        }

        let id_column = self.descriptor.id_column.clone();
        self.set_template_data("data", Value::Array(found.iter().map(Record::to_json).collect()));
        self.set_template_data("idColumn", id_column);
        self.set_template_data("dataColumns", Value::Array(headers));
        self.set_template_data("rows", Value::Array(rows));
        Ok(())
    }

    pub(crate) async fn prepare_post_settings(&mut self) -> Result<(), AppError> {
        if !self.allow("settings").await {
            return Err(AppError::PermissionDenied("Action (settings) not allowed".into()));
        }
        let Some(posted) = self.posted_section().cloned() else {
            return Err(AppError::Validation("Nothing to save!".into()));
        };
        for (name, value) in posted {
            if !self.set_setting(&name, value) {
                tracing::debug!(module = %self.descriptor.module_type, setting = %name, "undeclared setting ignored");
            }
        }
        self.settings.flush().await?;
        self.set_template_data("success", "Settings saved.");
        Ok(())
    }

    pub(crate) async fn prepare_edit_column(&mut self) -> Result<(), AppError> {
        let popup = self.request.sub_action().as_deref() == Some("popup");
        let html = self.edit_column(popup).await?;
        self.set_template_data("editColumn", html);
        Ok(())
    }
}
