//! Admin module: one instance per request, driving CRUD, search, batch edit and settings for one entity type.

pub mod action;
pub mod api;
pub mod edit_column;
pub mod form;
pub mod template;
pub mod widget;

pub use action::{candidate_keys, HandlerKey, HandlerRegistry, PrepareHandler, PrepareHook};
pub use api::ApiOutcome;
pub use edit_column::{EditPhase, EditSession};
pub use form::FormState;

use crate::case::{column_label, foreign_key_entity};
use crate::config::{resolve, Action, AdminConfig, ModuleDescriptor, ResolvedModel};
use crate::error::{AppError, ConfigError};
use crate::permission::{AuthorizationProvider, PermissionGate};
use crate::record::{value_id, Record, RecordStore};
use crate::request::RequestContext;
use crate::session::SessionStore;
use crate::settings::{SettingsPersistence, SettingsStore};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared, read-only admin setup: resolved modules, handler registry, template roots and URIs.
#[derive(Clone)]
pub struct AdminEnv {
    pub model: Arc<ResolvedModel>,
    pub handlers: Arc<HandlerRegistry>,
    pub template_dirs: Vec<PathBuf>,
    pub base_uri: String,
    /// Endpoint for the state/city/zip cascade.
    pub lookup_uri: String,
    pub use_popups: bool,
}

impl AdminEnv {
    pub fn from_config(config: &AdminConfig) -> Result<Self, ConfigError> {
        Ok(AdminEnv {
            model: Arc::new(resolve(config)?),
            handlers: Arc::new(HandlerRegistry::builtin()),
            template_dirs: config.template_dirs.iter().map(PathBuf::from).collect(),
            base_uri: config.base_uri.clone().unwrap_or_else(|| "/admin".into()),
            lookup_uri: config.lookup_uri.clone().unwrap_or_else(|| "/lookup".into()),
            use_popups: config.use_popups,
        })
    }

    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = Arc::new(handlers);
        self
    }
}

/// Per-request collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub records: Arc<dyn RecordStore>,
    pub authorizer: Arc<dyn AuthorizationProvider>,
    pub settings: Arc<dyn SettingsPersistence>,
    pub session: Arc<dyn SessionStore>,
}

pub struct Module {
    pub(crate) env: Arc<AdminEnv>,
    pub(crate) records: Arc<dyn RecordStore>,
    pub(crate) session: Arc<dyn SessionStore>,
    pub(crate) descriptor: ModuleDescriptor,
    pub(crate) request: RequestContext,
    pub(crate) item: Record,
    pub(crate) current_action: Action,
    pub(crate) gate: PermissionGate,
    pub(crate) settings: SettingsStore,
    pub(crate) template_data: Map<String, Value>,
    pub(crate) form: FormState,
    name_cache: HashMap<(String, i64), Option<String>>,
}

impl Module {
    /// Build the module for `module_type`: load settings, the addressed item, and pick the current action.
    pub async fn open(
        env: Arc<AdminEnv>,
        collaborators: Collaborators,
        module_type: &str,
        request: RequestContext,
    ) -> Result<Self, AppError> {
        let mut descriptor = env
            .model
            .module(module_type)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("module not found: {}", module_type)))?;

        let settings = SettingsStore::load(&descriptor, collaborators.settings.clone()).await?;

        let mut item = Record::new(&descriptor);
        if let Some(id) = request.id {
            match collaborators.records.load(&descriptor, id).await {
                Ok(Some(found)) => item = found,
                Ok(None) => tracing::debug!(module = %descriptor.module_type, id, "item not found"),
                Err(e) => tracing::warn!(module = %descriptor.module_type, id, error = %e, "item load failed"),
            }
        }
        if item.id > 0 {
            descriptor.menu_items.insert("item".into(), "Item".into());
            if !descriptor.allowed_actions.contains(&Action::Item) {
                descriptor.allowed_actions.push(Action::Item);
            }
        }

        let current_action = request
            .action
            .as_deref()
            .and_then(|a| a.parse::<Action>().ok())
            .filter(|a| descriptor.allowed_actions.contains(a))
            .unwrap_or(descriptor.default_action);

        tracing::debug!(
            module = %descriptor.module_type,
            method = %request.method,
            requested = ?request.action,
            action = %current_action,
            "module opened"
        );

        Ok(Module {
            gate: PermissionGate::new(descriptor.module_type.clone(), collaborators.authorizer),
            env,
            records: collaborators.records,
            session: collaborators.session,
            descriptor,
            request,
            item,
            current_action,
            settings,
            template_data: Map::new(),
            form: FormState::default(),
            name_cache: HashMap::new(),
        })
    }

    /// End of the module's life: write settings back if they changed. Returns false when that write failed.
    pub async fn finish(mut self) -> bool {
        match self.settings.flush().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(module = %self.descriptor.module_type, error = %e, "settings flush failed");
                false
            }
        }
    }

    pub fn module_type(&self) -> &str {
        &self.descriptor.module_type
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    pub fn current_action(&self) -> Action {
        self.current_action
    }

    pub fn set_current_action(&mut self, action: Action) {
        self.current_action = action;
    }

    pub fn item(&self) -> &Record {
        &self.item
    }

    pub fn template_data(&self) -> &Map<String, Value> {
        &self.template_data
    }

    pub fn set_template_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.template_data.insert(key.into(), value.into());
    }

    pub async fn allow(&mut self, component: &str) -> bool {
        self.gate.allow(component).await
    }

    pub fn is_search(&self) -> bool {
        self.request.is_search()
    }

    pub fn title(&self) -> String {
        self.descriptor.title()
    }

    pub fn group(&self) -> &str {
        &self.descriptor.group
    }

    pub fn visible_in_menu(&self) -> bool {
        self.descriptor.visible_in_menu
    }

    pub fn components(&self) -> &BTreeMap<String, String> {
        &self.descriptor.components
    }

    pub fn menu_items(&self) -> &BTreeMap<String, String> {
        &self.descriptor.menu_items
    }

    pub fn sub_menu_items(&self) -> &BTreeMap<String, String> {
        &self.descriptor.sub_menu_items
    }

    pub fn quick_search(&self) -> &BTreeMap<String, String> {
        &self.descriptor.quick_search
    }

    pub fn settings_fields(&self) -> &BTreeMap<String, String> {
        self.settings.fields()
    }

    pub fn current_item_title(&self) -> Option<String> {
        self.item.name()
    }

    /// One setting, or every setting when `name` is `None`.
    pub fn get_setting(&self, name: Option<&str>) -> Option<Value> {
        match name.filter(|n| !n.is_empty()) {
            Some(n) => self.settings.get(n).cloned(),
            None => self.settings.all(),
        }
    }

    pub fn set_setting(&mut self, name: &str, value: Value) -> bool {
        self.settings.set(name, value)
    }

    /// `{base}/{type}/{parts...}` with the type lower-cased.
    pub fn uri(&self, parts: &[&str]) -> String {
        let mut uri = format!(
            "{}/{}",
            self.env.base_uri.trim_end_matches('/'),
            self.descriptor.module_type.to_lowercase()
        );
        for p in parts.iter().filter(|p| !p.is_empty()) {
            uri.push('/');
            uri.push_str(p);
        }
        uri
    }

    /// Column names for a context: id column dropped, context ignore list applied, configured order first.
    /// Without a known context every non-id column is returned in declared order.
    pub fn get_columns(&self, context: Option<&str>) -> Vec<String> {
        let d = &self.descriptor;
        let names: Vec<String> = d
            .columns
            .iter()
            .filter(|c| c.name != d.id_column)
            .map(|c| c.name.clone())
            .collect();

        let Some(ignore) = context.and_then(|c| d.ignore.for_context(c)) else {
            return names;
        };

        let remaining: Vec<String> = names.into_iter().filter(|n| !ignore.contains(n)).collect();
        let mut ordered: Vec<String> = Vec::with_capacity(remaining.len());
        for name in d.column_order.iter().chain(remaining.iter()) {
            if remaining.contains(name) && !ordered.contains(name) {
                ordered.push(name.clone());
            }
        }
        ordered
    }

    /// Registered entity a column refers to by the `<Entity>ID` convention.
    pub fn referenced_module(&self, column: &str) -> Option<&ModuleDescriptor> {
        let entity = match column {
            "UserID" => "User",
            "KeyID" => "ResourceKey",
            other => foreign_key_entity(other)?,
        };
        self.env.model.module(entity)
    }

    pub fn column_title(&self, column: &str) -> String {
        match self.referenced_module(column) {
            Some(m) if m.module_type != self.descriptor.module_type => m.title(),
            _ => column_label(column),
        }
    }

    /// Display value of a column: references resolve to the referenced record's name ("None" for no reference).
    pub async fn column_value(&mut self, record: &Record, column: &str) -> Value {
        let raw = record.get(column).cloned().unwrap_or(Value::Null);
        if column == self.descriptor.id_column {
            return raw;
        }
        let Some(referenced) = self.referenced_module(column).filter(|m| m.name_column.is_some()).cloned() else {
            return raw;
        };
        let id = value_id(&raw).unwrap_or(0);
        if id == 0 {
            return Value::String("None".into());
        }
        let key = (referenced.module_type.clone(), id);
        if let Some(cached) = self.name_cache.get(&key) {
            return cached.clone().map(Value::String).unwrap_or(raw);
        }
        let name = match self.records.load(&referenced, id).await {
            Ok(found) => found.and_then(|r| r.name()),
            Err(e) => {
                tracing::warn!(module = %referenced.module_type, id, error = %e, "reference lookup failed");
                None
            }
        };
        self.name_cache.insert(key, name.clone());
        name.map(Value::String).unwrap_or(raw)
    }

    /// Summary of the module placed in template data after preparation.
    pub fn summary(&self) -> Value {
        json!({
            "type": self.descriptor.module_type,
            "title": self.title(),
            "group": self.descriptor.group,
            "visibleInMenu": self.descriptor.visible_in_menu,
            "menuItems": self.descriptor.menu_items,
            "subMenuItems": self.descriptor.sub_menu_items,
            "quickSearch": self.descriptor.quick_search,
            "components": self.descriptor.components,
            "uri": self.uri(&[]),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::request::Method;

    #[tokio::test]
    async fn unknown_or_disallowed_action_falls_back_to_default() {
        let f = Fixture::new();
        let m = f.open("Widget", get("explode")).await;
        assert_eq!(m.current_action(), Action::List);
        let m = f.open("Widget", get("item")).await;
        assert_eq!(m.current_action(), Action::List);
        let m = f.open("widget", get("Search")).await;
        assert_eq!(m.current_action(), Action::Search);
        m.finish().await;
    }

    #[tokio::test]
    async fn loaded_item_enables_item_action() {
        let f = Fixture::new();
        let id = f
            .records
            .seed(&f.module_descriptor("Widget"), json!({ "Name": "Sprocket" }))
            .unwrap();
        let m = f.open("Widget", get("item").with_id(id)).await;
        assert_eq!(m.current_action(), Action::Item);
        assert!(m.menu_items().contains_key("item"));
        assert_eq!(m.current_item_title().as_deref(), Some("Sprocket"));
    }

    #[tokio::test]
    async fn missing_item_is_not_an_error() {
        let f = Fixture::new();
        let m = f.open("Widget", get("view").with_id(99)).await;
        assert_eq!(m.item().id, 0);
        assert_eq!(m.current_action(), Action::View);
    }

    #[tokio::test]
    async fn columns_respect_ignore_list_and_order() {
        let f = Fixture::new();
        let m = f.open("Account", RequestContext::new(Method::Get)).await;
        assert_eq!(
            m.get_columns(Some("search")),
            vec!["Kind", "Name", "RoleID", "FooID", "Secret", "Joined"]
        );
        assert_eq!(m.get_columns(None).len(), 7);
        assert!(!m.get_columns(Some("Create")).contains(&"AccountID".to_string()));

        let w = f.open("Widget", RequestContext::new(Method::Get)).await;
        assert_eq!(w.get_columns(Some("search")), vec!["Name", "Active"]);
    }

    #[tokio::test]
    async fn titles_and_uris() {
        let f = Fixture::new();
        let m = f.open("Account", RequestContext::new(Method::Get)).await;
        assert_eq!(m.column_title("RoleID"), "Role");
        assert_eq!(m.column_title("FooID"), "Foo ID");
        assert_eq!(m.column_title("Name"), "Name");
        assert_eq!(m.uri(&["3", "view"]), "/admin/account/3/view");
        assert_eq!(m.title(), "Account");
    }

    #[tokio::test]
    async fn column_value_resolves_reference_names() {
        let f = Fixture::new();
        let role = f
            .records
            .seed(&f.module_descriptor("Role"), json!({ "Name": "Admin", "Active": true }))
            .unwrap();
        let account = f.module_descriptor("Account");
        let mut m = f.open("Account", RequestContext::new(Method::Get)).await;

        let mut r = Record::new(&account);
        r.set("RoleID", json!(role));
        r.set("FooID", json!(7));
        assert_eq!(m.column_value(&r, "RoleID").await, json!("Admin"));
        assert_eq!(m.column_value(&r, "FooID").await, json!(7));

        r.set("RoleID", json!(0));
        assert_eq!(m.column_value(&r, "RoleID").await, json!("None"));
    }

    #[tokio::test]
    async fn settings_flush_once_at_finish() {
        let f = Fixture::new();
        let mut m = f.open("Widget", RequestContext::new(Method::Get)).await;
        assert_eq!(f.settings.inserts(), 1);
        assert!(!m.set_setting("Unknown", json!(1)));
        assert!(m.set_setting("PageSize", json!(10)));
        assert_eq!(m.get_setting(Some("pagesize")), Some(json!(10)));
        assert!(m.finish().await);
        assert_eq!(f.settings.writes(), 1);

        let m = f.open("Role", RequestContext::new(Method::Get)).await;
        m.finish().await;
        assert_eq!(f.settings.reads(), 1);
        assert_eq!(f.settings.writes(), 1);
    }
}
