//! Permission gate: per-module, per-component decisions cached for one request.

use crate::config::GrantConfig;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Answers "may the current user use this component of this module type".
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    async fn has_resource(&self, module_type: &str, component: &str) -> bool;
}

/// Builds the provider for the user making a request.
pub trait AuthorizationSource: Send + Sync {
    fn for_user(&self, user: Option<&str>) -> Arc<dyn AuthorizationProvider>;
}

/// Component governing an action name: "list" is searching, "editcolumn" is editing.
pub fn component_for(action: &str) -> String {
    match action.to_lowercase().as_str() {
        "list" => "search".into(),
        "editcolumn" => "edit".into(),
        other => other.to_string(),
    }
}

/// Memoized yes/no per component. Never invalidated; one gate lives for one request.
pub struct PermissionGate {
    module_type: String,
    provider: Arc<dyn AuthorizationProvider>,
    cache: HashMap<String, bool>,
}

impl PermissionGate {
    pub fn new(module_type: impl Into<String>, provider: Arc<dyn AuthorizationProvider>) -> Self {
        PermissionGate {
            module_type: module_type.into(),
            provider,
            cache: HashMap::new(),
        }
    }

    pub async fn allow(&mut self, component: &str) -> bool {
        let component = component_for(component);
        if let Some(allowed) = self.cache.get(&component) {
            return *allowed;
        }
        let allowed = self.provider.has_resource(&self.module_type, &component).await;
        tracing::debug!(module = %self.module_type, component = %component, allowed, "permission");
        self.cache.insert(component, allowed);
        allowed
    }
}

/// Grants from admin config, keyed by lower-cased user and module. `*` matches any user or component.
#[derive(Clone, Debug, Default)]
pub struct GrantTable {
    grants: HashMap<(String, String), HashSet<String>>,
}

impl GrantTable {
    pub fn from_config(grants: &[GrantConfig]) -> Self {
        let mut table = GrantTable::default();
        for g in grants {
            table
                .grants
                .entry((g.user.to_lowercase(), g.module.to_lowercase()))
                .or_default()
                .extend(g.components.iter().map(|c| c.to_lowercase()));
        }
        table
    }

    pub fn allows(&self, user: Option<&str>, module_type: &str, component: &str) -> bool {
        let module = module_type.to_lowercase();
        let component = component.to_lowercase();
        let mut users = vec!["*".to_string()];
        if let Some(u) = user {
            users.push(u.to_lowercase());
        }
        users.into_iter().any(|u| {
            self.grants
                .get(&(u, module.clone()))
                .map(|set| set.contains("*") || set.contains(&component))
                .unwrap_or(false)
        })
    }
}

impl AuthorizationSource for GrantTable {
    fn for_user(&self, user: Option<&str>) -> Arc<dyn AuthorizationProvider> {
        Arc::new(GrantAuthorizer {
            table: self.clone(),
            user: user.map(str::to_string),
        })
    }
}

/// Config-backed provider for one user.
pub struct GrantAuthorizer {
    table: GrantTable,
    user: Option<String>,
}

#[async_trait]
impl AuthorizationProvider for GrantAuthorizer {
    async fn has_resource(&self, module_type: &str, component: &str) -> bool {
        self.table.allows(self.user.as_deref(), module_type, component)
    }
}

/// Allows everything. Handy for single-operator deployments and tests.
pub struct AllowAll;

#[async_trait]
impl AuthorizationProvider for AllowAll {
    async fn has_resource(&self, _module_type: &str, _component: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        allow: bool,
    }

    #[async_trait]
    impl AuthorizationProvider for Counting {
        async fn has_resource(&self, _module_type: &str, _component: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.allow
        }
    }

    #[tokio::test]
    async fn allow_consults_provider_once_per_component() {
        let provider = Arc::new(Counting { calls: AtomicUsize::new(0), allow: true });
        let mut gate = PermissionGate::new("Widget", provider.clone());
        assert!(gate.allow("edit").await);
        assert!(gate.allow("edit").await);
        assert!(gate.allow("editcolumn").await);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(gate.allow("list").await);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn denial_is_cached_too() {
        let provider = Arc::new(Counting { calls: AtomicUsize::new(0), allow: false });
        let mut gate = PermissionGate::new("Widget", provider.clone());
        assert!(!gate.allow("delete").await);
        assert!(!gate.allow("Delete").await);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn action_names_map_to_components() {
        assert_eq!(component_for("list"), "search");
        assert_eq!(component_for("EditColumn"), "edit");
        assert_eq!(component_for("settings"), "settings");
        assert_eq!(component_for("view"), "view");
    }

    #[test]
    fn grants_match_user_or_wildcard() {
        let table = GrantTable::from_config(&[
            GrantConfig { user: "ann".into(), module: "Widget".into(), components: vec!["search".into(), "edit".into()] },
            GrantConfig { user: "*".into(), module: "Widget".into(), components: vec!["view".into()] },
        ]);
        assert!(table.allows(Some("Ann"), "widget", "edit"));
        assert!(!table.allows(Some("bob"), "Widget", "edit"));
        assert!(table.allows(None, "Widget", "view"));
    }
}
