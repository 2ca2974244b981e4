//! Resolved module model: config validated and flattened for runtime use.

use crate::config::ColumnDescriptor;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Logical operation a module can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    List,
    View,
    Edit,
    Create,
    Search,
    EditColumn,
    Settings,
    Item,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::List => "list",
            Action::View => "view",
            Action::Edit => "edit",
            Action::Create => "create",
            Action::Search => "search",
            Action::EditColumn => "editcolumn",
            Action::Settings => "settings",
            Action::Item => "item",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "list" => Ok(Action::List),
            "view" => Ok(Action::View),
            "edit" => Ok(Action::Edit),
            "create" => Ok(Action::Create),
            "search" => Ok(Action::Search),
            "editcolumn" => Ok(Action::EditColumn),
            "settings" => Ok(Action::Settings),
            "item" => Ok(Action::Item),
            other => Err(format!("unknown action: {}", other)),
        }
    }
}

/// Actions every module may run unless its config narrows them.
pub const DEFAULT_ALLOWED_ACTIONS: &[Action] = &[
    Action::Search,
    Action::Create,
    Action::EditColumn,
    Action::Edit,
    Action::List,
    Action::View,
];

/// Column names excluded per form context.
#[derive(Clone, Debug, Default, Serialize)]
pub struct IgnoreLists {
    pub create: HashSet<String>,
    pub edit: HashSet<String>,
    pub search: HashSet<String>,
    pub view: HashSet<String>,
    pub boolean: HashSet<String>,
}

impl IgnoreLists {
    /// Ignore list for a context name, case-insensitive. Unknown contexts have none.
    pub fn for_context(&self, context: &str) -> Option<&HashSet<String>> {
        match context.to_lowercase().as_str() {
            "create" => Some(&self.create),
            "edit" => Some(&self.edit),
            "search" => Some(&self.search),
            "view" => Some(&self.view),
            "boolean" => Some(&self.boolean),
            _ => None,
        }
    }
}

/// Everything the admin core knows about one entity type.
#[derive(Clone, Debug, Serialize)]
pub struct ModuleDescriptor {
    pub module_type: String,
    pub schema_name: String,
    pub table_name: String,
    pub id_column: String,
    pub name_column: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
    pub components: BTreeMap<String, String>,
    pub ignore: IgnoreLists,
    pub column_order: Vec<String>,
    pub static_columns: Vec<String>,
    pub edit_columns: Vec<String>,
    pub allowed_actions: Vec<Action>,
    pub default_action: Action,
    /// Declared settings fields, keyed by lower-cased name.
    pub settings_fields: BTreeMap<String, String>,
    pub default_settings: serde_json::Map<String, serde_json::Value>,
    pub group: String,
    pub visible_in_menu: bool,
    pub menu_items: BTreeMap<String, String>,
    pub sub_menu_items: BTreeMap<String, String>,
    pub quick_search: BTreeMap<String, String>,
}

impl ModuleDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn title(&self) -> String {
        crate::case::title_from_type(&self.module_type)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub modules: Vec<ModuleDescriptor>,
    /// Lower-cased module type -> index into `modules`.
    pub by_type: HashMap<String, usize>,
}

impl ResolvedModel {
    pub fn new(modules: Vec<ModuleDescriptor>) -> Self {
        let by_type = modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.module_type.to_lowercase(), i))
            .collect();
        ResolvedModel { modules, by_type }
    }

    /// Module by type, case-insensitive.
    pub fn module(&self, module_type: &str) -> Option<&ModuleDescriptor> {
        self.by_type
            .get(&module_type.to_lowercase())
            .and_then(|i| self.modules.get(*i))
    }
}
