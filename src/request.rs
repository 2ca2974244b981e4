//! Request context handed to a module: method, action, sub-action, id and posted/query fields.

use serde_json::{Map, Value};
use std::fmt;

/// HTTP method as seen by the admin core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Delete => "delete",
        }
    }

    /// Write-style request (form submission).
    pub fn is_post(&self) -> bool {
        matches!(self, Method::Post)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&axum::http::Method> for Method {
    type Error = crate::error::AppError;

    fn try_from(m: &axum::http::Method) -> Result<Self, Self::Error> {
        match *m {
            axum::http::Method::GET => Ok(Method::Get),
            axum::http::Method::POST => Ok(Method::Post),
            axum::http::Method::PUT | axum::http::Method::PATCH => Ok(Method::Put),
            axum::http::Method::DELETE => Ok(Method::Delete),
            _ => Err(crate::error::AppError::BadRequest(format!("unsupported method: {}", m))),
        }
    }
}

/// Form or query fields with bracket keys expanded: `Widget[Name]=x` becomes `{"Widget": {"Name": "x"}}`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormData(Map<String, Value>);

impl FormData {
    pub fn new() -> Self {
        FormData(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        FormData(map)
    }

    /// Build from raw `key=value` pairs, expanding `a[b][c]` and `a[]` keys.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map = Map::new();
        for (k, v) in pairs {
            let path = split_key(k.as_ref());
            insert_path(&mut map, &path, Value::String(v.into()));
        }
        FormData(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Nested section such as the fields posted under the module type.
    pub fn section(&self, key: &str) -> Option<&Map<String, Value>> {
        self.0.get(key).and_then(Value::as_object)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// "a[b][]" -> ["a", "b", ""]
fn split_key(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };
    let mut parts = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        match stripped.find(']') {
            Some(close) => {
                parts.push(stripped[..close].to_string());
                rest = &stripped[close + 1..];
            }
            None => {
                // Unbalanced bracket: keep the remainder as a literal segment.
                parts.push(stripped.to_string());
                rest = "";
            }
        }
    }
    parts
}

fn insert_path(map: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((head, tail)) = path.split_first() else {
        return;
    };
    if tail.is_empty() {
        map.insert(head.clone(), value);
        return;
    }
    if tail.len() == 1 && tail[0].is_empty() {
        let entry = map.entry(head.clone()).or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(Vec::new());
        }
        if let Value::Array(items) = entry {
            items.push(value);
        }
        return;
    }
    let entry = map.entry(head.clone()).or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(inner) = entry {
        insert_path(inner, tail, value);
    }
}

/// Everything a module reads from the inbound request. Read-only to the core.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub method: Method,
    /// Requested action as sent; unknown or disallowed names fall back to the default action.
    pub action: Option<String>,
    pub sub_action: Option<String>,
    pub id: Option<i64>,
    pub post: FormData,
    pub query: FormData,
}

impl RequestContext {
    pub fn new(method: Method) -> Self {
        RequestContext {
            method,
            action: None,
            sub_action: None,
            id: None,
            post: FormData::new(),
            query: FormData::new(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_sub_action(mut self, sub_action: impl Into<String>) -> Self {
        self.sub_action = Some(sub_action.into());
        self
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_post(mut self, post: FormData) -> Self {
        self.post = post;
        self
    }

    pub fn with_query(mut self, query: FormData) -> Self {
        self.query = query;
        self
    }

    /// Lower-cased, non-empty sub-action.
    pub fn sub_action(&self) -> Option<String> {
        self.sub_action
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }

    /// Search-style requests render forms without defaults and with "None" placeholders.
    pub fn is_search(&self) -> bool {
        matches!(
            self.action.as_deref().map(str::to_lowercase).as_deref(),
            Some("search") | Some("list")
        )
    }

    /// Parse admin path segments after the module type: `[id][/action[/subAction]]`.
    pub fn apply_segments(mut self, segments: &[&str]) -> Self {
        let mut rest = segments.iter().filter(|s| !s.is_empty()).peekable();
        if let Some(id) = rest.peek().and_then(|s| s.parse::<i64>().ok()) {
            self.id = Some(id);
            rest.next();
        }
        if let Some(action) = rest.next() {
            self.action = Some(action.to_string());
        }
        if let Some(sub) = rest.next() {
            self.sub_action = Some(sub.to_string());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bracket_keys_expand_into_sections() {
        let form = FormData::from_pairs(vec![
            ("Widget[Name]", "Sprocket"),
            ("WidgetID[3]", "1"),
            ("WidgetID[7]", "1"),
            ("Delete", "1"),
            ("tags[]", "a"),
            ("tags[]", "b"),
        ]);
        assert_eq!(form.section("Widget").unwrap().get("Name"), Some(&json!("Sprocket")));
        assert_eq!(form.section("WidgetID").unwrap().len(), 2);
        assert_eq!(form.get_str("Delete"), Some("1"));
        assert_eq!(form.get("tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn path_segments_fill_id_action_and_sub_action() {
        let req = RequestContext::new(Method::Get).apply_segments(&["12", "view"]);
        assert_eq!(req.id, Some(12));
        assert_eq!(req.action.as_deref(), Some("view"));

        let req = RequestContext::new(Method::Post).apply_segments(&["search", "Quick"]);
        assert_eq!(req.id, None);
        assert_eq!(req.sub_action().as_deref(), Some("quick"));
        assert!(req.is_search());
    }
}
