//! Column schema adapter: declared type strings become a closed set of column kinds, parsed once.

use serde::Serialize;

/// Key role of a column within its entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum KeyRole {
    None,
    Primary,
    Unique,
}

impl KeyRole {
    pub fn parse(key: Option<&str>) -> Self {
        match key.map(|k| k.trim().to_lowercase()) {
            Some(k) if k.starts_with("pri") => KeyRole::Primary,
            Some(k) if k.starts_with("uni") => KeyRole::Unique,
            _ => KeyRole::None,
        }
    }
}

/// One `enum(...)` option: stored value and display label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnumOption {
    pub value: String,
    pub label: String,
}

/// Rendering family of a column, decided by the leading token of its declared type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnKind {
    Hidden,
    Enum { options: Vec<EnumOption> },
    /// text, mediumtext, longtext, textarea
    RichText,
    Radio,
    /// float, int
    Numeric,
    /// varchar, char
    Text,
    /// date, timestamp
    Date,
    /// Date with a comparison operator, used by search forms.
    SearchDate,
    Password,
    /// tinyint
    Boolean,
    /// Anything outside the closed set; rendered as an explicit error field.
    Unrecognized { family: String },
}

impl ColumnKind {
    pub fn from_type(raw_type: &str) -> Self {
        let family = type_family(raw_type);
        match family.as_str() {
            "hidden" => ColumnKind::Hidden,
            "enum" => ColumnKind::Enum {
                options: parse_enum_options(raw_type),
            },
            "text" | "mediumtext" | "longtext" | "textarea" => ColumnKind::RichText,
            "radio" => ColumnKind::Radio,
            "float" | "int" => ColumnKind::Numeric,
            "varchar" | "char" => ColumnKind::Text,
            "timestamp" | "date" => ColumnKind::Date,
            "searchdate" => ColumnKind::SearchDate,
            "password" => ColumnKind::Password,
            "tinyint" => ColumnKind::Boolean,
            _ => ColumnKind::Unrecognized { family },
        }
    }

    pub fn family(&self) -> &str {
        match self {
            ColumnKind::Hidden => "hidden",
            ColumnKind::Enum { .. } => "enum",
            ColumnKind::RichText => "text",
            ColumnKind::Radio => "radio",
            ColumnKind::Numeric => "int",
            ColumnKind::Text => "varchar",
            ColumnKind::Date => "date",
            ColumnKind::SearchDate => "searchdate",
            ColumnKind::Password => "password",
            ColumnKind::Boolean => "tinyint",
            ColumnKind::Unrecognized { family } => family,
        }
    }
}

/// Leading token of a declared type, lower-cased: "varchar(255)" -> "varchar", "int(10) unsigned" -> "int".
pub fn type_family(raw_type: &str) -> String {
    raw_type
        .trim()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Parse `enum('a','b','it''s')` into options labelled with capitalized words.
fn parse_enum_options(raw_type: &str) -> Vec<EnumOption> {
    let trimmed = raw_type.trim();
    let inner = match (trimmed.find('('), trimmed.rfind(')')) {
        (Some(start), Some(end)) if end > start => &trimmed[start + 1..end],
        _ => return Vec::new(),
    };
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' if in_quote => {
                if chars.peek() == Some(&'\'') {
                    current.push('\'');
                    chars.next();
                } else {
                    in_quote = false;
                }
            }
            '\'' => in_quote = true,
            ',' if !in_quote => {
                values.push(std::mem::take(&mut current));
            }
            c if in_quote => current.push(c),
            c if !c.is_whitespace() => current.push(c),
            _ => {}
        }
    }
    if !current.is_empty() || !values.is_empty() {
        values.push(current);
    }
    values
        .into_iter()
        .map(|value| EnumOption {
            label: crate::case::ucwords(&value),
            value,
        })
        .collect()
}

/// Normalized metadata for one entity attribute.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub raw_type: String,
    pub kind: ColumnKind,
    pub key_role: KeyRole,
    pub default_value: Option<String>,
    /// Radio button values.
    pub values: Vec<String>,
    #[serde(skip)]
    pub pg_type: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        let raw_type = raw_type.into();
        let kind = ColumnKind::from_type(&raw_type);
        ColumnDescriptor {
            name: name.into(),
            raw_type,
            kind,
            key_role: KeyRole::None,
            default_value: None,
            values: Vec::new(),
            pg_type: None,
        }
    }

    pub fn with_key(mut self, key_role: KeyRole) -> Self {
        self.key_role = key_role;
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    pub fn with_values(mut self, values: Vec<String>) -> Self {
        self.values = values;
        self
    }

    /// Same column rendered as another kind (search forms widen text and dates).
    pub fn with_kind(&self, kind: ColumnKind) -> Self {
        let mut c = self.clone();
        c.kind = kind;
        c
    }

    pub fn is_primary(&self) -> bool {
        self.key_role == KeyRole::Primary
    }

    /// `tinyint(1)` columns carry a boolean posted as checkbox presence.
    pub fn is_flag(&self) -> bool {
        self.raw_type.trim().eq_ignore_ascii_case("tinyint(1)")
    }

    /// Cast used when binding a value for this column.
    pub fn bind_cast(&self) -> Option<&str> {
        if let Some(t) = self.pg_type.as_deref() {
            return Some(t);
        }
        match (&self.kind, type_family(&self.raw_type).as_str()) {
            (ColumnKind::Numeric, "float") => Some("double precision"),
            (ColumnKind::Numeric, _) => Some("bigint"),
            (ColumnKind::Boolean, _) if self.is_flag() => Some("boolean"),
            (ColumnKind::Boolean, _) => Some("smallint"),
            (ColumnKind::Date, "timestamp") => Some("timestamp"),
            (ColumnKind::Date, _) => Some("date"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_token_decides_family() {
        assert_eq!(ColumnKind::from_type("varchar(255)"), ColumnKind::Text);
        assert_eq!(ColumnKind::from_type("int(10) unsigned"), ColumnKind::Numeric);
        assert_eq!(ColumnKind::from_type("TINYINT(1)"), ColumnKind::Boolean);
        assert_eq!(ColumnKind::from_type("mediumtext"), ColumnKind::RichText);
        assert_eq!(ColumnKind::from_type("timestamp"), ColumnKind::Date);
        assert_eq!(
            ColumnKind::from_type("blob"),
            ColumnKind::Unrecognized { family: "blob".into() }
        );
    }

    #[test]
    fn enum_options_are_parsed_with_labels() {
        let kind = ColumnKind::from_type("enum('internal','contact','it''s')");
        let ColumnKind::Enum { options } = kind else {
            panic!("expected enum kind");
        };
        let values: Vec<_> = options.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(values, vec!["internal", "contact", "it's"]);
        assert_eq!(options[0].label, "Internal");
    }

    #[test]
    fn key_roles() {
        assert_eq!(KeyRole::parse(Some("Primary")), KeyRole::Primary);
        assert_eq!(KeyRole::parse(Some("PRI")), KeyRole::Primary);
        assert_eq!(KeyRole::parse(Some("UNI")), KeyRole::Unique);
        assert_eq!(KeyRole::parse(None), KeyRole::None);
    }

    #[test]
    fn flags_are_exactly_tinyint_one() {
        assert!(ColumnDescriptor::new("Active", "tinyint(1)").is_flag());
        assert!(!ColumnDescriptor::new("Level", "tinyint(4)").is_flag());
        assert_eq!(ColumnDescriptor::new("Active", "tinyint(1)").bind_cast(), Some("boolean"));
    }
}
