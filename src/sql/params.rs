//! Convert serde_json::Value to a bindable PostgreSQL parameter.

use crate::record::value_text;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value bound as text. Statements cast each placeholder to the column's type
/// (`$1::bigint`), so the server does the conversion.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Text(String),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        match value_text(v) {
            Some(text) => PgBindValue::Text(text),
            None => PgBindValue::Null,
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            PgBindValue::Null => <Option<&str> as Encode<Postgres>>::encode_by_ref(&None, buf),
            PgBindValue::Text(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf),
        }
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn everything_binds_as_text() {
        assert_eq!(PgBindValue::from_json(&json!(true)), PgBindValue::Text("1".into()));
        assert_eq!(PgBindValue::from_json(&json!(12)), PgBindValue::Text("12".into()));
        assert_eq!(PgBindValue::from_json(&json!(null)), PgBindValue::Null);
    }
}
