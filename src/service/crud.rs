//! Record CRUD against PostgreSQL.

use crate::config::ModuleDescriptor;
use crate::error::AppError;
use crate::record::{Criteria, Record, RecordStore};
use crate::sql::{delete, insert, select_by_id, select_matching, update, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;

/// `RecordStore` over each module's configured schema and table.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        PgRecordStore { pool }
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<Map<String, Value>>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_map).collect())
    }

    async fn query_optional(&self, q: &QueryBuf) -> Result<Option<Map<String, Value>>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_map))
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn load(&self, module: &ModuleDescriptor, id: i64) -> Result<Option<Record>, AppError> {
        let row = self.query_optional(&select_by_id(module, id)).await?;
        Ok(row.map(|values| Record::from_values(module, values)))
    }

    async fn search(
        &self,
        module: &ModuleDescriptor,
        criteria: &Criteria,
        sort_column: Option<&str>,
    ) -> Result<Vec<Record>, AppError> {
        let rows = self.query_many(&select_matching(module, criteria, sort_column)).await?;
        Ok(rows
            .into_iter()
            .map(|values| Record::from_values(module, values))
            .collect())
    }

    /// Insert when the record has no id yet, otherwise update it. The stored row is read back into the record.
    async fn save(&self, module: &ModuleDescriptor, record: &mut Record) -> Result<bool, AppError> {
        let q = if record.id == 0 {
            insert(module, record.values())
        } else {
            update(module, record.id, record.values())
        };
        match self.query_optional(&q).await? {
            Some(stored) => {
                record.set_all(stored);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, module: &ModuleDescriptor, record: &Record) -> Result<bool, AppError> {
        if record.id == 0 {
            return Ok(false);
        }
        Ok(self.execute(&delete(module, record.id)).await? > 0)
    }
}

fn row_to_map(row: &sqlx::postgres::PgRow) -> Map<String, Value> {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &sqlx::postgres::PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j;
    }
    Value::Null
}
