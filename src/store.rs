//! _sys_* table DDL, settings and session persistence. All _sys_* tables live in a schema named from `ARCHITECT_SCHEMA` env (default `architect`).

use crate::error::AppError;
use crate::session::{SessionProvider, SessionStore};
use crate::settings::{SettingsBlob, SettingsPersistence};
use crate::sql::quoted;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;

/// Schema name for _sys_* tables. From env `ARCHITECT_SCHEMA`, default `architect`.
pub fn architect_schema() -> String {
    std::env::var("ARCHITECT_SCHEMA").unwrap_or_else(|_| "architect".into())
}

/// Returns schema-qualified table name for _sys_* tables (e.g. "architect"."_sys_settings").
pub fn qualified_sys_table(table: &str) -> String {
    format!("{}.{}", quoted(&architect_schema()), quoted(table))
}

/// Create schema from `ARCHITECT_SCHEMA` env if not exists, then _sys_settings and _sys_sessions.
pub async fn ensure_sys_tables(pool: &PgPool) -> Result<(), AppError> {
    let schema = architect_schema();
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(&schema)))
        .execute(pool)
        .await?;

    let settings_ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            module_type TEXT PRIMARY KEY,
            version BIGINT NOT NULL DEFAULT 1,
            payload JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        qualified_sys_table("_sys_settings")
    );
    sqlx::query(&settings_ddl).execute(pool).await?;

    let sessions_ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            session_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (session_id, key)
        )
        "#,
        qualified_sys_table("_sys_sessions")
    );
    sqlx::query(&sessions_ddl).execute(pool).await?;
    tracing::info!(schema = %schema, "sys tables ready");
    Ok(())
}

/// Settings blobs in `_sys_settings`, one row per module type.
#[derive(Clone)]
pub struct PgSettingsPersistence {
    pool: PgPool,
}

impl PgSettingsPersistence {
    pub fn new(pool: PgPool) -> Self {
        PgSettingsPersistence { pool }
    }
}

#[async_trait]
impl SettingsPersistence for PgSettingsPersistence {
    async fn read(&self, module_type: &str) -> Result<Option<SettingsBlob>, AppError> {
        let sql = format!(
            "SELECT version, payload FROM {} WHERE module_type = $1",
            qualified_sys_table("_sys_settings")
        );
        let row: Option<(i64, Value)> = sqlx::query_as(&sql)
            .bind(module_type)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(version, payload)| SettingsBlob {
            version: u32::try_from(version).unwrap_or(u32::MAX),
            values: match payload {
                Value::Object(values) => values,
                _ => Map::new(),
            },
        }))
    }

    async fn write(&self, module_type: &str, blob: &SettingsBlob) -> Result<(), AppError> {
        let sql = format!(
            r#"INSERT INTO {} (module_type, version, payload) VALUES ($1, $2, $3)
               ON CONFLICT (module_type) DO UPDATE SET version = EXCLUDED.version, payload = EXCLUDED.payload, updated_at = NOW()"#,
            qualified_sys_table("_sys_settings")
        );
        sqlx::query(&sql)
            .bind(module_type)
            .bind(i64::from(blob.version))
            .bind(Value::Object(blob.values.clone()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert(&self, module_type: &str, blob: &SettingsBlob) -> Result<(), AppError> {
        let sql = format!(
            "INSERT INTO {} (module_type, version, payload) VALUES ($1, $2, $3) ON CONFLICT (module_type) DO NOTHING",
            qualified_sys_table("_sys_settings")
        );
        sqlx::query(&sql)
            .bind(module_type)
            .bind(i64::from(blob.version))
            .bind(Value::Object(blob.values.clone()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Sessions in `_sys_sessions`, one row per (session id, key).
#[derive(Clone)]
pub struct PgSessions {
    pool: PgPool,
}

impl PgSessions {
    pub fn new(pool: PgPool) -> Self {
        PgSessions { pool }
    }
}

impl SessionProvider for PgSessions {
    fn session(&self, session_id: &str) -> Arc<dyn SessionStore> {
        Arc::new(PgSession {
            pool: self.pool.clone(),
            session_id: session_id.to_string(),
        })
    }
}

pub struct PgSession {
    pool: PgPool,
    session_id: String,
}

#[async_trait]
impl SessionStore for PgSession {
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        let sql = format!(
            "SELECT value FROM {} WHERE session_id = $1 AND key = $2",
            qualified_sys_table("_sys_sessions")
        );
        let row: Option<(Value,)> = sqlx::query_as(&sql)
            .bind(&self.session_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(v,)| v))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), AppError> {
        let sql = format!(
            r#"INSERT INTO {} (session_id, key, value) VALUES ($1, $2, $3)
               ON CONFLICT (session_id, key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()"#,
            qualified_sys_table("_sys_sessions")
        );
        sqlx::query(&sql)
            .bind(&self.session_id)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), AppError> {
        let sql = format!(
            "DELETE FROM {} WHERE session_id = $1 AND key = $2",
            qualified_sys_table("_sys_sessions")
        );
        sqlx::query(&sql)
            .bind(&self.session_id)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Create the database named in `database_url` if it does not exist (connects to the `postgres` database to do so).
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await.map_err(AppError::Db)?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(AppError::Db)?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await
            .map_err(AppError::Db)?;
        tracing::info!(database = %db_name, "database created");
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url.rfind('/').ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))? + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_name_is_split_from_url() {
        let (admin, name) = parse_db_name_from_url("postgres://u:p@localhost:5432/shop?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(name, "shop");
        assert!(parse_db_name_from_url("nopath").is_err());
    }
}
