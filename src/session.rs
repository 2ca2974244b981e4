//! Browser-session scoped storage used by multi-request workflows.

use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// One user's session. Lives longer than any module instance.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), AppError>;
    async fn clear(&self, key: &str) -> Result<(), AppError>;
}

/// Opens the session for a session id.
pub trait SessionProvider: Send + Sync {
    fn session(&self, session_id: &str) -> Arc<dyn SessionStore>;
}
