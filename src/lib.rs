//! Architect admin: metadata-driven admin modules (CRUD, search, batch column edit, settings) over column schemas.

pub mod case;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod memory;
pub mod module;
pub mod permission;
pub mod record;
pub mod request;
pub mod response;
pub mod routes;
pub mod service;
pub mod session;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_from_path, resolve, AdminConfig, ModuleDescriptor, ResolvedModel};
pub use error::{AppError, ConfigError};
pub use memory::{MemoryRecordStore, MemorySessions, MemorySettingsPersistence};
pub use module::{AdminEnv, ApiOutcome, Collaborators, HandlerKey, HandlerRegistry, Module, PrepareHandler, PrepareHook};
pub use permission::{AllowAll, AuthorizationProvider, AuthorizationSource, GrantTable};
pub use record::{Record, RecordStore};
pub use request::{FormData, Method, RequestContext};
pub use response::{error_body, success_many, success_one};
pub use routes::{admin_routes, common_routes};
pub use service::PgRecordStore;
pub use state::AppState;
pub use store::{ensure_database_exists, ensure_sys_tables, PgSessions, PgSettingsPersistence};

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `architect_admin=info`).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("architect_admin=info"));
    // A subscriber may already be set by the host or a previous test.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
