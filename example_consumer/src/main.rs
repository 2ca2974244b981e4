//! Example consumer: serves the admin and API routes for the modules in `ADMIN_CONFIG`.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Without `DATABASE_URL` records, settings and sessions live in memory.

use architect_admin::{
    admin_routes, common_routes, ensure_database_exists, ensure_sys_tables, init_tracing, load_from_path,
    AdminEnv, AppState, GrantTable, MemoryRecordStore, MemorySessions, MemorySettingsPersistence, PgRecordStore,
    PgSessions, PgSettingsPersistence,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config_path = std::env::var("ADMIN_CONFIG").unwrap_or_else(|_| "admin.json".into());
    let config = load_from_path(&config_path).await?;
    let env = Arc::new(AdminEnv::from_config(&config)?);
    let authorization = Arc::new(GrantTable::from_config(&config.grants));

    let state = match std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()) {
        Some(database_url) => {
            ensure_database_exists(&database_url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;
            ensure_sys_tables(&pool).await?;
            AppState {
                env,
                records: Arc::new(PgRecordStore::new(pool.clone())),
                settings: Arc::new(PgSettingsPersistence::new(pool.clone())),
                sessions: Arc::new(PgSessions::new(pool)),
                authorization,
            }
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory collaborators");
            AppState {
                env,
                records: Arc::new(MemoryRecordStore::new()),
                settings: Arc::new(MemorySettingsPersistence::default()),
                sessions: Arc::new(MemorySessions::new()),
                authorization,
            }
        }
    };

    let app = common_routes().merge(admin_routes(state));
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&bind_addr).await?;
    let port = listener.local_addr()?.port();
    tracing::info!(config = %config_path, "admin listening on http://{}:{}", listener.local_addr()?.ip(), port);
    axum::serve(listener, app).await?;
    Ok(())
}
