use std::sync::Arc;

use tracing::info;

use m87_server::admin_api::{self, AdminState};
use m87_server::config::AppConfig;
use m87_server::dwm::DynamicWeightManager;
use m87_server::response::ServerResult;
use m87_server::store::MemoryStore;
use m87_server::util::logging::init_tracing;

#[tokio::main]
async fn main() -> ServerResult<()> {
    println!("Booting dynamic weight manager...");
    init_tracing();
    info!("starting server");

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("failed to load config: {:?}", e);
        std::process::exit(1);
    });

    let store = Arc::new(MemoryStore::new());
    let dwm = Arc::new(DynamicWeightManager::new(config.router.clone(), store));
    let admin_state = Arc::new(AdminState::new(dwm));

    let app = admin_api::router(admin_state);
    let addr = format!("0.0.0.0:{}", config.admin_port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        m87_server::response::ServerError::internal_error(&format!("failed to bind {}: {}", addr, e))
    })?;

    info!("admin telemetry surface listening on {}", addr);
    axum::serve(listener, app).await.map_err(|e| {
        m87_server::response::ServerError::internal_error(&format!("server error: {}", e))
    })?;

    Ok(())
}
