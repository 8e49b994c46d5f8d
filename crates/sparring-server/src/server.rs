use std::io;
use std::path::{Path, PathBuf};

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use sparring_core::{SparringConfig, StoreBackend};

use crate::handlers;
use crate::state::AppState;

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health::service))
            .route("/profiles", web::get().to(handlers::profiles::list))
            .route(
                "/agents/terminate-all",
                web::post().to(handlers::lifecycle::terminate_all),
            )
            .route("/agents", web::post().to(handlers::agents::create))
            .route("/agents", web::get().to(handlers::agents::list))
            .route("/agents/{id}", web::get().to(handlers::agents::get))
            .route("/agents/{id}", web::delete().to(handlers::agents::remove))
            .route(
                "/agents/{id}/pause",
                web::post().to(handlers::lifecycle::pause),
            )
            .route(
                "/agents/{id}/resume",
                web::post().to(handlers::lifecycle::resume),
            )
            .route(
                "/agents/{id}/terminate",
                web::post().to(handlers::lifecycle::terminate),
            )
            .route("/agents/{id}/fail", web::post().to(handlers::lifecycle::fail))
            .route("/agents/{id}/health", web::get().to(handlers::health::agent))
            .route("/agents/{id}/actions", web::get().to(handlers::actions::list))
            .route(
                "/agents/{id}/response-policy",
                web::get().to(handlers::actions::response_policy),
            ),
    );
}

/// Anchor a relative SQLite path in the data directory.
pub fn resolve_store_path(mut config: SparringConfig, data_dir: &Path) -> SparringConfig {
    if let StoreBackend::Sqlite { path } = &config.store {
        if path.is_relative() {
            config.store = StoreBackend::Sqlite {
                path: data_dir.join(path),
            };
        }
    }
    config
}

pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".sparring")
}

pub async fn run_server(port: u16, config: SparringConfig) -> io::Result<()> {
    let state = AppState::new(config)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let state = web::Data::new(state);
    let server_state = state.clone();

    log::info!("Starting sparring server on http://0.0.0.0:{}", port);
    let result = HttpServer::new(move || {
        App::new()
            .app_data(server_state.clone())
            .wrap(Cors::permissive())
            .configure(app_config)
    })
    .bind(format!("0.0.0.0:{}", port))?
    .run()
    .await;

    state.shutdown().await;
    result
}
