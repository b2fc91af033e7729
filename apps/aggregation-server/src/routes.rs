// [apps/aggregation-server/src/routes.rs]
/*!
 * =================================================================
 * APARATO: GATEWAY ROUTING MATRIX (V6.0)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TOPOLOGÍA HTTP DEL AGREGADOR
 *
 * Topología:
 *   POST /api/ai/learn           ingesta atómica de interacciones
 *   POST /api/ai/upload-model    admisión multipart de artefactos
 *   GET  /api/ai/models/:version streaming/redirección de artefactos
 *   GET  /api/ai/latest-model    puntero de última versión
 *   GET  /api/ai/stats           agregados operativos
 *   GET  /health                 salud agregada de componentes
 * =================================================================
 */

use crate::handlers::{health, learn, models, stats, upload};
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_gateway_router(application_shared_state: AppState) -> Router {
    // Escudo de red: CORS abierto para los clientes móviles y herramientas Ops.
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // El techo del cuerpo cubre la subida multipart más el sobre.
    let upload_body_ceiling =
        DefaultBodyLimit::max(application_shared_state.config.max_upload_bytes() + 64 * 1024);

    Router::new()
        .route("/api/ai/learn", post(learn::handle_learn))
        .route("/api/ai/upload-model", post(upload::handle_upload_model))
        .route("/api/ai/models/:version", get(models::handle_model_download))
        .route("/api/ai/latest-model", get(models::handle_latest_model))
        .route("/api/ai/stats", get(stats::handle_stats))
        .route("/health", get(health::handle_health))
        .layer(upload_body_ceiling)
        .layer(TraceLayer::new_for_http())
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
