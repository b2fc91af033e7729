// [tests/mirror/libs/infra/blobstore/token_refresh.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL CICLO DE REFRESH OAUTH2 (V3.0)
 * CLASIFICACIÓN: EVIDENCIA DE BÓVEDA (ESTRATO L3-MIRROR)
 * RESPONSABILIDAD: AUDITORÍA DE REFRESH, PERSISTENCIA Y COOLDOWN
 *
 * Escenario certificado: con un access token expirado y un refresh
 * token válido, la primera lectura negocia un token nuevo contra el
 * endpoint, lo persiste atómicamente en tokens.json y lo sirve; una
 * segunda lectura dentro del cooldown NO vuelve a golpear el endpoint.
 * =================================================================
 */

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use synapse_infra_blobstore::{TokenManager, TokenPhase, TokenSettings};

/// Endpoint OAuth2 simulado que cuenta cada negociación recibida.
async fn spawn_mock_token_endpoint() -> (String, Arc<AtomicUsize>) {
    let negotiation_counter = Arc::new(AtomicUsize::new(0));
    let counter_for_handler = negotiation_counter.clone();

    let mock_router = Router::new()
        .route(
            "/oauth2/token",
            post(|State(counter): State<Arc<AtomicUsize>>| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(json!({
                    "access_token": "token-renovado",
                    "expires_in": 14400,
                    "token_type": "bearer"
                }))
            }),
        )
        .with_state(counter_for_handler);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("mock endpoint bind");
    let endpoint_url = format!("http://{}/oauth2/token", listener.local_addr().expect("addr"));

    tokio::spawn(async move {
        let _ = axum::serve(listener, mock_router).await;
    });

    (endpoint_url, negotiation_counter)
}

#[tokio::test]
async fn certify_refresh_persists_and_cooldown_suppresses_repeat() {
    let scratch = tempfile::tempdir().expect("scratch");
    let tokens_file = scratch.path().join("tokens.json");

    let (endpoint_url, negotiation_counter) = spawn_mock_token_endpoint().await;

    let mut settings = TokenSettings::new(
        "app-key".into(),
        "app-secret".into(),
        tokens_file.clone(),
    );
    settings.refresh_token = Some("refresh-vigente".into());
    settings.access_token = Some("token-caducado".into());
    settings.expiry_time = Some((Utc::now() - ChronoDuration::hours(1)).to_rfc3339());
    settings.token_endpoint = endpoint_url;

    let manager = TokenManager::initialize(settings).expect("init");

    // 1. PRIMERA LECTURA: refresh observado, token nuevo servido.
    let first_read = manager.get_valid_access_token().await.expect("get");
    assert_eq!(first_read.as_deref(), Some("token-renovado"));
    assert_eq!(negotiation_counter.load(Ordering::SeqCst), 1);
    assert_eq!(manager.phase().await, TokenPhase::Valid);

    // 2. PERSISTENCIA ATÓMICA: el archivo es la fuente de verdad.
    let persisted_raw = std::fs::read_to_string(&tokens_file).expect("tokens file");
    let persisted: serde_json::Value =
        serde_json::from_str(&persisted_raw).expect("tokens json");
    assert_eq!(persisted["access_token"], "token-renovado");
    assert_eq!(persisted["refresh_token"], "refresh-vigente");
    assert!(persisted["expiry_time"].as_str().is_some());
    assert!(!scratch.path().join("tokens.json.tmp").exists());

    // 3. SEGUNDA LECTURA DENTRO DEL COOLDOWN: cero negociaciones extra.
    let second_read = manager.get_valid_access_token().await.expect("get");
    assert_eq!(second_read.as_deref(), Some("token-renovado"));
    assert_eq!(negotiation_counter.load(Ordering::SeqCst), 1);

    // 4. REFRESH FORZADO DENTRO DEL COOLDOWN: también suprimido.
    manager.force_refresh().await.expect("cooldown swallow");
    assert_eq!(negotiation_counter.load(Ordering::SeqCst), 1);
}
