// [tests/mirror/apps/aggregation_server/api_flow.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE FLUJO DE GATEWAY (V4.0)
 * CLASIFICACIÓN: EVIDENCIA EXTREMO-A-EXTREMO (ESTRATO L1-MIRROR)
 * RESPONSABILIDAD: AUDITORÍA DEL CONTRATO HTTP DEL AGREGADOR
 *
 * Escenario arranque-en-frío: proceso vacío, una ingesta, estadísticas
 * coherentes y puntero de última versión en la semilla '1.0.0'.
 * =================================================================
 */

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use synapse_aggregation_server::prelude::*;
use tower::util::ServiceExt;

async fn laboratory_router() -> (Router, AppState, tempfile::TempDir) {
    let scratch = tempfile::tempdir().expect("scratch");
    let kernel = AggregationKernel::ignite(ServerConfig::for_local_testing(scratch.path()))
        .await
        .expect("kernel ignition");
    let (application_state, _trigger_receiver) = kernel.into_laboratory_parts();
    let router = create_gateway_router(application_state.clone());
    (router, application_state, scratch)
}

async fn json_body(response: axum::response::Response) -> Value {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&body_bytes).expect("json body")
}

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

#[tokio::test]
async fn certify_cold_start_ingest_stats_and_latest_pointer() {
    let (router, _state, _scratch) = laboratory_router().await;

    // 1. INGESTA: una interacción con feedback.
    let learn_response = router
        .clone()
        .oneshot(post_json(
            "/api/ai/learn",
            json!({
                "deviceId": "device-frio",
                "appVersion": "2.1.0",
                "modelVersion": "1.0.0",
                "osVersion": "17.4",
                "interactions": [{
                    "id": "a",
                    "timestamp": "2026-07-30T10:00:00Z",
                    "userMessage": "hello",
                    "aiResponse": "hi there",
                    "detectedIntent": "greet",
                    "confidenceScore": 0.9
                }]
            }),
        ))
        .await
        .expect("learn dispatch");

    assert_eq!(learn_response.status(), StatusCode::OK);
    let learn_payload = json_body(learn_response).await;
    assert_eq!(learn_payload["success"], true);
    assert_eq!(learn_payload["latestModelVersion"], "1.0.0");

    // 2. ESTADÍSTICAS: totales coherentes con la ingesta.
    let stats_response = router
        .clone()
        .oneshot(get("/api/ai/stats"))
        .await
        .expect("stats dispatch");
    assert_eq!(stats_response.status(), StatusCode::OK);
    let stats_payload = json_body(stats_response).await;
    assert_eq!(stats_payload["stats"]["totalInteractions"], 1);
    assert_eq!(stats_payload["stats"]["uniqueDevices"], 1);
    assert_eq!(stats_payload["stats"]["latestModelVersion"], "1.0.0");
    assert_eq!(stats_payload["stats"]["topIntents"][0]["intent"], "greet");

    // 3. PUNTERO DE ÚLTIMA VERSIÓN.
    let latest_response = router
        .clone()
        .oneshot(get("/api/ai/latest-model"))
        .await
        .expect("latest dispatch");
    let latest_payload = json_body(latest_response).await;
    assert_eq!(latest_payload["latestModelVersion"], "1.0.0");
    assert_eq!(latest_payload["modelDownloadURL"], "/api/ai/models/1.0.0");

    // 4. SALUD: el endpoint agrega sin fallar.
    let health_response = router
        .clone()
        .oneshot(get("/health"))
        .await
        .expect("health dispatch");
    assert_eq!(health_response.status(), StatusCode::OK);
    let health_payload = json_body(health_response).await;
    assert_eq!(health_payload["database"], "healthy");
    assert_eq!(health_payload["blob_store"], "local_mode");
}

#[tokio::test]
async fn certify_empty_batch_accepted_and_invalid_batch_rejected() {
    let (router, state, _scratch) = laboratory_router().await;

    // Lote vacío: aceptado, cero filas.
    let empty_response = router
        .clone()
        .oneshot(post_json(
            "/api/ai/learn",
            json!({ "deviceId": "device-x", "interactions": [] }),
        ))
        .await
        .expect("empty dispatch");
    assert_eq!(empty_response.status(), StatusCode::OK);

    // Confianza fuera de [0,1]: 400 y atomicidad (nada persiste).
    let poisoned_response = router
        .clone()
        .oneshot(post_json(
            "/api/ai/learn",
            json!({
                "deviceId": "device-x",
                "interactions": [
                    {
                        "id": "ok",
                        "timestamp": "2026-07-30T10:00:00Z",
                        "userMessage": "hola",
                        "aiResponse": "hola",
                        "detectedIntent": "greet",
                        "confidenceScore": 0.5
                    },
                    {
                        "id": "bad",
                        "timestamp": "2026-07-30T10:00:01Z",
                        "userMessage": "x",
                        "aiResponse": "y",
                        "detectedIntent": "greet",
                        "confidenceScore": 1.8
                    }
                ]
            }),
        ))
        .await
        .expect("poisoned dispatch");
    assert_eq!(poisoned_response.status(), StatusCode::BAD_REQUEST);
    let poisoned_payload = json_body(poisoned_response).await;
    assert_eq!(poisoned_payload["success"], false);

    let stats = state.stats().get_stats().await.expect("stats");
    assert_eq!(stats.total_interactions, 0);
}

#[tokio::test]
async fn certify_upload_extension_shield_and_admission() {
    let (router, state, _scratch) = laboratory_router().await;

    // 1. Extensión ajena: rechazo 400.
    let rejected = router
        .clone()
        .oneshot(multipart_upload_request("classifier.zip", b"zip-bytes"))
        .await
        .expect("rejected dispatch");
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    // 2. Extensión esperada: admisión con fila 'pending'.
    let admitted = router
        .clone()
        .oneshot(multipart_upload_request("classifier.mlmodel", b"artifact-bytes"))
        .await
        .expect("admitted dispatch");
    assert_eq!(admitted.status(), StatusCode::OK);
    let admitted_payload = json_body(admitted).await;
    assert_eq!(admitted_payload["success"], true);
    assert!(admitted_payload["modelId"].as_str().is_some());

    assert_eq!(state.uploads().count_pending().await.expect("count"), 1);
}

#[tokio::test]
async fn certify_unknown_version_download_is_404_json() {
    let (router, _state, _scratch) = laboratory_router().await;

    let missing_response = router
        .clone()
        .oneshot(get("/api/ai/models/9.9.9"))
        .await
        .expect("missing dispatch");
    assert_eq!(missing_response.status(), StatusCode::NOT_FOUND);
    let missing_payload = json_body(missing_response).await;
    assert_eq!(missing_payload["success"], false);
}

/// Construye a mano el sobre multipart de subida de artefactos.
fn multipart_upload_request(filename: &str, artifact_bytes: &[u8]) -> Request<Body> {
    const BOUNDARY: &str = "SYNAPSE-TEST-BOUNDARY";

    let mut body_bytes = Vec::new();
    for (field_name, field_value) in [
        ("deviceId", "device-subida"),
        ("appVersion", "2.1.0"),
        ("description", "artefacto de laboratorio"),
    ] {
        body_bytes.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, field_name, field_value
            )
            .as_bytes(),
        );
    }
    body_bytes.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"model\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            BOUNDARY, filename
        )
        .as_bytes(),
    );
    body_bytes.extend_from_slice(artifact_bytes);
    body_bytes.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/ai/upload-model")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body_bytes))
        .expect("multipart request")
}
