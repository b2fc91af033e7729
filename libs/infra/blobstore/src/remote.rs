// [libs/infra/blobstore/src/remote.rs]
/*!
 * =================================================================
 * APARATO: REMOTE VAULT UPLINK (V7.1)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: TRANSPORTE HTTP HACIA LA BÓVEDA DE OBJETOS REMOTA
 *
 * VISION:
 * 1. AUTH CIRCUIT: Todo despacho toma un token vigente del gestor; un
 *    401 dispara exactamente UN refresh+retry antes de aflorar.
 * 2. BOUNDED BACKOFF: 429/5xx y fallos físicos de red se reintentan
 *    con backoff exponencial hasta agotar el presupuesto.
 * 3. SNAPSHOT THROTTLE: La subida de instantáneas del ledger se limita
 *    a una por intervalo; los excesos coalescen sin error.
 * =================================================================
 */

use crate::errors::BlobError;
use crate::paths::BlobNamespace;
use crate::token::TokenManager;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const CONTENT_UPLOAD_ENDPOINT: &str = "https://content.dropboxapi.com/2/files/upload";
const CONTENT_DOWNLOAD_ENDPOINT: &str = "https://content.dropboxapi.com/2/files/download";
const TEMPORARY_LINK_ENDPOINT: &str = "https://api.dropboxapi.com/2/files/get_temporary_link";
const LIST_FOLDER_ENDPOINT: &str = "https://api.dropboxapi.com/2/files/list_folder";
const LIST_CONTINUE_ENDPOINT: &str = "https://api.dropboxapi.com/2/files/list_folder/continue";
const DELETE_ENDPOINT: &str = "https://api.dropboxapi.com/2/files/delete_v2";

/// Resultado de una subida: ruta estable + URL directa efímera.
#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub path: String,
    pub direct_url: Option<String>,
}

/// Handle de streaming para redirección HTTP.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    pub direct_url: String,
    pub size: u64,
}

/// Objeto listado en la bóveda.
#[derive(Debug, Clone)]
pub struct RemoteObject {
    pub name: String,
    pub path: String,
    pub size: u64,
}

pub struct RemoteVault {
    network_uplink_client: Client,
    token_manager: Arc<TokenManager>,
    namespace: BlobNamespace,
    db_snapshot_filename: String,
    /// Marca del último push de instantánea (throttle).
    last_snapshot_push: Mutex<Option<Instant>>,
    snapshot_push_interval: Duration,
    max_transient_retries: u32,
    retry_base_delay: Duration,
}

impl RemoteVault {
    pub fn new(
        token_manager: Arc<TokenManager>,
        namespace: BlobNamespace,
        db_snapshot_filename: String,
        snapshot_push_interval: Duration,
        max_transient_retries: u32,
        retry_base_delay: Duration,
    ) -> Result<Self, BlobError> {
        let network_uplink_client = Client::builder()
            .timeout(Duration::from_secs(120))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .user_agent("Synapse-Vault-Uplink/V7")
            .build()
            .map_err(|e| BlobError::Fatal(format!("UPLINK_IGNITION_FAILURE: {}", e)))?;

        Ok(Self {
            network_uplink_client,
            token_manager,
            namespace,
            db_snapshot_filename,
            last_snapshot_push: Mutex::new(None),
            snapshot_push_interval,
            max_transient_retries,
            retry_base_delay,
        })
    }

    pub fn namespace(&self) -> &BlobNamespace {
        &self.namespace
    }

    // --- INSTANTÁNEAS DEL LEDGER ---

    /// Descarga la instantánea de base de datos desde la raíz de la bóveda.
    #[instrument(skip(self))]
    pub async fn fetch_db_snapshot(&self) -> Result<Vec<u8>, BlobError> {
        let snapshot_path = format!("/{}", self.db_snapshot_filename);
        let response = self
            .transmit("fetch_db_snapshot", || {
                self.network_uplink_client
                    .post(CONTENT_DOWNLOAD_ENDPOINT)
                    .header("Dropbox-API-Arg", json!({ "path": snapshot_path }).to_string())
            })
            .await?;

        let snapshot_bytes = response
            .bytes()
            .await
            .map_err(|e| BlobError::Transient(format!("SNAPSHOT_STREAM_FAULT: {}", e)))?;

        info!("📥 [VAULT]: Ledger snapshot hydrated ({} bytes).", snapshot_bytes.len());
        Ok(snapshot_bytes.to_vec())
    }

    /// Sube la instantánea del ledger con throttle por intervalo.
    /// Devuelve `false` cuando el push coalesció dentro de la ventana.
    #[instrument(skip(self, snapshot_bytes))]
    pub async fn push_db_snapshot(&self, snapshot_bytes: Vec<u8>) -> Result<bool, BlobError> {
        {
            let mut last_push_guard = self.last_snapshot_push.lock().await;
            if let Some(last_push) = *last_push_guard {
                if last_push.elapsed() < self.snapshot_push_interval {
                    debug!("🧊 [VAULT]: Snapshot push coalesced inside throttle window.");
                    return Ok(false);
                }
            }
            *last_push_guard = Some(Instant::now());
        }

        let snapshot_path = format!("/{}", self.db_snapshot_filename);
        self.upload_bytes(&snapshot_path, snapshot_bytes).await?;
        info!("📤 [VAULT]: Ledger snapshot crystallized at '{}'.", snapshot_path);
        Ok(true)
    }

    // --- OPERACIONES DE MODELOS ---

    /// Sube un objeto (overwrite-by-name) y acuña una URL directa efímera.
    #[instrument(skip(self, payload_bytes), fields(name = %object_name, folder = %virtual_folder))]
    pub async fn put_model(
        &self,
        payload_bytes: Vec<u8>,
        object_name: &str,
        virtual_folder: &str,
    ) -> Result<PutOutcome, BlobError> {
        let object_path = self.namespace.object_path(virtual_folder, object_name);
        self.upload_bytes(&object_path, payload_bytes).await?;

        // La URL directa es best-effort: la ruta estable es el contrato.
        let direct_url = match self.mint_temporary_link(&object_path).await {
            Ok(stream_handle) => Some(stream_handle.direct_url),
            Err(link_fault) => {
                warn!("⚠️ [VAULT]: Direct link minting declined: {}", link_fault);
                None
            }
        };

        Ok(PutOutcome { path: object_path, direct_url })
    }

    /// Acuña un handle de streaming (URL directa + tamaño) para el objeto.
    #[instrument(skip(self), fields(name = %object_name, folder = %virtual_folder))]
    pub async fn get_model_stream(
        &self,
        object_name: &str,
        virtual_folder: &str,
    ) -> Result<StreamHandle, BlobError> {
        let object_path = self.namespace.object_path(virtual_folder, object_name);
        self.mint_temporary_link(&object_path).await
    }

    /// Descarga el objeto completo. Fallback cuando el streaming no procede.
    #[instrument(skip(self), fields(name = %object_name, folder = %virtual_folder))]
    pub async fn get_model_bytes(
        &self,
        object_name: &str,
        virtual_folder: &str,
    ) -> Result<Vec<u8>, BlobError> {
        let object_path = self.namespace.object_path(virtual_folder, object_name);
        let response = self
            .transmit("get_model_bytes", || {
                self.network_uplink_client
                    .post(CONTENT_DOWNLOAD_ENDPOINT)
                    .header("Dropbox-API-Arg", json!({ "path": object_path }).to_string())
            })
            .await?;

        let object_bytes = response
            .bytes()
            .await
            .map_err(|e| BlobError::Transient(format!("OBJECT_STREAM_FAULT: {}", e)))?;
        Ok(object_bytes.to_vec())
    }

    #[instrument(skip(self), fields(name = %object_name, folder = %virtual_folder))]
    pub async fn delete_model(
        &self,
        object_name: &str,
        virtual_folder: &str,
    ) -> Result<(), BlobError> {
        let object_path = self.namespace.object_path(virtual_folder, object_name);
        self.transmit("delete_model", || {
            self.network_uplink_client
                .post(DELETE_ENDPOINT)
                .json(&json!({ "path": object_path }))
        })
        .await?;

        info!("🗑️  [VAULT]: Object '{}' purged from vault.", object_path);
        Ok(())
    }

    /// Lista los objetos de una carpeta virtual (recursivo, con paginación).
    #[instrument(skip(self), fields(folder = %virtual_folder))]
    pub async fn list_models(&self, virtual_folder: &str) -> Result<Vec<RemoteObject>, BlobError> {
        let folder_path = if virtual_folder.is_empty() {
            String::new()
        } else {
            format!("/{}", virtual_folder.trim_matches('/'))
        };

        let mut inventory = Vec::new();

        let first_page = self
            .transmit("list_models", || {
                self.network_uplink_client.post(LIST_FOLDER_ENDPOINT).json(&json!({
                    "path": folder_path,
                    "recursive": true,
                    "include_deleted": false
                }))
            })
            .await?;

        let mut page_payload: serde_json::Value = first_page
            .json()
            .await
            .map_err(|e| BlobError::Fatal(format!("LIST_DECODE_FAULT: {}", e)))?;

        loop {
            if let Some(entries) = page_payload["entries"].as_array() {
                for entry in entries {
                    if entry[".tag"].as_str() != Some("file") {
                        continue;
                    }
                    inventory.push(RemoteObject {
                        name: entry["name"].as_str().unwrap_or_default().to_string(),
                        path: entry["path_display"].as_str().unwrap_or_default().to_string(),
                        size: entry["size"].as_u64().unwrap_or(0),
                    });
                }
            }

            if !page_payload["has_more"].as_bool().unwrap_or(false) {
                break;
            }

            let continuation_cursor = page_payload["cursor"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let next_page = self
                .transmit("list_models_continue", || {
                    self.network_uplink_client
                        .post(LIST_CONTINUE_ENDPOINT)
                        .json(&json!({ "cursor": continuation_cursor }))
                })
                .await?;
            page_payload = next_page
                .json()
                .await
                .map_err(|e| BlobError::Fatal(format!("LIST_DECODE_FAULT: {}", e)))?;
        }

        Ok(inventory)
    }

    // --- MOTOR DE TRANSPORTE ---

    async fn upload_bytes(
        &self,
        object_path: &str,
        payload_bytes: Vec<u8>,
    ) -> Result<(), BlobError> {
        let api_argument = json!({
            "path": object_path,
            "mode": "overwrite",
            "autorename": false,
            "mute": true
        })
        .to_string();

        self.transmit("upload_bytes", || {
            self.network_uplink_client
                .post(CONTENT_UPLOAD_ENDPOINT)
                .header("Dropbox-API-Arg", api_argument.clone())
                .header("Content-Type", "application/octet-stream")
                .body(payload_bytes.clone())
        })
        .await?;

        Ok(())
    }

    async fn mint_temporary_link(&self, object_path: &str) -> Result<StreamHandle, BlobError> {
        let response = self
            .transmit("mint_temporary_link", || {
                self.network_uplink_client
                    .post(TEMPORARY_LINK_ENDPOINT)
                    .json(&json!({ "path": object_path }))
            })
            .await?;

        let link_payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BlobError::Fatal(format!("LINK_DECODE_FAULT: {}", e)))?;

        let direct_url = link_payload["link"]
            .as_str()
            .ok_or_else(|| BlobError::Fatal("LINK_FIELD_VOID".into()))?
            .to_string();
        let size = link_payload["metadata"]["size"].as_u64().unwrap_or(0);

        Ok(StreamHandle { direct_url, size })
    }

    /// Despacho con circuito de autenticación y backoff exponencial.
    ///
    /// Un 401 consume el único retry de autenticación (refresh + reintento);
    /// 429/5xx y fallos físicos consumen el presupuesto transitorio.
    async fn transmit<F>(
        &self,
        operation_label: &str,
        build_request: F,
    ) -> Result<reqwest::Response, BlobError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut auth_retry_spent = false;
        let mut transient_attempts = 0u32;

        loop {
            let access_token = self
                .token_manager
                .get_valid_access_token()
                .await?
                .ok_or_else(|| {
                    BlobError::AuthExpired(format!("{}: no vigent access token", operation_label))
                })?;

            let dispatch_result = build_request()
                .bearer_auth(&access_token)
                .send()
                .await;

            let classified_fault = match dispatch_result {
                Ok(response) => {
                    let status_code = response.status();
                    if status_code.is_success() {
                        return Ok(response);
                    }

                    if status_code == StatusCode::UNAUTHORIZED {
                        if !auth_retry_spent {
                            auth_retry_spent = true;
                            warn!(
                                "🔑 [VAULT]: 401 on '{}'. Spending the single refresh+retry.",
                                operation_label
                            );
                            let _ = self.token_manager.force_refresh().await;
                            continue;
                        }
                        return Err(BlobError::AuthExpired(format!(
                            "{}: unauthorized after refresh",
                            operation_label
                        )));
                    }

                    if status_code == StatusCode::CONFLICT {
                        let rejection_body = response.text().await.unwrap_or_default();
                        if rejection_body.contains("not_found") {
                            return Err(BlobError::NotFound(operation_label.to_string()));
                        }
                        return Err(BlobError::Fatal(format!(
                            "{}: CONFLICT -> {}",
                            operation_label, rejection_body
                        )));
                    }

                    if status_code == StatusCode::TOO_MANY_REQUESTS
                        || status_code.is_server_error()
                    {
                        BlobError::Transient(format!("{}: HTTP_{}", operation_label, status_code))
                    } else {
                        let rejection_body = response.text().await.unwrap_or_default();
                        return Err(BlobError::Fatal(format!(
                            "{}: HTTP_{} -> {}",
                            operation_label, status_code, rejection_body
                        )));
                    }
                }
                Err(network_fault) => {
                    BlobError::Transient(format!("{}: {}", operation_label, network_fault))
                }
            };

            transient_attempts += 1;
            if transient_attempts >= self.max_transient_retries {
                return Err(classified_fault);
            }

            let exponential_delay = self.retry_base_delay * 2u32.pow(transient_attempts - 1);
            warn!(
                "⏳ [VAULT_BACKOFF]: '{}' degraded ({}). Retrying in {:?}.",
                operation_label, classified_fault, exponential_delay
            );
            tokio::time::sleep(exponential_delay).await;
        }
    }
}
