// [apps/aggregation-server/src/registry.rs]
/*!
 * =================================================================
 * APARATO: MODEL REGISTRY FACADE (V5.0)
 * CLASIFICACIÓN: APPLICATION ADAPTER (ESTRATO L2-APP)
 * RESPONSABILIDAD: RESOLUCIÓN DE VERSIONES A PAYLOADS DESCARGABLES
 *
 * VISION:
 * 1. POINTER AUTHORITY: La versión reservada '1.0.0' resuelve SIEMPRE
 *    contra el puntero 'base_model/model_latest.<ext>', nunca contra el
 *    blob_ref de la fila semilla; "último base" sigue a cada publish.
 * 2. READ-MOSTLY CACHE: Los bytes del base se cachean bajo RwLock; el
 *    publish invalida bajo el lado de escritura.
 * =================================================================
 */

use std::collections::HashMap;
use std::sync::Arc;
use synapse_domain_models::BlobRef;
use synapse_infra_blobstore::paths::BASE_MODEL_FOLDER;
use synapse_infra_blobstore::ObjectVault;
use synapse_infra_db::repositories::versions::RESERVED_BASE_VERSION;
use synapse_infra_db::{SqlClient, VersionRepository};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// Resolución de descarga de una versión.
pub enum DownloadResolution {
    /// Redirección 302 a la URL directa acuñada por la bóveda.
    Stream { direct_url: String, size: u64 },
    /// Payload completo como fallback (modo local o streaming rechazado).
    Bytes { buffer: Vec<u8> },
    NotFound,
}

pub struct ModelRegistry {
    database_client: SqlClient,
    vault: Arc<ObjectVault>,
    artifact_extension: String,
    /// Caché read-mostly de los bytes del modelo base vigente.
    base_model_cache: RwLock<Option<Arc<Vec<u8>>>>,
    /// Buffers en proceso para handles 'mem:' (diagnóstico y tests).
    memory_buffers: RwLock<HashMap<String, Arc<Vec<u8>>>>,
}

impl ModelRegistry {
    pub fn new(
        database_client: SqlClient,
        vault: Arc<ObjectVault>,
        artifact_extension: String,
    ) -> Self {
        Self {
            database_client,
            vault,
            artifact_extension,
            base_model_cache: RwLock::new(None),
            memory_buffers: RwLock::new(HashMap::new()),
        }
    }

    fn versions(&self) -> VersionRepository {
        VersionRepository::new(self.database_client.clone())
    }

    /// Última versión publicada observable por los clientes.
    pub async fn latest_version(&self) -> String {
        match self.versions().get_latest_version().await {
            Ok(Some(record)) => record.version,
            Ok(None) => RESERVED_BASE_VERSION.to_string(),
            Err(lookup_fault) => {
                warn!("⚠️ [REGISTRY]: Latest version lookup degraded: {}", lookup_fault);
                RESERVED_BASE_VERSION.to_string()
            }
        }
    }

    /// Resuelve una versión a su payload descargable.
    #[instrument(skip(self))]
    pub async fn resolve_for_download(&self, version: &str) -> DownloadResolution {
        if version == RESERVED_BASE_VERSION {
            return self.resolve_base_pointer().await;
        }

        let blob_ref = match self.versions().get_model_blob_ref(version).await {
            Ok(Some(blob_ref)) => blob_ref,
            Ok(None) => return DownloadResolution::NotFound,
            Err(lookup_fault) => {
                warn!("⚠️ [REGISTRY]: Ledger lookup degraded for '{}': {}", version, lookup_fault);
                return DownloadResolution::NotFound;
            }
        };

        self.resolve_handle(&blob_ref).await
    }

    /// Resolución del puntero base vigente, con caché de bytes.
    async fn resolve_base_pointer(&self) -> DownloadResolution {
        let latest_name = self.vault.namespace().latest_model_name(&self.artifact_extension);

        match self.vault.get_model_stream(&latest_name, BASE_MODEL_FOLDER).await {
            Ok(Some(stream_handle)) => {
                return DownloadResolution::Stream {
                    direct_url: stream_handle.direct_url,
                    size: stream_handle.size,
                };
            }
            Ok(None) => {}
            Err(stream_fault) if stream_fault.is_not_found() => {
                return DownloadResolution::NotFound
            }
            Err(stream_fault) => {
                debug!("⚠️ [REGISTRY]: Base stream declined, falling back to bytes: {}", stream_fault);
            }
        }

        if let Some(cached_payload) = self.base_model_cache.read().await.clone() {
            return DownloadResolution::Bytes { buffer: cached_payload.as_ref().clone() };
        }

        match self.vault.get_model_bytes(&latest_name, BASE_MODEL_FOLDER).await {
            Ok(payload) => {
                let shared_payload = Arc::new(payload);
                *self.base_model_cache.write().await = Some(shared_payload.clone());
                DownloadResolution::Bytes { buffer: shared_payload.as_ref().clone() }
            }
            Err(fetch_fault) if fetch_fault.is_not_found() => DownloadResolution::NotFound,
            Err(fetch_fault) => {
                warn!("⚠️ [REGISTRY]: Base pointer unreachable: {}", fetch_fault);
                DownloadResolution::NotFound
            }
        }
    }

    /// Resolución de un handle arbitrario del ledger.
    async fn resolve_handle(&self, blob_ref: &BlobRef) -> DownloadResolution {
        match blob_ref {
            BlobRef::Stream(direct_url) => DownloadResolution::Stream {
                direct_url: direct_url.clone(),
                size: 0,
            },
            BlobRef::Mem(buffer_name) => {
                match self.memory_buffers.read().await.get(buffer_name) {
                    Some(buffer) => DownloadResolution::Bytes { buffer: buffer.as_ref().clone() },
                    None => DownloadResolution::NotFound,
                }
            }
            BlobRef::Blob(vault_path) | BlobRef::File(vault_path) => {
                let Some((virtual_folder, object_name)) = split_handle_path(vault_path) else {
                    return DownloadResolution::NotFound;
                };

                if let Ok(Some(stream_handle)) =
                    self.vault.get_model_stream(&object_name, &virtual_folder).await
                {
                    return DownloadResolution::Stream {
                        direct_url: stream_handle.direct_url,
                        size: stream_handle.size,
                    };
                }

                match self.vault.get_model_bytes(&object_name, &virtual_folder).await {
                    Ok(payload) => DownloadResolution::Bytes { buffer: payload },
                    Err(fetch_fault) => {
                        if !fetch_fault.is_not_found() {
                            warn!("⚠️ [REGISTRY]: Handle '{}' unreachable: {}", blob_ref, fetch_fault);
                        }
                        DownloadResolution::NotFound
                    }
                }
            }
        }
    }

    /// Invalidación del caché del base tras cada publish.
    pub async fn invalidate_base_cache(&self) {
        *self.base_model_cache.write().await = None;
        debug!("♻️  [REGISTRY]: Base model cache invalidated.");
    }

    /// Bytes residentes en el caché del base (telemetría de salud).
    pub async fn base_cache_resident_bytes(&self) -> u64 {
        self.base_model_cache
            .read()
            .await
            .as_ref()
            .map(|payload| payload.len() as u64)
            .unwrap_or(0)
    }

    /// Registra un buffer en proceso para handles 'mem:'.
    pub async fn register_memory_buffer(&self, buffer_name: &str, payload: Vec<u8>) {
        self.memory_buffers
            .write()
            .await
            .insert(buffer_name.to_string(), Arc::new(payload));
    }
}

/// Separa un path de handle en (carpeta virtual, nombre de objeto).
fn split_handle_path(vault_path: &str) -> Option<(String, String)> {
    let trimmed = vault_path.trim_start_matches('/');
    match trimmed.rsplit_once('/') {
        Some((folder, name)) => Some((folder.to_string(), name.to_string())),
        None => Some((String::new(), trimmed.to_string())),
    }
}
