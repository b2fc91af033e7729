// [libs/infra/blobstore/src/local.rs]
/*!
 * =================================================================
 * APARATO: LOCAL VAULT (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: BÓVEDA DE OBJETOS SOBRE FILESYSTEM (MODO LOCAL)
 *
 * VISION:
 * Paridad semántica con la bóveda remota sobre tokio::fs. Sin URLs
 * directas: el streamer degrada al fallback de bytes. Los handles
 * emitidos usan el esquema 'file:'.
 * =================================================================
 */

use crate::errors::BlobError;
use crate::paths::BlobNamespace;
use crate::remote::{PutOutcome, RemoteObject};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

pub struct LocalVault {
    vault_root: PathBuf,
    namespace: BlobNamespace,
    db_snapshot_filename: String,
    last_snapshot_push: Mutex<Option<Instant>>,
    snapshot_push_interval: Duration,
}

impl LocalVault {
    pub fn new(
        vault_root: PathBuf,
        namespace: BlobNamespace,
        db_snapshot_filename: String,
        snapshot_push_interval: Duration,
    ) -> Self {
        Self {
            vault_root,
            namespace,
            db_snapshot_filename,
            last_snapshot_push: Mutex::new(None),
            snapshot_push_interval,
        }
    }

    pub fn namespace(&self) -> &BlobNamespace {
        &self.namespace
    }

    fn physical_path(&self, virtual_folder: &str, object_name: &str) -> PathBuf {
        if virtual_folder.is_empty() {
            self.vault_root.join(object_name)
        } else {
            self.vault_root
                .join(virtual_folder.trim_matches('/'))
                .join(object_name)
        }
    }

    pub async fn fetch_db_snapshot(&self) -> Result<Vec<u8>, BlobError> {
        let snapshot_path = self.vault_root.join(&self.db_snapshot_filename);
        match fs::read(&snapshot_path).await {
            Ok(snapshot_bytes) => Ok(snapshot_bytes),
            Err(io_fault) if io_fault.kind() == std::io::ErrorKind::NotFound => Err(
                BlobError::NotFound(format!("snapshot '{}'", self.db_snapshot_filename)),
            ),
            Err(io_fault) => Err(BlobError::Fatal(format!("SNAPSHOT_READ_FAULT: {}", io_fault))),
        }
    }

    pub async fn push_db_snapshot(&self, snapshot_bytes: Vec<u8>) -> Result<bool, BlobError> {
        {
            let mut last_push_guard = self.last_snapshot_push.lock().await;
            if let Some(last_push) = *last_push_guard {
                if last_push.elapsed() < self.snapshot_push_interval {
                    debug!("🧊 [LOCAL_VAULT]: Snapshot push coalesced inside throttle window.");
                    return Ok(false);
                }
            }
            *last_push_guard = Some(Instant::now());
        }

        fs::create_dir_all(&self.vault_root)
            .await
            .map_err(|e| BlobError::Fatal(format!("VAULT_ROOT_FAULT: {}", e)))?;
        let snapshot_path = self.vault_root.join(&self.db_snapshot_filename);
        fs::write(&snapshot_path, snapshot_bytes)
            .await
            .map_err(|e| BlobError::Fatal(format!("SNAPSHOT_WRITE_FAULT: {}", e)))?;
        Ok(true)
    }

    #[instrument(skip(self, payload_bytes), fields(name = %object_name, folder = %virtual_folder))]
    pub async fn put_model(
        &self,
        payload_bytes: Vec<u8>,
        object_name: &str,
        virtual_folder: &str,
    ) -> Result<PutOutcome, BlobError> {
        let destination = self.physical_path(virtual_folder, object_name);
        if let Some(parent_directory) = destination.parent() {
            fs::create_dir_all(parent_directory)
                .await
                .map_err(|e| BlobError::Fatal(format!("FOLDER_FAULT: {}", e)))?;
        }

        fs::write(&destination, payload_bytes)
            .await
            .map_err(|e| BlobError::Fatal(format!("OBJECT_WRITE_FAULT: {}", e)))?;

        info!("📦 [LOCAL_VAULT]: Object crystallized at '{}'.", destination.display());
        Ok(PutOutcome {
            path: destination.to_string_lossy().to_string(),
            direct_url: None,
        })
    }

    pub async fn get_model_bytes(
        &self,
        object_name: &str,
        virtual_folder: &str,
    ) -> Result<Vec<u8>, BlobError> {
        let source = self.physical_path(virtual_folder, object_name);
        match fs::read(&source).await {
            Ok(object_bytes) => Ok(object_bytes),
            Err(io_fault) if io_fault.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(source.to_string_lossy().to_string()))
            }
            Err(io_fault) => Err(BlobError::Fatal(format!("OBJECT_READ_FAULT: {}", io_fault))),
        }
    }

    pub async fn delete_model(
        &self,
        object_name: &str,
        virtual_folder: &str,
    ) -> Result<(), BlobError> {
        let target = self.physical_path(virtual_folder, object_name);
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(io_fault) if io_fault.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(target.to_string_lossy().to_string()))
            }
            Err(io_fault) => Err(BlobError::Fatal(format!("OBJECT_DELETE_FAULT: {}", io_fault))),
        }
    }

    /// Inventario recursivo de una carpeta virtual. Las rutas devueltas son
    /// relativas a la raíz de la bóveda, con separadores '/'.
    pub async fn list_models(&self, virtual_folder: &str) -> Result<Vec<RemoteObject>, BlobError> {
        let scan_root = if virtual_folder.is_empty() {
            self.vault_root.clone()
        } else {
            self.vault_root.join(virtual_folder.trim_matches('/'))
        };

        if !scan_root.exists() {
            return Ok(Vec::new());
        }

        let mut inventory = Vec::new();
        let mut pending_directories = vec![scan_root];

        while let Some(directory) = pending_directories.pop() {
            let mut directory_entries = fs::read_dir(&directory)
                .await
                .map_err(|e| BlobError::Fatal(format!("SCAN_FAULT: {}", e)))?;

            while let Some(entry) = directory_entries
                .next_entry()
                .await
                .map_err(|e| BlobError::Fatal(format!("SCAN_FAULT: {}", e)))?
            {
                let entry_path = entry.path();
                if entry_path.is_dir() {
                    pending_directories.push(entry_path);
                    continue;
                }

                let metadata = entry
                    .metadata()
                    .await
                    .map_err(|e| BlobError::Fatal(format!("SCAN_FAULT: {}", e)))?;

                inventory.push(RemoteObject {
                    name: entry
                        .file_name()
                        .to_string_lossy()
                        .to_string(),
                    path: relative_vault_path(&self.vault_root, &entry_path),
                    size: metadata.len(),
                });
            }
        }

        Ok(inventory)
    }
}

fn relative_vault_path(vault_root: &Path, absolute_path: &Path) -> String {
    absolute_path
        .strip_prefix(vault_root)
        .unwrap_or(absolute_path)
        .to_string_lossy()
        .replace('\\', "/")
}
