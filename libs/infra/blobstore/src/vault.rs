// [libs/infra/blobstore/src/vault.rs]
/*!
 * =================================================================
 * APARATO: OBJECT VAULT FACADE (V5.2)
 * CLASIFICACIÓN: INFRASTRUCTURE FACADE (ESTRATO L3)
 * RESPONSABILIDAD: DESPACHO UNIFICADO REMOTO/LOCAL DE LA BÓVEDA
 *
 * VISION:
 * 1. ENUM DISPATCH: Un solo punto de entrada para ambos backends; el
 *    modo se decide una vez en el arranque, nunca por petición.
 * 2. HANDLE MINTING: La fachada acuña los BlobRef canónicos ('blob:'
 *    remoto, 'file:' local) que viajan al ledger relacional.
 * =================================================================
 */

use crate::errors::BlobError;
use crate::local::LocalVault;
use crate::paths::BlobNamespace;
use crate::remote::{PutOutcome, RemoteObject, RemoteVault, StreamHandle};
use crate::token::TokenManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use synapse_domain_models::BlobRef;

/// Parámetros operativos de la bóveda, comunes a ambos backends.
#[derive(Debug, Clone)]
pub struct VaultSettings {
    pub models_root: String,
    pub db_snapshot_filename: String,
    pub snapshot_push_interval: Duration,
    pub max_transient_retries: u32,
    pub retry_base_delay: Duration,
}

pub enum ObjectVault {
    Remote(RemoteVault),
    Local(LocalVault),
}

impl ObjectVault {
    pub fn remote(
        token_manager: Arc<TokenManager>,
        settings: &VaultSettings,
    ) -> Result<Self, BlobError> {
        Ok(ObjectVault::Remote(RemoteVault::new(
            token_manager,
            BlobNamespace::new(settings.models_root.clone()),
            settings.db_snapshot_filename.clone(),
            settings.snapshot_push_interval,
            settings.max_transient_retries,
            settings.retry_base_delay,
        )?))
    }

    pub fn local(vault_root: PathBuf, settings: &VaultSettings) -> Self {
        ObjectVault::Local(LocalVault::new(
            vault_root,
            BlobNamespace::new(settings.models_root.clone()),
            settings.db_snapshot_filename.clone(),
            settings.snapshot_push_interval,
        ))
    }

    pub fn namespace(&self) -> &BlobNamespace {
        match self {
            ObjectVault::Remote(remote_vault) => remote_vault.namespace(),
            ObjectVault::Local(local_vault) => local_vault.namespace(),
        }
    }

    /// Descriptor del backend activo para el endpoint de salud.
    pub fn backend_descriptor(&self) -> &'static str {
        match self {
            ObjectVault::Remote(_) => "blob",
            ObjectVault::Local(_) => "local",
        }
    }

    /// Handle canónico que viaja al ledger para un objeto de esta bóveda.
    pub fn blob_ref_for(&self, object_name: &str, virtual_folder: &str) -> BlobRef {
        let vault_path = self
            .namespace()
            .object_path(virtual_folder, object_name)
            .trim_start_matches('/')
            .to_string();

        match self {
            ObjectVault::Remote(_) => BlobRef::Blob(vault_path),
            ObjectVault::Local(_) => BlobRef::File(vault_path),
        }
    }

    pub async fn fetch_db_snapshot(&self) -> Result<Vec<u8>, BlobError> {
        match self {
            ObjectVault::Remote(remote_vault) => remote_vault.fetch_db_snapshot().await,
            ObjectVault::Local(local_vault) => local_vault.fetch_db_snapshot().await,
        }
    }

    /// Push de instantánea con throttle; `false` cuando coalesció.
    pub async fn push_db_snapshot(&self, snapshot_bytes: Vec<u8>) -> Result<bool, BlobError> {
        match self {
            ObjectVault::Remote(remote_vault) => {
                remote_vault.push_db_snapshot(snapshot_bytes).await
            }
            ObjectVault::Local(local_vault) => local_vault.push_db_snapshot(snapshot_bytes).await,
        }
    }

    pub async fn put_model(
        &self,
        payload_bytes: Vec<u8>,
        object_name: &str,
        virtual_folder: &str,
    ) -> Result<PutOutcome, BlobError> {
        match self {
            ObjectVault::Remote(remote_vault) => {
                remote_vault
                    .put_model(payload_bytes, object_name, virtual_folder)
                    .await
            }
            ObjectVault::Local(local_vault) => {
                local_vault
                    .put_model(payload_bytes, object_name, virtual_folder)
                    .await
            }
        }
    }

    /// Handle de streaming. `None` en modo local: no existen URLs directas
    /// y el llamador degrada al fallback de bytes.
    pub async fn get_model_stream(
        &self,
        object_name: &str,
        virtual_folder: &str,
    ) -> Result<Option<StreamHandle>, BlobError> {
        match self {
            ObjectVault::Remote(remote_vault) => Ok(Some(
                remote_vault
                    .get_model_stream(object_name, virtual_folder)
                    .await?,
            )),
            ObjectVault::Local(_) => Ok(None),
        }
    }

    pub async fn get_model_bytes(
        &self,
        object_name: &str,
        virtual_folder: &str,
    ) -> Result<Vec<u8>, BlobError> {
        match self {
            ObjectVault::Remote(remote_vault) => {
                remote_vault.get_model_bytes(object_name, virtual_folder).await
            }
            ObjectVault::Local(local_vault) => {
                local_vault.get_model_bytes(object_name, virtual_folder).await
            }
        }
    }

    pub async fn delete_model(
        &self,
        object_name: &str,
        virtual_folder: &str,
    ) -> Result<(), BlobError> {
        match self {
            ObjectVault::Remote(remote_vault) => {
                remote_vault.delete_model(object_name, virtual_folder).await
            }
            ObjectVault::Local(local_vault) => {
                local_vault.delete_model(object_name, virtual_folder).await
            }
        }
    }

    pub async fn list_models(
        &self,
        virtual_folder: &str,
    ) -> Result<Vec<RemoteObject>, BlobError> {
        match self {
            ObjectVault::Remote(remote_vault) => remote_vault.list_models(virtual_folder).await,
            ObjectVault::Local(local_vault) => local_vault.list_models(virtual_folder).await,
        }
    }
}
