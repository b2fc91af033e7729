// [libs/infra/blobstore/src/errors.rs]
/*!
 * =================================================================
 * APARATO: VAULT ERROR CATALOG (V5.0)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE LA BÓVEDA
 *
 * VISION:
 * 1. RETRY TRIAGE: 'Transient' es reintentable con backoff exponencial;
 *    'AuthExpired' dispara exactamente UN refresh+retry; el resto aflora.
 * 2. DEGRADE PATH: 'Unconfigured' en modo blob es fatal al arranque; en
 *    modo local el sistema opera sin bóveda remota.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobError {
    /// El objeto solicitado no existe en la bóveda.
    #[error("[L3_VAULT_LOOKUP_FAULT]: OBJECT_NOT_FOUND -> {0}")]
    NotFound(String),

    /// Token de acceso expirado o revocado; dispara refresh + un retry.
    #[error("[L3_VAULT_AUTH_FAULT]: ACCESS_TOKEN_EXPIRED -> {0}")]
    AuthExpired(String),

    /// Fallo de red o de cuota, elegible a backoff exponencial acotado.
    #[error("[L3_VAULT_TRANSIENT_FAULT]: UPLINK_DEGRADED -> {0}")]
    Transient(String),

    /// Rechazo definitivo del servicio remoto o corrupción local.
    #[error("[L3_VAULT_FATAL_FAULT]: OPERATION_REJECTED -> {0}")]
    Fatal(String),

    /// Credenciales OAuth2 ausentes o incompletas en el entorno.
    #[error("[L3_VAULT_CONFIG_FAULT]: CREDENTIAL_VOID -> {0}")]
    Unconfigured(String),

    /// El endpoint de tokens rechazó el intento de refresh.
    #[error("[L3_VAULT_REFRESH_FAULT]: TOKEN_REFRESH_REJECTED -> {0}")]
    Refresh(String),
}

impl BlobError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BlobError::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound(_))
    }
}
