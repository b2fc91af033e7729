// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: STORE ERROR CATALOG (V4.1)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * VISION:
 * 1. TAXONOMÍA DE REINTENTO: 'Transient' es la única clase elegible
 *    para backoff; las violaciones de invariante jamás se reintentan.
 * 2. GATEWAY MAPPING: El gateway traduce Invariant -> 400,
 *    NotFound -> 404, el resto -> 500.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Error de enlace físico con el archivo o el ancla de memoria.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    Connection(String),

    /// Fallo en la configuración del entorno (rutas vacías o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    Configuration(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    Query(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el Dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    Mapping(String),

    /// Violación de invariante de dominio o de esquema. No elegible a retry.
    #[error("[L3_DB_INVARIANT_FAULT]: CONSTRAINT_VIOLATION -> {0}")]
    Invariant(String),

    /// La fila solicitada no existe en las tablas activas.
    #[error("[L3_DB_LOOKUP_FAULT]: IDENTIFIER_NOT_FOUND -> {0}")]
    NotFound(String),

    /// Contención u I/O transitorio agotado tras los reintentos con backoff.
    #[error("[L3_DB_TRANSIENT_FAULT]: RETRY_BUDGET_EXHAUSTED -> {0}")]
    Transient(String),
}

impl StoreError {
    /// Contención de candado elegible para backoff aleatorizado.
    pub fn is_contention(&self) -> bool {
        match self {
            StoreError::Query(engine_fault) => {
                let diagnostic = engine_fault.to_string();
                diagnostic.contains("locked") || diagnostic.contains("busy")
            }
            StoreError::Transient(_) => true,
            _ => false,
        }
    }
}
