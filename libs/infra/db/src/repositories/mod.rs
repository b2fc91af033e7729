// [libs/infra/db/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY REGISTRY (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO DE REPOSITORIOS Y MOTOR DE REINTENTOS
 *
 * VISION:
 * 1. BOUNDED RETRY: Contención de candado reintentada con backoff
 *    aleatorizado uniforme de 0.5-2.0s, máximo 3 intentos; el
 *    agotamiento aflora como fallo transitorio tipado.
 * 2. CONSTRAINT TRIAGE: Las violaciones de constraint del motor se
 *    reclasifican como fallos de invariante (no elegibles a retry).
 * =================================================================
 */

pub mod interactions;
pub mod stats;
pub mod uploads;
pub mod versions;

pub use interactions::InteractionRepository;
pub use stats::StatsRepository;
pub use uploads::UploadRepository;
pub use versions::VersionRepository;

use crate::errors::StoreError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Intentos totales ante contención de candado.
const WRITE_RETRY_ATTEMPTS: u32 = 3;

/// Ejecuta una mutación con reintentos acotados ante contención.
pub(crate) async fn with_contention_retry<T, F, Fut>(
    operation_label: &str,
    mut operation: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut remaining_attempts = WRITE_RETRY_ATTEMPTS;

    loop {
        match operation().await {
            Ok(outcome) => return Ok(outcome),
            Err(operation_fault) if operation_fault.is_contention() => {
                remaining_attempts -= 1;
                if remaining_attempts == 0 {
                    return Err(StoreError::Transient(format!(
                        "{}: {}",
                        operation_label, operation_fault
                    )));
                }

                let backoff_milliseconds = rand::thread_rng().gen_range(500..=2000);
                warn!(
                    "⏳ [LEDGER_CONTENTION]: '{}' deferred {}ms ({} attempts left).",
                    operation_label, backoff_milliseconds, remaining_attempts
                );
                tokio::time::sleep(Duration::from_millis(backoff_milliseconds)).await;
            }
            Err(operation_fault) => return Err(operation_fault),
        }
    }
}

/// Reclasifica fallos del motor: violaciones de constraint son invariantes.
pub(crate) fn classify_engine_fault(engine_fault: libsql::Error) -> StoreError {
    let diagnostic = engine_fault.to_string();
    if diagnostic.contains("UNIQUE constraint")
        || diagnostic.contains("NOT NULL constraint")
        || diagnostic.contains("FOREIGN KEY constraint")
        || diagnostic.contains("CHECK constraint")
    {
        StoreError::Invariant(diagnostic)
    } else {
        StoreError::Query(engine_fault)
    }
}
