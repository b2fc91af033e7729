// [libs/infra/db/src/client.rs]
/*!
 * =================================================================
 * APARATO: LEDGER CONNECTION CLIENT (V5.2)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GESTIÓN DE ENLACES, ESCRITOR ÚNICO Y BALIZA DE SYNC
 *
 * VISION:
 * 1. SINGLE-WRITER INVARIANT: Toda mutación adquiere la compuerta de
 *    escritura asíncrona antes de abrir su transacción; los lectores
 *    nunca la tocan.
 * 2. MEMORY ANCHOR: En modo RAM el cliente detecta URLs de memoria y
 *    fija un ancla de persistencia ANTES del bootstrap del esquema,
 *    garantizando que las tablas residan en el segmento compartido.
 * 3. SYNC BEACON: Cada commit iza la bandera 'dirty'; el relé de
 *    instantáneas la consume de forma debounced hacia la bóveda.
 * =================================================================
 */

use crate::errors::StoreError;
use crate::schema::apply_aggregation_schema;
use libsql::{Builder, Connection, Database};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

/// Baliza de sincronía de instantáneas: los repositorios la izan al
/// comprometer; el relé de fondo la consume.
#[derive(Debug, Default)]
pub struct SyncBeacon {
    dirty: AtomicBool,
}

impl SyncBeacon {
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Consume la bandera, devolviendo si había trabajo pendiente.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::SeqCst)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct SqlClient {
    internal_database_driver: Arc<Database>,
    /// Mantiene la base en memoria viva evitando que SQLite la purgue.
    _memory_persistence_anchor: Option<Arc<Connection>>,
    /// Compuerta de escritor único a nivel de proceso.
    write_serialization_gate: Arc<Mutex<()>>,
    snapshot_beacon: Arc<SyncBeacon>,
}

impl SqlClient {
    #[instrument(skip_all, fields(path = %database_path))]
    pub async fn connect(database_path: &str) -> Result<Self, StoreError> {
        if database_path.is_empty() {
            return Err(StoreError::Configuration(
                "CRITICAL_FAULT: DATABASE_PATH_UNDEFINED".into(),
            ));
        }

        info!("🔌 [LEDGER]: Initiating link synchronization to [{}]", database_path);

        let is_memory = database_path.contains(":memory:")
            || database_path.contains("mode=memory");

        let database_driver = Builder::new_local(database_path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("DRIVER_IGNITION_FAILURE: {}", e)))?;

        let shared_driver = Arc::new(database_driver);
        let mut anchor = None;

        if is_memory {
            // En modo memoria el ancla se abre ANTES que cualquier otra operación.
            let anchor_connection = shared_driver
                .connect()
                .map_err(|e| StoreError::Connection(format!("ANCHOR_FAULT: {}", e)))?;

            apply_aggregation_schema(&anchor_connection).await?;

            anchor = Some(Arc::new(anchor_connection));
            info!("⚓ [LEDGER]: Memory strata solidified and anchored.");
        } else {
            let bootstrap_connection = shared_driver
                .connect()
                .map_err(|e| StoreError::Connection(format!("BOOTSTRAP_LINK_FAULT: {}", e)))?;
            apply_aggregation_schema(&bootstrap_connection).await?;
        }

        Ok(Self {
            internal_database_driver: shared_driver,
            _memory_persistence_anchor: anchor,
            write_serialization_gate: Arc::new(Mutex::new(())),
            snapshot_beacon: Arc::new(SyncBeacon::default()),
        })
    }

    pub fn get_connection(&self) -> Result<Connection, StoreError> {
        self.internal_database_driver.connect().map_err(|e| {
            error!("⚠️ [POOL_FAULT]: Connection allocation failed: {}", e);
            StoreError::Connection(e.to_string())
        })
    }

    /// Compuerta de escritor único; toda mutación la adquiere primero.
    pub fn write_gate(&self) -> &Mutex<()> {
        &self.write_serialization_gate
    }

    pub fn beacon(&self) -> Arc<SyncBeacon> {
        self.snapshot_beacon.clone()
    }
}
