// [libs/infra/db/src/schema.rs]
/*!
 * =================================================================
 * APARATO: AGGREGATION LEDGER SCHEMA (V4.0)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CRISTALIZACIÓN DEL ESQUEMA RELACIONAL AUTORITATIVO
 *
 * VISION:
 * 1. IDEMPOTENT BOOTSTRAP: 'CREATE TABLE IF NOT EXISTS' permite aplicar
 *    el esquema en cada conexión de arranque sin migraciones externas.
 * 2. TEMPORAL PARITY: 'created_at' se inyecta explícitamente en RFC-3339
 *    desde el código; el DEFAULT del motor es solo red de seguridad.
 * =================================================================
 */

use crate::errors::StoreError;
use libsql::Connection;
use tracing::debug;

/// Sentencias DDL del ledger, en orden de dependencia referencial.
const LEDGER_DDL: [&str; 8] = [
    "CREATE TABLE IF NOT EXISTS interactions (
        id TEXT PRIMARY KEY,
        device_id TEXT NOT NULL,
        timestamp TEXT,
        user_message TEXT,
        ai_response TEXT,
        detected_intent TEXT,
        confidence_score REAL,
        app_version TEXT,
        model_version TEXT,
        os_version TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS feedback (
        interaction_id TEXT PRIMARY KEY,
        rating INTEGER NOT NULL,
        comment TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (interaction_id) REFERENCES interactions (id)
    )",
    "CREATE TABLE IF NOT EXISTS model_versions (
        version TEXT PRIMARY KEY,
        blob_ref TEXT NOT NULL,
        accuracy REAL,
        training_data_size INTEGER,
        training_date TEXT,
        export_marker TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS uploaded_models (
        id TEXT PRIMARY KEY,
        device_id TEXT NOT NULL,
        app_version TEXT,
        description TEXT,
        blob_ref TEXT NOT NULL,
        file_size INTEGER,
        original_filename TEXT,
        sha256 TEXT,
        upload_date TEXT,
        incorporation_status TEXT NOT NULL DEFAULT 'pending',
        incorporated_in_version TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS ensemble_models (
        ensemble_version TEXT PRIMARY KEY,
        description TEXT,
        component_models TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (ensemble_version) REFERENCES model_versions (version)
    )",
    "CREATE INDEX IF NOT EXISTS idx_interactions_created_at
        ON interactions (created_at)",
    "CREATE INDEX IF NOT EXISTS idx_uploaded_models_status
        ON uploaded_models (incorporation_status, upload_date)",
    "CREATE INDEX IF NOT EXISTS idx_model_versions_training_date
        ON model_versions (training_date)",
];

/// Aplica el esquema completo del ledger sobre la conexión entregada.
pub async fn apply_aggregation_schema(connection: &Connection) -> Result<(), StoreError> {
    for ddl_statement in LEDGER_DDL {
        connection.execute(ddl_statement, ()).await?;
    }
    debug!("🗄️  [SCHEMA]: Aggregation ledger strata crystallized.");
    Ok(())
}
