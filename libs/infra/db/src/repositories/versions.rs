// [libs/infra/db/src/repositories/versions.rs]
/*!
 * =================================================================
 * APARATO: MODEL VERSION REPOSITORY (V6.2)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: LEDGER APPEND-ONLY DE VERSIONES Y ENSAMBLES
 *
 * VISION:
 * 1. SEED GUARD: La versión reservada '1.0.0' es un placeholder de
 *    bootstrap; la retención y el borrado la rechazan siempre.
 * 2. PUBLISH ORDER: La fila de versión se inserta DESPUÉS de que los
 *    blobs existen; una fila sin blob es imposible por orden de
 *    escritura.
 * =================================================================
 */

use crate::client::SqlClient;
use crate::errors::StoreError;
use crate::repositories::{classify_engine_fault, with_contention_retry};
use libsql::{params, Row};
use synapse_domain_models::{BlobRef, EnsembleComponent, EnsembleRecord, ModelVersionRecord};
use tracing::{info, instrument};

/// Versión lógica reservada del modelo base.
pub const RESERVED_BASE_VERSION: &str = "1.0.0";

const VERSION_COLUMNS: &str = "version, blob_ref, COALESCE(accuracy, 0.0), \
    COALESCE(training_data_size, 0), COALESCE(training_date, ''), \
    COALESCE(created_at, ''), COALESCE(export_marker, '')";

pub struct VersionRepository {
    database_client: SqlClient,
}

impl VersionRepository {
    pub fn new(client: SqlClient) -> Self {
        Self { database_client: client }
    }

    #[instrument(skip(self, version_record), fields(version = %version_record.version))]
    pub async fn insert_model_version(
        &self,
        version_record: &ModelVersionRecord,
    ) -> Result<(), StoreError> {
        let _write_permit = self.database_client.write_gate().lock().await;

        with_contention_retry("insert_model_version", || async {
            let connection = self.database_client.get_connection()?;
            connection
                .execute(
                    r#"
                    INSERT INTO model_versions (
                        version, blob_ref, accuracy, training_data_size,
                        training_date, export_marker, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    params![
                        version_record.version.clone(),
                        version_record.blob_ref.to_string(),
                        version_record.accuracy,
                        version_record.training_data_size as i64,
                        version_record.training_date.clone(),
                        version_record.export_marker.clone().unwrap_or_default(),
                        chrono::Utc::now().to_rfc3339()
                    ],
                )
                .await
                .map_err(classify_engine_fault)?;
            Ok(())
        })
        .await?;

        self.database_client.beacon().mark_dirty();
        info!("🏷️  [VERSION_REPO]: Version '{}' sealed in ledger.", version_record.version);
        Ok(())
    }

    #[instrument(skip(self, ensemble_record), fields(version = %ensemble_record.version))]
    pub async fn insert_ensemble_record(
        &self,
        ensemble_record: &EnsembleRecord,
    ) -> Result<(), StoreError> {
        let components_payload = serde_json::to_string(&ensemble_record.components)
            .map_err(|e| StoreError::Mapping(e.to_string()))?;

        let _write_permit = self.database_client.write_gate().lock().await;

        with_contention_retry("insert_ensemble_record", || async {
            let connection = self.database_client.get_connection()?;
            connection
                .execute(
                    "INSERT INTO ensemble_models
                     (ensemble_version, description, component_models, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        ensemble_record.version.clone(),
                        ensemble_record.description.clone(),
                        components_payload.clone(),
                        chrono::Utc::now().to_rfc3339()
                    ],
                )
                .await
                .map_err(classify_engine_fault)?;
            Ok(())
        })
        .await?;

        self.database_client.beacon().mark_dirty();
        Ok(())
    }

    pub async fn get_ensemble_record(
        &self,
        version: &str,
    ) -> Result<Option<EnsembleRecord>, StoreError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT ensemble_version, COALESCE(description, ''), component_models
                 FROM ensemble_models WHERE ensemble_version = ?1",
                params![version.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(ensemble_row) => {
                let components_payload = ensemble_row.get::<String>(2)?;
                let components: Vec<EnsembleComponent> =
                    serde_json::from_str(&components_payload)
                        .map_err(|e| StoreError::Mapping(e.to_string()))?;
                Ok(Some(EnsembleRecord {
                    version: ensemble_row.get::<String>(0)?,
                    description: ensemble_row.get::<String>(1)?,
                    components,
                }))
            }
            None => Ok(None),
        }
    }

    /// Versión publicada más reciente por fecha de entrenamiento.
    pub async fn get_latest_version(&self) -> Result<Option<ModelVersionRecord>, StoreError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {} FROM model_versions
                     ORDER BY training_date DESC LIMIT 1",
                    VERSION_COLUMNS
                ),
                (),
            )
            .await?;

        match rows.next().await? {
            Some(version_row) => Ok(Some(map_version_row(&version_row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_model_version(
        &self,
        version: &str,
    ) -> Result<Option<ModelVersionRecord>, StoreError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {} FROM model_versions WHERE version = ?1",
                    VERSION_COLUMNS
                ),
                params![version.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(version_row) => Ok(Some(map_version_row(&version_row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_model_blob_ref(&self, version: &str) -> Result<Option<BlobRef>, StoreError> {
        Ok(self
            .get_model_version(version)
            .await?
            .map(|record| record.blob_ref))
    }

    /// Marca temporal del último entrenamiento registrado.
    pub async fn last_training_date(&self) -> Result<Option<String>, StoreError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT COALESCE(MAX(training_date), '') FROM model_versions",
                (),
            )
            .await?;

        match rows.next().await? {
            Some(max_row) => {
                let raw_stamp = max_row.get::<String>(0)?;
                Ok(if raw_stamp.is_empty() { None } else { Some(raw_stamp) })
            }
            None => Ok(None),
        }
    }

    /// Versión inmediatamente anterior a la entregada, para el bloque de
    /// comparación del acta de entrenamiento.
    pub async fn previous_model_info(
        &self,
        current_version: &str,
    ) -> Result<Option<ModelVersionRecord>, StoreError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {} FROM model_versions
                     WHERE version != ?1
                     ORDER BY training_date DESC LIMIT 1",
                    VERSION_COLUMNS
                ),
                params![current_version.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(version_row) => Ok(Some(map_version_row(&version_row)?)),
            None => Ok(None),
        }
    }

    /// Versiones no-base que exceden el presupuesto de retención, más
    /// antiguas primero en el resultado de borrado.
    pub async fn list_retention_candidates(
        &self,
        keep_newest: u32,
    ) -> Result<Vec<ModelVersionRecord>, StoreError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {} FROM model_versions
                     WHERE version != ?1
                     ORDER BY training_date DESC
                     LIMIT -1 OFFSET ?2",
                    VERSION_COLUMNS
                ),
                params![RESERVED_BASE_VERSION.to_string(), keep_newest as i64],
            )
            .await?;

        let mut expired_versions = Vec::new();
        while let Some(version_row) = rows.next().await? {
            expired_versions.push(map_version_row(&version_row)?);
        }
        Ok(expired_versions)
    }

    /// Elimina la fila de versión y su composición de ensamble.
    /// El blob asociado debe haberse eliminado ANTES de esta llamada.
    #[instrument(skip(self))]
    pub async fn delete_model_version(&self, version: &str) -> Result<(), StoreError> {
        if version == RESERVED_BASE_VERSION {
            return Err(StoreError::Invariant(
                "reserved base version is not deletable".into(),
            ));
        }

        let _write_permit = self.database_client.write_gate().lock().await;

        with_contention_retry("delete_model_version", || async {
            let connection = self.database_client.get_connection()?;
            let transaction = connection.transaction().await?;

            transaction
                .execute(
                    "DELETE FROM ensemble_models WHERE ensemble_version = ?1",
                    params![version.to_string()],
                )
                .await
                .map_err(classify_engine_fault)?;
            transaction
                .execute(
                    "DELETE FROM model_versions WHERE version = ?1",
                    params![version.to_string()],
                )
                .await
                .map_err(classify_engine_fault)?;

            transaction.commit().await?;
            Ok(())
        })
        .await?;

        self.database_client.beacon().mark_dirty();
        info!("🗑️  [VERSION_REPO]: Version '{}' purged from ledger.", version);
        Ok(())
    }

    /// Siembra la fila placeholder '1.0.0' si el ledger arranca vacío.
    /// Devuelve true si la siembra ocurrió en esta llamada.
    #[instrument(skip(self, base_pointer_ref))]
    pub async fn seed_base_version(
        &self,
        base_pointer_ref: &BlobRef,
    ) -> Result<bool, StoreError> {
        let _write_permit = self.database_client.write_gate().lock().await;

        let seeded = with_contention_retry("seed_base_version", || async {
            let connection = self.database_client.get_connection()?;

            let mut count_rows = connection
                .query(
                    "SELECT COUNT(*) FROM model_versions WHERE version = ?1",
                    params![RESERVED_BASE_VERSION.to_string()],
                )
                .await?;
            let already_seeded = match count_rows.next().await? {
                Some(count_row) => count_row.get::<i64>(0)? > 0,
                None => false,
            };
            if already_seeded {
                return Ok(false);
            }

            connection
                .execute(
                    "INSERT INTO model_versions
                     (version, blob_ref, accuracy, training_data_size, training_date, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        RESERVED_BASE_VERSION.to_string(),
                        base_pointer_ref.to_string(),
                        0.92,
                        1000_i64,
                        chrono::Utc::now().to_rfc3339(),
                        chrono::Utc::now().to_rfc3339()
                    ],
                )
                .await
                .map_err(classify_engine_fault)?;
            Ok(true)
        })
        .await?;

        if seeded {
            self.database_client.beacon().mark_dirty();
            info!("🌱 [VERSION_REPO]: Base version placeholder seeded.");
        }
        Ok(seeded)
    }

    pub async fn count_versions(&self) -> Result<u64, StoreError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query("SELECT COUNT(*) FROM model_versions", ())
            .await?;

        match rows.next().await? {
            Some(count_row) => Ok(count_row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }
}

fn map_version_row(version_row: &Row) -> Result<ModelVersionRecord, StoreError> {
    let raw_blob_ref = version_row.get::<String>(1)?;
    let blob_ref: BlobRef = raw_blob_ref.parse().map_err(StoreError::Mapping)?;

    let created_at = version_row.get::<String>(5)?;
    let export_marker = version_row.get::<String>(6)?;

    Ok(ModelVersionRecord {
        version: version_row.get::<String>(0)?,
        blob_ref,
        accuracy: version_row.get::<f64>(2)?,
        training_data_size: version_row.get::<i64>(3)? as u64,
        training_date: version_row.get::<String>(4)?,
        created_at: if created_at.is_empty() { None } else { Some(created_at) },
        export_marker: if export_marker.is_empty() { None } else { Some(export_marker) },
    })
}
