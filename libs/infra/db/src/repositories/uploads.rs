// [libs/infra/db/src/repositories/uploads.rs]
/*!
 * =================================================================
 * APARATO: UPLOADED MODEL REPOSITORY (V5.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DE ARTEFACTOS SUBIDOS POR CLIENTES
 *
 * VISION:
 * 1. FORWARD-ONLY GUARD: Toda transición de estado se valida contra la
 *    máquina de estados del dominio antes de tocar el ledger.
 * 2. VERSION BINDING: 'incorporated_in_version' se sella si y solo si
 *    el estado destino es 'incorporated'.
 * =================================================================
 */

use crate::client::SqlClient;
use crate::errors::StoreError;
use crate::repositories::{classify_engine_fault, with_contention_retry};
use libsql::{params, Row};
use synapse_domain_models::{BlobRef, IncorporationStatus, UploadedModel};
use tracing::{info, instrument};

const UPLOADED_COLUMNS: &str = "id, device_id, COALESCE(app_version, ''), \
    COALESCE(description, ''), blob_ref, COALESCE(file_size, 0), \
    COALESCE(original_filename, ''), COALESCE(sha256, ''), \
    COALESCE(upload_date, ''), incorporation_status, \
    COALESCE(incorporated_in_version, '')";

pub struct UploadRepository {
    database_client: SqlClient,
}

impl UploadRepository {
    pub fn new(client: SqlClient) -> Self {
        Self { database_client: client }
    }

    #[instrument(skip(self, uploaded_model), fields(model_id = %uploaded_model.id))]
    pub async fn insert_uploaded_model(
        &self,
        uploaded_model: &UploadedModel,
    ) -> Result<(), StoreError> {
        let _write_permit = self.database_client.write_gate().lock().await;

        with_contention_retry("insert_uploaded_model", || async {
            let connection = self.database_client.get_connection()?;
            connection
                .execute(
                    r#"
                    INSERT INTO uploaded_models (
                        id, device_id, app_version, description, blob_ref,
                        file_size, original_filename, sha256, upload_date,
                        incorporation_status, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    "#,
                    params![
                        uploaded_model.id.clone(),
                        uploaded_model.device_id.clone(),
                        uploaded_model.app_version.clone(),
                        uploaded_model.description.clone(),
                        uploaded_model.blob_ref.to_string(),
                        uploaded_model.file_size as i64,
                        uploaded_model.original_filename.clone(),
                        uploaded_model.sha256.clone(),
                        uploaded_model.upload_date.clone(),
                        uploaded_model.status.as_str().to_string(),
                        chrono::Utc::now().to_rfc3339()
                    ],
                )
                .await
                .map_err(classify_engine_fault)?;
            Ok(())
        })
        .await?;

        self.database_client.beacon().mark_dirty();
        info!("📥 [UPLOAD_REPO]: Artifact '{}' registered as pending.", uploaded_model.id);
        Ok(())
    }

    /// Transición de estado con guardia forward-only.
    ///
    /// # Errors:
    /// - `NotFound` si el id no existe.
    /// - `Invariant` si la transición es ilegal o falta la versión destino.
    #[instrument(skip(self))]
    pub async fn set_uploaded_status(
        &self,
        uploaded_model_id: &str,
        next_status: IncorporationStatus,
        incorporated_in_version: Option<&str>,
    ) -> Result<(), StoreError> {
        if next_status == IncorporationStatus::Incorporated
            && incorporated_in_version.is_none()
        {
            return Err(StoreError::Invariant(
                "incorporated status requires a target version".into(),
            ));
        }

        let _write_permit = self.database_client.write_gate().lock().await;

        with_contention_retry("set_uploaded_status", || async {
            let connection = self.database_client.get_connection()?;

            let mut status_rows = connection
                .query(
                    "SELECT incorporation_status FROM uploaded_models WHERE id = ?1",
                    params![uploaded_model_id.to_string()],
                )
                .await?;

            let current_status = match status_rows.next().await? {
                Some(status_row) => {
                    let raw_status = status_row.get::<String>(0)?;
                    IncorporationStatus::parse(&raw_status).ok_or_else(|| {
                        StoreError::Mapping(format!("unknown status '{}'", raw_status))
                    })?
                }
                None => {
                    return Err(StoreError::NotFound(format!(
                        "uploaded model '{}' absent from ledger",
                        uploaded_model_id
                    )))
                }
            };

            if !current_status.can_transition_to(next_status) {
                return Err(StoreError::Invariant(format!(
                    "illegal status transition {} -> {} for '{}'",
                    current_status.as_str(),
                    next_status.as_str(),
                    uploaded_model_id
                )));
            }

            connection
                .execute(
                    "UPDATE uploaded_models
                     SET incorporation_status = ?1, incorporated_in_version = ?2
                     WHERE id = ?3",
                    params![
                        next_status.as_str().to_string(),
                        incorporated_in_version.unwrap_or_default().to_string(),
                        uploaded_model_id.to_string()
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

    /// Subidas pendientes en orden de llegada (upload_date ascendente).
    /// La consulta única garantiza una instantánea estable frente a
    /// inserciones concurrentes.
    pub async fn list_pending_uploaded(&self) -> Result<Vec<UploadedModel>, StoreError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {} FROM uploaded_models
                     WHERE incorporation_status = 'pending'
                     ORDER BY upload_date ASC",
                    UPLOADED_COLUMNS
                ),
                (),
            )
            .await?;

        let mut pending_models = Vec::new();
        while let Some(model_row) = rows.next().await? {
            pending_models.push(map_uploaded_row(&model_row)?);
        }
        Ok(pending_models)
    }

    pub async fn count_pending(&self) -> Result<u64, StoreError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT COUNT(*) FROM uploaded_models WHERE incorporation_status = 'pending'",
                (),
            )
            .await?;

        match rows.next().await? {
            Some(count_row) => Ok(count_row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    pub async fn get_uploaded_model(
        &self,
        uploaded_model_id: &str,
    ) -> Result<Option<UploadedModel>, StoreError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {} FROM uploaded_models WHERE id = ?1",
                    UPLOADED_COLUMNS
                ),
                params![uploaded_model_id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(model_row) => Ok(Some(map_uploaded_row(&model_row)?)),
            None => Ok(None),
        }
    }
}

fn map_uploaded_row(model_row: &Row) -> Result<UploadedModel, StoreError> {
    let raw_status = model_row.get::<String>(9)?;
    let status = IncorporationStatus::parse(&raw_status)
        .ok_or_else(|| StoreError::Mapping(format!("unknown status '{}'", raw_status)))?;

    let raw_blob_ref = model_row.get::<String>(4)?;
    let blob_ref: BlobRef = raw_blob_ref
        .parse()
        .map_err(StoreError::Mapping)?;

    let incorporated_in = model_row.get::<String>(10)?;

    Ok(UploadedModel {
        id: model_row.get::<String>(0)?,
        device_id: model_row.get::<String>(1)?,
        app_version: model_row.get::<String>(2)?,
        description: model_row.get::<String>(3)?,
        blob_ref,
        file_size: model_row.get::<i64>(5)? as u64,
        original_filename: model_row.get::<String>(6)?,
        sha256: model_row.get::<String>(7)?,
        upload_date: model_row.get::<String>(8)?,
        status,
        incorporated_in_version: if incorporated_in.is_empty() {
            None
        } else {
            Some(incorporated_in)
        },
    })
}
