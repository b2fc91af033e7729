// [libs/infra/db/src/repositories/interactions.rs]
/*!
 * =================================================================
 * APARATO: INTERACTION REPOSITORY (V5.1)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA ATÓMICA DE INTERACCIONES Y FEEDBACK
 *
 * VISION:
 * 1. BATCH ATOMICITY: Un lote de interacciones + feedback se compromete
 *    en una sola transacción; el fallo parcial revierte el lote entero.
 * 2. IDEMPOTENT INGEST: Re-emitir el mismo lote produce exactamente el
 *    mismo estado del ledger (upsert por id, nunca duplicado).
 * =================================================================
 */

use crate::client::SqlClient;
use crate::errors::StoreError;
use crate::repositories::{classify_engine_fault, with_contention_retry};
use chrono::Utc;
use libsql::params;
use synapse_domain_models::{DeviceInteraction, InteractionFeedback};
use tracing::{info, instrument};

const INTERACTION_UPSERT_SQL: &str = r#"
    INSERT INTO interactions (
        id, device_id, timestamp, user_message, ai_response,
        detected_intent, confidence_score, app_version, model_version,
        os_version, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
    ON CONFLICT(id) DO UPDATE SET
        device_id = excluded.device_id,
        timestamp = excluded.timestamp,
        user_message = excluded.user_message,
        ai_response = excluded.ai_response,
        detected_intent = excluded.detected_intent,
        confidence_score = excluded.confidence_score,
        app_version = excluded.app_version,
        model_version = excluded.model_version,
        os_version = excluded.os_version
"#;

const FEEDBACK_UPSERT_SQL: &str = r#"
    INSERT INTO feedback (interaction_id, rating, comment, created_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(interaction_id) DO UPDATE SET
        rating = excluded.rating,
        comment = excluded.comment
"#;

pub struct InteractionRepository {
    database_client: SqlClient,
}

impl InteractionRepository {
    pub fn new(client: SqlClient) -> Self {
        Self { database_client: client }
    }

    /// Compromete un lote completo de interacciones con su feedback.
    ///
    /// # Errors:
    /// - `Invariant` si alguna fila viola el dominio (nada se persiste).
    /// - `Transient` si la contención de candado agota los reintentos.
    #[instrument(skip(self, batch))]
    pub async fn upsert_interactions(
        &self,
        batch: &[DeviceInteraction],
    ) -> Result<usize, StoreError> {
        for interaction_row in batch {
            interaction_row.validate().map_err(StoreError::Invariant)?;
        }

        if batch.is_empty() {
            return Ok(0);
        }

        let _write_permit = self.database_client.write_gate().lock().await;

        let persisted_count =
            with_contention_retry("upsert_interactions", || self.execute_batch_upsert(batch))
                .await?;

        self.database_client.beacon().mark_dirty();
        info!("💾 [INTERACTION_REPO]: Batch persisted {} interactions.", persisted_count);
        Ok(persisted_count)
    }

    async fn execute_batch_upsert(
        &self,
        batch: &[DeviceInteraction],
    ) -> Result<usize, StoreError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection.transaction().await?;
        let commit_stamp = Utc::now().to_rfc3339();

        for interaction_row in batch {
            transaction
                .execute(
                    INTERACTION_UPSERT_SQL,
                    params![
                        interaction_row.id.clone(),
                        interaction_row.device_id.clone(),
                        interaction_row.timestamp.clone(),
                        interaction_row.user_message.clone(),
                        interaction_row.ai_response.clone(),
                        interaction_row.detected_intent.clone(),
                        interaction_row.confidence_score,
                        interaction_row.app_version.clone().unwrap_or_default(),
                        interaction_row.model_version.clone().unwrap_or_default(),
                        interaction_row.os_version.clone().unwrap_or_default(),
                        commit_stamp.clone()
                    ],
                )
                .await
                .map_err(classify_engine_fault)?;

            if let Some(feedback_signal) = &interaction_row.feedback {
                transaction
                    .execute(
                        FEEDBACK_UPSERT_SQL,
                        params![
                            interaction_row.id.clone(),
                            feedback_signal.rating,
                            feedback_signal.comment.clone().unwrap_or_default(),
                            commit_stamp.clone()
                        ],
                    )
                    .await
                    .map_err(classify_engine_fault)?;
            }
        }

        transaction.commit().await?;
        Ok(batch.len())
    }

    /// Upsert aislado de feedback sobre una interacción ya registrada.
    #[instrument(skip(self))]
    pub async fn upsert_feedback(
        &self,
        interaction_id: &str,
        rating: i64,
        comment: Option<String>,
    ) -> Result<(), StoreError> {
        if !(1..=5).contains(&rating) {
            return Err(StoreError::Invariant(format!(
                "feedback rating {} outside 1..5",
                rating
            )));
        }

        let _write_permit = self.database_client.write_gate().lock().await;

        with_contention_retry("upsert_feedback", || async {
            let connection = self.database_client.get_connection()?;

            // La interacción referenciada debe existir antes del upsert.
            let mut lookup_rows = connection
                .query(
                    "SELECT COUNT(*) FROM interactions WHERE id = ?1",
                    params![interaction_id.to_string()],
                )
                .await?;
            let interaction_exists = match lookup_rows.next().await? {
                Some(count_row) => count_row.get::<i64>(0)? > 0,
                None => false,
            };
            if !interaction_exists {
                return Err(StoreError::NotFound(format!(
                    "interaction '{}' absent from ledger",
                    interaction_id
                )));
            }

            connection
                .execute(
                    FEEDBACK_UPSERT_SQL,
                    params![
                        interaction_id.to_string(),
                        rating,
                        comment.clone().unwrap_or_default(),
                        Utc::now().to_rfc3339()
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

    /// Interacciones creadas estrictamente después de la marca entregada.
    pub async fn count_interactions_since(&self, threshold_stamp: &str) -> Result<u64, StoreError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT COUNT(*) FROM interactions WHERE created_at > ?1",
                params![threshold_stamp.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(count_row) => Ok(count_row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    /// Corpus completo de entrenamiento: interacciones con feedback adjunto
    /// (LEFT JOIN). Lectura instantánea sin bloquear escritores.
    #[instrument(skip(self))]
    pub async fn load_training_corpus(&self) -> Result<Vec<DeviceInteraction>, StoreError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT i.id, i.device_id, i.timestamp, i.user_message, i.ai_response,
                       i.detected_intent, i.confidence_score,
                       COALESCE(i.app_version, ''), COALESCE(i.model_version, ''),
                       COALESCE(i.os_version, ''),
                       COALESCE(f.rating, -1), COALESCE(f.comment, '')
                FROM interactions i
                LEFT JOIN feedback f ON i.id = f.interaction_id
                "#,
                (),
            )
            .await?;

        let mut corpus = Vec::new();
        while let Some(joined_row) = rows.next().await? {
            let rating_sentinel = joined_row.get::<i64>(10)?;
            let feedback_signal = if rating_sentinel >= 0 {
                let comment_text = joined_row.get::<String>(11)?;
                Some(InteractionFeedback {
                    rating: rating_sentinel,
                    comment: if comment_text.is_empty() { None } else { Some(comment_text) },
                })
            } else {
                None
            };

            let optional_column = |raw: String| if raw.is_empty() { None } else { Some(raw) };

            corpus.push(DeviceInteraction {
                id: joined_row.get::<String>(0)?,
                device_id: joined_row.get::<String>(1)?,
                timestamp: joined_row.get::<String>(2)?,
                user_message: joined_row.get::<String>(3)?,
                ai_response: joined_row.get::<String>(4)?,
                detected_intent: joined_row.get::<String>(5)?,
                confidence_score: joined_row.get::<f64>(6)?,
                app_version: optional_column(joined_row.get::<String>(7)?),
                model_version: optional_column(joined_row.get::<String>(8)?),
                os_version: optional_column(joined_row.get::<String>(9)?),
                feedback: feedback_signal,
            });
        }

        Ok(corpus)
    }
}
