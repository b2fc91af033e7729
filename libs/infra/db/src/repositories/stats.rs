// [libs/infra/db/src/repositories/stats.rs]
/*!
 * =================================================================
 * APARATO: GLOBAL STATS REPOSITORY (V3.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: AGREGADOS OPERATIVOS PARA EL GATEWAY
 * =================================================================
 */

use crate::client::SqlClient;
use crate::errors::StoreError;
use crate::repositories::versions::RESERVED_BASE_VERSION;
use synapse_domain_models::{GlobalStats, IntentCount};
use tracing::instrument;

pub struct StatsRepository {
    database_client: SqlClient,
}

impl StatsRepository {
    pub fn new(client: SqlClient) -> Self {
        Self { database_client: client }
    }

    /// Instantánea agregada del sistema en una sola pasada de lecturas.
    #[instrument(skip(self))]
    pub async fn get_stats(&self) -> Result<GlobalStats, StoreError> {
        let connection = self.database_client.get_connection()?;

        let mut totals_rows = connection
            .query(
                "SELECT COUNT(*), COUNT(DISTINCT device_id) FROM interactions",
                (),
            )
            .await?;
        let (total_interactions, unique_devices) = match totals_rows.next().await? {
            Some(totals_row) => (
                totals_row.get::<i64>(0)? as u64,
                totals_row.get::<i64>(1)? as u64,
            ),
            None => (0, 0),
        };

        let mut rating_rows = connection
            .query("SELECT COALESCE(AVG(rating), 0.0) FROM feedback", ())
            .await?;
        let average_feedback_rating = match rating_rows.next().await? {
            Some(rating_row) => rating_row.get::<f64>(0)?,
            None => 0.0,
        };

        let mut intent_rows = connection
            .query(
                "SELECT detected_intent, COUNT(*) AS frequency
                 FROM interactions
                 WHERE detected_intent != ''
                 GROUP BY detected_intent
                 ORDER BY frequency DESC
                 LIMIT 5",
                (),
            )
            .await?;
        let mut top_intents = Vec::new();
        while let Some(intent_row) = intent_rows.next().await? {
            top_intents.push(IntentCount {
                intent: intent_row.get::<String>(0)?,
                count: intent_row.get::<i64>(1)? as u64,
            });
        }

        let mut version_rows = connection
            .query(
                "SELECT version, COALESCE(training_date, '')
                 FROM model_versions
                 ORDER BY training_date DESC LIMIT 1",
                (),
            )
            .await?;
        let (latest_model_version, last_training_date) = match version_rows.next().await? {
            Some(version_row) => {
                let training_stamp = version_row.get::<String>(1)?;
                (
                    version_row.get::<String>(0)?,
                    if training_stamp.is_empty() { None } else { Some(training_stamp) },
                )
            }
            None => (RESERVED_BASE_VERSION.to_string(), None),
        };

        let mut model_count_rows = connection
            .query("SELECT COUNT(*) FROM model_versions", ())
            .await?;
        let total_models = match model_count_rows.next().await? {
            Some(count_row) => count_row.get::<i64>(0)? as u64,
            None => 0,
        };

        let mut incorporated_rows = connection
            .query(
                "SELECT COUNT(*) FROM uploaded_models
                 WHERE incorporation_status = 'incorporated'",
                (),
            )
            .await?;
        let incorporated_user_models = match incorporated_rows.next().await? {
            Some(count_row) => count_row.get::<i64>(0)? as u64,
            None => 0,
        };

        Ok(GlobalStats {
            total_interactions,
            unique_devices,
            average_feedback_rating,
            top_intents,
            latest_model_version,
            last_training_date,
            total_models,
            incorporated_user_models,
        })
    }
}
