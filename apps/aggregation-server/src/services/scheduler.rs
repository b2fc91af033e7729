// [apps/aggregation-server/src/services/scheduler.rs]
/*!
 * =================================================================
 * APARATO: WALL-CLOCK SCHEDULER DAEMON (V6.0)
 * CLASIFICACIÓN: BACKGROUND SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: TICK DIARIO DE ENTRENAMIENTO Y BARRIDO SEMANAL
 *
 * Implementación: bucle de reloj de pared con sueños de 60s; ante un
 * error no manejado el ciclo hiberna 300s. El tick de entrenamiento
 * evalúa la política a las 02:00 locales; la retención corre semanal.
 * La zona horaria es la del proceso (knob documentado para futuros).
 * =================================================================
 */

use crate::services::{orchestrator, retention};
use crate::state::AppState;
use chrono::{Local, NaiveDate, Timelike};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

/// Cadencia nominal del bucle de pared.
const SCHEDULER_TICK_SECONDS: u64 = 60;
/// Hibernación tras un error no manejado.
const SCHEDULER_ERROR_BACKOFF_SECONDS: u64 = 300;
/// Hora local del tick diario de entrenamiento.
const DAILY_TRAINING_HOUR: u32 = 2;
/// Hora local del barrido de retención.
const RETENTION_SWEEP_HOUR: u32 = 3;
/// Días entre barridos de retención.
const RETENTION_PERIOD_DAYS: i64 = 7;

/// Lanza el daemon del scheduler sobre el reactor de Tokio.
pub fn spawn_scheduler(application_state: AppState) {
    tokio::spawn(async move {
        info!(
            "⏰ [SCHEDULER]: Wall-clock daemon online (daily tick {:02}:00, weekly retention).",
            DAILY_TRAINING_HOUR
        );

        let mut last_training_tick_date: Option<NaiveDate> = None;
        let mut last_retention_sweep_date: Option<NaiveDate> = None;

        loop {
            if application_state.shutdown_requested() {
                info!("🛑 [SCHEDULER]: Shutdown observed; daemon standing down.");
                break;
            }

            application_state.scheduler_alive.store(true, Ordering::SeqCst);

            let tick_outcome: anyhow::Result<()> = async {
                let local_now = Local::now();
                let today = local_now.date_naive();

                // A. TICK DIARIO DE ENTRENAMIENTO (02:00 local).
                if local_now.hour() == DAILY_TRAINING_HOUR
                    && last_training_tick_date != Some(today)
                {
                    last_training_tick_date = Some(today);
                    info!("🌙 [SCHEDULER]: Daily training tick firing.");
                    orchestrator::evaluate_and_dispatch(&application_state, "scheduler_daily")
                        .await;
                }

                // B. BARRIDO SEMANAL DE RETENCIÓN (03:00 local, cada 7 días).
                let retention_due = last_retention_sweep_date
                    .map(|last_sweep| (today - last_sweep).num_days() >= RETENTION_PERIOD_DAYS)
                    .unwrap_or(true);
                if local_now.hour() == RETENTION_SWEEP_HOUR && retention_due {
                    last_retention_sweep_date = Some(today);
                    let purged_count = retention::run_retention_sweep(&application_state).await?;
                    info!("🧹 [SCHEDULER]: Weekly retention purged {} versions.", purged_count);
                }

                Ok(())
            }
            .await;

            match tick_outcome {
                Ok(()) => sleep(Duration::from_secs(SCHEDULER_TICK_SECONDS)).await,
                Err(tick_fault) => {
                    error!("💥 [SCHEDULER]: Tick collapsed ({:#}); hibernating.", tick_fault);
                    sleep(Duration::from_secs(SCHEDULER_ERROR_BACKOFF_SECONDS)).await;
                }
            }
        }
    });
}
