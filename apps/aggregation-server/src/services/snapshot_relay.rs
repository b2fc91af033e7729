// [apps/aggregation-server/src/services/snapshot_relay.rs]
/*!
 * =================================================================
 * APARATO: LEDGER SNAPSHOT RELAY (V5.0)
 * CLASIFICACIÓN: BACKGROUND SERVICE (ESTRATO L4)
 * RESPONSABILIDAD: ESPEJO DEBOUNCED DEL LEDGER HACIA LA BÓVEDA
 *
 * Protocolo Write-Behind: cada commit iza la baliza 'dirty'; este relé
 * la consume en su ticker y empuja la instantánea. El throttle de la
 * bóveda coalesce pushes excesivos; la baliza permanece izada hasta un
 * push efectivo.
 * =================================================================
 */

use crate::state::AppState;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Lanza el relé de instantáneas sobre el reactor de Tokio.
pub fn spawn_snapshot_relay(application_state: AppState) {
    // Un ledger en memoria (laboratorio) no tiene archivo que espejar.
    if application_state.config.database_path.contains(":memory:")
        || application_state.config.database_path.contains("mode=memory")
    {
        info!("🧪 [SNAPSHOT_RELAY]: In-memory ledger detected; relay in standby.");
        return;
    }

    tokio::spawn(async move {
        let relay_cadence = application_state.config.db_sync_interval_secs.max(5);
        let mut relay_ticker = interval(Duration::from_secs(relay_cadence));
        let snapshot_beacon = application_state.database_client.beacon();

        info!("🛰️  [SNAPSHOT_RELAY]: Write-behind mirror online ({}s cadence).", relay_cadence);

        loop {
            relay_ticker.tick().await;

            if application_state.shutdown_requested() {
                info!("🛑 [SNAPSHOT_RELAY]: Shutdown observed; relay standing down.");
                break;
            }

            if !snapshot_beacon.is_dirty() {
                continue;
            }

            let snapshot_bytes =
                match tokio::fs::read(&application_state.config.database_path).await {
                    Ok(ledger_bytes) => ledger_bytes,
                    Err(read_fault) => {
                        warn!("⚠️ [SNAPSHOT_RELAY]: Ledger file unreadable: {}", read_fault);
                        continue;
                    }
                };

            match application_state.vault.push_db_snapshot(snapshot_bytes).await {
                Ok(true) => {
                    snapshot_beacon.take_dirty();
                    debug!("📤 [SNAPSHOT_RELAY]: Ledger snapshot mirrored.");
                }
                Ok(false) => {
                    // Throttle de la bóveda: la baliza sigue izada para el
                    // siguiente tick.
                    debug!("🧊 [SNAPSHOT_RELAY]: Push coalesced; beacon stays hot.");
                }
                Err(push_fault) => {
                    warn!("⚠️ [SNAPSHOT_RELAY]: Snapshot push degraded: {}", push_fault);
                }
            }
        }
    });
}
