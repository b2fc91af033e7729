// [apps/aggregation-server/src/main.rs]
/*!
 * =================================================================
 * APARATO: AGGREGATION SERVER ENTRY POINT (V8.0)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1)
 * RESPONSABILIDAD: BOOTSTRAP DE ENTORNO E IGNICIÓN SEGURA
 *
 * Contrato de salida: 0 en apagado ordenado (SIGTERM/SIGINT); no-cero
 * ante fallo fatal de ignición (configuración malformada o credenciales
 * de bóveda irrecuperables con STORAGE_MODE=blob).
 * =================================================================
 */

use dotenvy::dotenv;
use synapse_aggregation_server::prelude::*;
use synapse_shared_watchtower::init_tracing;
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. CARGA DE ENTORNO.
    dotenv().ok();

    // 2. OBSERVABILIDAD (WATCHTOWER).
    init_tracing("synapse_aggregation_server");

    // 3. RUNTIME MULTIHILO DE TOKIO.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        info!("🛰️  [AGGREGATOR]: Global ignition sequence starting...");

        // 4. CONFIGURACIÓN ESTRICTA DEL ENTORNO.
        let server_config = match ServerConfig::from_env() {
            Ok(config) => config,
            Err(config_fault) => {
                error!("❌ [IGNITION_ABORT]: Configuration rejected: {:#}", config_fault);
                std::process::exit(2);
            }
        };

        // 5. IGNICIÓN DEL KERNEL (credenciales, bóveda, ledger, semilla).
        let kernel = match AggregationKernel::ignite(server_config).await {
            Ok(kernel) => kernel,
            Err(ignition_fault) => {
                error!("❌ [IGNITION_ABORT]: Kernel collapse: {:#}", ignition_fault);
                std::process::exit(1);
            }
        };

        // 6. OPERACIONES: daemons + transporte HTTP hasta el apagado.
        if let Err(runtime_fault) = kernel.launch_operations().await {
            error!("💀 [KERNEL_COLLAPSE]: Runtime failure: {:#}", runtime_fault);
            std::process::exit(1);
        }
    });

    Ok(())
}
