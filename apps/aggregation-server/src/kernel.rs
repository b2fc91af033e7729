// [apps/aggregation-server/src/kernel.rs]
/*!
 * =================================================================
 * APARATO: AGGREGATION SOVEREIGN KERNEL (V8.1)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * Orden de ignición:
 *   credenciales -> bóveda -> restauración de instantánea -> ledger ->
 *   semilla de versión base -> daemons -> transporte HTTP.
 * Con STORAGE_MODE=blob y credenciales irrecuperables la ignición
 * aborta (salida no-cero); en modo local el sistema opera sin bóveda
 * remota.
 * =================================================================
 */

use crate::config::{ServerConfig, StorageMode};
use crate::registry::ModelRegistry;
use crate::routes::create_gateway_router;
use crate::services;
use crate::state::{AppState, TrainingTrigger};
use anyhow::Context;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use synapse_infra_blobstore::paths::BASE_MODEL_FOLDER;
use synapse_infra_blobstore::{ObjectVault, TokenManager};
use synapse_infra_db::{SqlClient, VersionRepository};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

pub struct AggregationKernel {
    pub server_network_port: u16,
    pub application_state: AppState,
    trigger_receiver: mpsc::Receiver<TrainingTrigger>,
    shutdown_transmitter: watch::Sender<bool>,
}

impl AggregationKernel {
    /// Ignición completa de la infraestructura a partir de la configuración.
    pub async fn ignite(server_config: ServerConfig) -> anyhow::Result<Self> {
        let config = Arc::new(server_config);

        // 1. BÓVEDA Y CREDENCIALES SEGÚN MODO DE ALMACENAMIENTO.
        let (vault, token_manager): (Arc<ObjectVault>, Option<Arc<TokenManager>>) =
            match config.storage_mode {
                StorageMode::Blob => {
                    let token_manager = TokenManager::initialize(config.token_settings())
                        .context(
                            "STORAGE_MODE=blob demands recoverable OAuth2 credentials",
                        )?;
                    let token_manager = Arc::new(token_manager);
                    let remote_vault =
                        ObjectVault::remote(token_manager.clone(), &config.vault_settings())
                            .context("remote vault ignition")?;
                    (Arc::new(remote_vault), Some(token_manager))
                }
                StorageMode::Local => {
                    let vault_root = config.data_dir.join("vault");
                    info!("📁 [KERNEL]: Local vault mode at '{}'.", vault_root.display());
                    (
                        Arc::new(ObjectVault::local(vault_root, &config.vault_settings())),
                        None,
                    )
                }
            };

        // 2. RESTAURACIÓN DE LA INSTANTÁNEA DEL LEDGER (si procede).
        restore_ledger_snapshot(&config, &vault).await;

        // 3. ENLACE AL LEDGER RELACIONAL.
        let database_client = SqlClient::connect(&config.database_path)
            .await
            .context("ledger link ignition")?;

        // 4. SEMILLA DE LA VERSIÓN BASE RESERVADA.
        let artifact_extension = config.artifact_extension();
        let latest_pointer_name = vault.namespace().latest_model_name(&artifact_extension);
        let base_pointer_ref = vault.blob_ref_for(&latest_pointer_name, BASE_MODEL_FOLDER);
        VersionRepository::new(database_client.clone())
            .seed_base_version(&base_pointer_ref)
            .await
            .context("base version seed")?;

        if vault
            .get_model_bytes(&latest_pointer_name, BASE_MODEL_FOLDER)
            .await
            .is_err()
        {
            warn!(
                "⚠️ [KERNEL]: Base model artifact '{}' absent from the vault; \
                 downloads of '1.0.0' will 404 until a model is published.",
                latest_pointer_name
            );
        }

        // 5. CANALES DE DISPARO Y APAGADO.
        let (trigger_transmitter, trigger_receiver) = mpsc::channel::<TrainingTrigger>(1);
        let (shutdown_transmitter, shutdown_receiver) = watch::channel(false);

        let registry = Arc::new(ModelRegistry::new(
            database_client.clone(),
            vault.clone(),
            artifact_extension,
        ));

        let application_state = AppState::new(
            config.clone(),
            database_client,
            vault,
            token_manager,
            registry,
            trigger_transmitter,
            shutdown_receiver,
        );

        Ok(Self {
            server_network_port: config.port,
            application_state,
            trigger_receiver,
            shutdown_transmitter,
        })
    }

    /// Descompone el kernel para bancos de prueba: estado compartido +
    /// receptor de disparos, sin levantar daemons ni transporte.
    pub fn into_laboratory_parts(
        self,
    ) -> (AppState, mpsc::Receiver<TrainingTrigger>) {
        (self.application_state, self.trigger_receiver)
    }

    /// Lanza daemons y el transporte HTTP; retorna tras el apagado ordenado.
    pub async fn launch_operations(self) -> anyhow::Result<()> {
        let shared_state = self.application_state.clone();

        // --- DAEMONS DE FONDO ---
        services::spawn_orchestrator_worker(shared_state.clone(), self.trigger_receiver);
        services::spawn_scheduler(shared_state.clone());
        services::spawn_snapshot_relay(shared_state.clone());

        // --- TRANSPORTE HTTP (AXUM) ---
        let gateway_router = create_gateway_router(shared_state);

        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("static bind address"),
            self.server_network_port,
        );

        let tcp_listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .context("network port bind")?;

        info!("🚀 [KERNEL_ONLINE]: Aggregation gateway listening at {}", bind_address);

        let shutdown_transmitter = self.shutdown_transmitter;
        axum::serve(tcp_listener, gateway_router)
            .with_graceful_shutdown(async move {
                wait_for_termination_signal().await;
                info!("🛑 [KERNEL]: Termination signal observed; draining...");
                let _ = shutdown_transmitter.send(true);
            })
            .await
            .context("http transport runtime")?;

        info!("👋 [KERNEL]: Orderly shutdown complete.");
        Ok(())
    }
}

/// Hidrata el archivo del ledger desde la instantánea de la bóveda cuando
/// el proceso arranca sin estado local.
async fn restore_ledger_snapshot(config: &ServerConfig, vault: &ObjectVault) {
    let ledger_path = &config.database_path;
    if ledger_path.contains(":memory:") || ledger_path.contains("mode=memory") {
        return;
    }

    if let Some(parent_directory) = std::path::Path::new(ledger_path).parent() {
        if let Err(directory_fault) = tokio::fs::create_dir_all(parent_directory).await {
            error!("❌ [KERNEL]: Data directory unreachable: {}", directory_fault);
            return;
        }
    }

    if tokio::fs::metadata(ledger_path).await.is_ok() {
        return;
    }

    match vault.fetch_db_snapshot().await {
        Ok(snapshot_bytes) => {
            match tokio::fs::write(ledger_path, snapshot_bytes).await {
                Ok(()) => info!("📥 [KERNEL]: Ledger hydrated from vault snapshot."),
                Err(write_fault) => {
                    error!("❌ [KERNEL]: Snapshot restore write failed: {}", write_fault)
                }
            }
        }
        Err(snapshot_fault) if snapshot_fault.is_not_found() => {
            info!("🌱 [KERNEL]: No vault snapshot; starting with a fresh ledger.");
        }
        Err(snapshot_fault) => {
            warn!("⚠️ [KERNEL]: Snapshot hydration degraded: {}", snapshot_fault);
        }
    }
}

/// Espera SIGTERM/SIGINT para el apagado ordenado (salida 0).
async fn wait_for_termination_signal() {
    let interrupt_signal = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate_signal =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("SIGTERM handler installation");
        tokio::select! {
            _ = interrupt_signal => {},
            _ = terminate_signal.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = interrupt_signal.await;
    }
}
