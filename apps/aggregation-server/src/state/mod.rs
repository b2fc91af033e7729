// [apps/aggregation-server/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN STATE HUB (V6.1)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: ORQUESTACIÓN DE REPOSITORIOS, BÓVEDA Y SEÑALES
 *
 * VISION:
 * 1. COMPOSITION ROOT: Todas las dependencias se inyectan aquí una vez
 *    en el arranque; handlers y daemons reciben clones del hub, nunca
 *    singletons globales.
 * 2. SINGLE CYCLE INVARIANT: 'cycle_in_progress' + canal de disparo de
 *    capacidad 1 garantizan a lo sumo un ciclo de entrenamiento activo
 *    y a lo sumo uno encolado.
 * =================================================================
 */

use crate::config::ServerConfig;
use crate::registry::ModelRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use synapse_infra_blobstore::{ObjectVault, TokenManager};
use synapse_infra_db::repositories::{
    InteractionRepository, StatsRepository, UploadRepository, VersionRepository,
};
use synapse_infra_db::SqlClient;
use tokio::sync::{mpsc, watch};

/// Señal de disparo de un ciclo de reentrenamiento.
#[derive(Debug, Clone)]
pub struct TrainingTrigger {
    /// Origen del disparo para el rastro operativo.
    pub origin: String,
    /// Predicado de la política que encendió el disparo.
    pub reason: String,
}

/// Contenedor de estado compartido (Thread-Safe) del agregador.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Cliente del ledger relacional (compuerta de escritor único incluida).
    pub database_client: SqlClient,
    /// Bóveda de objetos (remota o local según STORAGE_MODE).
    pub vault: Arc<ObjectVault>,
    /// Gestor de credenciales OAuth2; ausente en modo local.
    pub token_manager: Option<Arc<TokenManager>>,
    /// Registro de versiones con caché del modelo base.
    pub registry: Arc<ModelRegistry>,
    /// Canal de disparo de entrenamiento (capacidad 1, coalescente).
    pub training_trigger: mpsc::Sender<TrainingTrigger>,
    /// Bandera de ciclo-en-progreso (a lo sumo un ciclo activo).
    pub cycle_in_progress: Arc<AtomicBool>,
    /// Latido del scheduler para el endpoint de salud.
    pub scheduler_alive: Arc<AtomicBool>,
    /// Señal de apagado ordenado observada por daemons y el pipeline.
    pub shutdown_signal: watch::Receiver<bool>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<ServerConfig>,
        database_client: SqlClient,
        vault: Arc<ObjectVault>,
        token_manager: Option<Arc<TokenManager>>,
        registry: Arc<ModelRegistry>,
        training_trigger: mpsc::Sender<TrainingTrigger>,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            database_client,
            vault,
            token_manager,
            registry,
            training_trigger,
            cycle_in_progress: Arc::new(AtomicBool::new(false)),
            scheduler_alive: Arc::new(AtomicBool::new(false)),
            shutdown_signal,
        }
    }

    // --- REPOSITORIOS (hidratación bajo demanda, estilo adaptador) ---

    pub fn interactions(&self) -> InteractionRepository {
        InteractionRepository::new(self.database_client.clone())
    }

    pub fn uploads(&self) -> UploadRepository {
        UploadRepository::new(self.database_client.clone())
    }

    pub fn versions(&self) -> VersionRepository {
        VersionRepository::new(self.database_client.clone())
    }

    pub fn stats(&self) -> StatsRepository {
        StatsRepository::new(self.database_client.clone())
    }

    /// Apagado ordenado solicitado: los pasos pre-publicación del ciclo
    /// y los daemons lo consultan entre suspensiones.
    pub fn shutdown_requested(&self) -> bool {
        *self.shutdown_signal.borrow()
    }

    /// Ruta relativa de descarga para una versión publicada.
    pub fn download_url_for(&self, version: &str) -> String {
        format!("/api/ai/models/{}", version)
    }
}
