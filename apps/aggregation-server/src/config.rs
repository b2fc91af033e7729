// [apps/aggregation-server/src/config.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN CONFIGURATION MATRIX (V5.2)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: CAPTURA Y VALIDACIÓN ESTRICTA DEL ENTORNO
 *
 * VISION:
 * 1. ENUMERATED SURFACE: Toda opción reconocida vive en este struct con
 *    su default validado; un valor malformado colapsa el arranque.
 * 2. NAMESPACE GUARD: Variables 'SYNAPSE_*' no reconocidas se rechazan
 *    en la carga para detectar typos de despliegue.
 * =================================================================
 */

use anyhow::{bail, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use synapse_core_trainer::{classifier::TrainingSettings, forest::ForestHyperparameters};
use synapse_infra_blobstore::{TokenSettings, VaultSettings};

/// Backend de la bóveda de objetos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Blob,
    Local,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    /// Ruta del archivo del ledger (o URL ':memory:' en tests).
    pub database_path: String,

    // --- Política de entrenamiento ---
    pub min_training_data: usize,
    pub max_models_to_keep: u32,
    pub retrain_pending_models: u64,
    pub retrain_hours_since: i64,
    pub retrain_new_interactions: u64,
    pub max_features: usize,
    pub ngram_max: usize,
    pub base_model_weight: f32,
    pub user_model_weight: f32,
    pub model_version_prefix: String,

    // --- Sincronía y límites ---
    pub db_sync_interval_secs: u64,
    pub models_sync_interval_secs: u64,
    pub max_upload_size_mb: u64,

    // --- Bóveda de objetos ---
    pub storage_mode: StorageMode,
    pub base_model_name: String,
    pub models_folder: String,
    pub db_snapshot_filename: String,
    pub tokens_file: PathBuf,
    pub dropbox_app_key: String,
    pub dropbox_app_secret: String,
    pub dropbox_refresh_token: Option<String>,
    pub dropbox_access_token: Option<String>,
    pub dropbox_auto_refresh: bool,
    pub dropbox_max_retries: u32,
    pub dropbox_retry_delay_ms: u64,
}

impl ServerConfig {
    /// Captura del entorno con validación estricta.
    pub fn from_env() -> Result<Self> {
        reject_unknown_namespace_keys()?;

        let data_dir: PathBuf = parse_env("DATA_DIR", PathBuf::from("./data"))?;
        let database_path = data_dir.join("interactions.db").to_string_lossy().to_string();

        let storage_mode = match std::env::var("STORAGE_MODE")
            .unwrap_or_else(|_| "blob".to_string())
            .to_lowercase()
            .as_str()
        {
            "blob" => StorageMode::Blob,
            "local" => StorageMode::Local,
            unknown => bail!("STORAGE_MODE '{}' not recognized (blob|local)", unknown),
        };

        let base_model_name: String =
            parse_env("BASE_MODEL_NAME", "model_1.0.0.mlmodel".to_string())?;
        if !base_model_name.contains('.') {
            bail!("BASE_MODEL_NAME '{}' carries no artifact extension", base_model_name);
        }

        let config = Self {
            port: parse_env("PORT", 10000u16)?,
            data_dir,
            database_path,
            min_training_data: parse_env("MIN_TRAINING_DATA", 50usize)?,
            max_models_to_keep: parse_env("MAX_MODELS_TO_KEEP", 5u32)?,
            retrain_pending_models: parse_env("RETRAIN_PENDING_MODELS", 3u64)?,
            retrain_hours_since: parse_env("RETRAIN_HOURS_SINCE", 12i64)?,
            retrain_new_interactions: parse_env("RETRAIN_NEW_INTERACTIONS", 100u64)?,
            max_features: parse_env("MAX_FEATURES", 5000usize)?,
            ngram_max: parse_env("NGRAM_MAX", 2usize)?,
            base_model_weight: parse_env("BASE_MODEL_WEIGHT", 2.0f32)?,
            user_model_weight: parse_env("USER_MODEL_WEIGHT", 1.0f32)?,
            model_version_prefix: parse_env("MODEL_VERSION_PREFIX", "1.0.".to_string())?,
            db_sync_interval_secs: parse_env("DB_SYNC_INTERVAL", 60u64)?,
            models_sync_interval_secs: parse_env("MODELS_SYNC_INTERVAL", 300u64)?,
            max_upload_size_mb: parse_env("MAX_UPLOAD_SIZE_MB", 600u64)?,
            storage_mode,
            base_model_name,
            models_folder: parse_env("DROPBOX_MODELS_FOLDER", "synapse_models".to_string())?,
            db_snapshot_filename: parse_env(
                "DROPBOX_DB_FILENAME",
                "synapse_ledger.db".to_string(),
            )?,
            tokens_file: parse_env("TOKENS_FILE", PathBuf::from("tokens.json"))?,
            dropbox_app_key: std::env::var("DROPBOX_APP_KEY").unwrap_or_default(),
            dropbox_app_secret: std::env::var("DROPBOX_APP_SECRET").unwrap_or_default(),
            dropbox_refresh_token: std::env::var("DROPBOX_REFRESH_TOKEN").ok(),
            dropbox_access_token: std::env::var("DROPBOX_ACCESS_TOKEN").ok(),
            dropbox_auto_refresh: parse_env("DROPBOX_AUTO_REFRESH", true)?,
            dropbox_max_retries: parse_env("DROPBOX_MAX_RETRIES", 3u32)?,
            dropbox_retry_delay_ms: parse_env("DROPBOX_RETRY_DELAY", 500u64)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_training_data == 0 {
            bail!("MIN_TRAINING_DATA must be positive");
        }
        if self.ngram_max == 0 || self.ngram_max > 3 {
            bail!("NGRAM_MAX {} outside the supported 1..=3 band", self.ngram_max);
        }
        if self.base_model_weight <= 0.0 || self.user_model_weight <= 0.0 {
            bail!("ensemble weights must be positive");
        }
        if self.max_upload_size_mb == 0 {
            bail!("MAX_UPLOAD_SIZE_MB must be positive");
        }
        Ok(())
    }

    /// Extensión del artefacto, derivada del nombre del modelo base.
    pub fn artifact_extension(&self) -> String {
        self.base_model_name
            .rsplit('.')
            .next()
            .unwrap_or("mlmodel")
            .to_string()
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_size_mb as usize) * 1024 * 1024
    }

    pub fn training_settings(&self) -> TrainingSettings {
        TrainingSettings {
            min_training_data: self.min_training_data,
            max_features: self.max_features,
            ngram_max: self.ngram_max,
            test_fraction: 0.2,
            forest: ForestHyperparameters::default(),
        }
    }

    pub fn vault_settings(&self) -> VaultSettings {
        VaultSettings {
            models_root: self.models_folder.clone(),
            db_snapshot_filename: self.db_snapshot_filename.clone(),
            snapshot_push_interval: Duration::from_secs(self.db_sync_interval_secs),
            max_transient_retries: self.dropbox_max_retries.max(1),
            retry_base_delay: Duration::from_millis(self.dropbox_retry_delay_ms),
        }
    }

    pub fn token_settings(&self) -> TokenSettings {
        let mut settings = TokenSettings::new(
            self.dropbox_app_key.clone(),
            self.dropbox_app_secret.clone(),
            self.tokens_file.clone(),
        );
        settings.refresh_token = self.dropbox_refresh_token.clone();
        settings.access_token = self.dropbox_access_token.clone();
        settings.auto_refresh = self.dropbox_auto_refresh;
        settings
    }

    /// Configuración de laboratorio: bóveda local + ledger en memoria.
    /// Es la base de los tests de integración del workspace.
    pub fn for_local_testing(scratch_dir: &std::path::Path) -> Self {
        Self {
            port: 0,
            data_dir: scratch_dir.to_path_buf(),
            database_path: format!(
                "file:{}?mode=memory&cache=shared",
                uuid::Uuid::new_v4().simple()
            ),
            min_training_data: 50,
            max_models_to_keep: 5,
            retrain_pending_models: 3,
            retrain_hours_since: 12,
            retrain_new_interactions: 100,
            max_features: 5000,
            ngram_max: 2,
            base_model_weight: 2.0,
            user_model_weight: 1.0,
            model_version_prefix: "1.0.".to_string(),
            db_sync_interval_secs: 60,
            models_sync_interval_secs: 300,
            max_upload_size_mb: 8,
            storage_mode: StorageMode::Local,
            base_model_name: "model_1.0.0.mlmodel".to_string(),
            models_folder: "synapse_models".to_string(),
            db_snapshot_filename: "synapse_ledger.db".to_string(),
            tokens_file: scratch_dir.join("tokens.json"),
            dropbox_app_key: String::new(),
            dropbox_app_secret: String::new(),
            dropbox_refresh_token: None,
            dropbox_access_token: None,
            dropbox_auto_refresh: true,
            dropbox_max_retries: 3,
            dropbox_retry_delay_ms: 100,
        }
    }
}

/// Claves reconocidas del espacio de nombres 'SYNAPSE_'.
const RECOGNIZED_NAMESPACE_KEYS: &[&str] = &["SYNAPSE_LOG_FORMAT"];

fn reject_unknown_namespace_keys() -> Result<()> {
    let recognized: HashSet<&str> = RECOGNIZED_NAMESPACE_KEYS.iter().copied().collect();
    for (environment_key, _) in std::env::vars() {
        if environment_key.starts_with("SYNAPSE_")
            && !recognized.contains(environment_key.as_str())
        {
            bail!(
                "environment key '{}' is not recognized; refusing to start with a typo'd configuration",
                environment_key
            );
        }
    }
    Ok(())
}

fn parse_env<T>(environment_key: &str, default_value: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(environment_key) {
        Ok(raw_value) => raw_value.parse::<T>().map_err(|parse_fault| {
            anyhow::anyhow!("{}='{}' malformed: {}", environment_key, raw_value, parse_fault)
        }),
        Err(_) => Ok(default_value),
    }
}
