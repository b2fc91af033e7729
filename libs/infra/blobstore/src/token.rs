// [libs/infra/blobstore/src/token.rs]
/*!
 * =================================================================
 * APARATO: OAUTH2 TOKEN MANAGER (V6.3)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DE CREDENCIALES CON REFRESH AUTOMÁTICO
 *
 * VISION:
 * 1. LAZY REFRESH: 'NeedsRefresh' se detecta perezosamente en cada
 *    lectura del token; el refresh respeta un cooldown mínimo entre
 *    intentos para no castigar el endpoint ante fallos en cascada.
 * 2. FILE AUTHORITY: El archivo de tokens es la fuente de verdad entre
 *    reinicios; la configuración solo siembra valores. Escritura
 *    atómica via temp + rename. Archivos corruptos se ponen en
 *    cuarentena y se re-siembra desde configuración.
 * 3. COPY-OUT GETTERS: El lector recibe una copia del token, jamás una
 *    referencia al estado mutable.
 * =================================================================
 */

use crate::errors::BlobError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Endpoint OAuth2 del proveedor de la bóveda.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://api.dropboxapi.com/oauth2/token";
/// Margen de anticipación del refresh antes de la expiración real.
pub const DEFAULT_REFRESH_THRESHOLD_SECONDS: i64 = 300;
/// Tiempo mínimo entre intentos de refresh.
pub const DEFAULT_REFRESH_COOLDOWN_SECONDS: u64 = 60;
/// Timeout propio del RPC de refresh, independiente del contexto llamador.
const REFRESH_RPC_TIMEOUT_SECONDS: u64 = 10;

/// Configuración reconocida del gestor de tokens.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub app_key: String,
    pub app_secret: String,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub expiry_time: Option<String>,
    pub auto_refresh: bool,
    pub refresh_threshold_seconds: i64,
    pub refresh_cooldown_seconds: u64,
    pub tokens_file: PathBuf,
    pub token_endpoint: String,
}

impl TokenSettings {
    pub fn new(app_key: String, app_secret: String, tokens_file: PathBuf) -> Self {
        Self {
            app_key,
            app_secret,
            refresh_token: None,
            access_token: None,
            expiry_time: None,
            auto_refresh: true,
            refresh_threshold_seconds: DEFAULT_REFRESH_THRESHOLD_SECONDS,
            refresh_cooldown_seconds: DEFAULT_REFRESH_COOLDOWN_SECONDS,
            tokens_file,
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
        }
    }
}

/// Forma persistida del archivo de tokens (`tokens.json`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct TokenFileShape {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Expiración en ISO-8601.
    #[serde(default)]
    expiry_time: Option<String>,
}

/// Fase observable de la máquina de estados de credenciales.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPhase {
    Uninitialized,
    HaveRefreshOnly,
    Valid,
    NeedsRefresh,
    Failed,
}

#[derive(Debug)]
struct TokenVaultState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expiry_time: Option<DateTime<Utc>>,
    last_refresh_attempt: Option<Instant>,
    last_refresh_failed: bool,
}

/// Singleton de proceso para la gestión de credenciales OAuth2.
pub struct TokenManager {
    settings: TokenSettings,
    vault_state: Mutex<TokenVaultState>,
    refresh_rpc_client: reqwest::Client,
}

impl TokenManager {
    /// Inicializa el gestor: carga el archivo de tokens (cuarentena si está
    /// corrupto) y siembra desde configuración lo que falte.
    ///
    /// # Errors:
    /// `Unconfigured` si no existe refresh token ni en archivo ni en config.
    #[instrument(skip(settings), fields(tokens_file = %settings.tokens_file.display()))]
    pub fn initialize(settings: TokenSettings) -> Result<Self, BlobError> {
        let persisted_shape = load_token_file(&settings.tokens_file);

        let refresh_token = persisted_shape
            .as_ref()
            .and_then(|shape| shape.refresh_token.clone())
            .or_else(|| settings.refresh_token.clone());

        let Some(refresh_token) = refresh_token else {
            return Err(BlobError::Unconfigured(
                "refresh token absent from token file and configuration".into(),
            ));
        };

        let access_token = persisted_shape
            .as_ref()
            .and_then(|shape| shape.access_token.clone())
            .or_else(|| settings.access_token.clone());

        let expiry_time = persisted_shape
            .as_ref()
            .and_then(|shape| shape.expiry_time.clone())
            .or_else(|| settings.expiry_time.clone())
            .and_then(|raw_stamp| parse_expiry(&raw_stamp));

        let refresh_rpc_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REFRESH_RPC_TIMEOUT_SECONDS))
            .user_agent("Synapse-Token-Manager/V6")
            .build()
            .map_err(|e| BlobError::Fatal(format!("TOKEN_CLIENT_IGNITION: {}", e)))?;

        info!(
            "🔐 [TOKEN_MANAGER]: Credential vault levelized (access token: {}).",
            if access_token.is_some() { "present" } else { "absent" }
        );

        Ok(Self {
            settings,
            vault_state: Mutex::new(TokenVaultState {
                access_token,
                refresh_token: Some(refresh_token),
                expiry_time,
                last_refresh_attempt: None,
                last_refresh_failed: false,
            }),
            refresh_rpc_client,
        })
    }

    /// Fase observable de la máquina de estados (salud y tests).
    pub async fn phase(&self) -> TokenPhase {
        let state = self.vault_state.lock().await;
        match (&state.access_token, &state.refresh_token) {
            (None, None) => TokenPhase::Uninitialized,
            (None, Some(_)) if state.last_refresh_failed => TokenPhase::Failed,
            (None, Some(_)) => TokenPhase::HaveRefreshOnly,
            (Some(_), _) => {
                if self.needs_refresh(&state) {
                    if state.last_refresh_failed {
                        TokenPhase::Failed
                    } else {
                        TokenPhase::NeedsRefresh
                    }
                } else {
                    TokenPhase::Valid
                }
            }
        }
    }

    /// Devuelve una copia de un token de acceso vigente, refrescando si es
    /// necesario. Devuelve `None` si no hay token vigente y el refresh no
    /// procede (cooldown activo o endpoint rechazando).
    #[instrument(skip(self))]
    pub async fn get_valid_access_token(&self) -> Result<Option<String>, BlobError> {
        let mut state = self.vault_state.lock().await;

        if self.settings.auto_refresh && self.needs_refresh(&state) {
            self.attempt_refresh(&mut state).await;
        }

        let now = Utc::now();
        let vigent_token = match (&state.access_token, state.expiry_time) {
            (Some(access_token), Some(expiry)) if expiry > now => Some(access_token.clone()),
            // Sin información de expiración tras un refresh exitoso reciente.
            (Some(access_token), None) => Some(access_token.clone()),
            _ => None,
        };

        Ok(vigent_token)
    }

    /// Refresh forzado tras un 401 de la bóveda. Respeta el cooldown.
    ///
    /// # Errors:
    /// `Refresh` si el intento procedió y el endpoint lo rechazó.
    #[instrument(skip(self))]
    pub async fn force_refresh(&self) -> Result<(), BlobError> {
        let mut state = self.vault_state.lock().await;

        if self.cooldown_active(&state) {
            warn!("🧊 [TOKEN_MANAGER]: Refresh suppressed, cooldown window active.");
            return Ok(());
        }

        self.execute_refresh(&mut state).await
    }

    fn needs_refresh(&self, state: &TokenVaultState) -> bool {
        if state.access_token.is_none() && state.refresh_token.is_some() {
            return true;
        }

        match state.expiry_time {
            Some(expiry) => {
                let threshold =
                    ChronoDuration::seconds(self.settings.refresh_threshold_seconds);
                expiry - Utc::now() <= threshold
            }
            // Token sin expiración conocida: refrescamos para re-anclarla.
            None => state.access_token.is_some() && state.refresh_token.is_some(),
        }
    }

    fn cooldown_active(&self, state: &TokenVaultState) -> bool {
        state
            .last_refresh_attempt
            .map(|last_attempt| {
                last_attempt.elapsed()
                    < Duration::from_secs(self.settings.refresh_cooldown_seconds)
            })
            .unwrap_or(false)
    }

    /// Intento best-effort dentro del getter: el fallo deja el token como
    /// está y el cooldown absorbe la tormenta.
    async fn attempt_refresh(&self, state: &mut TokenVaultState) {
        if self.cooldown_active(state) {
            return;
        }
        if let Err(refresh_fault) = self.execute_refresh(state).await {
            warn!("⚠️ [TOKEN_MANAGER]: Background refresh rejected: {}", refresh_fault);
        }
    }

    async fn execute_refresh(&self, state: &mut TokenVaultState) -> Result<(), BlobError> {
        let Some(refresh_token) = state.refresh_token.clone() else {
            return Err(BlobError::Unconfigured("refresh token vanished".into()));
        };

        // El cooldown corre desde el intento, no desde el éxito.
        state.last_refresh_attempt = Some(Instant::now());

        info!("🔄 [TOKEN_MANAGER]: Negotiating fresh access token...");

        let form_payload = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", self.settings.app_key.as_str()),
            ("client_secret", self.settings.app_secret.as_str()),
        ];

        let endpoint_response = self
            .refresh_rpc_client
            .post(&self.settings.token_endpoint)
            .form(&form_payload)
            .send()
            .await
            .map_err(|network_fault| {
                state.last_refresh_failed = true;
                BlobError::Refresh(format!("TOKEN_ENDPOINT_UNREACHABLE: {}", network_fault))
            })?;

        if !endpoint_response.status().is_success() {
            state.last_refresh_failed = true;
            let status_code = endpoint_response.status();
            let rejection_body = endpoint_response.text().await.unwrap_or_default();
            return Err(BlobError::Refresh(format!(
                "HTTP_{}: {}",
                status_code, rejection_body
            )));
        }

        #[derive(Deserialize)]
        struct RefreshGrant {
            access_token: String,
            #[serde(default)]
            expires_in: Option<i64>,
        }

        let grant: RefreshGrant = endpoint_response.json().await.map_err(|decode_fault| {
            state.last_refresh_failed = true;
            BlobError::Refresh(format!("GRANT_DECODE_FAULT: {}", decode_fault))
        })?;

        state.access_token = Some(grant.access_token);
        state.expiry_time = grant
            .expires_in
            .map(|expires_in| Utc::now() + ChronoDuration::seconds(expires_in));
        state.last_refresh_failed = false;

        self.persist(state)?;

        info!("✅ [TOKEN_MANAGER]: Access token renewed and persisted.");
        Ok(())
    }

    /// Escritura atómica del archivo de tokens (temp + rename).
    fn persist(&self, state: &TokenVaultState) -> Result<(), BlobError> {
        let file_shape = TokenFileShape {
            access_token: state.access_token.clone(),
            refresh_token: state.refresh_token.clone(),
            expiry_time: state.expiry_time.map(|expiry| expiry.to_rfc3339()),
        };

        let serialized_tokens = serde_json::to_vec_pretty(&file_shape)
            .map_err(|e| BlobError::Fatal(format!("TOKEN_SERIALIZE_FAULT: {}", e)))?;

        let temp_path = self.settings.tokens_file.with_extension("json.tmp");
        std::fs::write(&temp_path, &serialized_tokens)
            .map_err(|e| BlobError::Fatal(format!("TOKEN_WRITE_FAULT: {}", e)))?;
        std::fs::rename(&temp_path, &self.settings.tokens_file)
            .map_err(|e| BlobError::Fatal(format!("TOKEN_RENAME_FAULT: {}", e)))?;

        Ok(())
    }
}

/// Carga el archivo de tokens; un archivo corrupto se pone en cuarentena
/// (renombrado `.corrupt`) y se devuelve `None` para re-sembrar.
fn load_token_file(tokens_file: &Path) -> Option<TokenFileShape> {
    let raw_content = std::fs::read(tokens_file).ok()?;

    match serde_json::from_slice::<TokenFileShape>(&raw_content) {
        Ok(shape) => Some(shape),
        Err(corruption_fault) => {
            let quarantine_path = tokens_file.with_extension("json.corrupt");
            warn!(
                "🧟 [TOKEN_MANAGER]: Token file corrupt ({}). Quarantined at {}.",
                corruption_fault,
                quarantine_path.display()
            );
            let _ = std::fs::rename(tokens_file, quarantine_path);
            None
        }
    }
}

fn parse_expiry(raw_stamp: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw_stamp)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_in(dir: &tempfile::TempDir) -> TokenSettings {
        let mut settings = TokenSettings::new(
            "app-key".into(),
            "app-secret".into(),
            dir.path().join("tokens.json"),
        );
        settings.refresh_token = Some("seed-refresh".into());
        // Puerto cerrado local: el intento de refresh colapsa rápido sin red.
        settings.token_endpoint = "http://127.0.0.1:9/oauth2/token".into();
        settings
    }

    #[tokio::test]
    async fn vigent_token_returned_without_refresh() {
        let scratch = tempfile::tempdir().expect("scratch");
        let mut settings = settings_in(&scratch);
        settings.access_token = Some("vigente".into());
        settings.expiry_time = Some((Utc::now() + ChronoDuration::hours(2)).to_rfc3339());

        let manager = TokenManager::initialize(settings).expect("init");
        assert_eq!(manager.phase().await, TokenPhase::Valid);

        let token = manager.get_valid_access_token().await.expect("get");
        assert_eq!(token.as_deref(), Some("vigente"));
    }

    #[tokio::test]
    async fn expired_token_never_served_and_cooldown_suppresses_second_attempt() {
        let scratch = tempfile::tempdir().expect("scratch");
        let mut settings = settings_in(&scratch);
        settings.access_token = Some("caducado".into());
        settings.expiry_time = Some((Utc::now() - ChronoDuration::hours(1)).to_rfc3339());

        let manager = TokenManager::initialize(settings).expect("init");

        // Primer acceso: intenta refresh (endpoint muerto), jamás sirve el caducado.
        let first_read = manager.get_valid_access_token().await.expect("get");
        assert_eq!(first_read, None);
        assert_eq!(manager.phase().await, TokenPhase::Failed);

        // Segundo acceso dentro del cooldown: no procede otro intento.
        let second_read = manager.get_valid_access_token().await.expect("get");
        assert_eq!(second_read, None);

        // El refresh forzado dentro del cooldown tampoco castiga el endpoint.
        manager.force_refresh().await.expect("cooldown swallow");
    }

    #[tokio::test]
    async fn token_file_is_authority_over_configuration() {
        let scratch = tempfile::tempdir().expect("scratch");
        let tokens_file = scratch.path().join("tokens.json");
        std::fs::write(
            &tokens_file,
            serde_json::json!({
                "access_token": "del-archivo",
                "refresh_token": "refresh-del-archivo",
                "expiry_time": (Utc::now() + ChronoDuration::hours(3)).to_rfc3339()
            })
            .to_string(),
        )
        .expect("seed file");

        let mut settings = settings_in(&scratch);
        settings.access_token = Some("de-config".into());

        let manager = TokenManager::initialize(settings).expect("init");
        let token = manager.get_valid_access_token().await.expect("get");
        assert_eq!(token.as_deref(), Some("del-archivo"));
    }

    #[tokio::test]
    async fn corrupt_token_file_is_quarantined_and_reseeded() {
        let scratch = tempfile::tempdir().expect("scratch");
        let tokens_file = scratch.path().join("tokens.json");
        std::fs::write(&tokens_file, b"{{{ basura").expect("seed corrupt");

        let settings = settings_in(&scratch);
        let manager = TokenManager::initialize(settings).expect("init despite corruption");

        assert!(scratch.path().join("tokens.json.corrupt").exists());
        assert_eq!(manager.phase().await, TokenPhase::HaveRefreshOnly);
    }

    #[test]
    fn missing_refresh_token_is_unconfigured() {
        let scratch = tempfile::tempdir().expect("scratch");
        let mut settings = settings_in(&scratch);
        settings.refresh_token = None;

        match TokenManager::initialize(settings) {
            Err(BlobError::Unconfigured(_)) => {}
            other => panic!("expected Unconfigured, got {:?}", other.map(|_| ())),
        }
    }
}
