// [libs/infra/blobstore/src/paths.rs]
/*!
 * =================================================================
 * APARATO: VAULT NAMESPACE MATRIX (V3.1)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: TOPOLOGÍA CANÓNICA DE CARPETAS DE LA BÓVEDA
 *
 * Topología:
 *   <root>/                          raíz de modelos
 *   <root>/trained/model_<v>.<ext>   versiones publicadas
 *   <root>/uploaded/model_<dev>_<ts>.<ext>  subidas de clientes
 *   base_model/model_latest.<ext>    puntero base vigente
 *   base_model/model_<v>.<ext>       instantáneas versionadas
 *   base_model/ *.json                actas de entrenamiento
 *   model_info/model_<v>_update.{json,md}   reportes por versión
 *   model_validation/                diagnósticos
 *   user_data/<deviceId>/interactions_<ts>.json  espejo de ingesta
 *   <dbSnapshot>.db                  instantánea del ledger en la raíz
 * =================================================================
 */

/// Carpeta del puntero base; vive FUERA de la raíz de modelos.
pub const BASE_MODEL_FOLDER: &str = "base_model";
/// Carpeta de reportes por versión.
pub const MODEL_INFO_FOLDER: &str = "model_info";
/// Carpeta de diagnósticos de validación.
pub const MODEL_VALIDATION_FOLDER: &str = "model_validation";
/// Carpeta raíz del espejo de ingesta por dispositivo.
pub const USER_DATA_FOLDER: &str = "user_data";

/// Resolución de rutas virtuales dentro de la bóveda de objetos.
#[derive(Debug, Clone)]
pub struct BlobNamespace {
    /// Raíz de modelos (p.ej. "synapse_models").
    pub models_root: String,
}

impl BlobNamespace {
    pub fn new(models_root: impl Into<String>) -> Self {
        Self { models_root: models_root.into() }
    }

    pub fn trained_folder(&self) -> String {
        format!("{}/trained", self.models_root)
    }

    pub fn uploaded_folder(&self) -> String {
        format!("{}/uploaded", self.models_root)
    }

    pub fn user_data_folder(&self, device_id: &str) -> String {
        format!("{}/{}", USER_DATA_FOLDER, device_id)
    }

    /// Ruta absoluta de bóveda para un objeto dentro de una carpeta virtual.
    /// Con carpeta vacía el objeto vive en la raíz absoluta de la bóveda.
    pub fn object_path(&self, folder: &str, name: &str) -> String {
        if folder.is_empty() {
            format!("/{}", name)
        } else {
            format!("/{}/{}", folder.trim_matches('/'), name)
        }
    }

    /// Nombre canónico del artefacto de una versión publicada.
    pub fn versioned_model_name(&self, version: &str, extension: &str) -> String {
        format!("model_{}.{}", version, extension)
    }

    /// Nombre canónico del puntero base vigente.
    pub fn latest_model_name(&self, extension: &str) -> String {
        format!("model_latest.{}", extension)
    }

    /// Nombre canónico de una subida de cliente.
    pub fn uploaded_model_name(
        &self,
        device_id: &str,
        epoch_seconds: i64,
        extension: &str,
    ) -> String {
        format!("model_{}_{}.{}", device_id, epoch_seconds, extension)
    }
}
