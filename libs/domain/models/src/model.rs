// [libs/domain/models/src/model.rs]
/*!
 * =================================================================
 * APARATO: MODEL LIFECYCLE DOMAIN MODELS (V5.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE VERSIONADO, SUBIDAS Y ENSAMBLES
 *
 * VISION:
 * 1. FORWARD-ONLY LIFECYCLE: El estado de incorporación de una subida
 *    solo avanza (pending -> processing -> incorporated|failed); el
 *    retroceso a 'pending' existe únicamente como rollback de un ciclo
 *    colapsado antes de publicar.
 * 2. APPEND-ONLY LEDGER: Las versiones de modelo jamás se mutan; la
 *    retención las elimina blob-primero, fila-después.
 * =================================================================
 */

use crate::blob_ref::BlobRef;
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Estados del ciclo de vida de un modelo subido por un dispositivo.
#[typeshare]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncorporationStatus {
    Pending,
    Processing,
    Incorporated,
    Failed,
}

impl IncorporationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncorporationStatus::Pending => "pending",
            IncorporationStatus::Processing => "processing",
            IncorporationStatus::Incorporated => "incorporated",
            IncorporationStatus::Failed => "failed",
        }
    }

    pub fn parse(raw_status: &str) -> Option<Self> {
        match raw_status {
            "pending" => Some(IncorporationStatus::Pending),
            "processing" => Some(IncorporationStatus::Processing),
            "incorporated" => Some(IncorporationStatus::Incorporated),
            "failed" => Some(IncorporationStatus::Failed),
            _ => None,
        }
    }

    /// Transiciones legales de la máquina de estados.
    /// `Processing -> Pending` es el rollback de un ciclo fallido pre-publicación.
    pub fn can_transition_to(&self, next_status: IncorporationStatus) -> bool {
        matches!(
            (self, next_status),
            (IncorporationStatus::Pending, IncorporationStatus::Processing)
                | (IncorporationStatus::Processing, IncorporationStatus::Incorporated)
                | (IncorporationStatus::Processing, IncorporationStatus::Failed)
                | (IncorporationStatus::Processing, IncorporationStatus::Pending)
        )
    }
}

/// Artefacto de clasificador entrenado localmente y subido por un cliente.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedModel {
    pub id: String,
    pub device_id: String,
    pub app_version: String,
    pub description: String,
    /// Handle del payload binario en la bóveda de objetos.
    pub blob_ref: BlobRef,
    #[typeshare(serialized_as = "number")]
    pub file_size: u64,
    pub original_filename: String,
    /// Huella SHA-256 del contenido, registrada en la subida.
    pub sha256: String,
    pub upload_date: String,
    pub status: IncorporationStatus,
    /// Presente si y solo si status == incorporated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incorporated_in_version: Option<String>,
}

/// Fila del ledger de versiones publicadas. Append-only.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersionRecord {
    /// Formato `1.0.<unix-seconds>`; el orden lexicográfico dentro del
    /// prefijo aproxima el orden de creación.
    pub version: String,
    pub blob_ref: BlobRef,
    pub accuracy: f64,
    #[typeshare(serialized_as = "number")]
    pub training_data_size: u64,
    pub training_date: String,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Marcador de exportación degradada: la serialización del artefacto
    /// falló y se publicaron los bytes del base anterior en su lugar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_marker: Option<String>,
}

impl ModelVersionRecord {
    /// Segundo de época embebido en la versión, si el formato lo permite.
    pub fn embedded_timestamp(&self) -> Option<i64> {
        self.version.rsplit('.').next()?.parse().ok()
    }
}

/// Componente de un ensamble: un modelo subido con su peso de votación.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleComponent {
    pub uploaded_model_id: String,
    pub device_id: String,
    pub weight: f64,
}

/// Composición de una versión-ensamble. Presente si y solo si la versión
/// fusionó al menos un modelo subido junto al clasificador base.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleRecord {
    pub version: String,
    pub description: String,
    pub components: Vec<EnsembleComponent>,
}
