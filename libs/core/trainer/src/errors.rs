// [libs/core/trainer/src/errors.rs]
// =================================================================
// APARATO: TRAINER ERROR CATALOG (V3.0)
// RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DEL NÚCLEO DE ENTRENAMIENTO
// =================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainerError {
    /// El dataset no alcanza el umbral mínimo; el ciclo debe abortar sin
    /// tocar las subidas pendientes.
    #[error("[L2_TRAINER_FAULT]: INSUFFICIENT_DATA -> {have} samples (minimum: {need})")]
    InsufficientData { have: usize, need: usize },

    /// Corpus sin señal útil (vocabulario o clases vacías tras normalizar).
    #[error("[L2_TRAINER_FAULT]: DEGENERATE_CORPUS -> {0}")]
    DegenerateCorpus(String),

    /// El artefacto binario no corresponde al formato reconocido.
    #[error("[L2_TRAINER_FAULT]: ARTIFACT_DECODE_REJECTED -> {0}")]
    ArtifactDecode(String),

    /// La serialización del artefacto colapsó.
    #[error("[L2_TRAINER_FAULT]: ARTIFACT_ENCODE_REJECTED -> {0}")]
    ArtifactEncode(String),
}
