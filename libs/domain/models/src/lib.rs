
pub mod blob_ref;
pub mod interaction;
pub mod model;
pub mod stats;
pub mod summary;

pub use blob_ref::BlobRef;
pub use interaction::{DeviceInteraction, InteractionFeedback, InteractionReport, LearnEnvelope};
pub use model::{
    EnsembleComponent, EnsembleRecord, IncorporationStatus, ModelVersionRecord, UploadedModel,
};
pub use stats::{GlobalStats, IntentCount};
pub use summary::{
    IncorporatedModelInfo, ModelComparison, ModelFlavor, ModelPerformance, TrainingDataProfile,
    TrainingSummary,
};
