
pub mod config;
pub mod handlers;
pub mod kernel;
pub mod registry;
pub mod routes;
pub mod services;
pub mod state;

/// Superficie nominal del agregador para binarios y tests de integración.
pub mod prelude {
    pub use crate::config::{ServerConfig, StorageMode};
    pub use crate::kernel::AggregationKernel;
    pub use crate::registry::{DownloadResolution, ModelRegistry};
    pub use crate::routes::create_gateway_router;
    pub use crate::state::{AppState, TrainingTrigger};
}
