// [apps/aggregation-server/src/services/mod.rs]
// =================================================================
// APARATO: BACKGROUND SERVICE REGISTRY (V5.0)
// RESPONSABILIDAD: REGISTRO DE DAEMONS DEL AGREGADOR
// =================================================================

pub mod orchestrator;
pub mod pipeline;
pub mod retention;
pub mod scheduler;
pub mod snapshot_relay;
pub mod trigger;

pub use orchestrator::spawn_orchestrator_worker;
pub use scheduler::spawn_scheduler;
pub use snapshot_relay::spawn_snapshot_relay;
