
pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::{SqlClient, SyncBeacon};
pub use errors::StoreError;
pub use repositories::{
    InteractionRepository, StatsRepository, UploadRepository, VersionRepository,
};
