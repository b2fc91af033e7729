
pub mod errors;
pub mod local;
pub mod paths;
pub mod remote;
pub mod token;
pub mod user_data;
pub mod vault;

pub use errors::BlobError;
pub use local::LocalVault;
pub use paths::BlobNamespace;
pub use remote::{PutOutcome, RemoteObject, RemoteVault, StreamHandle};
pub use token::{TokenManager, TokenPhase, TokenSettings};
pub use vault::{ObjectVault, VaultSettings};
