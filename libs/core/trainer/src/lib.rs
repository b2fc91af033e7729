
pub mod artifact;
pub mod classifier;
pub mod dataset;
pub mod ensemble;
pub mod errors;
pub mod forest;
pub mod preprocess;
pub mod vectorizer;

pub use artifact::ModelArtifact;
pub use classifier::{IntentClassifier, TrainingReport, TrainingSettings, WeightedMember};
pub use dataset::{build_training_dataset, TrainingRecord};
pub use ensemble::SoftVotingEnsemble;
pub use errors::TrainerError;
pub use forest::RandomForest;
pub use preprocess::canonical_normalize;
pub use vectorizer::TfIdfVectorizer;
