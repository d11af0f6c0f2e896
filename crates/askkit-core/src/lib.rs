pub mod config;
pub mod error;
pub mod exec;
pub mod ingest;
pub mod llm;
pub mod metrics;
pub mod registry;
pub mod resolve;

// Re-export key types for convenience
pub use error::{AskKitError, Result};
pub use registry::{DatasetRecord, RegistrySnapshot};
pub use resolve::{GeneratedBy, PromptResolution, PromptResolver};
