pub mod provider;
pub mod local;
pub mod managed;
pub mod router;
pub mod types;

pub use provider::CompletionBackend;
pub use managed::ManagedBackend;
pub use router::create_backend;
pub use types::{Completion, GenerationParams};
