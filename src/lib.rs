pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod functions;
pub mod model;
pub mod pipe;
pub mod registry;
pub mod transition;
pub mod types;

// Re-export main types
pub use backend::{Backend, InMemoryBackend};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use functions::FunctionRegistry;
pub use model::{compile, AppDescriptor, AppVersion};
pub use types::*;
