pub mod config;
pub mod error;
pub mod model_client;
pub mod models;
pub mod object_store;
pub mod orchestrator;
pub mod repository;

// Re-export commonly used types
pub use config::ModelServiceConfig;
pub use error::{AnalysisError, Result};
pub use model_client::{DiagnosticModelClient, HttpDiagnosticModelClient};
pub use models::{
    ChatExchange, ChatSession, DiagnosticResult, DiseasePrediction, StoredResult,
};
pub use object_store::{FsObjectStore, InMemoryObjectStore, ObjectStoreGateway};
pub use orchestrator::AnalysisOrchestrator;
pub use repository::{InMemorySessionRepository, PostgresSessionRepository, SessionRepository};
