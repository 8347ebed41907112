pub mod agents;
pub mod config;
pub mod extraction;
pub mod llm;
pub mod models;
pub mod service;
pub mod workflow;

pub use config::{AppConfig, ConfigError, LogFormat};
pub use extraction::{ExtractionResult, PdfTextExtractor, TextExtractor};
pub use llm::{ChatModel, ChatRequest, ModelError, OpenAiCompatibleModel};
pub use service::{AppState, build_router, create_app};
pub use workflow::{
    AgentResponse, FAILURE_MESSAGE, MedicalAgents, build_medical_workflow, create_turn_runner,
    report_path, report_turn_input, route,
};
