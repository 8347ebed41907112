pub mod agent;
pub mod context;
pub mod error;
pub mod graph;
pub mod runner;
pub mod storage;

// Re-export commonly used types
pub use agent::{Agent, AgentResult, NextAction};
pub use context::{ATTACHMENT_KEY, Context, SESSION_ID_KEY, USER_INPUT_KEY};
pub use error::{GraphError, Result};
pub use graph::{AgentGraph, AgentGraphBuilder, MAX_AGENT_RUNS_PER_TURN, TurnResult, TurnStatus};
pub use runner::{DEFAULT_FAILURE_MESSAGE, TurnGuard, TurnInput, TurnRunner};
pub use storage::{ChatMessage, InMemorySessionStorage, MessageRole, Session, SessionStorage};
