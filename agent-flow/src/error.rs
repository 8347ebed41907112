use thiserror::Error;

/// Errors raised while routing a turn through the agent graph
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Graph '{0}' has no entry agent")]
    NoEntryAgent(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Handoff from '{from}' to '{to}' is not declared")]
    HandoffNotAllowed { from: String, to: String },

    #[error("Agent '{0}' requested a handoff but no declared handoff matched")]
    NoHandoffTarget(String),

    #[error("Turn exceeded {0} agent runs without producing a terminal response")]
    HandoffLimitExceeded(usize),

    #[error("Agent execution failed: {0}")]
    AgentExecutionFailed(String),

    #[error("Agent '{agent}' failed: {message}")]
    AgentFailed { agent: String, message: String },

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl GraphError {
    /// Name of the agent this error is attributed to, if any.
    pub fn agent(&self) -> Option<&str> {
        match self {
            GraphError::AgentFailed { agent, .. } => Some(agent),
            GraphError::NoHandoffTarget(agent) => Some(agent),
            GraphError::HandoffNotAllowed { from, .. } => Some(from),
            _ => None,
        }
    }

    /// Wraps an error returned by an agent's `run` so the failing agent is known.
    pub(crate) fn attributed_to(self, agent: &str) -> Self {
        match self {
            GraphError::AgentFailed { .. } => self,
            other => GraphError::AgentFailed {
                agent: agent.to_string(),
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
