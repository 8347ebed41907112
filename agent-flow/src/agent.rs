use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::Result};

/// Result of one agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// Text shown to the user, only used when the agent keeps the turn
    pub response: Option<String>,
    /// What should happen next
    pub next_action: NextAction,
    /// Short description of the agent's progress, for logs and session views
    pub status_message: Option<String>,
}

impl AgentResult {
    pub fn new(response: Option<String>, next_action: NextAction) -> Self {
        Self {
            response,
            next_action,
            status_message: None,
        }
    }

    pub fn new_with_status(
        response: Option<String>,
        next_action: NextAction,
        status_message: Option<String>,
    ) -> Self {
        Self {
            response,
            next_action,
            status_message,
        }
    }

    /// Give up the turn and follow the graph's declared handoffs
    pub fn handoff(status_message: impl Into<String>) -> Self {
        Self::new_with_status(None, NextAction::Handoff, Some(status_message.into()))
    }

    /// Terminal response for the turn
    pub fn reply(response: impl Into<String>) -> Self {
        Self::new(Some(response.into()), NextAction::End)
    }
}

/// Defines what should happen after an agent completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextAction {
    /// Transfer the turn to the first declared handoff whose condition holds
    Handoff,
    /// Transfer the turn to a specific agent; the handoff must be declared
    HandoffTo(String),
    /// Keep ownership and end the turn, expecting the user to supply more input
    WaitForInput,
    /// End the turn with this agent's response as the final answer
    End,
}

/// Core trait that all agents must implement
#[async_trait]
pub trait Agent: Send + Sync {
    /// Display name, also used as the agent's id inside a graph
    fn name(&self) -> &str;

    /// Execute the agent with the given per-turn context
    async fn run(&self, context: Context) -> Result<AgentResult>;
}
