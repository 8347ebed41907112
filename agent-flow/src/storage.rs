use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::Result,
    graph::{TurnResult, TurnStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Agent,
    System,
}

/// One line of the conversation as displayed to the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    /// Agent name for agent messages
    pub speaker: Option<String>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::build(MessageRole::User, None, content)
    }

    pub fn agent(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::build(MessageRole::Agent, Some(name.into()), content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::build(MessageRole::System, None, content)
    }

    fn build(role: MessageRole, speaker: Option<String>, content: impl Into<String>) -> Self {
        Self {
            role,
            speaker,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Rendered form, e.g. `You: ...` or `Diagnoser: ...`
    pub fn display(&self) -> String {
        match (self.role, &self.speaker) {
            (MessageRole::User, _) => format!("You: {}", self.content),
            (MessageRole::Agent, Some(name)) => format!("{}: {}", name, self.content),
            _ => self.content.clone(),
        }
    }
}

/// Conversation state of one chat session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Agent restored on reset and after failed turns
    pub entry_agent: String,
    /// Agent that produced the last terminal response
    pub active_agent: String,
    pub status_message: Option<String>,
    pub history: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, entry_agent: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            entry_agent: entry_agent.to_string(),
            active_agent: entry_agent.to_string(),
            status_message: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self, agent: &str) -> bool {
        self.active_agent == agent
    }

    /// Append the user's line and the turn's terminal response, and move the
    /// active agent to whoever answered.
    pub fn record_turn(&mut self, user_line: ChatMessage, result: &TurnResult) {
        self.history.push(user_line);
        self.history.push(ChatMessage::agent(
            result.responding_agent.clone(),
            result.final_text(),
        ));
        self.active_agent = match result.status {
            TurnStatus::Failed(_) => self.entry_agent.clone(),
            _ => result.responding_agent.clone(),
        };
        self.status_message = result.status_message.clone();
        self.updated_at = Utc::now();
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.active_agent = self.entry_agent.clone();
        self.status_message = None;
        self.updated_at = Utc::now();
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage
#[derive(Default)]
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}
