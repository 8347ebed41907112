//! TurnRunner – loads a session, routes exactly **one** user turn through the
//! agent graph, records the outcome in the session history and persists it.
//!
//! Every turn starts at the graph's entry agent. Turns against the same
//! session are serialized; different sessions run independently.
//!
//! Errors raised by agents do not escape `run`: they are logged and turned
//! into a terminal [`TurnResult`] with [`TurnStatus::Failed`] whose visible
//! text is the runner's failure message. Storage problems and unknown
//! sessions are still returned as errors.

use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    context::{ATTACHMENT_KEY, Context, SESSION_ID_KEY, USER_INPUT_KEY},
    error::{GraphError, Result},
    graph::{AgentGraph, TurnResult},
    storage::{ChatMessage, Session, SessionStorage},
};

pub const DEFAULT_FAILURE_MESSAGE: &str =
    "Sorry, something went wrong while handling your request. Please try again.";

/// Input for one turn
#[derive(Debug, Clone)]
pub struct TurnInput {
    /// Text handed to the entry agent
    pub text: String,
    /// Replaces the `You: ...` history line, e.g. for file uploads
    pub display: Option<String>,
    /// File supplied alongside the text, exposed to agents under [`ATTACHMENT_KEY`]
    pub attachment: Option<PathBuf>,
}

impl TurnInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            display: None,
            attachment: None,
        }
    }

    pub fn with_display(text: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            display: Some(display.into()),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment = Some(path.into());
        self
    }

    fn history_line(&self) -> ChatMessage {
        match &self.display {
            Some(display) => ChatMessage::system(display.clone()),
            None => ChatMessage::user(self.text.clone()),
        }
    }
}

/// Exclusive hold on one session's turn slot.
///
/// While it is alive no other turn, reset or removal can run against the
/// session, so callers can check session state and act on it atomically.
pub struct TurnGuard {
    session_id: String,
    _lock: OwnedMutexGuard<()>,
}

impl TurnGuard {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// High-level helper that orchestrates the _load → route → record → save_ pattern.
#[derive(Clone)]
pub struct TurnRunner {
    graph: Arc<AgentGraph>,
    storage: Arc<dyn SessionStorage>,
    failure_message: String,
    turn_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl TurnRunner {
    pub fn new(graph: Arc<AgentGraph>, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            graph,
            storage,
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
            turn_locks: Arc::new(DashMap::new()),
        }
    }

    /// Override the text shown to the user when a turn fails
    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    pub fn graph(&self) -> &Arc<AgentGraph> {
        &self.graph
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    fn entry_agent(&self) -> Result<String> {
        self.graph
            .entry_agent()
            .map(str::to_string)
            .ok_or_else(|| GraphError::NoEntryAgent(self.graph.id.clone()))
    }

    /// Create and persist a new session positioned at the entry agent
    pub async fn create_session(&self) -> Result<Session> {
        let session = Session::new(Uuid::new_v4().to_string(), &self.entry_agent()?);
        self.storage.save(session.clone()).await?;
        info!(session_id = %session.id, "Created session");
        Ok(session)
    }

    /// Wait for exclusive access to `session_id`'s turn slot
    pub async fn begin_turn(&self, session_id: &str) -> TurnGuard {
        let lock = self
            .turn_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        TurnGuard {
            session_id: session_id.to_string(),
            _lock: lock.lock_owned().await,
        }
    }

    /// Load the session held by `guard`
    pub async fn session(&self, guard: &TurnGuard) -> Result<Session> {
        match self.storage.get(guard.session_id()).await? {
            Some(session) => Ok(session),
            None => {
                // unknown ids must not leave a lock behind
                self.turn_locks.remove(guard.session_id());
                Err(GraphError::SessionNotFound(guard.session_id().to_string()))
            }
        }
    }

    /// Route one turn for `session_id` and persist the updated session.
    pub async fn run(&self, session_id: &str, input: TurnInput) -> Result<TurnResult> {
        let guard = self.begin_turn(session_id).await;
        self.run_with(&guard, input).await
    }

    /// Route one turn for the session already held by `guard`.
    pub async fn run_with(&self, guard: &TurnGuard, input: TurnInput) -> Result<TurnResult> {
        let session_id = guard.session_id();
        let mut session = self.session(guard).await?;

        let entry = self.entry_agent()?;
        let context = Context::new();
        context.set(USER_INPUT_KEY, input.text.clone()).await;
        context.set(SESSION_ID_KEY, session_id.to_string()).await;
        if let Some(path) = &input.attachment {
            context.set(ATTACHMENT_KEY, path).await;
        }

        let result = match self.graph.execute_turn(&entry, context).await {
            Ok(result) => result,
            Err(e) => {
                let agent = e.agent().unwrap_or(&entry).to_string();
                error!(
                    session_id = %session_id,
                    agent = %agent,
                    error = %e,
                    "Turn failed"
                );
                TurnResult::failed(agent, self.failure_message.clone(), e.to_string())
            }
        };

        info!(
            session_id = %session_id,
            agent = %result.responding_agent,
            status = ?result.status,
            path = ?result.path,
            "Turn completed"
        );

        session.record_turn(input.history_line(), &result);
        self.storage.save(session).await?;

        Ok(result)
    }

    /// Clear the conversation and return to the entry agent
    pub async fn reset(&self, session_id: &str) -> Result<Session> {
        let guard = self.begin_turn(session_id).await;
        let mut session = self.session(&guard).await?;
        session.reset();
        self.storage.save(session.clone()).await?;
        info!(session_id = %session_id, "Session reset");
        Ok(session)
    }

    /// Delete the session and forget its turn lock
    pub async fn remove_session(&self, session_id: &str) -> Result<()> {
        let guard = self.begin_turn(session_id).await;
        self.session(&guard).await?;
        self.storage.delete(session_id).await?;
        self.turn_locks.remove(session_id);
        info!(session_id = %session_id, "Session removed");
        Ok(())
    }

    /// Number of sessions that currently have a turn lock
    pub fn tracked_sessions(&self) -> usize {
        self.turn_locks.len()
    }
}
