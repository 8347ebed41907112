use agent_flow::{ChatMessage, Session, TurnResult, TurnStatus};
use serde::{Deserialize, Serialize};

use crate::workflow::awaiting_report_upload;

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatTurnRequest {
    pub session_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatTurnResponse {
    pub session_id: String,
    /// Agent whose answer is shown for this turn
    pub agent: String,
    pub response: String,
    pub status: String,
    pub awaiting_report_upload: bool,
    /// Rendered conversation so far
    pub history: Vec<String>,
}

impl ChatTurnResponse {
    pub fn new(session: &Session, result: &TurnResult) -> Self {
        let status = match &result.status {
            TurnStatus::WaitingForInput => "waiting_for_input",
            TurnStatus::Completed => "completed",
            TurnStatus::Failed(_) => "failed",
        };
        Self {
            session_id: session.id.clone(),
            agent: result.responding_agent.clone(),
            response: result.final_text().to_string(),
            status: status.to_string(),
            awaiting_report_upload: awaiting_report_upload(session),
            history: session.history.iter().map(ChatMessage::display).collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub active_agent: String,
    pub status_message: Option<String>,
    pub awaiting_report_upload: bool,
    pub history: Vec<ChatMessage>,
}

impl From<Session> for SessionView {
    fn from(session: Session) -> Self {
        Self {
            awaiting_report_upload: awaiting_report_upload(&session),
            session_id: session.id,
            active_agent: session.active_agent,
            status_message: session.status_message,
            history: session.history,
        }
    }
}
