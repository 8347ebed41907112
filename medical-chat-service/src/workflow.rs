use agent_flow::{
    ATTACHMENT_KEY, AgentGraph, AgentGraphBuilder, Context, Session, SessionStorage, TurnInput,
    TurnRunner, USER_INPUT_KEY,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agents::{
    BloodReportAgent, DiagnoserAgent, IntentClassifier, LlmIntentClassifier, LlmRecordStructurer,
    RecordStructurer, Route, RouterAgent, agent_names, session_keys, types::REPORT_UPLOADED_TEXT,
};
use crate::extraction::TextExtractor;
use crate::llm::ChatModel;

pub const FAILURE_MESSAGE: &str =
    "Sorry, I ran into a problem while processing your request. Please try again in a moment.";
pub const UPLOAD_NOTICE: &str = "File uploaded: blood report";
pub const REPORT_FILE_NAME: &str = "report.pdf";

/// The seams the three agents depend on
pub struct MedicalAgents {
    pub classifier: Arc<dyn IntentClassifier>,
    pub extractor: Arc<dyn TextExtractor>,
    pub structurer: Arc<dyn RecordStructurer>,
    pub model: Arc<dyn ChatModel>,
}

impl MedicalAgents {
    /// Every model-backed step shares one chat model
    pub fn from_model(model: Arc<dyn ChatModel>, extractor: Arc<dyn TextExtractor>) -> Self {
        Self {
            classifier: Arc::new(LlmIntentClassifier::new(model.clone())),
            structurer: Arc::new(LlmRecordStructurer::new(model.clone())),
            extractor,
            model,
        }
    }
}

fn route_is(context: &Context, route: Route) -> bool {
    context.get_sync::<Route>(session_keys::ROUTE) == Some(route)
}

pub fn build_medical_workflow(agents: MedicalAgents) -> AgentGraph {
    let router = Arc::new(RouterAgent::new(agents.classifier));
    let blood_report = Arc::new(BloodReportAgent::new(agents.extractor, agents.structurer));
    let diagnoser = Arc::new(DiagnoserAgent::new(agents.model));

    AgentGraphBuilder::new("medical_chat")
        .add_agent(router)
        .add_agent(blood_report)
        .add_agent(diagnoser)
        .set_entry_agent(agent_names::ROUTER)
        .add_conditional_handoff(agent_names::ROUTER, agent_names::BLOOD_REPORT, |ctx| {
            route_is(ctx, Route::BloodReport)
        })
        .add_conditional_handoff(agent_names::ROUTER, agent_names::DIAGNOSER, |ctx| {
            route_is(ctx, Route::Diagnoser)
        })
        .add_handoff(agent_names::BLOOD_REPORT, agent_names::DIAGNOSER)
        .build()
}

pub fn create_turn_runner(graph: AgentGraph, storage: Arc<dyn SessionStorage>) -> TurnRunner {
    TurnRunner::new(Arc::new(graph), storage).with_failure_message(FAILURE_MESSAGE)
}

/// Terminal artifact of one routing pass
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub agent: String,
    pub text: String,
}

/// Route a single input (text, or text with an uploaded report attached)
/// through the graph without touching any session
pub async fn route(
    graph: &AgentGraph,
    initial_agent: &str,
    input: &TurnInput,
) -> agent_flow::Result<AgentResponse> {
    let context = Context::new();
    context.set(USER_INPUT_KEY, input.text.clone()).await;
    if let Some(path) = &input.attachment {
        context.set(ATTACHMENT_KEY, path).await;
    }
    let result = graph.execute_turn(initial_agent, context).await?;
    Ok(AgentResponse {
        text: result.final_text().to_string(),
        agent: result.responding_agent,
    })
}

/// Turn input for a report written to `path` by the upload boundary
pub fn report_turn_input(path: &Path) -> TurnInput {
    TurnInput::with_display(REPORT_UPLOADED_TEXT, UPLOAD_NOTICE).with_attachment(path)
}

/// Where the upload boundary stores a session's report
pub fn report_path(upload_dir: &Path, session_id: &str) -> PathBuf {
    upload_dir.join(session_id).join(REPORT_FILE_NAME)
}

/// The upload control is offered while the blood report agent holds the conversation
pub fn awaiting_report_upload(session: &Session) -> bool {
    session.is_active(agent_names::BLOOD_REPORT)
}
