use async_trait::async_trait;
use agent_flow::{Agent, AgentResult, Context, NextAction, Result};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::types::{DiagnoserInput, Route, agent_names, session_keys};
use super::utils::{agent_error, extract_json_block};
use crate::llm::{ChatModel, ChatRequest};

pub const ROUTER_INSTRUCTIONS: &str = r#"You are the entry point of a medical diagnosis chatbot. You never diagnose anything yourself; you only decide who should handle the user's message.

Classify the message into exactly one route:
- "blood_report": the user wants a blood report (PDF) analysed, or refers to an uploaded blood report.
- "diagnoser": the user describes symptoms, asks about a medical condition, or asks what a medical term means.
- "unroutable": the message is empty, gibberish, or unrelated to health.

Respond with ONLY this JSON and nothing else:
{"route": "<blood_report|diagnoser|unroutable>"}
"#;

pub const CLARIFICATION_PROMPT: &str = "I'm not sure how to help with that. Please describe your symptoms, ask about a medical term, or tell me you have a blood report you would like analysed.";

/// Decides which agent should own a request
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, input: &str) -> anyhow::Result<Route>;
}

#[derive(Deserialize)]
struct RouteResponse {
    route: Route,
}

/// Attempts to parse the route from the model's response; anything
/// unrecognised counts as unroutable
fn parse_route_from_response(response: &str) -> Route {
    extract_json_block(response)
        .and_then(|block| serde_json::from_str::<RouteResponse>(block).ok())
        .map(|parsed| parsed.route)
        .unwrap_or_else(|| {
            warn!(response = %response, "Could not parse route from classifier response");
            Route::Unroutable
        })
}

/// Classifier backed by the chat model
pub struct LlmIntentClassifier {
    model: Arc<dyn ChatModel>,
}

impl LlmIntentClassifier {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, input: &str) -> anyhow::Result<Route> {
        let request = ChatRequest::new(ROUTER_INSTRUCTIONS, input)
            .with_max_tokens(50)
            .with_temperature(0.0);
        let response = self.model.complete(request).await?;
        Ok(parse_route_from_response(&response))
    }
}

/// Entry agent: classifies the request and hands it off
pub struct RouterAgent {
    classifier: Arc<dyn IntentClassifier>,
}

impl RouterAgent {
    pub fn new(classifier: Arc<dyn IntentClassifier>) -> Self {
        Self { classifier }
    }

    async fn classify(&self, input: &str, has_attachment: bool) -> Result<Route> {
        // uploaded reports arrive as an attachment and never need the model
        if has_attachment {
            return Ok(Route::BloodReport);
        }
        if input.trim().is_empty() {
            return Ok(Route::Unroutable);
        }
        self.classifier
            .classify(input)
            .await
            .map_err(|e| agent_error("intent classification failed", e))
    }
}

#[async_trait]
impl Agent for RouterAgent {
    fn name(&self) -> &str {
        agent_names::ROUTER
    }

    async fn run(&self, context: Context) -> Result<AgentResult> {
        let input = context.user_input().await;
        let has_attachment = context.attachment().await.is_some();
        let route = self.classify(&input, has_attachment).await?;

        info!(agent = %self.name(), route = ?route, "Request classified");
        context.set(session_keys::ROUTE, route).await;

        match route {
            Route::BloodReport => Ok(AgentResult::handoff("Routing to blood report parser")),
            Route::Diagnoser => {
                context
                    .set(session_keys::DIAGNOSER_INPUT, DiagnoserInput::Query(input))
                    .await;
                Ok(AgentResult::handoff("Routing to diagnoser"))
            }
            Route::Unroutable => Ok(AgentResult::new_with_status(
                Some(CLARIFICATION_PROMPT.to_string()),
                NextAction::End,
                Some("Request could not be routed".to_string()),
            )),
        }
    }
}
