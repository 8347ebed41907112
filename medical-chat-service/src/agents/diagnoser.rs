use async_trait::async_trait;
use agent_flow::{Agent, AgentResult, Context, NextAction, Result};
use std::sync::Arc;
use tracing::info;

use super::types::{DiagnoserInput, agent_names, session_keys};
use super::utils::agent_error;
use crate::llm::{ChatModel, ChatRequest};

pub const DIAGNOSER_INSTRUCTIONS: &str = "You are a health agent who suggests possible diagnoses based on the medical information you receive. \
Your input is one of: blood test results as JSON, a description of symptoms, or a question about what a medical term means. \
For blood test results or symptoms, list the medical conditions the user may have and explain briefly why. \
For a medical term, reply with a simple definition that someone without a medical background can understand. \
If you are told that the blood report could not be read, explain that to the user in plain language and ask them to upload a valid, readable PDF; do not make any diagnosis in that case. \
Whenever you give medical information, end your answer by telling the user to speak with a qualified medical professional.";

pub const DISCLAIMER: &str =
    "Please speak with a qualified medical professional before acting on any of this information.";

/// Verbs that turn a mention of a professional into an instruction to see one
const REFERRAL_VERBS: &[&str] = &[
    "consult", "see", "speak", "talk", "ask", "contact", "visit", "check",
];

const PROFESSIONAL_TERMS: &[&str] = &[
    "doctor",
    "doctors",
    "physician",
    "physicians",
    "professional",
    "professionals",
    "provider",
    "providers",
    "clinician",
    "clinicians",
    "gp",
];

/// How many words may separate the verb from the professional, as in
/// "speak with a qualified medical professional"
const REFERRAL_WINDOW: usize = 5;

/// Whether the closing paragraph of `text` tells the reader to consult a
/// professional. Merely mentioning one ("is diagnosed by a doctor") does not count.
pub fn has_disclaimer(text: &str) -> bool {
    let closing = text
        .trim_end()
        .rsplit("\n\n")
        .find(|paragraph| !paragraph.trim().is_empty())
        .unwrap_or_default()
        .to_lowercase();
    let words: Vec<&str> = closing
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    words.iter().enumerate().any(|(i, word)| {
        REFERRAL_VERBS.contains(word)
            && words[i + 1..]
                .iter()
                .take(REFERRAL_WINDOW)
                .any(|w| PROFESSIONAL_TERMS.contains(w))
    })
}

/// Appends the consult-a-professional clause unless the answer already ends with one
pub fn with_disclaimer(text: &str) -> String {
    if has_disclaimer(text) {
        text.to_string()
    } else {
        format!("{}\n\n{}", text.trim_end(), DISCLAIMER)
    }
}

fn build_prompt(input: &DiagnoserInput) -> String {
    match input {
        DiagnoserInput::BloodRecord(record) => format!(
            "Here are the results of my blood test as JSON. What conditions could they indicate?\n\n{}",
            record.to_pretty_json()
        ),
        DiagnoserInput::ExtractionFailure(payload) => format!(
            "The blood report I uploaded could not be read. The extraction tool returned: {}\n\nExplain what happened and what I should do next.",
            payload
        ),
        DiagnoserInput::Query(query) => query.clone(),
    }
}

/// Terminal agent: every answer the user sees for a medical question comes from here
pub struct DiagnoserAgent {
    model: Arc<dyn ChatModel>,
}

impl DiagnoserAgent {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Agent for DiagnoserAgent {
    fn name(&self) -> &str {
        agent_names::DIAGNOSER
    }

    async fn run(&self, context: Context) -> Result<AgentResult> {
        let input = match context
            .get::<DiagnoserInput>(session_keys::DIAGNOSER_INPUT)
            .await
        {
            Some(input) => input,
            None => DiagnoserInput::Query(context.user_input().await),
        };

        let request = ChatRequest::new(DIAGNOSER_INSTRUCTIONS, build_prompt(&input));
        let answer = self
            .model
            .complete(request)
            .await
            .map_err(|e| agent_error("diagnosis request failed", e))?;

        if answer.trim().is_empty() {
            return Err(agent_error("diagnosis request failed", "empty response"));
        }

        let answer = if input.needs_disclaimer() {
            with_disclaimer(&answer)
        } else {
            answer
        };

        let status = match input {
            DiagnoserInput::BloodRecord(_) => "Blood report reviewed",
            DiagnoserInput::ExtractionFailure(_) => "Explained extraction failure",
            DiagnoserInput::Query(_) => "Query answered",
        };
        info!(agent = %self.name(), status = %status, "Diagnoser responded");

        Ok(AgentResult::new_with_status(
            Some(answer),
            NextAction::End,
            Some(status.to_string()),
        ))
    }
}
