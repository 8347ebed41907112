use async_trait::async_trait;
use agent_flow::{Agent, AgentResult, Context, NextAction, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::types::{DiagnoserInput, StructuredBloodRecord, agent_names, session_keys};
use super::utils::{agent_error, extract_json_block};
use crate::extraction::{ExtractionResult, TextExtractor};
use crate::llm::{ChatModel, ChatRequest};

/// First-contact reply; deliberately does not name the agent
pub const ACKNOWLEDGMENT: &str =
    "I can help you with that. Please upload your blood report as a PDF and I'll take a look.";

pub const STRUCTURER_INSTRUCTIONS: &str = r#"You convert the raw text of a blood test report into JSON.

Keep ONLY the blood test results: each analyte with its measured value, unit and reference range when present.
Discard everything else: patient name, address, identifiers, doctor and laboratory details, dates, page headers and footers, disclaimers and any other boilerplate.
Use the analyte names exactly as they appear in the report as the JSON keys.

Respond with ONLY a single JSON object, for example:
{"Hemoglobin": {"value": 13.5, "unit": "g/dL", "reference_range": "13.0-17.0"}}
"#;

/// Turns extracted report text into a structured record
#[async_trait]
pub trait RecordStructurer: Send + Sync {
    async fn structure(&self, report_text: &str) -> anyhow::Result<StructuredBloodRecord>;
}

/// Record structurer backed by the chat model
pub struct LlmRecordStructurer {
    model: Arc<dyn ChatModel>,
}

impl LlmRecordStructurer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl RecordStructurer for LlmRecordStructurer {
    async fn structure(&self, report_text: &str) -> anyhow::Result<StructuredBloodRecord> {
        let request = ChatRequest::new(
            STRUCTURER_INSTRUCTIONS,
            format!("Blood report text:\n\n{}", report_text),
        )
        .with_max_tokens(2000)
        .with_temperature(0.0);

        let response = self.model.complete(request).await?;
        parse_record(&response)
    }
}

fn parse_record(response: &str) -> anyhow::Result<StructuredBloodRecord> {
    let block = extract_json_block(response)
        .ok_or_else(|| anyhow::anyhow!("no JSON object in structuring response"))?;
    match serde_json::from_str::<Value>(block)? {
        Value::Object(fields) => Ok(StructuredBloodRecord::new(fields).pruned()),
        other => Err(anyhow::anyhow!(
            "expected a JSON object of analytes, got {}",
            other
        )),
    }
}

/// Extracts a blood report and hands the structured record to the diagnoser
pub struct BloodReportAgent {
    extractor: Arc<dyn TextExtractor>,
    structurer: Arc<dyn RecordStructurer>,
}

impl BloodReportAgent {
    pub fn new(extractor: Arc<dyn TextExtractor>, structurer: Arc<dyn RecordStructurer>) -> Self {
        Self {
            extractor,
            structurer,
        }
    }
}

#[async_trait]
impl Agent for BloodReportAgent {
    fn name(&self) -> &str {
        agent_names::BLOOD_REPORT
    }

    async fn run(&self, context: Context) -> Result<AgentResult> {
        // only an uploaded attachment is ever extracted; paths in chat text are ignored
        let Some(report_path) = context.attachment().await else {
            info!(agent = %self.name(), "No report attached yet, asking for upload");
            return Ok(AgentResult::new_with_status(
                Some(ACKNOWLEDGMENT.to_string()),
                NextAction::WaitForInput,
                Some("Waiting for blood report upload".to_string()),
            ));
        };

        let attempts: u32 = context
            .get(session_keys::EXTRACTION_ATTEMPTS)
            .await
            .unwrap_or(0);
        context
            .set(session_keys::EXTRACTION_ATTEMPTS, attempts + 1)
            .await;

        info!(agent = %self.name(), path = %report_path.display(), "Extracting blood report");

        let diagnoser_input = match self.extractor.extract(&report_path).await {
            ExtractionResult::Failure => {
                warn!(path = %report_path.display(), "Extraction failed, forwarding failure");
                DiagnoserInput::ExtractionFailure(ExtractionResult::failure_payload())
            }
            ExtractionResult::Text(text) => {
                let record = self
                    .structurer
                    .structure(&text)
                    .await
                    .map_err(|e| agent_error("structuring blood report failed", e))?;
                if record.is_empty() {
                    warn!(path = %report_path.display(), "No analytes found in report, forwarding failure");
                    DiagnoserInput::ExtractionFailure(ExtractionResult::failure_payload())
                } else {
                    info!(analytes = record.len(), "Blood report structured");
                    DiagnoserInput::BloodRecord(record)
                }
            }
        };

        let status = match &diagnoser_input {
            DiagnoserInput::ExtractionFailure(_) => "Report extraction failed",
            _ => "Blood report structured",
        };
        context
            .set(session_keys::DIAGNOSER_INPUT, diagnoser_input)
            .await;

        Ok(AgentResult::new_with_status(
            None,
            NextAction::HandoffTo(agent_names::DIAGNOSER.to_string()),
            Some(status.to_string()),
        ))
    }
}
