//! Deterministic stand-ins for the model and tool seams.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::blood_report::RecordStructurer;
use super::router::IntentClassifier;
use super::types::{Route, StructuredBloodRecord};
use crate::extraction::{ExtractionResult, TextExtractor};
use crate::llm::{ChatModel, ChatRequest, ModelError};

/// Replies with the same text to every request and remembers what it was asked
pub struct ScriptedModel {
    reply: Option<String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> Result<String, ModelError> {
        self.requests.lock().unwrap().push(request);
        self.reply
            .clone()
            .ok_or_else(|| ModelError::MalformedResponse("scripted failure".to_string()))
    }
}

pub struct FixedClassifier {
    route: Route,
    pub calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IntentClassifier for FixedClassifier {
    async fn classify(&self, _input: &str) -> anyhow::Result<Route> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.route)
    }
}

pub struct CountingExtractor {
    result: ExtractionResult,
    pub calls: AtomicUsize,
    paths: Mutex<Vec<PathBuf>>,
}

impl CountingExtractor {
    pub fn text(text: &str) -> Self {
        Self {
            result: ExtractionResult::Text(text.to_string()),
            calls: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
        }
    }

    pub fn failure() -> Self {
        Self {
            result: ExtractionResult::Failure,
            calls: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
        }
    }

    /// Every path handed to `extract`, in call order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextExtractor for CountingExtractor {
    async fn extract(&self, path: &Path) -> ExtractionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().unwrap().push(path.to_path_buf());
        self.result.clone()
    }
}

pub struct FixedStructurer {
    record: StructuredBloodRecord,
    pub calls: AtomicUsize,
}

impl FixedStructurer {
    pub fn empty() -> Self {
        Self {
            record: StructuredBloodRecord::default(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_record(fields: serde_json::Value) -> Self {
        Self {
            record: StructuredBloodRecord::new(fields.as_object().cloned().unwrap_or_default()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RecordStructurer for FixedStructurer {
    async fn structure(&self, _report_text: &str) -> anyhow::Result<StructuredBloodRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.record.clone())
    }
}
