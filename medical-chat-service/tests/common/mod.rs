#![allow(dead_code)]

use agent_flow::{InMemorySessionStorage, TurnRunner};
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use medical_chat_service::agents::blood_report::STRUCTURER_INSTRUCTIONS;
use medical_chat_service::agents::diagnoser::DIAGNOSER_INSTRUCTIONS;
use medical_chat_service::agents::router::ROUTER_INSTRUCTIONS;
use medical_chat_service::{
    ChatModel, ChatRequest, ExtractionResult, MedicalAgents, ModelError, PdfTextExtractor,
    TextExtractor, build_medical_workflow, create_turn_runner,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Answers each agent's prompt the way a well-behaved model would
#[derive(Default)]
pub struct StubModel {
    failing: bool,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl StubModel {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn requests_with(&self, instructions: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.instructions == instructions)
            .count()
    }
}

#[async_trait]
impl ChatModel for StubModel {
    async fn complete(&self, request: ChatRequest) -> Result<String, ModelError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing {
            return Err(ModelError::MalformedResponse("upstream timed out".to_string()));
        }

        let prompt = request.prompt.to_lowercase();
        let reply = if request.instructions == ROUTER_INSTRUCTIONS {
            if prompt.contains("blood report") {
                r#"{"route": "blood_report"}"#.to_string()
            } else if prompt.contains("headache") || prompt.contains("anemia") {
                r#"{"route": "diagnoser"}"#.to_string()
            } else {
                r#"{"route": "unroutable"}"#.to_string()
            }
        } else if request.instructions == STRUCTURER_INSTRUCTIONS {
            r#"```json
{"Hemoglobin": {"value": 10.1, "unit": "g/dL", "reference_range": "13.0-17.0"}}
```"#
                .to_string()
        } else if request.instructions == DIAGNOSER_INSTRUCTIONS {
            if prompt.contains("could not be read") {
                "I couldn't read the file you uploaded. Please upload a valid, readable PDF."
                    .to_string()
            } else {
                "Possible causes include iron deficiency anemia or a viral infection.".to_string()
            }
        } else {
            return Err(ModelError::MalformedResponse("unexpected prompt".to_string()));
        };
        Ok(reply)
    }
}

/// Real PDF extraction that also counts how often it was invoked
#[derive(Default)]
pub struct CountingPdfExtractor {
    pub calls: AtomicUsize,
}

impl CountingPdfExtractor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextExtractor for CountingPdfExtractor {
    async fn extract(&self, path: &Path) -> ExtractionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        PdfTextExtractor.extract(path).await
    }
}

pub fn runner_with(model: Arc<StubModel>, extractor: Arc<CountingPdfExtractor>) -> TurnRunner {
    let graph = build_medical_workflow(MedicalAgents::from_model(model, extractor));
    create_turn_runner(graph, Arc::new(InMemorySessionStorage::new()))
}

/// Write a PDF with one line of text per page
pub fn write_report(path: &Path, pages: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|line| {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 11.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            }))
        })
        .collect();

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}
