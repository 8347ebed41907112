use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod agent_names {
    pub const ROUTER: &str = "Router";
    pub const BLOOD_REPORT: &str = "Blood Report Parser";
    pub const DIAGNOSER: &str = "Diagnoser";
}

pub mod session_keys {
    pub const ROUTE: &str = "route";
    pub const DIAGNOSER_INPUT: &str = "diagnoser_input";
    pub const EXTRACTION_ATTEMPTS: &str = "extraction_attempts";
}

/// How the router classified a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    BloodReport,
    Diagnoser,
    Unroutable,
}

/// Analyte name → value mapping pulled out of a blood report.
///
/// The shape is whatever the report contains; there is no fixed schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredBloodRecord(Map<String, Value>);

impl StructuredBloodRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Drop null and empty values, recursively
    pub fn pruned(self) -> Self {
        let fields = self
            .0
            .into_iter()
            .filter_map(|(key, value)| prune_value(value).map(|v| (key, v)))
            .collect();
        Self(fields)
    }

    pub fn get(&self, analyte: &str) -> Option<&Value> {
        self.0.get(analyte)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

fn prune_value(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::Array(items) => {
            let items: Vec<Value> = items.into_iter().filter_map(prune_value).collect();
            (!items.is_empty()).then_some(Value::Array(items))
        }
        Value::Object(fields) => {
            let fields: Map<String, Value> = fields
                .into_iter()
                .filter_map(|(k, v)| prune_value(v).map(|v| (k, v)))
                .collect();
            (!fields.is_empty()).then_some(Value::Object(fields))
        }
        other => Some(other),
    }
}

/// What the diagnoser is asked to respond to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum DiagnoserInput {
    BloodRecord(StructuredBloodRecord),
    /// Failure payload forwarded verbatim from the blood report agent
    ExtractionFailure(String),
    /// Symptom description or terminology question
    Query(String),
}

impl DiagnoserInput {
    /// Whether an answer to this input amounts to medical advice
    pub fn needs_disclaimer(&self) -> bool {
        !matches!(self, DiagnoserInput::ExtractionFailure(_))
    }
}

/// User text recorded for an upload turn. The file itself travels as the
/// turn's attachment, never inside the text.
pub const REPORT_UPLOADED_TEXT: &str = "I have uploaded my blood report.";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pruning_drops_empty_values() {
        let record = StructuredBloodRecord::new(
            json!({
                "Hemoglobin": { "value": 13.5, "unit": "g/dL", "reference_range": null },
                "Notes": "",
                "Platelets": 250,
                "Flags": [],
                "Comments": { "text": " " }
            })
            .as_object()
            .cloned()
            .unwrap(),
        )
        .pruned();

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("Hemoglobin"), Some(&json!({ "value": 13.5, "unit": "g/dL" })));
        assert_eq!(record.get("Platelets"), Some(&json!(250)));
    }

    #[test]
    fn diagnoser_input_is_tagged() {
        let input = DiagnoserInput::Query("what is anemia?".to_string());
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value, json!({ "kind": "query", "payload": "what is anemia?" }));
        assert!(input.needs_disclaimer());
        assert!(!DiagnoserInput::ExtractionFailure("{}".into()).needs_disclaimer());
    }
}
