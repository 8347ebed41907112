pub mod blood_report;
pub mod diagnoser;
pub mod router;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use blood_report::{BloodReportAgent, LlmRecordStructurer, RecordStructurer};
pub use diagnoser::DiagnoserAgent;
pub use router::{IntentClassifier, LlmIntentClassifier, RouterAgent};
pub use types::{DiagnoserInput, Route, StructuredBloodRecord, agent_names, session_keys};
