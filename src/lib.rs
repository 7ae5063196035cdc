//! Pulsewatch - Real-time heart-rate monitoring with symptom-driven diagnosis
//!
//! Pulsewatch reads `HR:<bpm>` lines from a serial device, watches for a
//! sustained run of out-of-range readings, and on trigger collects a short
//! symptom questionnaire whose answers are coerced into a feature record and
//! ranked by a classifier:
//! stream reading → streak detection → questionnaire → value coercion
//! → feature assembly → classification.
//!
//! ## Modules
//!
//! - **Monitor**: the watching/questionnaire state machine
//! - **Stream**: device transports and the `HR:` line parser
//! - **Normalizer / Features**: value coercion and feature assembly

pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod features;
pub mod monitor;
pub mod normalizer;
pub mod questionnaire;
pub mod report;
pub mod stream;
pub mod types;
pub mod window;

pub use classifier::{Classifier, ClassifierBundle, PrototypeClassifier};
pub use config::MonitorConfig;
pub use detector::{should_trigger, update, AbnormalityDetector, Trigger};
pub use error::MonitorError;
pub use features::{CoercedInputs, FeatureAssembler, RawInputs};
pub use monitor::{CancellationToken, Monitor, MonitorState, MonitorStats};
pub use questionnaire::{AnswerLines, Presenter, Prompt, Questionnaire, PROMPTS};
pub use report::DiagnosisReport;
pub use stream::{DeviceLineTransport, LineTransport, SerialLineTransport, StreamReader};
pub use types::{ClassifiedResult, FeatureRecord, FeatureValue, RawValue, Reading, StreakState};

/// Pulsewatch version embedded in all reports
pub const PULSEWATCH_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "pulsewatch";
