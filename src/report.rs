//! Diagnosis reports
//!
//! A report bundles one questionnaire cycle: the reading that triggered it,
//! the assembled features and the ranked classifier output.

use crate::detector::{AbnormalityDetector, Trigger};
use crate::types::{ClassProbability, ClassifiedResult, FeatureRecord};
use crate::window::RecentWindow;
use crate::{PRODUCER_NAME, PULSEWATCH_VERSION};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Shown alongside every result
pub const SAFETY_NOTICE: &str = "This tool is not a medical diagnosis. If you feel unwell or symptoms persist, consult a doctor.";

/// Producer metadata embedded in reports
#[derive(Debug, Clone, Serialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
}

/// Outcome of one questionnaire cycle
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisReport {
    pub report_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub producer: ReportProducer,
    /// Reading that completed the abnormal streak (bpm)
    pub trigger_bpm: f64,
    pub streak_length: u32,
    /// Normal range in effect, `[lower, upper]`
    pub normal_range: [f64; 2],
    /// Mean of the recent window when the trigger fired
    pub window_mean_bpm: Option<f64>,
    pub features: FeatureRecord,
    /// Most likely condition
    pub label: String,
    /// Highest-ranked classes, most likely first
    pub top: Vec<ClassProbability>,
}

impl DiagnosisReport {
    pub fn new(
        trigger: &Trigger,
        detector: &AbnormalityDetector,
        window: &RecentWindow,
        features: FeatureRecord,
        result: &ClassifiedResult,
        top_k: usize,
    ) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            created_at: Utc::now(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: PULSEWATCH_VERSION.to_string(),
            },
            trigger_bpm: trigger.reading.bpm,
            streak_length: trigger.streak_length,
            normal_range: [detector.lower, detector.upper],
            window_mean_bpm: window.mean(),
            features,
            label: result.label.clone(),
            top: result.top(top_k).to_vec(),
        }
    }

    /// Encode as a single JSON line
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Encode as indented JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureAssembler, RawInputs};
    use crate::types::{RawValue, Reading};

    #[test]
    fn test_report_fields() {
        let detector = AbnormalityDetector::default();
        let mut window = RecentWindow::new(5);
        for bpm in [110.0, 112.0, 114.0] {
            window.push(bpm);
        }
        let trigger = Trigger {
            reading: Reading::new(114.0),
            streak_length: 3,
        };
        let raw = RawInputs {
            fever: RawValue::text("y"),
            ..Default::default()
        };
        let features = FeatureAssembler::from_raw(&raw, None);
        let result = ClassifiedResult::from_pairs(vec![
            ("Flu", 0.5),
            ("Cold", 0.25),
            ("COVID", 0.15),
            ("Asthma", 0.1),
        ])
        .unwrap();

        let report = DiagnosisReport::new(&trigger, &detector, &window, features, &result, 3);

        assert_eq!(report.label, "Flu");
        assert_eq!(report.top.len(), 3);
        assert_eq!(report.top[2].label, "COVID");
        assert_eq!(report.trigger_bpm, 114.0);
        assert_eq!(report.window_mean_bpm, Some(112.0));
        assert_eq!(report.normal_range, [60.0, 100.0]);

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["producer"]["name"], "pulsewatch");
        assert_eq!(json["features"]["Fever"], 1.0);
        assert!(json["features"]["Age"].is_null());
        assert_eq!(json["top"][0]["label"], "Flu");
        assert_eq!(json["streak_length"], 3);
    }
}
