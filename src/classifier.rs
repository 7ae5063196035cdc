//! Classifier interface
//!
//! The monitor treats the diagnosis model as an external collaborator behind
//! the [`Classifier`] trait. A [`ClassifierBundle`] pairs a classifier with the
//! feature order it was exported with, and is built once by an explicit
//! loading step before monitoring starts.
//!
//! [`PrototypeClassifier`] is a small reference model described in JSON: each
//! class carries a prototype feature vector, and probabilities are a softmax
//! over the negative scaled distance to each prototype.

use crate::error::MonitorError;
use crate::types::{ClassifiedResult, FeatureRecord, FeatureValue};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Trait for diagnosis classifiers
pub trait Classifier {
    /// Class labels this classifier can produce
    fn classes(&self) -> &[String];

    /// Rank every class for one feature record
    fn classify(&self, record: &FeatureRecord) -> Result<ClassifiedResult, MonitorError>;
}

/// A classifier together with its exported feature schema
pub struct ClassifierBundle {
    target: String,
    feature_columns: Vec<String>,
    classifier: Box<dyn Classifier>,
}

impl ClassifierBundle {
    pub fn new(
        target: impl Into<String>,
        feature_columns: Vec<String>,
        classifier: Box<dyn Classifier>,
    ) -> Self {
        Self {
            target: target.into(),
            feature_columns,
            classifier,
        }
    }

    /// Load a prototype bundle from a JSON file
    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        if !path.exists() {
            return Err(MonitorError::ModelBundle(format!(
                "model not found at {}",
                path.display()
            )));
        }
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse a prototype bundle from JSON
    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        let model: PrototypeBundle = serde_json::from_str(json)?;
        let target = model.target.clone();
        let feature_columns = model.feature_columns.clone();
        let classifier = PrototypeClassifier::new(model)?;
        log::info!(
            "Loaded classifier for '{}' with {} classes over {} features",
            target,
            classifier.classes().len(),
            feature_columns.len()
        );
        Ok(Self::new(target, feature_columns, Box::new(classifier)))
    }

    /// Name of the predicted variable
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Feature order the classifier expects
    pub fn feature_order(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn classes(&self) -> &[String] {
        self.classifier.classes()
    }

    /// Check the record schema, then classify it
    pub fn classify(&self, record: &FeatureRecord) -> Result<ClassifiedResult, MonitorError> {
        let matches = record.len() == self.feature_columns.len()
            && record
                .names()
                .zip(self.feature_columns.iter())
                .all(|(name, expected)| name == expected);

        if !matches {
            let got: Vec<&str> = record.names().collect();
            return Err(MonitorError::SchemaMismatch(format!(
                "expected {:?}, got {:?}",
                self.feature_columns, got
            )));
        }

        self.classifier.classify(record)
    }
}

/// JSON description of a prototype bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrototypeBundle {
    /// Name of the predicted variable, e.g. "Disease"
    pub target: String,
    /// Exported feature order
    pub feature_columns: Vec<String>,
    /// Softmax temperature; lower values sharpen the ranking
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Per-feature divisor applied to numeric differences
    #[serde(default)]
    pub scales: HashMap<String, f64>,
    pub classes: Vec<ClassPrototype>,
}

/// One class and its prototype feature values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassPrototype {
    pub label: String,
    pub prototype: HashMap<String, FeatureValue>,
}

fn default_temperature() -> f64 {
    1.0
}

/// Nearest-prototype classifier with softmax ranking
#[derive(Debug, Clone)]
pub struct PrototypeClassifier {
    labels: Vec<String>,
    model: PrototypeBundle,
}

impl PrototypeClassifier {
    pub fn new(model: PrototypeBundle) -> Result<Self, MonitorError> {
        if model.classes.is_empty() {
            return Err(MonitorError::ModelBundle("bundle has no classes".to_string()));
        }
        if model.feature_columns.is_empty() {
            return Err(MonitorError::ModelBundle(
                "bundle has no feature columns".to_string(),
            ));
        }
        if !(model.temperature.is_finite() && model.temperature > 0.0) {
            return Err(MonitorError::ModelBundle(
                "temperature must be positive".to_string(),
            ));
        }
        if let Some((name, _)) = model
            .scales
            .iter()
            .find(|(_, scale)| !(scale.is_finite() && **scale > 0.0))
        {
            return Err(MonitorError::ModelBundle(format!(
                "scale for '{}' must be positive",
                name
            )));
        }

        let mut seen = HashSet::new();
        for class in &model.classes {
            if !seen.insert(class.label.as_str()) {
                return Err(MonitorError::ModelBundle(format!(
                    "duplicate class '{}'",
                    class.label
                )));
            }
        }

        let labels = model.classes.iter().map(|c| c.label.clone()).collect();
        Ok(Self { labels, model })
    }

    /// Scaled distance from a record to one prototype; missing values are skipped
    fn distance(&self, record: &FeatureRecord, prototype: &HashMap<String, FeatureValue>) -> f64 {
        let mut sum = 0.0;
        for (name, value) in record.fields() {
            let Some(reference) = prototype.get(name) else {
                continue;
            };
            match (value, reference) {
                (FeatureValue::Number(x), FeatureValue::Number(p)) => {
                    let scale = self.model.scales.get(name).copied().unwrap_or(1.0);
                    let diff = (x - p) / scale;
                    sum += diff * diff;
                }
                (FeatureValue::Category(x), FeatureValue::Category(p)) => {
                    if x != p {
                        sum += 1.0;
                    }
                }
                _ => {}
            }
        }
        sum.sqrt()
    }
}

impl Classifier for PrototypeClassifier {
    fn classes(&self) -> &[String] {
        &self.labels
    }

    fn classify(&self, record: &FeatureRecord) -> Result<ClassifiedResult, MonitorError> {
        let scores: Vec<f64> = self
            .model
            .classes
            .iter()
            .map(|class| -self.distance(record, &class.prototype) / self.model.temperature)
            .collect();

        // Shift by the max score so exp() cannot overflow
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let total: f64 = weights.iter().sum();

        if !(total.is_finite() && total > 0.0) {
            return Err(MonitorError::Classifier(
                "probabilities could not be normalized".to_string(),
            ));
        }

        ClassifiedResult::from_pairs(
            self.labels
                .iter()
                .zip(weights)
                .map(|(label, w)| (label.clone(), w / total)),
        )
        .ok_or_else(|| MonitorError::Classifier("no classes to rank".to_string()))
    }
}
