//! Core types for the Pulsewatch monitor
//!
//! This module defines the data structures that flow through each stage of the
//! monitor: raw boundary values, readings, streak state, feature records, and
//! classification output.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Raw value as supplied by a presentation layer or dataset row.
///
/// Coercers pattern-match on the tag instead of guessing at the input type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Pair(f64, f64),
    #[default]
    Missing,
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        RawValue::Text(value.into())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawValue::Missing)
    }
}

/// A single heart-rate sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Beats per minute
    pub bpm: f64,
    /// When the line carrying this reading arrived
    pub received_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm,
            received_at: Utc::now(),
        }
    }
}

/// Count of consecutive abnormal readings since the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreakState {
    count: u32,
}

impl StreakState {
    pub fn new(count: u32) -> Self {
        Self { count }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Streak extended by one abnormal reading
    pub fn extended(self) -> Self {
        Self {
            count: self.count.saturating_add(1),
        }
    }

    /// Streak after a normal reading or a fired trigger
    pub fn reset() -> Self {
        Self::default()
    }
}

/// Biological sex as accepted by the classifier schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

/// Features the assembler knows how to fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureName {
    Age,
    Gender,
    Fever,
    Cough,
    Fatigue,
    DifficultyBreathing,
    SystolicBp,
    DiastolicBp,
    CholesterolLevel,
}

impl FeatureName {
    /// Canonical order used when the classifier does not export one
    pub const DEFAULT_ORDER: [FeatureName; 9] = [
        FeatureName::Age,
        FeatureName::Gender,
        FeatureName::Fever,
        FeatureName::Cough,
        FeatureName::Fatigue,
        FeatureName::DifficultyBreathing,
        FeatureName::SystolicBp,
        FeatureName::DiastolicBp,
        FeatureName::CholesterolLevel,
    ];

    /// Column label used by exported feature orders
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::Age => "Age",
            FeatureName::Gender => "Gender",
            FeatureName::Fever => "Fever",
            FeatureName::Cough => "Cough",
            FeatureName::Fatigue => "Fatigue",
            FeatureName::DifficultyBreathing => "Difficulty Breathing",
            FeatureName::SystolicBp => "SystolicBP",
            FeatureName::DiastolicBp => "DiastolicBP",
            FeatureName::CholesterolLevel => "Cholesterol Level",
        }
    }

    /// Resolve a column label, ignoring case, spaces, underscores and dashes
    pub fn from_label(label: &str) -> Option<Self> {
        let key: String = label
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "age" => Some(FeatureName::Age),
            "gender" | "sex" => Some(FeatureName::Gender),
            "fever" => Some(FeatureName::Fever),
            "cough" => Some(FeatureName::Cough),
            "fatigue" => Some(FeatureName::Fatigue),
            "difficultybreathing" => Some(FeatureName::DifficultyBreathing),
            "systolicbp" => Some(FeatureName::SystolicBp),
            "diastolicbp" => Some(FeatureName::DiastolicBp),
            "cholesterollevel" | "cholesterol" => Some(FeatureName::CholesterolLevel),
            _ => None,
        }
    }

    /// Default order as owned column labels
    pub fn default_order() -> Vec<String> {
        Self::DEFAULT_ORDER
            .iter()
            .map(|name| name.as_str().to_string())
            .collect()
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coerced scalar ready for the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Category(String),
    Missing,
}

impl FeatureValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FeatureValue::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            FeatureValue::Category(c) => Some(c.as_str()),
            _ => None,
        }
    }
}

impl From<Option<f64>> for FeatureValue {
    fn from(value: Option<f64>) -> Self {
        value.map(FeatureValue::Number).unwrap_or(FeatureValue::Missing)
    }
}

impl From<Option<bool>> for FeatureValue {
    fn from(value: Option<bool>) -> Self {
        value
            .map(|flag| FeatureValue::Number(if flag { 1.0 } else { 0.0 }))
            .unwrap_or(FeatureValue::Missing)
    }
}

impl From<Option<Gender>> for FeatureValue {
    fn from(value: Option<Gender>) -> Self {
        value
            .map(|g| FeatureValue::Category(g.as_str().to_string()))
            .unwrap_or(FeatureValue::Missing)
    }
}

/// Ordered feature vector handed to a classifier.
///
/// Serializes as a JSON object whose keys follow the record order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    fields: Vec<(String, FeatureValue)>,
}

impl FeatureRecord {
    pub(crate) fn from_fields(fields: Vec<(String, FeatureValue)>) -> Self {
        Self { fields }
    }

    /// Field names in record order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn fields(&self) -> &[(String, FeatureValue)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields that ended up missing
    pub fn missing_count(&self) -> usize {
        self.fields.iter().filter(|(_, v)| v.is_missing()).count()
    }
}

impl Serialize for FeatureRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One class and its predicted probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: String,
    pub probability: f64,
}

/// Classifier output: best label plus the full ranking, highest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedResult {
    pub label: String,
    pub ranked: Vec<ClassProbability>,
}

impl ClassifiedResult {
    /// Build a result from unsorted (class, probability) pairs.
    ///
    /// Returns `None` when no pairs are given. Ties keep their input order.
    pub fn from_pairs<I, S>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut ranked: Vec<ClassProbability> = pairs
            .into_iter()
            .map(|(label, probability)| ClassProbability {
                label: label.into(),
                probability,
            })
            .collect();

        ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        let label = ranked.first()?.label.clone();

        Some(Self { label, ranked })
    }

    /// The `k` most likely classes
    pub fn top(&self, k: usize) -> &[ClassProbability] {
        &self.ranked[..k.min(self.ranked.len())]
    }
}
