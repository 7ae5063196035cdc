//! Feature assembly
//!
//! This module turns coerced questionnaire values into the ordered feature
//! record a classifier expects:
//! - Symptom flags become 0/1 numbers
//! - Gender becomes a category label
//! - Unknown values and unrecognized columns become `Missing`

use crate::normalizer::{
    coerce_blood_pressure, coerce_cholesterol, coerce_gender, coerce_numeric, coerce_yes_no,
};
use crate::types::{FeatureName, FeatureRecord, FeatureValue, Gender, RawValue};
use serde::{Deserialize, Serialize};

/// Raw questionnaire values before coercion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawInputs {
    pub age: RawValue,
    pub gender: RawValue,
    pub fever: RawValue,
    pub cough: RawValue,
    pub fatigue: RawValue,
    pub difficulty_breathing: RawValue,
    /// Either `"120/80"` text, a `[sys, dia]` pair, or a bare systolic number
    pub blood_pressure: RawValue,
    pub cholesterol: RawValue,
}

/// Typed values after coercion; `None` means unknown
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoercedInputs {
    pub age: Option<f64>,
    pub gender: Option<Gender>,
    pub fever: Option<bool>,
    pub cough: Option<bool>,
    pub fatigue: Option<bool>,
    pub difficulty_breathing: Option<bool>,
    pub systolic_bp: Option<f64>,
    pub diastolic_bp: Option<f64>,
    pub cholesterol: Option<f64>,
}

impl CoercedInputs {
    /// Run every coercer over the raw inputs
    pub fn from_raw(raw: &RawInputs) -> Self {
        let (systolic_bp, diastolic_bp) = coerce_blood_pressure(&raw.blood_pressure);

        Self {
            age: coerce_numeric(&raw.age),
            gender: coerce_gender(&raw.gender),
            fever: coerce_yes_no(&raw.fever),
            cough: coerce_yes_no(&raw.cough),
            fatigue: coerce_yes_no(&raw.fatigue),
            difficulty_breathing: coerce_yes_no(&raw.difficulty_breathing),
            systolic_bp,
            diastolic_bp,
            cholesterol: coerce_cholesterol(&raw.cholesterol),
        }
    }

    fn value_of(&self, name: FeatureName) -> FeatureValue {
        match name {
            FeatureName::Age => self.age.into(),
            FeatureName::Gender => self.gender.into(),
            FeatureName::Fever => self.fever.into(),
            FeatureName::Cough => self.cough.into(),
            FeatureName::Fatigue => self.fatigue.into(),
            FeatureName::DifficultyBreathing => self.difficulty_breathing.into(),
            FeatureName::SystolicBp => self.systolic_bp.into(),
            FeatureName::DiastolicBp => self.diastolic_bp.into(),
            FeatureName::CholesterolLevel => self.cholesterol.into(),
        }
    }
}

/// Assembler for building classifier feature records
pub struct FeatureAssembler;

impl FeatureAssembler {
    /// Assemble a record whose field sequence equals `order`.
    ///
    /// Without an order the canonical [`FeatureName::DEFAULT_ORDER`] is used.
    pub fn assemble(inputs: &CoercedInputs, order: Option<&[String]>) -> FeatureRecord {
        let fields = match order {
            Some(order) => order
                .iter()
                .map(|label| {
                    let value = FeatureName::from_label(label)
                        .map(|name| inputs.value_of(name))
                        .unwrap_or(FeatureValue::Missing);
                    (label.clone(), value)
                })
                .collect(),
            None => FeatureName::DEFAULT_ORDER
                .iter()
                .map(|name| (name.as_str().to_string(), inputs.value_of(*name)))
                .collect(),
        };

        FeatureRecord::from_fields(fields)
    }

    /// Coerce raw inputs and assemble them in one step
    pub fn from_raw(raw: &RawInputs, order: Option<&[String]>) -> FeatureRecord {
        Self::assemble(&CoercedInputs::from_raw(raw), order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_raw() -> RawInputs {
        RawInputs {
            age: RawValue::text("42"),
            gender: RawValue::text("f"),
            fever: RawValue::text("y"),
            cough: RawValue::text("n"),
            fatigue: RawValue::Bool(true),
            difficulty_breathing: RawValue::Number(0.0),
            blood_pressure: RawValue::text("130/85"),
            cholesterol: RawValue::text("high"),
        }
    }

    fn order(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_order() {
        let record = FeatureAssembler::from_raw(&sample_raw(), None);
        let names: Vec<&str> = record.names().collect();

        assert_eq!(
            names,
            vec![
                "Age",
                "Gender",
                "Fever",
                "Cough",
                "Fatigue",
                "Difficulty Breathing",
                "SystolicBP",
                "DiastolicBP",
                "Cholesterol Level",
            ]
        );
        assert_eq!(record.get("Age"), Some(&FeatureValue::Number(42.0)));
        assert_eq!(
            record.get("Gender"),
            Some(&FeatureValue::Category("Female".to_string()))
        );
        assert_eq!(record.get("Fever"), Some(&FeatureValue::Number(1.0)));
        assert_eq!(record.get("Cough"), Some(&FeatureValue::Number(0.0)));
        assert_eq!(record.get("SystolicBP"), Some(&FeatureValue::Number(130.0)));
        assert_eq!(record.get("DiastolicBP"), Some(&FeatureValue::Number(85.0)));
        assert_eq!(
            record.get("Cholesterol Level"),
            Some(&FeatureValue::Number(240.0))
        );
        assert_eq!(record.missing_count(), 0);
    }

    #[test]
    fn test_supplied_order_is_followed_exactly() {
        let order = order(&["Cholesterol Level", "Fever", "Gender", "Age"]);
        let record = FeatureAssembler::from_raw(&sample_raw(), Some(&order));
        let names: Vec<&str> = record.names().collect();

        assert_eq!(names, vec!["Cholesterol Level", "Fever", "Gender", "Age"]);
        assert_eq!(record.len(), 4);
    }

    #[test]
    fn test_order_holds_for_any_subset_of_inputs() {
        let order = FeatureName::default_order();
        let partial = RawInputs {
            age: RawValue::text("60"),
            ..Default::default()
        };

        for raw in [RawInputs::default(), partial, sample_raw()] {
            let record = FeatureAssembler::from_raw(&raw, Some(&order));
            let names: Vec<String> = record.names().map(str::to_string).collect();
            assert_eq!(names, order);
        }
    }

    #[test]
    fn test_missing_and_unknown_columns() {
        let order = order(&["DifficultyBreathing", "heart_rate", "systolic_bp"]);
        let raw = RawInputs {
            difficulty_breathing: RawValue::text("yes"),
            blood_pressure: RawValue::text("garbage"),
            ..Default::default()
        };
        let record = FeatureAssembler::from_raw(&raw, Some(&order));

        assert_eq!(
            record.get("DifficultyBreathing"),
            Some(&FeatureValue::Number(1.0))
        );
        assert_eq!(record.get("heart_rate"), Some(&FeatureValue::Missing));
        assert_eq!(record.get("systolic_bp"), Some(&FeatureValue::Missing));
        assert_eq!(record.missing_count(), 2);
    }

    #[test]
    fn test_record_serializes_in_order() {
        let order = order(&["Gender", "Age"]);
        let raw = RawInputs {
            gender: RawValue::text("m"),
            ..Default::default()
        };
        let record = FeatureAssembler::from_raw(&raw, Some(&order));
        let json = serde_json::to_string(&record).unwrap();

        assert_eq!(json, r#"{"Gender":"Male","Age":null}"#);
    }
}
