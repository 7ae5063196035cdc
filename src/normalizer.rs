//! Value coercion
//!
//! This module normalizes raw questionnaire and device values into typed
//! scalars. Every coercer is total: malformed input yields `None` ("unknown")
//! and never an error.
//! - Yes/no answers to booleans
//! - Free-text numbers to `f64`
//! - Blood pressure text to a systolic/diastolic pair
//! - Gender and cholesterol labels to their canonical forms

use crate::types::{Gender, RawValue};
use once_cell::sync::Lazy;
use regex::Regex;

/// Cholesterol label → representative mg/dL value
const CHOLESTEROL_LEVELS: [(&str, f64); 3] = [("low", 150.0), ("normal", 200.0), ("high", 240.0)];

static BLOOD_PRESSURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2,3})\s*/\s*(\d{2,3})$").expect("valid blood pressure pattern"));

/// Coerce a yes/no answer
pub fn coerce_yes_no(value: &RawValue) -> Option<bool> {
    match value {
        RawValue::Bool(flag) => Some(*flag),
        RawValue::Number(n) if *n == 0.0 => Some(false),
        RawValue::Number(n) if *n == 1.0 => Some(true),
        RawValue::Text(text) => match text.trim().to_lowercase().as_str() {
            "y" | "yes" | "true" | "1" => Some(true),
            "n" | "no" | "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Coerce a number, parsing trimmed text as floating point
pub fn coerce_numeric(value: &RawValue) -> Option<f64> {
    match value {
        RawValue::Number(n) => finite(*n),
        RawValue::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        RawValue::Text(text) => parse_number(text),
        RawValue::Pair(..) | RawValue::Missing => None,
    }
}

/// Coerce a blood pressure reading into `(systolic, diastolic)`.
///
/// `"120/80"` gives both values; a bare number is taken as systolic only.
pub fn coerce_blood_pressure(value: &RawValue) -> (Option<f64>, Option<f64>) {
    match value {
        RawValue::Pair(systolic, diastolic) => (finite(*systolic), finite(*diastolic)),
        RawValue::Text(text) => {
            let text = text.trim();
            if let Some(caps) = BLOOD_PRESSURE.captures(text) {
                let systolic = caps.get(1).and_then(|m| parse_number(m.as_str()));
                let diastolic = caps.get(2).and_then(|m| parse_number(m.as_str()));
                return (systolic, diastolic);
            }
            (parse_number(text), None)
        }
        RawValue::Number(n) => (finite(*n), None),
        RawValue::Bool(_) | RawValue::Missing => (None, None),
    }
}

/// Coerce a gender label
pub fn coerce_gender(value: &RawValue) -> Option<Gender> {
    match value {
        RawValue::Text(text) => match text.trim().to_lowercase().as_str() {
            "male" | "m" => Some(Gender::Male),
            "female" | "f" => Some(Gender::Female),
            _ => None,
        },
        _ => None,
    }
}

/// Coerce a cholesterol level given in mg/dL or as low/normal/high
pub fn coerce_cholesterol(value: &RawValue) -> Option<f64> {
    match value {
        RawValue::Number(n) => finite(*n),
        RawValue::Text(text) => {
            let key = text.trim().to_lowercase();
            CHOLESTEROL_LEVELS
                .iter()
                .find(|(label, _)| *label == key)
                .map(|(_, level)| *level)
                .or_else(|| parse_number(&key))
        }
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().and_then(finite)
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yes_no_accepts_common_spellings() {
        for text in ["y", "YES", " true ", "1"] {
            assert_eq!(coerce_yes_no(&RawValue::text(text)), Some(true), "{text}");
        }
        for text in ["n", "No", "FALSE", "0"] {
            assert_eq!(coerce_yes_no(&RawValue::text(text)), Some(false), "{text}");
        }
        assert_eq!(coerce_yes_no(&RawValue::Bool(true)), Some(true));
        assert_eq!(coerce_yes_no(&RawValue::Number(0.0)), Some(false));
        assert_eq!(coerce_yes_no(&RawValue::Number(1.0)), Some(true));
    }

    #[test]
    fn test_yes_no_unknown_inputs() {
        assert_eq!(coerce_yes_no(&RawValue::Missing), None);
        assert_eq!(coerce_yes_no(&RawValue::text("")), None);
        assert_eq!(coerce_yes_no(&RawValue::text("maybe")), None);
        assert_eq!(coerce_yes_no(&RawValue::Number(f64::NAN)), None);
        assert_eq!(coerce_yes_no(&RawValue::Number(2.0)), None);
        assert_eq!(coerce_yes_no(&RawValue::Pair(1.0, 0.0)), None);
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(coerce_numeric(&RawValue::Number(42.0)), Some(42.0));
        assert_eq!(coerce_numeric(&RawValue::text(" 35 ")), Some(35.0));
        assert_eq!(coerce_numeric(&RawValue::text("36.6")), Some(36.6));
        assert_eq!(coerce_numeric(&RawValue::text("")), None);
        assert_eq!(coerce_numeric(&RawValue::text("   ")), None);
        assert_eq!(coerce_numeric(&RawValue::text("thirty")), None);
        assert_eq!(coerce_numeric(&RawValue::text("inf")), None);
        assert_eq!(coerce_numeric(&RawValue::Missing), None);
    }

    #[test]
    fn test_blood_pressure_pairs() {
        assert_eq!(
            coerce_blood_pressure(&RawValue::text("120/80")),
            (Some(120.0), Some(80.0))
        );
        assert_eq!(
            coerce_blood_pressure(&RawValue::text(" 135 / 95 ")),
            (Some(135.0), Some(95.0))
        );
        assert_eq!(
            coerce_blood_pressure(&RawValue::Pair(118.0, 76.0)),
            (Some(118.0), Some(76.0))
        );
    }

    #[test]
    fn test_blood_pressure_partial_and_garbage() {
        assert_eq!(coerce_blood_pressure(&RawValue::text("120")), (Some(120.0), None));
        assert_eq!(coerce_blood_pressure(&RawValue::Number(110.0)), (Some(110.0), None));
        assert_eq!(coerce_blood_pressure(&RawValue::text("abc")), (None, None));
        assert_eq!(coerce_blood_pressure(&RawValue::text("1200/80")), (None, None));
        assert_eq!(coerce_blood_pressure(&RawValue::text("")), (None, None));
        assert_eq!(coerce_blood_pressure(&RawValue::Missing), (None, None));
    }

    #[test]
    fn test_gender_coercion() {
        assert_eq!(coerce_gender(&RawValue::text("M")), Some(Gender::Male));
        assert_eq!(coerce_gender(&RawValue::text("male")), Some(Gender::Male));
        assert_eq!(coerce_gender(&RawValue::text(" Female ")), Some(Gender::Female));
        assert_eq!(coerce_gender(&RawValue::text("f")), Some(Gender::Female));
        assert_eq!(coerce_gender(&RawValue::text("other")), None);
        assert_eq!(coerce_gender(&RawValue::Number(1.0)), None);
        assert_eq!(coerce_gender(&RawValue::Missing), None);
    }

    #[test]
    fn test_cholesterol_coercion() {
        assert_eq!(coerce_cholesterol(&RawValue::text("normal")), Some(200.0));
        assert_eq!(coerce_cholesterol(&RawValue::text("HIGH")), Some(240.0));
        assert_eq!(coerce_cholesterol(&RawValue::text("Low")), Some(150.0));
        assert_eq!(coerce_cholesterol(&RawValue::text("210")), Some(210.0));
        assert_eq!(coerce_cholesterol(&RawValue::Number(185.0)), Some(185.0));
        assert_eq!(coerce_cholesterol(&RawValue::text("xyz")), None);
        assert_eq!(coerce_cholesterol(&RawValue::Number(f64::NAN)), None);
        assert_eq!(coerce_cholesterol(&RawValue::Missing), None);
    }
}
