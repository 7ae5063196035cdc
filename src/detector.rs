//! Abnormal heart-rate detection
//!
//! A reading is abnormal when it falls outside `[lower, upper]`. The detector
//! counts consecutive abnormal readings and fires once the count reaches the
//! configured threshold. State lives in a [`StreakState`] value that callers
//! thread through each update.

use crate::types::{Reading, StreakState};

/// Default lower bound of normal adult resting heart rate (bpm)
pub const DEFAULT_LOWER_BOUND: f64 = 60.0;

/// Default upper bound of normal adult resting heart rate (bpm)
pub const DEFAULT_UPPER_BOUND: f64 = 100.0;

/// Default number of consecutive abnormal readings before triggering
pub const DEFAULT_STREAK_THRESHOLD: u32 = 3;

/// Whether a reading lies outside the normal range. Non-finite readings are never abnormal.
pub fn is_abnormal(bpm: f64, lower: f64, upper: f64) -> bool {
    bpm.is_finite() && (bpm < lower || bpm > upper)
}

/// Advance the streak by one reading.
///
/// Abnormal readings extend the streak, normal readings reset it, and absent
/// or non-numeric readings leave it untouched.
pub fn update(streak: StreakState, reading: Option<f64>, lower: f64, upper: f64) -> StreakState {
    match reading {
        Some(bpm) if bpm.is_finite() => {
            if is_abnormal(bpm, lower, upper) {
                streak.extended()
            } else {
                StreakState::reset()
            }
        }
        _ => streak,
    }
}

/// Whether the streak is long enough to trigger the questionnaire
pub fn should_trigger(streak: StreakState, threshold: u32) -> bool {
    streak.count() >= threshold
}

/// A fired trigger: the reading that completed the streak
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    pub reading: Reading,
    /// Streak length at the moment of firing
    pub streak_length: u32,
}

/// Range and threshold bundled for repeated use
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbnormalityDetector {
    pub lower: f64,
    pub upper: f64,
    pub threshold: u32,
}

impl Default for AbnormalityDetector {
    fn default() -> Self {
        Self {
            lower: DEFAULT_LOWER_BOUND,
            upper: DEFAULT_UPPER_BOUND,
            threshold: DEFAULT_STREAK_THRESHOLD,
        }
    }
}

impl AbnormalityDetector {
    pub fn new(lower: f64, upper: f64, threshold: u32) -> Self {
        Self {
            lower,
            upper,
            threshold,
        }
    }

    pub fn is_abnormal(&self, bpm: f64) -> bool {
        is_abnormal(bpm, self.lower, self.upper)
    }

    pub fn update(&self, streak: StreakState, reading: Option<f64>) -> StreakState {
        update(streak, reading, self.lower, self.upper)
    }

    pub fn should_trigger(&self, streak: StreakState) -> bool {
        should_trigger(streak, self.threshold)
    }

    /// Feed one reading and fire if the threshold is reached.
    ///
    /// Returns the next streak and the trigger, if any. A fired trigger always
    /// comes with a reset streak, so the same run can never fire twice.
    pub fn observe(&self, streak: StreakState, reading: Reading) -> (StreakState, Option<Trigger>) {
        let next = self.update(streak, Some(reading.bpm));
        if self.should_trigger(next) {
            let trigger = Trigger {
                reading,
                streak_length: next.count(),
            };
            (StreakState::reset(), Some(trigger))
        } else {
            (next, None)
        }
    }
}
