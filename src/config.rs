//! Monitor configuration
//!
//! All options carry defaults so a partial JSON file (or none at all) yields a
//! usable configuration.

use crate::detector::{
    AbnormalityDetector, DEFAULT_LOWER_BOUND, DEFAULT_STREAK_THRESHOLD, DEFAULT_UPPER_BOUND,
};
use crate::error::MonitorError;
use crate::stream::DEFAULT_BAUD_RATE;
use crate::window::DEFAULT_WINDOW_SIZE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of ranked classes shown with a diagnosis
pub const DEFAULT_TOP_K: usize = 3;

/// Tunables for the monitor loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Serial line speed of the heart-rate device
    pub baud_rate: u32,
    /// Lower bound of the normal range (bpm)
    pub lower_bound: f64,
    /// Upper bound of the normal range (bpm)
    pub upper_bound: f64,
    /// Consecutive abnormal readings needed to trigger the questionnaire
    pub abnormal_streak_threshold: u32,
    /// Longest a single read may block waiting for a line
    pub read_timeout_seconds: f64,
    /// Pause after a questionnaire before monitoring resumes
    pub resume_delay_seconds: f64,
    /// Number of recent readings kept for display
    pub recent_window_size: usize,
    /// Number of ranked classes reported
    pub top_k: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            lower_bound: DEFAULT_LOWER_BOUND,
            upper_bound: DEFAULT_UPPER_BOUND,
            abnormal_streak_threshold: DEFAULT_STREAK_THRESHOLD,
            read_timeout_seconds: 1.0,
            resume_delay_seconds: 2.0,
            recent_window_size: DEFAULT_WINDOW_SIZE,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check that every option is in range
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.baud_rate == 0 {
            return Err(MonitorError::InvalidConfig(
                "baud_rate must be positive".to_string(),
            ));
        }
        if !self.lower_bound.is_finite() || !self.upper_bound.is_finite() {
            return Err(MonitorError::InvalidConfig(
                "heart rate bounds must be finite".to_string(),
            ));
        }
        if self.lower_bound >= self.upper_bound {
            return Err(MonitorError::InvalidConfig(format!(
                "lower_bound ({}) must be below upper_bound ({})",
                self.lower_bound, self.upper_bound
            )));
        }
        if self.abnormal_streak_threshold == 0 {
            return Err(MonitorError::InvalidConfig(
                "abnormal_streak_threshold must be at least 1".to_string(),
            ));
        }
        if !(self.read_timeout_seconds.is_finite() && self.read_timeout_seconds > 0.0) {
            return Err(MonitorError::InvalidConfig(
                "read_timeout_seconds must be positive".to_string(),
            ));
        }
        if !(self.resume_delay_seconds.is_finite() && self.resume_delay_seconds >= 0.0) {
            return Err(MonitorError::InvalidConfig(
                "resume_delay_seconds must not be negative".to_string(),
            ));
        }
        if self.recent_window_size == 0 {
            return Err(MonitorError::InvalidConfig(
                "recent_window_size must be at least 1".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(MonitorError::InvalidConfig(
                "top_k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.read_timeout_seconds)
    }

    pub fn resume_delay(&self) -> Duration {
        Duration::from_secs_f64(self.resume_delay_seconds)
    }

    pub fn detector(&self) -> AbnormalityDetector {
        AbnormalityDetector::new(
            self.lower_bound,
            self.upper_bound,
            self.abnormal_streak_threshold,
        )
    }
}
