//! Monitor loop
//!
//! This module drives the real-time state machine:
//! 1. `Watching` - read one line at a time, track the recent window and the
//!    abnormal streak
//! 2. `Questionnaire` - on trigger, ask the symptom questions, assemble the
//!    feature record, classify it and report the top-ranked conditions
//!
//! The loop runs until its [`CancellationToken`] is cancelled. The device
//! transport is owned by the [`StreamReader`] passed in and is closed exactly
//! once however the loop exits.

use crate::classifier::ClassifierBundle;
use crate::config::MonitorConfig;
use crate::detector::{AbnormalityDetector, Trigger};
use crate::error::MonitorError;
use crate::features::{FeatureAssembler, RawInputs};
use crate::questionnaire::{Presenter, Questionnaire};
use crate::report::DiagnosisReport;
use crate::stream::{LineTransport, ReaderStats, StreamReader};
use crate::types::{Reading, StreakState};
use crate::window::RecentWindow;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of cancellation checks while pausing
const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// Shared flag used to stop a running monitor
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Monitor state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Watching,
    Questionnaire,
}

/// Counters for one monitoring run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    /// Valid readings processed
    pub readings: u64,
    /// Abnormal readings among them
    pub abnormal_readings: u64,
    /// Triggers fired
    pub triggers: u64,
    /// Questionnaire cycles that produced a report
    pub reports: u64,
    /// Questionnaire cycles aborted by a classifier failure
    pub failed_cycles: u64,
    /// Line-level counters from the stream reader
    pub reader: ReaderStats,
}

/// Real-time heart-rate monitor
pub struct Monitor<'a> {
    config: MonitorConfig,
    detector: AbnormalityDetector,
    bundle: &'a ClassifierBundle,
    streak: StreakState,
    window: RecentWindow,
    state: MonitorState,
    stats: MonitorStats,
}

impl<'a> Monitor<'a> {
    /// Create a monitor using a loaded classifier bundle
    pub fn new(config: MonitorConfig, bundle: &'a ClassifierBundle) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self {
            detector: config.detector(),
            window: RecentWindow::new(config.recent_window_size),
            config,
            bundle,
            streak: StreakState::default(),
            state: MonitorState::Watching,
            stats: MonitorStats::default(),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn detector(&self) -> &AbnormalityDetector {
        &self.detector
    }

    pub fn streak(&self) -> StreakState {
        self.streak
    }

    pub fn window(&self) -> &RecentWindow {
        &self.window
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// Process one valid reading while watching.
    ///
    /// Returns the trigger when this reading completes an abnormal streak. The
    /// streak is already reset when the trigger is returned, and the monitor
    /// enters [`MonitorState::Questionnaire`].
    pub fn observe(&mut self, reading: Reading) -> Option<Trigger> {
        self.window.push(reading.bpm);
        self.stats.readings += 1;
        if self.detector.is_abnormal(reading.bpm) {
            self.stats.abnormal_readings += 1;
        }

        let (streak, trigger) = self.detector.observe(self.streak, reading);
        self.streak = streak;

        if let Some(trigger) = &trigger {
            self.stats.triggers += 1;
            self.state = MonitorState::Questionnaire;
            log::info!(
                "Abnormal heart rate: {:.0} bpm after {} consecutive readings",
                trigger.reading.bpm,
                trigger.streak_length
            );
        }
        trigger
    }

    /// Coerce answers, assemble them in the bundle's order and classify
    pub fn diagnose(&self, trigger: &Trigger, raw: &RawInputs) -> Result<DiagnosisReport, MonitorError> {
        let record = FeatureAssembler::from_raw(raw, Some(self.bundle.feature_order()));
        if record.missing_count() > 0 {
            log::debug!("{} features missing after coercion", record.missing_count());
        }

        let result = self.bundle.classify(&record).map_err(|e| match e {
            MonitorError::SchemaMismatch(_) | MonitorError::Classifier(_) => e,
            other => MonitorError::Classifier(other.to_string()),
        })?;

        Ok(DiagnosisReport::new(
            trigger,
            &self.detector,
            &self.window,
            record,
            &result,
            self.config.top_k,
        ))
    }

    /// Run the questionnaire for a fired trigger and return to watching
    pub fn run_questionnaire(
        &mut self,
        trigger: &Trigger,
        presenter: &mut dyn Presenter,
    ) -> Result<DiagnosisReport, MonitorError> {
        self.state = MonitorState::Questionnaire;
        presenter.show_alert(trigger, &self.detector);

        let outcome = Questionnaire::collect(presenter).and_then(|raw| self.diagnose(trigger, &raw));

        self.streak = StreakState::reset();
        self.state = MonitorState::Watching;

        match &outcome {
            Ok(report) => {
                self.stats.reports += 1;
                log::info!("Most likely condition: {}", report.label);
            }
            Err(e) if !e.is_fatal() => self.stats.failed_cycles += 1,
            Err(_) => {}
        }
        outcome
    }

    /// Monitor the stream until cancelled.
    ///
    /// Consumes the reader so its transport is released when the run ends.
    /// Cancellation (including the operator leaving mid-questionnaire) ends the
    /// run cleanly; a lost transport is returned as an error.
    pub fn run<T: LineTransport>(
        &mut self,
        mut reader: StreamReader<T>,
        presenter: &mut dyn Presenter,
        cancel: &CancellationToken,
    ) -> Result<MonitorStats, MonitorError> {
        let outcome = self.watch(&mut reader, presenter, cancel);
        self.stats.reader = reader.stats();
        reader.close();

        match outcome {
            Ok(()) | Err(MonitorError::Cancelled) => {
                log::info!("Monitoring stopped after {} readings", self.stats.readings);
                Ok(self.stats)
            }
            Err(e) => Err(e),
        }
    }

    fn watch<T: LineTransport>(
        &mut self,
        reader: &mut StreamReader<T>,
        presenter: &mut dyn Presenter,
        cancel: &CancellationToken,
    ) -> Result<(), MonitorError> {
        while !cancel.is_cancelled() {
            let Some(reading) = reader.read_one()? else {
                continue;
            };

            let trigger = self.observe(reading);
            presenter.show_reading(&reading, &self.window);

            let Some(trigger) = trigger else {
                continue;
            };

            match self.run_questionnaire(&trigger, presenter) {
                Ok(report) => presenter.show_report(&report),
                Err(e) if !e.is_fatal() => {
                    log::warn!("Questionnaire cycle aborted: {}", e);
                    presenter.notify(&format!("Classification failed: {}", e));
                }
                Err(e) => return Err(e),
            }

            presenter.notify("Monitoring resumes.");
            pause(self.config.resume_delay(), cancel);
        }
        Ok(())
    }
}

/// Sleep for `delay`, waking early if cancelled
fn pause(delay: Duration, cancel: &CancellationToken) {
    let deadline = Instant::now() + delay;
    while !cancel.is_cancelled() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(PAUSE_SLICE.min(deadline - now));
    }
}
