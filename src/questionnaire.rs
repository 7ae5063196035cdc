//! Symptom questionnaire
//!
//! The fixed list of questions asked when the monitor triggers, and the
//! [`Presenter`] trait through which a front end (terminal, GUI, test script)
//! answers them and receives results.

use crate::detector::{AbnormalityDetector, Trigger};
use crate::error::MonitorError;
use crate::features::RawInputs;
use crate::monitor::CancellationToken;
use crate::normalizer::coerce_yes_no;
use crate::report::DiagnosisReport;
use crate::types::{RawValue, Reading};
use crate::window::RecentWindow;
use std::io::{BufRead, ErrorKind};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Attempts allowed for a yes/no question before its default is used
pub const MAX_PROMPT_ATTEMPTS: usize = 3;

/// Which input a prompt fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptField {
    Fever,
    Cough,
    Fatigue,
    DifficultyBreathing,
    Age,
    Gender,
    BloodPressure,
    Cholesterol,
}

/// How an answer is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    YesNo,
    Text,
}

/// One questionnaire question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prompt {
    pub field: PromptField,
    pub question: &'static str,
    pub kind: PromptKind,
    /// Answer used when the operator just presses enter
    pub default: &'static str,
}

/// Questions in the order they are asked
pub const PROMPTS: [Prompt; 8] = [
    Prompt {
        field: PromptField::Fever,
        question: "Fever",
        kind: PromptKind::YesNo,
        default: "n",
    },
    Prompt {
        field: PromptField::Cough,
        question: "Cough",
        kind: PromptKind::YesNo,
        default: "n",
    },
    Prompt {
        field: PromptField::Fatigue,
        question: "Fatigue",
        kind: PromptKind::YesNo,
        default: "n",
    },
    Prompt {
        field: PromptField::DifficultyBreathing,
        question: "Difficulty Breathing",
        kind: PromptKind::YesNo,
        default: "n",
    },
    Prompt {
        field: PromptField::Age,
        question: "Age in years",
        kind: PromptKind::Text,
        default: "35",
    },
    Prompt {
        field: PromptField::Gender,
        question: "Gender (M/F)",
        kind: PromptKind::Text,
        default: "M",
    },
    Prompt {
        field: PromptField::BloodPressure,
        question: "Blood Pressure (e.g., 120/80 or 120)",
        kind: PromptKind::Text,
        default: "120/80",
    },
    Prompt {
        field: PromptField::Cholesterol,
        question: "Cholesterol Level (mg/dL or low/normal/high)",
        kind: PromptKind::Text,
        default: "normal",
    },
];

/// Front end that answers questions and displays monitor output
pub trait Presenter {
    /// Ask one question.
    ///
    /// `Ok(None)` means the operator is gone (e.g. end of input) and stops the run.
    fn ask(&mut self, prompt: &Prompt) -> Result<Option<String>, MonitorError>;

    /// Show a short status or validation message
    fn notify(&mut self, message: &str);

    /// Show the latest reading
    fn show_reading(&mut self, _reading: &Reading, _window: &RecentWindow) {}

    /// Announce that the abnormal streak fired
    fn show_alert(&mut self, trigger: &Trigger, detector: &AbnormalityDetector);

    /// Show a finished diagnosis
    fn show_report(&mut self, report: &DiagnosisReport);
}

/// Collector running [`PROMPTS`] against a presenter
pub struct Questionnaire;

impl Questionnaire {
    /// Ask every question in order and gather the raw answers
    pub fn collect(presenter: &mut dyn Presenter) -> Result<RawInputs, MonitorError> {
        let mut inputs = RawInputs::default();
        for prompt in &PROMPTS {
            let answer = Self::ask_one(presenter, prompt)?;
            let value = RawValue::Text(answer);
            match prompt.field {
                PromptField::Fever => inputs.fever = value,
                PromptField::Cough => inputs.cough = value,
                PromptField::Fatigue => inputs.fatigue = value,
                PromptField::DifficultyBreathing => inputs.difficulty_breathing = value,
                PromptField::Age => inputs.age = value,
                PromptField::Gender => inputs.gender = value,
                PromptField::BloodPressure => inputs.blood_pressure = value,
                PromptField::Cholesterol => inputs.cholesterol = value,
            }
        }
        Ok(inputs)
    }

    fn ask_one(presenter: &mut dyn Presenter, prompt: &Prompt) -> Result<String, MonitorError> {
        for _ in 0..MAX_PROMPT_ATTEMPTS {
            let answer = presenter.ask(prompt)?.ok_or(MonitorError::Cancelled)?;
            let answer = answer.trim();

            if answer.is_empty() {
                return Ok(prompt.default.to_string());
            }
            match prompt.kind {
                PromptKind::Text => return Ok(answer.to_string()),
                PromptKind::YesNo => {
                    if coerce_yes_no(&RawValue::text(answer)).is_some() {
                        return Ok(answer.to_string());
                    }
                    presenter.notify("Please enter 'y' or 'n'.");
                }
            }
        }

        presenter.notify(&format!(
            "Using default '{}' for {}.",
            prompt.default, prompt.question
        ));
        Ok(prompt.default.to_string())
    }
}

/// Answer lines read on a helper thread.
///
/// Waiting for an answer never blocks past one poll interval, so a cancelled
/// run leaves the questionnaire without the operator pressing enter.
pub struct AnswerLines {
    lines: Receiver<String>,
}

impl AnswerLines {
    /// Start reading lines from `source` (usually stdin)
    pub fn spawn<R>(mut source: R) -> Result<Self, MonitorError>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("pulsewatch-answers".to_string())
            .spawn(move || loop {
                let mut line = String::new();
                match source.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        log::warn!("Cannot read answer: {}", e);
                        break;
                    }
                }
            })?;
        Ok(Self { lines: rx })
    }

    /// Wait for the next line, checking `cancel` every `poll`.
    ///
    /// Returns `Ok(None)` once the source is exhausted and
    /// [`MonitorError::Cancelled`] as soon as the token is cancelled.
    pub fn next_answer(
        &self,
        cancel: &CancellationToken,
        poll: Duration,
    ) -> Result<Option<String>, MonitorError> {
        loop {
            if cancel.is_cancelled() {
                return Err(MonitorError::Cancelled);
            }
            match self.lines.recv_timeout(poll) {
                Ok(line) => return Ok(Some(line)),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }
}
