//! Pulsewatch CLI - Command-line interface for Pulsewatch
//!
//! Commands:
//! - monitor: Watch a heart-rate device and run the questionnaire on trigger
//! - predict: Classify one set of questionnaire answers given as flags
//! - doctor: Diagnose device, model bundle and configuration
//! - prompts: Print the questionnaire

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use pulsewatch::detector::AbnormalityDetector;
use pulsewatch::questionnaire::PromptKind;
use pulsewatch::report::SAFETY_NOTICE;
use pulsewatch::stream::{autodetect_device_port, DEFAULT_BAUD_RATE};
use pulsewatch::window::RecentWindow;
use pulsewatch::{
    AnswerLines, CancellationToken, ClassifierBundle, DiagnosisReport, FeatureAssembler, Monitor,
    MonitorConfig, MonitorError, Presenter, Prompt, RawInputs, RawValue, Reading,
    SerialLineTransport, StreamReader, Trigger, PRODUCER_NAME, PROMPTS, PULSEWATCH_VERSION,
};

/// How often a pending answer checks for Ctrl+C
const ANSWER_POLL: Duration = Duration::from_millis(100);

/// Pulsewatch - Real-time heart-rate monitor and symptom classifier
#[derive(Parser)]
#[command(name = "pulsewatch")]
#[command(version = PULSEWATCH_VERSION)]
#[command(about = "Monitor heart rate and rank likely conditions on sustained abnormal readings", long_about = None)]
struct Cli {
    /// Log more detail (repeat for trace output)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a heart-rate device (streaming mode)
    Monitor {
        /// Device path, e.g. /dev/ttyACM0. Autodetected if omitted
        #[arg(short, long)]
        port: Option<PathBuf>,

        /// Serial baud rate (default 115200)
        #[arg(long)]
        baud: Option<u32>,

        /// Classifier bundle (JSON)
        #[arg(short, long, default_value = "models/disease_model.json")]
        model: PathBuf,

        /// Monitor configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Lower bound of normal heart rate (bpm)
        #[arg(long)]
        lower: Option<f64>,

        /// Upper bound of normal heart rate (bpm)
        #[arg(long)]
        upper: Option<f64>,

        /// Consecutive abnormal readings that trigger the questionnaire
        #[arg(long)]
        abnormal_count: Option<u32>,

        /// Read timeout in seconds
        #[arg(long)]
        timeout: Option<f64>,

        /// Pause after a questionnaire, in seconds
        #[arg(long)]
        resume_delay: Option<f64>,

        /// Emit diagnosis reports as JSON lines on stdout
        #[arg(long)]
        json: bool,
    },

    /// Classify one set of answers (form mode)
    Predict {
        /// Classifier bundle (JSON)
        #[arg(short, long, default_value = "models/disease_model.json")]
        model: PathBuf,

        /// Age in years
        #[arg(long)]
        age: Option<String>,

        /// Gender (M/F)
        #[arg(long)]
        gender: Option<String>,

        /// Fever (y/n)
        #[arg(long)]
        fever: Option<String>,

        /// Cough (y/n)
        #[arg(long)]
        cough: Option<String>,

        /// Fatigue (y/n)
        #[arg(long)]
        fatigue: Option<String>,

        /// Difficulty breathing (y/n)
        #[arg(long)]
        difficulty_breathing: Option<String>,

        /// Blood pressure, e.g. 120/80 or 120
        #[arg(long)]
        bp: Option<String>,

        /// Cholesterol in mg/dL or low/normal/high
        #[arg(long)]
        cholesterol: Option<String>,

        /// Number of ranked classes to show
        #[arg(long, default_value = "3")]
        top: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose device, model bundle and configuration
    Doctor {
        /// Device path to check. Autodetected if omitted
        #[arg(short, long)]
        port: Option<PathBuf>,

        /// Serial baud rate to open the device with
        #[arg(long)]
        baud: Option<u32>,

        /// Classifier bundle to check
        #[arg(short, long, default_value = "models/disease_model.json")]
        model: PathBuf,

        /// Configuration file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the questionnaire
    Prompts,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn run(cli: Cli) -> Result<(), PulsewatchCliError> {
    match cli.command {
        Commands::Monitor {
            port,
            baud,
            model,
            config,
            lower,
            upper,
            abnormal_count,
            timeout,
            resume_delay,
            json,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(baud) = baud {
                config.baud_rate = baud;
            }
            if let Some(lower) = lower {
                config.lower_bound = lower;
            }
            if let Some(upper) = upper {
                config.upper_bound = upper;
            }
            if let Some(count) = abnormal_count {
                config.abnormal_streak_threshold = count;
            }
            if let Some(timeout) = timeout {
                config.read_timeout_seconds = timeout;
            }
            if let Some(delay) = resume_delay {
                config.resume_delay_seconds = delay;
            }
            cmd_monitor(port.as_deref(), &model, config, json)
        }

        Commands::Predict {
            model,
            age,
            gender,
            fever,
            cough,
            fatigue,
            difficulty_breathing,
            bp,
            cholesterol,
            top,
            json,
        } => {
            let raw = RawInputs {
                age: RawValue::from(age),
                gender: RawValue::from(gender),
                fever: RawValue::from(fever),
                cough: RawValue::from(cough),
                fatigue: RawValue::from(fatigue),
                difficulty_breathing: RawValue::from(difficulty_breathing),
                blood_pressure: RawValue::from(bp),
                cholesterol: RawValue::from(cholesterol),
            };
            cmd_predict(&model, &raw, top, json)
        }

        Commands::Doctor {
            port,
            baud,
            model,
            config,
            json,
        } => cmd_doctor(port.as_deref(), baud, &model, config.as_deref(), json),

        Commands::Prompts => cmd_prompts(),
    }
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig, PulsewatchCliError> {
    match path {
        Some(path) => Ok(MonitorConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(MonitorConfig::default()),
    }
}

fn cmd_monitor(
    port: Option<&Path>,
    model: &Path,
    config: MonitorConfig,
    json: bool,
) -> Result<(), PulsewatchCliError> {
    config.validate()?;
    let bundle = ClassifierBundle::load(model)?;
    let mut monitor = Monitor::new(config, &bundle)?;

    // Open the device before any reading so a missing device fails fast
    let baud_rate = monitor.config().baud_rate;
    let transport = SerialLineTransport::open_or_detect(port, baud_rate)?;
    let reader = StreamReader::new(transport, monitor.config().read_timeout());

    // Reads and prompts both wake within a poll interval, so the loop always
    // unwinds through the reader's close
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| PulsewatchCliError::Signal(e.to_string()))?;

    let answers = AnswerLines::spawn(BufReader::new(io::stdin()))?;
    let mut presenter = TerminalPresenter::new(answers, cancel.clone(), json);
    presenter.say(&format!(
        "Listening on {} at {} baud. Press Ctrl+C to exit.",
        reader.name(),
        baud_rate
    ));

    let stats = monitor.run(reader, &mut presenter, &cancel)?;
    presenter.say(&format!(
        "\nExiting... {} readings, {} alerts, {} reports.",
        stats.readings, stats.triggers, stats.reports
    ));
    Ok(())
}

fn cmd_predict(model: &Path, raw: &RawInputs, top: usize, json: bool) -> Result<(), PulsewatchCliError> {
    let bundle = ClassifierBundle::load(model)?;
    let record = FeatureAssembler::from_raw(raw, Some(bundle.feature_order()));
    let result = bundle.classify(&record)?;

    if json {
        let output = serde_json::json!({
            "features": record,
            "label": result.label,
            "ranked": result.top(top),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Most likely condition: {}", result.label);
        println!("Confidence:");
        for class in result.top(top) {
            println!(" - {}: {:.1}%", class.label, class.probability * 100.0);
        }
        if record.missing_count() > 0 {
            let missing: Vec<&str> = record
                .fields()
                .iter()
                .filter(|(_, value)| value.is_missing())
                .map(|(name, _)| name.as_str())
                .collect();
            println!("\nNot provided or not understood: {}", missing.join(", "));
        }
        println!("\n{}", SAFETY_NOTICE);
    }

    Ok(())
}

fn cmd_doctor(
    port: Option<&Path>,
    baud: Option<u32>,
    model: &Path,
    config: Option<&Path>,
    json: bool,
) -> Result<(), PulsewatchCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pulsewatch version {}", PULSEWATCH_VERSION),
    });

    // Configuration
    let loaded = load_config(config);
    let baud_rate = baud.unwrap_or_else(|| {
        loaded
            .as_ref()
            .map(|config| config.baud_rate)
            .unwrap_or(DEFAULT_BAUD_RATE)
    });
    checks.push(match loaded {
        Ok(config) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Normal range {}-{} bpm, trigger after {} readings",
                config.lower_bound, config.upper_bound, config.abnormal_streak_threshold
            ),
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: CliError::from(e).message,
        },
    });

    // Classifier bundle
    checks.push(match ClassifierBundle::load(model) {
        Ok(bundle) => DoctorCheck {
            name: "model".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "{} classes over {} features ({})",
                bundle.classes().len(),
                bundle.feature_order().len(),
                bundle.feature_order().join(", ")
            ),
        },
        Err(e) => DoctorCheck {
            name: "model".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    // Device
    let device = port.map(Path::to_path_buf).or_else(autodetect_device_port);
    checks.push(match device {
        Some(path) => match SerialLineTransport::open(&path, baud_rate) {
            Ok(_) => DoctorCheck {
                name: "device".to_string(),
                status: CheckStatus::Ok,
                message: format!("Device {} opened at {} baud", path.display(), baud_rate),
            },
            Err(e) => DoctorCheck {
                name: "device".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        },
        None => DoctorCheck {
            name: "device".to_string(),
            status: CheckStatus::Warning,
            message: "No serial port detected. Specify --port.".to_string(),
        },
    });

    // The questionnaire needs an interactive terminal
    checks.push(if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (questionnaire ready)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Warning,
            message: "stdin is not a TTY; questionnaire answers will be read from the pipe".to_string(),
        }
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PULSEWATCH_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulsewatch Doctor Report");
        println!("========================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulsewatchCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_prompts() -> Result<(), PulsewatchCliError> {
    println!("Questionnaire (asked in this order):");
    for (i, prompt) in PROMPTS.iter().enumerate() {
        let kind = match prompt.kind {
            PromptKind::YesNo => "y/n",
            PromptKind::Text => "text",
        };
        println!(
            "  {}. {} [{}] (default: {})",
            i + 1,
            prompt.question,
            kind,
            prompt.default
        );
    }
    Ok(())
}

// Terminal presenter

/// Presenter reading answers from stdin.
///
/// With `json` set, reports go to stdout as JSON lines and all other output
/// moves to stderr.
struct TerminalPresenter {
    answers: AnswerLines,
    cancel: CancellationToken,
    json: bool,
}

impl TerminalPresenter {
    fn new(answers: AnswerLines, cancel: CancellationToken, json: bool) -> Self {
        Self {
            answers,
            cancel,
            json,
        }
    }

    fn console(&self) -> Box<dyn Write> {
        if self.json {
            Box::new(io::stderr())
        } else {
            Box::new(io::stdout())
        }
    }

    fn say(&self, text: &str) {
        let mut out = self.console();
        let _ = writeln!(out, "{}", text);
    }
}

impl Presenter for TerminalPresenter {
    fn ask(&mut self, prompt: &Prompt) -> Result<Option<String>, MonitorError> {
        let question = match prompt.kind {
            PromptKind::YesNo => format!("{} (y/n) [{}]: ", prompt.question, prompt.default),
            PromptKind::Text => format!("{} [{}]: ", prompt.question, prompt.default),
        };
        let mut out = self.console();
        write!(out, "{}", question)?;
        out.flush()?;

        self.answers.next_answer(&self.cancel, ANSWER_POLL)
    }

    fn notify(&mut self, message: &str) {
        self.say(message);
    }

    fn show_reading(&mut self, reading: &Reading, _window: &RecentWindow) {
        let mut out = self.console();
        let _ = write!(out, "\rMHR: {:.0} bpm   ", reading.bpm);
        let _ = out.flush();
    }

    fn show_alert(&mut self, trigger: &Trigger, detector: &AbnormalityDetector) {
        self.say(&format!(
            "\nAbnormal heart rate detected: {:.0} bpm (Normal {:.0}-{:.0}).",
            trigger.reading.bpm, detector.lower, detector.upper
        ));
        self.say("Please answer the following questions.");
    }

    fn show_report(&mut self, report: &DiagnosisReport) {
        if self.json {
            match report.to_json() {
                Ok(line) => println!("{}", line),
                Err(e) => log::error!("Cannot encode report: {}", e),
            }
            return;
        }

        self.say(&format!("\nMost likely condition: {}", report.label));
        self.say("Confidence:");
        for class in &report.top {
            self.say(&format!(" - {}: {:.1}%", class.label, class.probability * 100.0));
        }
        self.say(&format!("\n{}", SAFETY_NOTICE));
    }
}

// Error types

#[derive(Debug)]
enum PulsewatchCliError {
    Io(io::Error),
    Monitor(MonitorError),
    Json(serde_json::Error),
    Signal(String),
    DoctorFailed,
}

impl From<io::Error> for PulsewatchCliError {
    fn from(e: io::Error) -> Self {
        PulsewatchCliError::Io(e)
    }
}

impl From<MonitorError> for PulsewatchCliError {
    fn from(e: MonitorError) -> Self {
        PulsewatchCliError::Monitor(e)
    }
}

impl From<serde_json::Error> for PulsewatchCliError {
    fn from(e: serde_json::Error) -> Self {
        PulsewatchCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulsewatchCliError> for CliError {
    fn from(e: PulsewatchCliError) -> Self {
        match e {
            PulsewatchCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulsewatchCliError::Monitor(e) => {
                let (code, hint) = match &e {
                    MonitorError::TransportUnavailable(_) => {
                        ("TRANSPORT_UNAVAILABLE", "Connect the device or pass --port")
                    }
                    MonitorError::TransportDisconnected(_) => {
                        ("TRANSPORT_DISCONNECTED", "Check the device cable and restart monitoring")
                    }
                    MonitorError::InvalidConfig(_) => {
                        ("INVALID_CONFIG", "Run 'pulsewatch doctor' to check the configuration")
                    }
                    MonitorError::ModelBundle(_) => {
                        ("MODEL_ERROR", "Pass a valid classifier bundle with --model")
                    }
                    MonitorError::SchemaMismatch(_) | MonitorError::Classifier(_) => {
                        ("CLASSIFIER_ERROR", "Check that the bundle matches the questionnaire features")
                    }
                    MonitorError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                    MonitorError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    MonitorError::Cancelled => ("CANCELLED", "Monitoring was interrupted"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PulsewatchCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulsewatchCliError::Signal(msg) => CliError {
                code: "SIGNAL_ERROR".to_string(),
                message: msg,
                hint: Some("Cannot install the Ctrl+C handler".to_string()),
            },
            PulsewatchCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
