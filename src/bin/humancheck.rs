//! Humancheck CLI - Command-line interface for the verification engine
//!
//! Commands:
//! - replay: Run a scripted session and print the verification report
//! - score: Score recorded telemetry directly
//! - catalog: List challenges, rhythm patterns, and precision rings
//! - config: Print or validate a verification configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use humancheck::verify::precision;
use humancheck::verify::replay::{replay_script, SessionScript, TelemetryRecording};
use humancheck::verify::rhythm::RHYTHM_PATTERNS;
use humancheck::verify::{ChallengeKind, ReportEncoder};
use humancheck::{VerificationConfig, VerifyError, ENGINE_VERSION, PRODUCER_NAME};

/// Humancheck - behavioral human/bot verification
#[derive(Parser)]
#[command(name = "humancheck")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score interaction telemetry for human/bot verification", long_about = None)]
struct Cli {
    /// Log level filter (e.g. "warn", "humancheck=debug")
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a session script and print the verification report
    Replay {
        /// Script file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Override the script's pattern seed
        #[arg(long)]
        seed: Option<u64>,

        /// Verification config JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Score recorded telemetry with a known task accuracy
    Score {
        /// Telemetry recording file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Challenge the telemetry was recorded under
        #[arg(long, default_value = "precision")]
        challenge: String,

        /// Task accuracy in [0, 1]
        #[arg(long, default_value = "0.0")]
        accuracy: f64,

        /// Verification config JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// List available challenges
    Catalog {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration (defaults, or a validated file)
    Config {
        /// Config file to validate
        #[arg(long)]
        file: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON on one line
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), HumancheckCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            seed,
            config,
            output_format,
        } => cmd_replay(&input, &output, seed, config.as_deref(), output_format),

        Commands::Score {
            input,
            challenge,
            accuracy,
            config,
            output_format,
        } => cmd_score(&input, &challenge, accuracy, config.as_deref(), output_format),

        Commands::Catalog { json } => cmd_catalog(json),

        Commands::Config { file, json } => cmd_config(file.as_deref(), json),
    }
}

fn read_input(input: &Path) -> Result<String, HumancheckCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn load_config(path: Option<&Path>) -> Result<VerificationConfig, HumancheckCliError> {
    match path {
        Some(path) => Ok(VerificationConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(VerificationConfig::default()),
    }
}

fn format_json<T: serde::Serialize>(
    value: &T,
    format: &OutputFormat,
) -> Result<String, HumancheckCliError> {
    let mut out = match format {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value)?,
    };
    out.push('\n');
    Ok(out)
}

fn write_output(output: &Path, data: &str) -> Result<(), HumancheckCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    seed: Option<u64>,
    config: Option<&Path>,
    output_format: OutputFormat,
) -> Result<(), HumancheckCliError> {
    let config = load_config(config)?;
    let mut script = SessionScript::from_json(&read_input(input)?)?;
    if seed.is_some() {
        script.seed = seed;
    }
    if script.events.is_empty() {
        return Err(HumancheckCliError::NoEvents);
    }

    let outcome = replay_script(&script, config)?;
    for rejected in &outcome.rejected {
        info!(
            index = rejected.index,
            at_ms = rejected.at_ms,
            reason = %rejected.reason,
            "scripted action rejected"
        );
    }

    let report = ReportEncoder::new().encode_outcome(&outcome)?;
    write_output(output, &format_json(&report, &output_format)?)
}

fn cmd_score(
    input: &Path,
    challenge: &str,
    accuracy: f64,
    config: Option<&Path>,
    output_format: OutputFormat,
) -> Result<(), HumancheckCliError> {
    let config = load_config(config)?;
    let challenge: ChallengeKind = challenge.parse()?;
    let recording: TelemetryRecording = serde_json::from_str(&read_input(input)?)?;
    if recording.pointer.is_empty() && recording.taps.is_empty() && recording.clicks.is_empty() {
        return Err(HumancheckCliError::NoEvents);
    }

    let result = recording.score(&config, challenge, accuracy)?;
    let report = ReportEncoder::new().encode(challenge, &result, None);
    print!("{}", format_json(&report, &output_format)?);
    Ok(())
}

fn cmd_catalog(json: bool) -> Result<(), HumancheckCliError> {
    let catalog = Catalog {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        challenges: vec![ChallengeKind::Rhythm, ChallengeKind::Precision],
        rhythm_patterns: RHYTHM_PATTERNS
            .iter()
            .map(|p| PatternEntry {
                name: p.name.to_string(),
                beats_ms: p.beats.to_vec(),
            })
            .collect(),
        precision_rings: precision::targets(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    } else {
        println!("Humancheck Challenge Catalog");
        println!("============================");
        println!("Producer: {}", catalog.producer);
        println!("Version:  {}", catalog.version);
        println!("\nRhythm patterns:");
        for pattern in &catalog.rhythm_patterns {
            let beats: Vec<String> = pattern.beats_ms.iter().map(|b| format!("{b:.0}")).collect();
            println!("  {:<12} [{}] ms", pattern.name, beats.join(", "));
        }
        println!("\nPrecision rings:");
        for ring in &catalog.precision_rings {
            println!(
                "  #{} at ({:.0}%, {:.0}%)  size {:.0}px  {} ms",
                ring.index + 1,
                ring.x_pct,
                ring.y_pct,
                ring.size,
                ring.duration_ms
            );
        }
    }
    Ok(())
}

fn cmd_config(file: Option<&Path>, json: bool) -> Result<(), HumancheckCliError> {
    let config = load_config(file)?;

    if json {
        println!("{}", config.to_json()?);
    } else {
        println!("Humancheck Configuration");
        println!("========================");
        println!("sample_interval_ms:          {}", config.sample_interval_ms);
        println!("telemetry_window:            {}", config.telemetry_window);
        println!("micro_movement_max_distance: {}", config.micro_movement_max_distance);
        println!("hesitation_pause_ms:         {}", config.hesitation_pause_ms);
        println!("hesitation_min_distance:     {}", config.hesitation_min_distance);
        println!("listen_grace_ms:             {}", config.listen_grace_ms);
        println!("tap_settle_ms:               {}", config.tap_settle_ms);
        println!("rhythm_tolerance_ms:         {}", config.rhythm_tolerance_ms);
        println!("checking_delay_ms:           {}", config.checking_delay_ms);
        println!("ring_gap_ms:                 {}", config.ring_gap_ms);
        println!("human_threshold:             {}", config.human_threshold);
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum HumancheckCliError {
    Io(io::Error),
    Verify(VerifyError),
    Json(serde_json::Error),
    NoEvents,
}

impl From<io::Error> for HumancheckCliError {
    fn from(e: io::Error) -> Self {
        HumancheckCliError::Io(e)
    }
}

impl From<VerifyError> for HumancheckCliError {
    fn from(e: VerifyError) -> Self {
        HumancheckCliError::Verify(e)
    }
}

impl From<serde_json::Error> for HumancheckCliError {
    fn from(e: serde_json::Error) -> Self {
        HumancheckCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<HumancheckCliError> for CliError {
    fn from(e: HumancheckCliError) -> Self {
        match e {
            HumancheckCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            HumancheckCliError::Verify(e) => {
                let hint = match &e {
                    VerifyError::InvalidConfig(_) => "Run 'humancheck config --json' for defaults",
                    VerifyError::UnknownChallenge(_) => "Run 'humancheck catalog' for challenges",
                    VerifyError::InvalidScript(_) => "Order script events by at_ms",
                    VerifyError::EncodingError(_) => "Make sure the script reaches a verdict",
                    _ => "Check input format",
                };
                CliError {
                    code: "VERIFY_ERROR".to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            HumancheckCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            HumancheckCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct Catalog {
    producer: String,
    version: String,
    challenges: Vec<ChallengeKind>,
    rhythm_patterns: Vec<PatternEntry>,
    precision_rings: Vec<precision::PrecisionTarget>,
}

#[derive(serde::Serialize)]
struct PatternEntry {
    name: String,
    beats_ms: Vec<f64>,
}
