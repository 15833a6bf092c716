use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use shared_logging::LogLevel;
use waveform_preference::{
    Candidate, EngineConfig, FeatureSet, Label, PreferenceEngine, PreferenceTelemetry,
};

#[derive(Parser, Debug)]
#[command(name = "prefctl", version, about = "Waveform track preference engine driver")]
struct Cli {
    /// Engine configuration (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory for JSON-lines logs and events; overrides the config paths.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replays a feedback log and trains a model.
    Train {
        #[arg(long)]
        feedback: PathBuf,
    },
    /// Trains from a feedback log, then scores one track.
    Predict {
        #[arg(long)]
        feedback: PathBuf,
        /// Track features as a JSON object, e.g. '{"tempo": 120, "energy": 0.6}'.
        #[arg(long)]
        track: String,
    },
    /// Trains from a feedback log, then ranks candidate tracks.
    Rank {
        #[arg(long)]
        feedback: PathBuf,
        /// JSON-lines file of `{"id": ..., "features": {...}}` objects.
        #[arg(long)]
        candidates: PathBuf,
    },
    /// Prints label and skip-reason counts for a feedback log.
    Summary {
        #[arg(long)]
        feedback: PathBuf,
    },
}

/// One line of a feedback log, using the recommendation service field names.
#[derive(Debug, Serialize, Deserialize)]
struct FeedbackLine {
    #[serde(default)]
    track_features: FeatureSet,
    #[serde(default)]
    feedback: i64,
    #[serde(default)]
    skip_reason: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let telemetry = build_telemetry(&config, cli.log_dir.as_deref())?;
    let engine = PreferenceEngine::new(config).with_telemetry(telemetry.clone());

    match cli.command {
        Commands::Train { feedback } => {
            replay_feedback(&engine, &feedback)?;
            print_json(&engine.train())
        }
        Commands::Predict { feedback, track } => {
            let features: FeatureSet =
                serde_json::from_str(&track).context("parsing --track as a JSON object")?;
            replay_feedback(&engine, &feedback)?;
            engine.train();
            print_json(&engine.predict(&features))
        }
        Commands::Rank {
            feedback,
            candidates,
        } => {
            let candidates = read_candidates(&candidates)?;
            replay_feedback(&engine, &feedback)?;
            engine.train();
            print_json(&engine.rank(candidates))
        }
        Commands::Summary { feedback } => {
            let replayed = replay_feedback(&engine, &feedback)?;
            let _ = telemetry.log(
                LogLevel::Info,
                "summary_requested",
                serde_json::json!({ "records": replayed }),
            );
            print_json(&engine.feedback_summary())
        }
    }
}

fn build_telemetry(config: &EngineConfig, log_dir: Option<&Path>) -> Result<PreferenceTelemetry> {
    let builder = PreferenceTelemetry::builder("prefctl").from_config(&config.telemetry);
    let builder = match log_dir {
        Some(dir) => builder
            .log_path(dir.join("preference.log.jsonl"))
            .event_path(dir.join("preference-events.jsonl")),
        None => builder,
    };
    builder.build().context("opening telemetry sinks")
}

fn replay_feedback(engine: &PreferenceEngine, path: &Path) -> Result<usize> {
    let lines = read_feedback(path)?;
    let count = lines.len();
    for (features, label, skip_reason) in lines {
        engine.submit_feedback(features, label, skip_reason);
    }
    Ok(count)
}

fn read_feedback(path: &Path) -> Result<Vec<(FeatureSet, Label, Option<String>)>> {
    read_json_lines::<FeedbackLine>(path)?
        .into_iter()
        .map(|(number, line)| {
            let label = Label::try_from(line.feedback)
                .with_context(|| format!("{}:{number}", path.display()))?;
            Ok((line.track_features, label, line.skip_reason))
        })
        .collect()
}

fn read_candidates(path: &Path) -> Result<Vec<Candidate>> {
    Ok(read_json_lines::<Candidate>(path)?
        .into_iter()
        .map(|(_, candidate)| candidate)
        .collect())
}

fn read_json_lines<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<(usize, T)>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let number = index + 1;
        let line = line.with_context(|| format!("reading {}:{number}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line)
            .with_context(|| format!("parsing {}:{number}", path.display()))?;
        entries.push((number, entry));
    }
    Ok(entries)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
