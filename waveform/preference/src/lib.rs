#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]
#![allow(clippy::module_name_repetitions)]

//! Waveform preference engine: learns from liked/skipped track feedback and
//! predicts, with a short explanation, whether a new track will be liked.

/// Audio feature vocabulary and vectorization.
#[path = "../features.rs"]
pub mod features;

/// Append-only feedback log and last-track pointer.
#[path = "../feedback.rs"]
pub mod feedback;

/// Standardization + logistic regression training.
#[path = "../trainer/main.rs"]
pub mod trainer;

/// Probability scoring and rule-based explanations.
#[path = "../predictor.rs"]
pub mod predictor;

/// Candidate filtering and ordering.
#[path = "../ranking.rs"]
pub mod ranking;

/// Engine configuration loaded from TOML.
#[path = "../config.rs"]
pub mod config;

/// Typed errors for the fallible edges of the engine.
#[path = "../error.rs"]
pub mod error;

/// Structured logging and event emission.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// The engine object tying every component together.
#[path = "../engine.rs"]
pub mod engine;

pub use config::{EngineConfig, ExplanationConfig, TelemetryConfig, TrainingConfig};
pub use engine::PreferenceEngine;
pub use error::PreferenceError;
pub use features::{vectorize, AudioFeature, FeatureSet, FeatureVector, FEATURE_COUNT};
pub use feedback::{FeedbackRecord, FeedbackStore, FeedbackSummary, Label};
pub use predictor::{Prediction, Predictor};
pub use ranking::{Candidate, ListeningFilters, RankedTrack};
pub use telemetry::{PreferenceTelemetry, PreferenceTelemetryBuilder};
pub use trainer::{ModelState, TrainOutcome, Trainer};
