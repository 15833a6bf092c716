use serde::{Deserialize, Serialize};

use crate::{
    config::ExplanationConfig,
    features::{vectorize, AudioFeature, FeatureSet},
    trainer::ModelState,
};

/// Reason returned while no model has been trained.
pub const UNTRAINED_REASON: &str = "model not trained yet";
/// Reason used when there is no previous track to compare against.
pub const DEFAULT_REASON: &str = "Recommended!";
/// Reason used when tempo and energy are both close to the last track.
pub const SIMILAR_TRACK_REASON: &str =
    "Because it has a similar tempo and energy to your last track.";
/// Reason used otherwise.
pub const PROFILE_REASON: &str = "Because it fits your listening profile.";

/// Probability of a like plus a short justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Probability in `[0, 1]` that the track will be liked.
    pub probability: f64,
    /// Human-readable explanation.
    pub reason: String,
    /// `false` when this is the untrained fallback.
    pub trained: bool,
}

impl Prediction {
    /// Fixed response used before any model exists.
    #[must_use]
    pub fn untrained() -> Self {
        Self {
            probability: 0.5,
            reason: UNTRAINED_REASON.to_owned(),
            trained: false,
        }
    }
}

/// Scores tracks against a model and explains the result.
#[derive(Debug, Clone, Default)]
pub struct Predictor {
    explanation: ExplanationConfig,
}

impl Predictor {
    /// Creates a predictor with the given explanation thresholds.
    #[must_use]
    pub const fn new(explanation: ExplanationConfig) -> Self {
        Self { explanation }
    }

    /// Scores `features`. Without a model the untrained fallback is returned
    /// and the last track is not consulted.
    #[must_use]
    pub fn predict(
        &self,
        model: Option<&ModelState>,
        last_track: Option<&FeatureSet>,
        features: &FeatureSet,
    ) -> Prediction {
        let Some(model) = model else {
            return Prediction::untrained();
        };
        Prediction {
            probability: model.probability(&vectorize(features)),
            reason: self.explain(last_track, features).to_owned(),
            trained: true,
        }
    }

    /// Picks the explanation for `current` given the last submitted track.
    #[must_use]
    pub fn explain(&self, last_track: Option<&FeatureSet>, current: &FeatureSet) -> &'static str {
        let Some(previous) = last_track else {
            return DEFAULT_REASON;
        };
        let tempo_gap =
            (previous.value(AudioFeature::Tempo) - current.value(AudioFeature::Tempo)).abs();
        let energy_gap =
            (previous.value(AudioFeature::Energy) - current.value(AudioFeature::Energy)).abs();
        if tempo_gap < self.explanation.tempo_threshold
            && energy_gap < self.explanation.energy_threshold
        {
            SIMILAR_TRACK_REASON
        } else {
            PROFILE_REASON
        }
    }
}
