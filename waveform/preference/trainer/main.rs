//! Full-refit training: standardization followed by logistic regression.

/// Penalized logistic regression on top of `linfa-logistic`.
pub mod logistic;
/// Per-feature standardization.
pub mod scaler;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::{
    config::TrainingConfig,
    error::PreferenceError,
    features::{FeatureVector, FEATURE_COUNT},
    feedback::Label,
};
use logistic::{FitReport, LogisticRegression};
use scaler::StandardScaler;

/// Result of a training request, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainOutcome {
    /// Whether a model was fitted; `false` means the log was empty or the solver failed.
    pub trained: bool,
    /// Number of feedback records consumed.
    pub sample_count: usize,
}

impl TrainOutcome {
    /// Outcome for an empty log.
    #[must_use]
    pub const fn no_data() -> Self {
        Self {
            trained: false,
            sample_count: 0,
        }
    }
}

/// A transform and a classifier fitted together in one training round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    scaler: StandardScaler,
    classifier: LogisticRegression,
    sample_count: usize,
    report: FitReport,
    trained_at: DateTime<Utc>,
}

impl ModelState {
    /// Probability that a track with this vector will be liked.
    #[must_use]
    pub fn probability(&self, vector: &FeatureVector) -> f64 {
        let standardized = self.standardize(vector);
        self.classifier
            .predict_proba(standardized.view())
            .clamp(0.0, 1.0)
    }

    /// Raw decision value (log-odds) for a vector.
    #[must_use]
    pub fn decision_function(&self, vector: &FeatureVector) -> f64 {
        let standardized = self.standardize(vector);
        self.classifier.decision_function(standardized.view())
    }

    fn standardize(&self, vector: &FeatureVector) -> Array1<f64> {
        let row = Array1::from_iter(vector.as_slice().iter().copied());
        self.scaler.transform_row(row.view())
    }

    /// Fitted standardization transform.
    #[must_use]
    pub const fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Fitted classifier.
    #[must_use]
    pub const fn classifier(&self) -> &LogisticRegression {
        &self.classifier
    }

    /// Number of records the model was fitted on.
    #[must_use]
    pub const fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Solver diagnostics.
    #[must_use]
    pub const fn report(&self) -> &FitReport {
        &self.report
    }

    /// When the fit completed.
    #[must_use]
    pub const fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Whether two states carry the same fitted parameters, ignoring timestamps.
    #[must_use]
    pub fn same_parameters(&self, other: &Self) -> bool {
        self.scaler == other.scaler
            && self.classifier == other.classifier
            && self.sample_count == other.sample_count
    }
}

/// Fits fresh model state from a complete feedback snapshot.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    /// Creates a trainer with the given hyper-parameters.
    #[must_use]
    pub const fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Hyper-parameters in use.
    #[must_use]
    pub const fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fits a new model over every sample. Returns `Ok(None)` for an empty snapshot.
    pub fn fit(
        &self,
        samples: &[(FeatureVector, Label)],
    ) -> Result<Option<ModelState>, PreferenceError> {
        if samples.is_empty() {
            return Ok(None);
        }
        let x = Array2::from_shape_fn((samples.len(), FEATURE_COUNT), |(row, col)| {
            samples[row].0.as_slice()[col]
        });
        let liked: Array1<bool> = samples.iter().map(|(_, label)| label.is_liked()).collect();

        let scaler = StandardScaler::fit(&x);
        let standardized = scaler.transform(&x);
        let (classifier, report) = LogisticRegression::fit(&standardized, &liked, &self.config)?;
        Ok(Some(ModelState {
            scaler,
            classifier,
            sample_count: samples.len(),
            report,
            trained_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{vectorize, AudioFeature, FeatureSet};
    use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};

    fn sample(tempo: f64, energy: f64, danceability: f64, label: Label) -> (FeatureVector, Label) {
        let features = FeatureSet::new()
            .with(AudioFeature::Tempo, tempo)
            .with(AudioFeature::Energy, energy)
            .with(AudioFeature::Danceability, danceability);
        (vectorize(&features), label)
    }

    fn mixed_log() -> Vec<(FeatureVector, Label)> {
        vec![
            sample(128.0, 0.82, 0.71, Label::Liked),
            sample(124.0, 0.77, 0.64, Label::Liked),
            sample(131.0, 0.69, 0.80, Label::Liked),
            sample(118.0, 0.58, 0.55, Label::Skipped),
            sample(72.0, 0.21, 0.33, Label::Skipped),
            sample(80.0, 0.35, 0.40, Label::Skipped),
            sample(95.0, 0.66, 0.62, Label::Liked),
            sample(101.0, 0.28, 0.47, Label::Skipped),
        ]
    }

    #[test]
    fn empty_snapshot_yields_no_model() {
        assert!(Trainer::default().fit(&[]).unwrap().is_none());
    }

    #[test]
    fn retraining_reproduces_parameters() {
        let trainer = Trainer::default();
        let first = trainer.fit(&mixed_log()).unwrap().unwrap();
        let second = trainer.fit(&mixed_log()).unwrap().unwrap();
        assert!(first.same_parameters(&second));
        assert_eq!(first.sample_count(), 8);
    }

    #[test]
    fn training_is_order_independent() {
        let trainer = Trainer::default();
        let baseline = trainer.fit(&mixed_log()).unwrap().unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        let checkpoints = [
            sample(126.0, 0.75, 0.70, Label::Liked).0,
            sample(78.0, 0.30, 0.35, Label::Skipped).0,
            sample(0.0, 0.0, 0.0, Label::Skipped).0,
        ];
        for _ in 0..5 {
            let mut shuffled = mixed_log();
            shuffled.shuffle(&mut rng);
            let permuted = trainer.fit(&shuffled).unwrap().unwrap();
            for point in &checkpoints {
                let delta =
                    (baseline.decision_function(point) - permuted.decision_function(point)).abs();
                assert!(delta < 1e-4, "decision drifted by {delta}");
            }
        }
    }

    #[test]
    fn constant_features_do_not_break_training() {
        let log = vec![
            sample(120.0, 0.9, 0.5, Label::Liked),
            sample(120.0, 0.1, 0.5, Label::Skipped),
        ];
        let model = Trainer::default().fit(&log).unwrap().unwrap();
        assert!(model.scaler().scale().iter().all(|s| s.is_finite() && *s > 0.0));
        let probability = model.probability(&sample(120.0, 0.8, 0.5, Label::Liked).0);
        assert!(probability.is_finite());
        assert!(probability > 0.5);
    }

    #[test]
    fn liked_region_scores_higher() {
        let model = Trainer::default().fit(&mixed_log()).unwrap().unwrap();
        let near_liked = model.probability(&sample(127.0, 0.80, 0.72, Label::Liked).0);
        let near_skipped = model.probability(&sample(75.0, 0.25, 0.35, Label::Skipped).0);
        assert!(near_liked > near_skipped);
        assert!((0.0..=1.0).contains(&near_liked));
    }

    #[test]
    fn extreme_input_keeps_probability_in_range() {
        let log = vec![
            sample(100.6, 0.2, 0.0, Label::Liked),
            sample(100.5, 0.3, 0.0, Label::Liked),
            sample(100.0, 0.9, 0.0, Label::Skipped),
            sample(100.1, 0.8, 0.0, Label::Skipped),
        ];
        let model = Trainer::default().fit(&log).unwrap().unwrap();
        let weights = model.classifier().weights();
        let (tempo, energy) = (AudioFeature::Tempo.index(), AudioFeature::Energy.index());
        assert!(weights[tempo] > 0.0 && weights[energy] < 0.0);

        let extreme = sample(1e308, 1e308, 0.0, Label::Liked).0;
        let probability = model.probability(&extreme);
        assert!((0.0..=1.0).contains(&probability), "probability {probability}");
    }
}
