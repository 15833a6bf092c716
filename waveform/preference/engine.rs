//! Preference engine owning the feedback log, the last-track pointer and the model.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use shared_logging::LogLevel;

use crate::{
    config::EngineConfig,
    features::FeatureSet,
    feedback::{FeedbackRecord, FeedbackStore, FeedbackSummary, Label},
    predictor::{Prediction, Predictor},
    ranking::{rank_with, Candidate, ListeningFilters, RankedTrack},
    telemetry::PreferenceTelemetry,
    trainer::{ModelState, TrainOutcome, Trainer},
};

/// One independent preference model (e.g. per listener).
///
/// All operations take `&self`; share it behind an `Arc` across threads.
/// Predictions always see a transform and classifier from the same fit.
pub struct PreferenceEngine {
    store: RwLock<FeedbackStore>,
    model: RwLock<Option<Arc<ModelState>>>,
    fit_lock: Mutex<()>,
    trainer: Trainer,
    predictor: Predictor,
    filters: ListeningFilters,
    telemetry: Option<PreferenceTelemetry>,
}

impl Default for PreferenceEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl PreferenceEngine {
    /// Creates an untrained engine.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: RwLock::new(FeedbackStore::new()),
            model: RwLock::new(None),
            fit_lock: Mutex::new(()),
            trainer: Trainer::new(config.training),
            predictor: Predictor::new(config.explanation),
            filters: config.filters,
            telemetry: None,
        }
    }

    /// Attaches telemetry sinks for structured logging/events.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: PreferenceTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Records feedback for a track and makes it the last-seen track.
    pub fn submit_feedback(
        &self,
        features: FeatureSet,
        label: Label,
        skip_reason: Option<String>,
    ) -> FeedbackRecord {
        let (record, total) = {
            let mut store = self.store.write();
            let record = store.record(features, label, skip_reason);
            (record, store.len())
        };
        let metadata = json!({
            "id": record.id,
            "label": i64::from(record.label),
            "skip_reason": record.skip_reason,
            "total": total,
        });
        self.log(LogLevel::Debug, "feedback_recorded", metadata.clone());
        self.event("preference.feedback.recorded", metadata);
        record
    }

    /// Refits the model from the whole feedback log.
    ///
    /// An empty log, or a solver failure, leaves the current model (or its
    /// absence) untouched and reports `trained: false`.
    pub fn train(&self) -> TrainOutcome {
        let _serialized = self.fit_lock.lock();
        let samples = self.store.read().training_snapshot();
        let state = match self.trainer.fit(&samples) {
            Ok(Some(state)) => state,
            Ok(None) => {
                self.log(LogLevel::Warn, "training_skipped_no_data", json!({}));
                return TrainOutcome::no_data();
            }
            Err(err) => {
                self.log(
                    LogLevel::Error,
                    "training_failed",
                    json!({ "samples": samples.len(), "error": err.to_string() }),
                );
                return TrainOutcome {
                    trained: false,
                    sample_count: samples.len(),
                };
            }
        };

        let report = *state.report();
        let sample_count = state.sample_count();
        *self.model.write() = Some(Arc::new(state));

        self.log(
            LogLevel::Info,
            "training_complete",
            json!({
                "samples": sample_count,
                "method": report.method,
                "converged": report.converged,
                "gradient_norm": report.gradient_norm,
                "objective": report.objective,
            }),
        );
        self.event(
            "preference.model.trained",
            json!({ "samples": sample_count, "converged": report.converged }),
        );
        TrainOutcome {
            trained: true,
            sample_count,
        }
    }

    /// Probability that `features` will be liked, with an explanation.
    #[must_use]
    pub fn predict(&self, features: &FeatureSet) -> Prediction {
        let model = self.model();
        let store = self.store.read();
        self.predictor
            .predict(model.as_deref(), store.last_track(), features)
    }

    /// Ranks candidates using the configured listening filters.
    #[must_use]
    pub fn rank(&self, candidates: Vec<Candidate>) -> Vec<RankedTrack> {
        self.rank_filtered(candidates, &self.filters)
    }

    /// Ranks candidates with explicit filters.
    #[must_use]
    pub fn rank_filtered(
        &self,
        candidates: Vec<Candidate>,
        filters: &ListeningFilters,
    ) -> Vec<RankedTrack> {
        let offered = candidates.len();
        let model = self.model();
        let last_track = self.store.read().last_track().cloned();
        let ranked = rank_with(candidates, filters, |features| {
            self.predictor
                .predict(model.as_deref(), last_track.as_ref(), features)
        });
        self.event(
            "preference.ranked",
            json!({
                "offered": offered,
                "ranked": ranked.len(),
                "top": ranked.first().map(|track| track.id.clone()),
            }),
        );
        ranked
    }

    /// Label and skip-reason counts over the log.
    #[must_use]
    pub fn feedback_summary(&self) -> FeedbackSummary {
        self.store.read().summary()
    }

    /// Number of feedback records.
    #[must_use]
    pub fn feedback_count(&self) -> usize {
        self.store.read().len()
    }

    /// Copy of the feedback log in submission order.
    #[must_use]
    pub fn feedback_records(&self) -> Vec<FeedbackRecord> {
        self.store.read().records().to_vec()
    }

    /// Current model, if trained.
    #[must_use]
    pub fn model(&self) -> Option<Arc<ModelState>> {
        self.model.read().clone()
    }

    /// Whether a model has been fitted.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        self.model.read().is_some()
    }

    fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        if let Some(telemetry) = self.telemetry.as_ref() {
            let _ = telemetry.log(level, message, metadata);
        }
    }

    fn event(&self, event_type: &str, payload: Value) {
        if let Some(telemetry) = self.telemetry.as_ref() {
            let _ = telemetry.event(event_type, payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        features::AudioFeature,
        predictor::{PROFILE_REASON, SIMILAR_TRACK_REASON, UNTRAINED_REASON},
    };
    use shared_logging::MemorySink;
    use std::thread;
    use tempfile::tempdir;

    fn track(tempo: f64, energy: f64) -> FeatureSet {
        FeatureSet::new()
            .with(AudioFeature::Tempo, tempo)
            .with(AudioFeature::Energy, energy)
    }

    fn full_track(tempo: f64, energy: f64, danceability: f64, valence: f64) -> FeatureSet {
        track(tempo, energy)
            .with(AudioFeature::Danceability, danceability)
            .with(AudioFeature::Valence, valence)
    }

    #[test]
    fn predicts_fallback_before_training() {
        let engine = PreferenceEngine::default();
        let prediction = engine.predict(&track(120.0, 0.5));
        assert_eq!(prediction.probability, 0.5);
        assert_eq!(prediction.reason, UNTRAINED_REASON);
        assert!(!prediction.trained);

        engine.submit_feedback(track(120.0, 0.5), Label::Liked, None);
        assert_eq!(engine.predict(&track(0.0, 0.0)), Prediction::untrained());
    }

    #[test]
    fn empty_training_is_a_no_op() {
        let engine = PreferenceEngine::default();
        assert_eq!(engine.train(), TrainOutcome::no_data());
        assert!(!engine.is_trained());
        assert_eq!(engine.predict(&track(100.0, 0.4)), Prediction::untrained());
    }

    #[test]
    fn closer_to_liked_scores_higher() {
        let engine = PreferenceEngine::default();
        engine.submit_feedback(full_track(128.0, 0.85, 0.8, 0.7), Label::Liked, None);
        engine.submit_feedback(
            full_track(72.0, 0.2, 0.3, 0.2),
            Label::Skipped,
            Some("NOT_IN_MOOD".into()),
        );
        let outcome = engine.train();
        assert!(outcome.trained);
        assert_eq!(outcome.sample_count, 2);

        let near_liked = engine.predict(&full_track(125.0, 0.8, 0.75, 0.65));
        let near_skipped = engine.predict(&full_track(75.0, 0.25, 0.35, 0.25));
        assert!(near_liked.trained);
        assert!(near_liked.probability > near_skipped.probability);
    }

    #[test]
    fn explanation_follows_last_track() {
        let engine = PreferenceEngine::default();
        engine.submit_feedback(track(90.0, 0.3), Label::Skipped, None);
        engine.submit_feedback(track(120.0, 0.5), Label::Liked, None);
        engine.train();
        assert_eq!(engine.predict(&track(125.0, 0.6)).reason, SIMILAR_TRACK_REASON);
        assert_eq!(engine.predict(&track(140.0, 0.9)).reason, PROFILE_REASON);
    }

    #[test]
    fn retraining_without_feedback_keeps_parameters() {
        let engine = PreferenceEngine::default();
        engine.submit_feedback(track(128.0, 0.9), Label::Liked, None);
        engine.submit_feedback(track(70.0, 0.1), Label::Skipped, None);
        engine.submit_feedback(track(110.0, 0.6), Label::Liked, None);
        engine.train();
        let first = engine.model().unwrap();
        engine.train();
        let second = engine.model().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(first.same_parameters(&second));
    }

    #[test]
    fn training_on_more_feedback_replaces_model() {
        let engine = PreferenceEngine::default();
        engine.submit_feedback(track(128.0, 0.9), Label::Liked, None);
        engine.train();
        let before = engine.model().unwrap();
        engine.submit_feedback(track(70.0, 0.1), Label::Skipped, None);
        engine.train();
        let after = engine.model().unwrap();
        assert_eq!(before.sample_count(), 1);
        assert_eq!(after.sample_count(), 2);
        assert_eq!(engine.feedback_count(), 2);
    }

    #[test]
    fn concurrent_predictions_during_training_stay_consistent() {
        let engine = Arc::new(PreferenceEngine::default());
        for step in 0..40 {
            let label = if step % 2 == 0 { Label::Liked } else { Label::Skipped };
            let tempo = if step % 2 == 0 { 130.0 } else { 70.0 };
            engine.submit_feedback(track(tempo + f64::from(step), 0.5), label, None);
        }
        engine.train();

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for _ in 0..50 {
                        if worker == 0 {
                            engine.train();
                        } else {
                            let prediction = engine.predict(&track(100.0, 0.5));
                            assert!(prediction.trained);
                            assert!((0.0..=1.0).contains(&prediction.probability));
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
    }

    #[test]
    fn rank_uses_configured_filters() {
        let config = EngineConfig {
            filters: ListeningFilters {
                energy_range: (0.3, 1.0),
                tempo_range: (60.0, 180.0),
                blocked_artists: vec!["Nickelback".into()],
                ..ListeningFilters::default()
            },
            ..EngineConfig::default()
        };
        let engine = PreferenceEngine::new(config);
        engine.submit_feedback(track(128.0, 0.9), Label::Liked, None);
        engine.submit_feedback(track(75.0, 0.35), Label::Skipped, None);
        engine.train();
        let ranked = engine.rank(vec![
            Candidate::new("calm", track(80.0, 0.4)),
            Candidate::new("quiet", track(100.0, 0.1)),
            Candidate::new("banger", track(126.0, 0.88)),
            Candidate::new("blocked", track(127.0, 0.9)).with_artist("Nickelback"),
        ]);
        let ids: Vec<&str> = ranked.iter().map(|track| track.id.as_str()).collect();
        assert_eq!(ids, ["banger", "calm"]);
        assert!(ranked[0].probability > ranked[1].probability);
    }

    #[test]
    fn extreme_features_never_produce_nan() {
        let engine = PreferenceEngine::default();
        for (tempo, energy, label) in [
            (100.6, 0.2, Label::Liked),
            (100.5, 0.3, Label::Liked),
            (100.0, 0.9, Label::Skipped),
            (100.1, 0.8, Label::Skipped),
        ] {
            engine.submit_feedback(track(tempo, energy), label, None);
        }
        assert!(engine.train().trained);

        let prediction = engine.predict(&track(1e308, 1e308));
        assert!(prediction.trained);
        assert!((0.0..=1.0).contains(&prediction.probability));

        let ranked = engine.rank_filtered(
            vec![
                Candidate::new("extreme", track(1e308, 1e308)),
                Candidate::new("liked-like", track(100.6, 0.2)),
            ],
            &ListeningFilters {
                energy_range: (0.0, f64::MAX),
                tempo_range: (0.0, f64::MAX),
                ..ListeningFilters::default()
            },
        );
        assert_eq!(ranked[0].id, "liked-like");
        assert!(ranked.iter().all(|track| (0.0..=1.0).contains(&track.probability)));
    }

    #[test]
    fn summary_reflects_feedback() {
        let engine = PreferenceEngine::default();
        engine.submit_feedback(track(120.0, 0.5), Label::Liked, None);
        engine.submit_feedback(track(80.0, 0.2), Label::Skipped, Some("DONT_LIKE_ARTIST".into()));
        let summary = engine.feedback_summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.skip_reasons["DONT_LIKE_ARTIST"], 1);
        assert_eq!(
            engine.feedback_records()[1].skip_reason.as_deref(),
            Some("DONT_LIKE_ARTIST")
        );
    }

    #[test]
    fn telemetry_records_lifecycle() {
        let tmp = tempdir().unwrap();
        let log_path = tmp.path().join("preference.log");
        let events = Arc::new(MemorySink::new(16));
        let telemetry = PreferenceTelemetry::builder("preference")
            .log_path(&log_path)
            .memory_events(Arc::clone(&events))
            .build()
            .unwrap();
        let engine = PreferenceEngine::default().with_telemetry(telemetry);
        engine.train();
        engine.submit_feedback(track(120.0, 0.5), Label::Liked, None);
        engine.train();

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("training_skipped_no_data"));
        assert!(log.contains("feedback_recorded"));
        assert!(log.contains("training_complete"));
        let types: Vec<String> = events
            .snapshot()
            .into_iter()
            .map(|event| event.event_type)
            .collect();
        assert_eq!(
            types,
            ["preference.feedback.recorded", "preference.model.trained"]
        );
    }
}
