use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::PreferenceError,
    features::{vectorize, FeatureSet, FeatureVector},
};

/// Reason bucket used by [`FeedbackSummary`] for skips submitted without one.
pub const UNSPECIFIED_SKIP_REASON: &str = "UNSPECIFIED";

/// Binary feedback label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Label {
    /// Skipped before the end (0).
    Skipped,
    /// Liked or fully played (1).
    Liked,
}

impl Label {
    /// Whether this is the positive class of the classifier.
    #[must_use]
    pub const fn is_liked(self) -> bool {
        matches!(self, Self::Liked)
    }
}

impl TryFrom<i64> for Label {
    type Error = PreferenceError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Skipped),
            1 => Ok(Self::Liked),
            other => Err(PreferenceError::InvalidLabel(other)),
        }
    }
}

impl From<Label> for i64 {
    fn from(label: Label) -> Self {
        match label {
            Label::Skipped => 0,
            Label::Liked => 1,
        }
    }
}

/// One immutable entry of the feedback log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Audit identifier.
    pub id: Uuid,
    /// Vectorized track features.
    pub vector: FeatureVector,
    /// Submitted label.
    pub label: Label,
    /// Free-form skip reason (e.g. `NOT_IN_MOOD`). Stored, not modeled.
    pub skip_reason: Option<String>,
    /// Submission time.
    pub recorded_at: DateTime<Utc>,
}

/// Counts over the feedback log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSummary {
    /// Number of records.
    pub total: usize,
    /// Records labeled liked.
    pub liked: usize,
    /// Records labeled skipped.
    pub skipped: usize,
    /// Skip counts per reason, in first-seen order.
    pub skip_reasons: IndexMap<String, usize>,
}

/// Append-only feedback log plus the raw features of the latest submission.
#[derive(Debug, Clone, Default)]
pub struct FeedbackStore {
    records: Vec<FeedbackRecord>,
    last_track: Option<FeatureSet>,
}

impl FeedbackStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record and moves the last-track pointer to `features`,
    /// whatever the label or skip reason.
    pub fn record(
        &mut self,
        features: FeatureSet,
        label: Label,
        skip_reason: Option<String>,
    ) -> FeedbackRecord {
        let record = FeedbackRecord {
            id: Uuid::new_v4(),
            vector: vectorize(&features),
            label,
            skip_reason,
            recorded_at: Utc::now(),
        };
        self.records.push(record.clone());
        self.last_track = Some(features);
        record
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in submission order.
    #[must_use]
    pub fn records(&self) -> &[FeedbackRecord] {
        &self.records
    }

    /// Raw features of the most recent submission.
    #[must_use]
    pub const fn last_track(&self) -> Option<&FeatureSet> {
        self.last_track.as_ref()
    }

    /// Copies out the (vector, label) pairs the trainer consumes.
    #[must_use]
    pub fn training_snapshot(&self) -> Vec<(FeatureVector, Label)> {
        self.records
            .iter()
            .map(|record| (record.vector, record.label))
            .collect()
    }

    /// Tallies labels and skip reasons.
    #[must_use]
    pub fn summary(&self) -> FeedbackSummary {
        let mut summary = FeedbackSummary {
            total: self.records.len(),
            ..FeedbackSummary::default()
        };
        for record in &self.records {
            match record.label {
                Label::Liked => summary.liked += 1,
                Label::Skipped => {
                    summary.skipped += 1;
                    let reason = record
                        .skip_reason
                        .as_deref()
                        .unwrap_or(UNSPECIFIED_SKIP_REASON);
                    *summary.skip_reasons.entry(reason.to_owned()).or_insert(0) += 1;
                }
            }
        }
        summary
    }
}
