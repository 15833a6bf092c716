use serde::{Deserialize, Serialize};

use crate::{
    config::invalid,
    error::PreferenceError,
    features::{AudioFeature, FeatureSet},
    predictor::Prediction,
};

/// Popularity above which a track no longer counts as obscure.
pub const OBSCURE_POPULARITY_LIMIT: u8 = 70;

/// A track offered for ranking.
///
/// Catalog metadata is optional; a filter never rejects a track for
/// metadata it does not carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Caller-side identifier (e.g. a catalog track id).
    pub id: String,
    /// Audio features of the track.
    pub features: FeatureSet,
    /// Primary artist name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    /// Explicit-content flag.
    #[serde(default)]
    pub explicit: bool,
    /// Album release year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
    /// Catalog popularity, 0..=100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity: Option<u8>,
}

impl Candidate {
    /// Creates a candidate without catalog metadata.
    #[must_use]
    pub fn new(id: impl Into<String>, features: FeatureSet) -> Self {
        Self {
            id: id.into(),
            features,
            artist: None,
            explicit: false,
            release_year: None,
            popularity: None,
        }
    }

    /// Sets the primary artist.
    #[must_use]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// Marks the track as explicit.
    #[must_use]
    pub const fn with_explicit(mut self, explicit: bool) -> Self {
        self.explicit = explicit;
        self
    }

    /// Sets the release year.
    #[must_use]
    pub const fn with_release_year(mut self, year: i32) -> Self {
        self.release_year = Some(year);
        self
    }

    /// Sets the catalog popularity.
    #[must_use]
    pub const fn with_popularity(mut self, popularity: u8) -> Self {
        self.popularity = Some(popularity);
        self
    }
}

/// Listener preferences a candidate must satisfy. Ranges are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListeningFilters {
    /// Accepted energy range.
    pub energy_range: (f64, f64),
    /// Accepted tempo range in BPM.
    pub tempo_range: (f64, f64),
    /// Accepted release years.
    pub release_year_range: (i32, i32),
    /// Drop tracks flagged explicit.
    pub block_explicit: bool,
    /// Artists whose tracks are dropped (exact name match).
    pub blocked_artists: Vec<String>,
    /// Drop tracks more popular than [`OBSCURE_POPULARITY_LIMIT`].
    pub focus_obscure: bool,
}

impl Default for ListeningFilters {
    fn default() -> Self {
        Self {
            energy_range: (0.0, 1.0),
            tempo_range: (50.0, 200.0),
            release_year_range: (1970, 2025),
            block_explicit: false,
            blocked_artists: Vec::new(),
            focus_obscure: false,
        }
    }
}

impl ListeningFilters {
    /// Whether the candidate passes every filter. Energy and tempo read
    /// missing attributes as `0.0`.
    #[must_use]
    pub fn accepts(&self, candidate: &Candidate) -> bool {
        self.accepts_catalog(candidate) && self.accepts_audio(&candidate.features)
    }

    /// Whether energy and tempo fall in range.
    #[must_use]
    pub fn accepts_audio(&self, features: &FeatureSet) -> bool {
        within(self.energy_range, features.value(AudioFeature::Energy))
            && within(self.tempo_range, features.value(AudioFeature::Tempo))
    }

    fn accepts_catalog(&self, candidate: &Candidate) -> bool {
        if let Some(artist) = &candidate.artist {
            if self.blocked_artists.iter().any(|blocked| blocked == artist) {
                return false;
            }
        }
        if self.block_explicit && candidate.explicit {
            return false;
        }
        if let Some(year) = candidate.release_year {
            let (first, last) = self.release_year_range;
            if !(first..=last).contains(&year) {
                return false;
            }
        }
        !(self.focus_obscure
            && candidate
                .popularity
                .is_some_and(|popularity| popularity > OBSCURE_POPULARITY_LIMIT))
    }

    pub(crate) fn validate(&self) -> Result<(), PreferenceError> {
        for (name, (low, high)) in [
            ("energy_range", self.energy_range),
            ("tempo_range", self.tempo_range),
        ] {
            if !(low.is_finite() && high.is_finite() && low <= high) {
                return Err(invalid(format!(
                    "filters.{name} must be an ordered finite pair, got [{low}, {high}]"
                )));
            }
        }
        let (first, last) = self.release_year_range;
        if first > last {
            return Err(invalid(format!(
                "filters.release_year_range must be ordered, got [{first}, {last}]"
            )));
        }
        Ok(())
    }
}

fn within((low, high): (f64, f64), value: f64) -> bool {
    (low..=high).contains(&value)
}

/// A candidate with its prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedTrack {
    /// Candidate identifier.
    pub id: String,
    /// Probability of a like.
    pub probability: f64,
    /// Explanation for the score.
    pub reason: String,
}

/// Drops filtered candidates, scores the rest and orders them by descending
/// probability. Equal scores keep their input order.
pub(crate) fn rank_with<F>(
    candidates: Vec<Candidate>,
    filters: &ListeningFilters,
    mut score: F,
) -> Vec<RankedTrack>
where
    F: FnMut(&FeatureSet) -> Prediction,
{
    let mut ranked: Vec<RankedTrack> = candidates
        .into_iter()
        .filter(|candidate| filters.accepts(candidate))
        .map(|candidate| {
            let prediction = score(&candidate.features);
            RankedTrack {
                id: candidate.id,
                probability: prediction.probability,
                reason: prediction.reason,
            }
        })
        .collect();
    ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    ranked
}
