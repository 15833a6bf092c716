use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Number of attributes in the vocabulary.
pub const FEATURE_COUNT: usize = 9;

/// Named audio attributes, declared in canonical vector order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AudioFeature {
    /// How suitable the track is for dancing, 0..1.
    Danceability,
    /// Perceived intensity, 0..1.
    Energy,
    /// Musical positiveness, 0..1.
    Valence,
    /// Beats per minute.
    Tempo,
    /// Overall loudness in dB.
    Loudness,
    /// Presence of spoken words, 0..1.
    Speechiness,
    /// Likelihood of no vocals, 0..1.
    Instrumentalness,
    /// Likelihood of a live recording, 0..1.
    Liveness,
    /// Acoustic confidence, 0..1.
    Acousticness,
}

impl AudioFeature {
    /// Every attribute in canonical order.
    pub const ALL: [Self; FEATURE_COUNT] = [
        Self::Danceability,
        Self::Energy,
        Self::Valence,
        Self::Tempo,
        Self::Loudness,
        Self::Speechiness,
        Self::Instrumentalness,
        Self::Liveness,
        Self::Acousticness,
    ];

    /// Position of the attribute inside a [`FeatureVector`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Key used in feature maps.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Danceability => "danceability",
            Self::Energy => "energy",
            Self::Valence => "valence",
            Self::Tempo => "tempo",
            Self::Loudness => "loudness",
            Self::Speechiness => "speechiness",
            Self::Instrumentalness => "instrumentalness",
            Self::Liveness => "liveness",
            Self::Acousticness => "acousticness",
        }
    }
}

impl fmt::Display for AudioFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AudioFeature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|feature| feature.name() == s)
            .ok_or_else(|| format!("unknown audio feature `{s}`"))
    }
}

/// Sparse named attributes describing one track.
///
/// Keys outside the vocabulary are kept (callers often forward whole
/// audio-feature payloads) but never reach the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(IndexMap<String, f64>);

impl FeatureSet {
    /// Creates an empty feature set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a vocabulary attribute.
    #[must_use]
    pub fn with(mut self, feature: AudioFeature, value: f64) -> Self {
        self.0.insert(feature.name().to_owned(), value);
        self
    }

    /// Sets an arbitrary key.
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    /// Raw lookup; `None` when the key is absent.
    #[must_use]
    pub fn get(&self, feature: AudioFeature) -> Option<f64> {
        self.0.get(feature.name()).copied()
    }

    /// Lookup with the missing-attribute policy applied: absent reads as `0.0`.
    #[must_use]
    pub fn value(&self, feature: AudioFeature) -> f64 {
        self.get(feature).unwrap_or(0.0)
    }

    /// Number of keys present, including unknown ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no key is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Dense attribute values in [`AudioFeature::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Value of a single attribute.
    #[must_use]
    pub const fn get(&self, feature: AudioFeature) -> f64 {
        self.0[feature.index()]
    }

    /// Borrow as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Maps a feature set to its dense vector.
///
/// Missing attributes become `0.0` and unknown keys are ignored. Training and
/// prediction both go through this function so the layout never diverges.
#[must_use]
pub fn vectorize(features: &FeatureSet) -> FeatureVector {
    let mut dense = [0.0; FEATURE_COUNT];
    for feature in AudioFeature::ALL {
        dense[feature.index()] = features.value(feature);
    }
    FeatureVector(dense)
}
