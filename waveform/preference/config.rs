use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared_logging::LogLevel;

use crate::{error::PreferenceError, ranking::ListeningFilters};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Solver hyper-parameters.
    pub training: TrainingConfig,
    /// Thresholds used by the explanation heuristic.
    pub explanation: ExplanationConfig,
    /// Default ranges applied when ranking candidates.
    pub filters: ListeningFilters,
    /// Optional telemetry sinks.
    pub telemetry: TelemetryConfig,
}

impl EngineConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading engine config {}", path.display()))?;
        let mut config = Self::from_toml_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        let source_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.telemetry.resolve_relative_to(&source_dir);
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value is within its accepted range.
    pub fn validate(&self) -> Result<(), PreferenceError> {
        self.training.validate()?;
        self.explanation.validate()?;
        self.filters.validate()
    }
}

/// Logistic regression hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Inverse L2 regularization strength.
    pub c: f64,
    /// L-BFGS iteration cap.
    pub max_iter: usize,
    /// Gradient norm at which the solver stops.
    pub tolerance: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tolerance: 1e-6,
        }
    }
}

impl TrainingConfig {
    fn validate(&self) -> Result<(), PreferenceError> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(invalid(format!("training.c must be > 0, got {}", self.c)));
        }
        if self.max_iter == 0 {
            return Err(invalid("training.max_iter must be at least 1".into()));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(invalid(format!(
                "training.tolerance must be > 0, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Explanation heuristic thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplanationConfig {
    /// Tempo difference (BPM) below which tracks count as similar.
    pub tempo_threshold: f64,
    /// Energy difference below which tracks count as similar.
    pub energy_threshold: f64,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            tempo_threshold: 10.0,
            energy_threshold: 0.2,
        }
    }
}

impl ExplanationConfig {
    fn validate(&self) -> Result<(), PreferenceError> {
        for (name, value) in [
            ("tempo_threshold", self.tempo_threshold),
            ("energy_threshold", self.energy_threshold),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(format!("explanation.{name} must be >= 0, got {value}")));
            }
        }
        Ok(())
    }
}

/// Where telemetry goes; both sinks are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// JSON-lines log file.
    pub log_path: Option<PathBuf>,
    /// JSON-lines event file.
    pub event_path: Option<PathBuf>,
    /// Least severe level written to the log file.
    pub min_level: LogLevel,
}

impl TelemetryConfig {
    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.log_path, &mut self.event_path].into_iter().flatten() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

pub(crate) fn invalid(message: String) -> PreferenceError {
    PreferenceError::InvalidConfig(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.training.max_iter, 100);
        assert_eq!(config.explanation.tempo_threshold, 10.0);
        assert_eq!(config.filters.tempo_range, (50.0, 200.0));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [training]
            c = 0.5

            [filters]
            energy_range = [0.2, 0.9]
            block_explicit = true
            blocked_artists = ["Drake"]
            "#,
        )
        .unwrap();
        assert_eq!(config.training.c, 0.5);
        assert_eq!(config.training.tolerance, 1e-6);
        assert_eq!(config.filters.energy_range, (0.2, 0.9));
        assert_eq!(config.filters.tempo_range, (50.0, 200.0));
        assert!(config.filters.block_explicit);
        assert_eq!(config.filters.blocked_artists, ["Drake"]);
        assert_eq!(config.filters.release_year_range, (1970, 2025));
        assert!(!config.filters.focus_obscure);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = EngineConfig::from_toml_str("[training]\nc = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("training.c"));
        assert!(EngineConfig::from_toml_str("[training]\nmax_iter = 0\n").is_err());
        assert!(EngineConfig::from_toml_str("[explanation]\nenergy_threshold = -1.0\n").is_err());
        assert!(EngineConfig::from_toml_str("[filters]\ntempo_range = [180.0, 60.0]\n").is_err());
        assert!(
            EngineConfig::from_toml_str("[filters]\nrelease_year_range = [2020, 1990]\n").is_err()
        );
    }

    #[test]
    fn load_resolves_telemetry_paths_next_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        fs::write(&path, "[telemetry]\nlog_path = \"logs/preference.log\"\n").unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(
            config.telemetry.log_path,
            Some(dir.path().join("logs/preference.log"))
        );
        assert!(config.telemetry.event_path.is_none());
        assert_eq!(config.telemetry.min_level, LogLevel::Debug);
    }

    #[test]
    fn min_level_parses_uppercase_names() {
        let config = EngineConfig::from_toml_str("[telemetry]\nmin_level = \"WARN\"\n").unwrap();
        assert_eq!(config.telemetry.min_level, LogLevel::Warn);
        assert!(EngineConfig::from_toml_str("[telemetry]\nmin_level = \"LOUD\"\n").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = EngineConfig::load("/nonexistent/engine.toml").unwrap_err();
        assert!(err.to_string().contains("reading engine config"));
    }
}
