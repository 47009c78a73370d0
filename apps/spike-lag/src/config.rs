use crate::error::SpikeLagError;
use crate::series::Platform;
use crate::services::analysis::normalize::DEFAULT_EPSILON;
use crate::services::analysis::spikes::SpikeDetectOptions;
use crate::time::days_to_ms;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_PATH_ENV: &str = "SPIKE_LAG_CONFIG_PATH";
const DEFAULT_CACHE_DIR: &str = ".";

/// Tunables for one song's analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub diff_lag: usize,
    pub threshold_multiplier_a: f64,
    pub threshold_multiplier_b: f64,
    /// Zero-range guard for min/max normalization. Historical outputs used 1.0.
    pub epsilon: f64,
    pub merge_gap_days: i64,
    pub causation_window_days: i64,
    /// Keep only the most recent N samples; `None` analyses the full history.
    pub max_samples: Option<usize>,
    /// Greedy pairs at or beyond this delay are left out of the batch delay mean.
    pub greedy_max_delay_days: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            diff_lag: 2,
            threshold_multiplier_a: 1.0,
            threshold_multiplier_b: 1.0,
            epsilon: DEFAULT_EPSILON,
            merge_gap_days: 0,
            causation_window_days: 20,
            max_samples: Some(90),
            greedy_max_delay_days: 20.0,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |msg: String| Err(SpikeLagError::InvalidConfig(msg));
        if self.diff_lag == 0 {
            return invalid("diff_lag must be at least 1".to_string());
        }
        for (name, value) in [
            ("threshold_multiplier_a", self.threshold_multiplier_a),
            ("threshold_multiplier_b", self.threshold_multiplier_b),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{name} must be finite and non-negative (got {value})"));
            }
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return invalid(format!(
                "epsilon must be positive and finite (got {})",
                self.epsilon
            ));
        }
        if self.merge_gap_days < 0 {
            return invalid(format!(
                "merge_gap_days must be non-negative (got {})",
                self.merge_gap_days
            ));
        }
        if self.causation_window_days < 0 {
            return invalid(format!(
                "causation_window_days must be non-negative (got {})",
                self.causation_window_days
            ));
        }
        if self.max_samples == Some(0) {
            return invalid("max_samples must be at least 1 when set".to_string());
        }
        if !self.greedy_max_delay_days.is_finite() || self.greedy_max_delay_days <= 0.0 {
            return invalid(format!(
                "greedy_max_delay_days must be positive (got {})",
                self.greedy_max_delay_days
            ));
        }
        Ok(())
    }

    pub fn threshold_multiplier(&self, platform: Platform) -> f64 {
        match platform {
            Platform::A => self.threshold_multiplier_a,
            Platform::B => self.threshold_multiplier_b,
        }
    }

    pub fn detect_options(&self, platform: Platform) -> SpikeDetectOptions {
        SpikeDetectOptions {
            diff_lag: self.diff_lag,
            threshold_multiplier: self.threshold_multiplier(platform),
            merge_gap_ms: days_to_ms(self.merge_gap_days),
        }
    }

    pub fn causation_window_ms(&self) -> i64 {
        days_to_ms(self.causation_window_days)
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub cache_dir: PathBuf,
    pub max_concurrency: usize,
    pub analysis: AnalysisConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            max_concurrency: default_concurrency(),
            analysis: AnalysisConfig::default(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    cache_dir: Option<String>,
    #[serde(default)]
    max_concurrency: Option<usize>,
    #[serde(default)]
    analysis: Option<AnalysisConfig>,
}

/// Values supplied on the command line; applied last.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub cache_dir: Option<PathBuf>,
    pub max_concurrency: Option<usize>,
    pub epsilon: Option<f64>,
    pub causation_window_days: Option<i64>,
    pub threshold_multiplier_a: Option<f64>,
    pub threshold_multiplier_b: Option<f64>,
    pub full_history: bool,
}

pub fn config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn load_config_file(path: &Path) -> Option<ConfigFile> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to read config file; using defaults"
            );
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse config file; using defaults"
            );
            None
        }
    }
}

fn env_parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let Some(raw) = lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .with_context(|| format!("{key} has an invalid value: {raw:?}"))
}

impl RunConfig {
    /// Defaults, then the JSON config file (if any), then `SPIKE_LAG_*` env vars.
    pub fn load(cli_config_path: Option<&Path>) -> Result<Self> {
        let mut config = RunConfig::default();
        if let Some(path) = config_path(cli_config_path) {
            if let Some(file) = load_config_file(&path) {
                config.apply_file(file);
            }
        }
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(dir) = file
            .cache_dir
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(limit) = file.max_concurrency.filter(|v| *v != 0) {
            self.max_concurrency = limit;
        }
        if let Some(analysis) = file.analysis {
            self.analysis = analysis;
        }
    }

    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup("SPIKE_LAG_CACHE_DIR")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
        {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(limit) = env_parse::<usize>(&lookup, "SPIKE_LAG_MAX_CONCURRENCY")? {
            self.max_concurrency = limit;
        }
        if let Some(epsilon) = env_parse::<f64>(&lookup, "SPIKE_LAG_EPSILON")? {
            self.analysis.epsilon = epsilon;
        }
        if let Some(days) = env_parse::<i64>(&lookup, "SPIKE_LAG_CAUSATION_WINDOW_DAYS")? {
            self.analysis.causation_window_days = days;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(dir) = overrides.cache_dir.as_ref() {
            self.cache_dir = dir.clone();
        }
        if let Some(limit) = overrides.max_concurrency {
            self.max_concurrency = limit;
        }
        if let Some(epsilon) = overrides.epsilon {
            self.analysis.epsilon = epsilon;
        }
        if let Some(days) = overrides.causation_window_days {
            self.analysis.causation_window_days = days;
        }
        if let Some(multiplier) = overrides.threshold_multiplier_a {
            self.analysis.threshold_multiplier_a = multiplier;
        }
        if let Some(multiplier) = overrides.threshold_multiplier_b {
            self.analysis.threshold_multiplier_b = multiplier;
        }
        if overrides.full_history {
            self.analysis.max_samples = None;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            anyhow::bail!("max_concurrency must be at least 1");
        }
        if self.cache_dir.as_os_str().is_empty() {
            anyhow::bail!("cache_dir resolved to an empty path");
        }
        self.analysis.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{AnalysisConfig, ConfigFile, Overrides, RunConfig};
    use crate::series::Platform;
    use crate::time::MS_PER_DAY;
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::PathBuf;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();
        config.validate().expect("default config validates");
        assert_eq!(config.diff_lag, 2);
        assert_eq!(config.max_samples, Some(90));
        assert_eq!(config.causation_window_ms(), 20 * MS_PER_DAY);
    }

    #[test]
    fn per_platform_multipliers_reach_detect_options() {
        let config = AnalysisConfig {
            threshold_multiplier_b: 3.0,
            merge_gap_days: 1,
            ..AnalysisConfig::default()
        };
        assert_eq!(config.detect_options(Platform::A).threshold_multiplier, 1.0);
        let b = config.detect_options(Platform::B);
        assert_eq!(b.threshold_multiplier, 3.0);
        assert_eq!(b.merge_gap_ms, MS_PER_DAY);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            AnalysisConfig {
                diff_lag: 0,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                epsilon: 0.0,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                threshold_multiplier_a: f64::NAN,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                causation_window_days: -1,
                ..AnalysisConfig::default()
            },
            AnalysisConfig {
                max_samples: Some(0),
                ..AnalysisConfig::default()
            },
        ];
        for case in cases {
            assert!(case.validate().is_err(), "{case:?} should be rejected");
        }
    }

    #[test]
    fn partial_analysis_block_keeps_other_defaults() {
        let file: ConfigFile =
            serde_json::from_str(r#"{"cache_dir":"/tmp/cache","analysis":{"epsilon":1.0}}"#)
                .expect("parse");
        let mut config = RunConfig::default();
        config.apply_file(file);
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
        assert_eq!(config.analysis.epsilon, 1.0);
        assert_eq!(config.analysis.causation_window_days, 20);
    }

    #[test]
    fn unparseable_config_file_is_ignored() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        write!(file, "{{not json").expect("write");
        assert!(super::load_config_file(file.path()).is_none());
        assert!(super::load_config_file(&PathBuf::from("/nonexistent/spike-lag.json")).is_none());
    }

    #[test]
    fn env_overrides_apply_and_bad_values_fail() {
        let mut config = RunConfig::default();
        config
            .apply_env_with(lookup(&[
                ("SPIKE_LAG_CACHE_DIR", " /data/cache "),
                ("SPIKE_LAG_MAX_CONCURRENCY", "3"),
                ("SPIKE_LAG_EPSILON", "1"),
                ("SPIKE_LAG_CAUSATION_WINDOW_DAYS", "14"),
            ]))
            .expect("env applies");
        assert_eq!(config.cache_dir, PathBuf::from("/data/cache"));
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.analysis.epsilon, 1.0);
        assert_eq!(config.analysis.causation_window_days, 14);

        let err = RunConfig::default()
            .apply_env_with(lookup(&[("SPIKE_LAG_MAX_CONCURRENCY", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("SPIKE_LAG_MAX_CONCURRENCY"));
    }

    #[test]
    fn command_line_overrides_win() {
        let mut config = RunConfig::default();
        config
            .apply_env_with(lookup(&[("SPIKE_LAG_EPSILON", "1")]))
            .expect("env");
        config.apply_overrides(&Overrides {
            epsilon: Some(1e-6),
            threshold_multiplier_a: Some(3.0),
            full_history: true,
            ..Overrides::default()
        });
        assert_eq!(config.analysis.epsilon, 1e-6);
        assert_eq!(config.analysis.threshold_multiplier_a, 3.0);
        assert_eq!(config.analysis.max_samples, None);
        config.validate().expect("valid");
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = RunConfig {
            max_concurrency: 0,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
