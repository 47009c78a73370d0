use crate::series::Platform;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpikeLagError>;

#[derive(Error, Debug)]
pub enum SpikeLagError {
    /// Min/max normalization has nothing to work on.
    #[error("cannot normalize an empty series")]
    EmptyInput,

    /// Fewer points than the finite-difference lag needs.
    #[error("series has {len} points; at least {required} are needed for spike detection")]
    InsufficientSeriesLength { len: usize, required: usize },

    /// Triggering spike has a zero jump, so its coefficient is undefined.
    #[error("triggering jump is zero; coefficient skipped")]
    DivisionByZeroSkip,

    #[error("series for song {song_id} on platform {platform} is unavailable")]
    MissingSeries { song_id: String, platform: Platform },

    #[error("invalid series: {0}")]
    InvalidSeries(String),

    #[error("invalid analysis config: {0}")]
    InvalidConfig(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl SpikeLagError {
    /// Failures that only skip the current song in a batch run.
    pub fn is_song_local(&self) -> bool {
        matches!(
            self,
            SpikeLagError::EmptyInput
                | SpikeLagError::MissingSeries { .. }
                | SpikeLagError::InvalidSeries(_)
                | SpikeLagError::Io { .. }
                | SpikeLagError::Csv { .. }
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            SpikeLagError::EmptyInput => "empty_input",
            SpikeLagError::InsufficientSeriesLength { .. } => "insufficient_series_length",
            SpikeLagError::DivisionByZeroSkip => "division_by_zero_skip",
            SpikeLagError::MissingSeries { .. } => "missing_series",
            SpikeLagError::InvalidSeries(_) => "invalid_series",
            SpikeLagError::InvalidConfig(_) => "invalid_config",
            SpikeLagError::Io { .. } => "io",
            SpikeLagError::Csv { .. } => "csv",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SpikeLagError;
    use crate::series::Platform;

    #[test]
    fn missing_series_message_names_song_and_platform() {
        let err = SpikeLagError::MissingSeries {
            song_id: "njtwgzci".to_string(),
            platform: Platform::B,
        };
        let message = err.to_string();
        assert!(message.contains("njtwgzci"));
        assert!(message.contains("platform_b"));
        assert!(err.is_song_local());
        assert_eq!(err.code(), "missing_series");
    }

    #[test]
    fn config_errors_are_not_song_local() {
        let err = SpikeLagError::InvalidConfig("diff_lag must be at least 1".to_string());
        assert!(!err.is_song_local());
    }
}
