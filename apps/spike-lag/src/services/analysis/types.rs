use crate::series::Platform;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SummaryStats {
    pub count: u64,
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PartitionSummary {
    pub leader: Platform,
    pub coefficient: SummaryStats,
    pub delay_days: SummaryStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateSummary {
    pub a_led: PartitionSummary,
    pub b_led: PartitionSummary,
    /// Nearest-start pair delays below the configured cutoff.
    pub greedy_delay_days: SummaryStats,
    pub greedy_coefficient: SummaryStats,
    pub rejected_non_finite: u64,
}

/// Per-song row of a batch report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongSummary {
    pub song_id: String,
    pub title: String,
    pub spikes_a: usize,
    pub spikes_b: usize,
    pub links: usize,
    pub a_led: usize,
    pub b_led: usize,
    pub greedy_pairs: usize,
    pub skipped_zero_jump: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SongFailure {
    pub song_id: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub songs_requested: usize,
    pub songs_analyzed: usize,
    pub songs_failed: usize,
    pub songs: Vec<SongSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<SongFailure>,
    pub aggregate: AggregateSummary,
}
