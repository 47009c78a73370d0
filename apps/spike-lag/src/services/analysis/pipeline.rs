use super::causation::{determine_causation, CausationLink};
use super::coefficients::{compute_coefficients, greedy_coefficients, CoefficientSet, GreedyCoefficient};
use super::normalize::{normalize_series, NormalizedSeries};
use super::pairing::{pair_nearest, GreedyPair};
use super::spikes::{detect_spikes, DetectedSpikes};
use super::types::SongSummary;
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::series::{Platform, Series, SongSeries, TrackMeta};
use serde::Serialize;

/// Everything derived from one song's pair of series.
#[derive(Debug, Clone, Serialize)]
pub struct SongAnalysis {
    pub song_id: String,
    pub meta: TrackMeta,
    pub samples_a: usize,
    pub samples_b: usize,
    pub spikes_a: DetectedSpikes,
    pub spikes_b: DetectedSpikes,
    pub links: Vec<CausationLink>,
    pub coefficients: CoefficientSet,
    /// Platform-B spikes paired with their nearest platform-A spike start.
    pub greedy_pairs: Vec<GreedyPair>,
    pub greedy_coefficients: Vec<GreedyCoefficient>,
    pub greedy_skipped_zero_jump: usize,
}

impl SongAnalysis {
    pub fn spikes(&self, platform: Platform) -> &DetectedSpikes {
        match platform {
            Platform::A => &self.spikes_a,
            Platform::B => &self.spikes_b,
        }
    }

    pub fn skipped_zero_jump(&self) -> usize {
        self.coefficients.skipped_zero_jump + self.greedy_skipped_zero_jump
    }

    pub fn summary(&self) -> SongSummary {
        SongSummary {
            song_id: self.song_id.clone(),
            title: self.meta.title.clone(),
            spikes_a: self.spikes_a.spikes.len(),
            spikes_b: self.spikes_b.spikes.len(),
            links: self.links.len(),
            a_led: self.coefficients.a_led.len(),
            b_led: self.coefficients.b_led.len(),
            greedy_pairs: self.greedy_pairs.len(),
            skipped_zero_jump: self.skipped_zero_jump(),
        }
    }
}

fn windowed(series: &Series, max_samples: Option<usize>) -> Series {
    match max_samples {
        Some(n) => series.most_recent(n),
        None => series.clone(),
    }
}

fn prepare(series: &Series, config: &AnalysisConfig) -> Result<NormalizedSeries> {
    normalize_series(&windowed(series, config.max_samples), config.epsilon)
}

/// Normalize, detect, link and score one song.
///
/// Pure over its inputs: the same series and config always give the same
/// links and records.
pub fn analyze_song(song: &SongSeries, config: &AnalysisConfig) -> Result<SongAnalysis> {
    config.validate()?;

    let norm_a = prepare(&song.a, config)?;
    let norm_b = prepare(&song.b, config)?;

    let spikes_a = detect_spikes(&norm_a, Platform::A, &config.detect_options(Platform::A));
    let spikes_b = detect_spikes(&norm_b, Platform::B, &config.detect_options(Platform::B));
    let intervals_a = spikes_a.intervals();
    let intervals_b = spikes_b.intervals();

    let links = determine_causation(&intervals_a, &intervals_b, config.causation_window_ms());
    let coefficients = compute_coefficients(&links, &norm_a, &norm_b);

    let greedy_pairs = pair_nearest(&intervals_b, &intervals_a);
    let (greedy_scored, greedy_skipped) = greedy_coefficients(&greedy_pairs, &norm_b, &norm_a);

    tracing::info!(
        song_id = %song.song_id,
        spikes_a = intervals_a.len(),
        spikes_b = intervals_b.len(),
        links = links.len(),
        a_led = coefficients.a_led.len(),
        b_led = coefficients.b_led.len(),
        skipped_zero_jump = coefficients.skipped_zero_jump,
        "song analyzed"
    );

    Ok(SongAnalysis {
        song_id: song.song_id.clone(),
        meta: song.meta.clone(),
        samples_a: norm_a.len(),
        samples_b: norm_b.len(),
        spikes_a,
        spikes_b,
        links,
        coefficients,
        greedy_pairs,
        greedy_coefficients: greedy_scored,
        greedy_skipped_zero_jump: greedy_skipped,
    })
}
