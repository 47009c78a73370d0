use super::intervals::{merge_intervals, SpikeInterval};
use super::normalize::NormalizedSeries;
use crate::error::{Result, SpikeLagError};
use crate::series::Platform;
use serde::Serialize;
use statrs::statistics::Statistics;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpikeValuePair {
    pub start: f64,
    pub end: f64,
}

impl SpikeValuePair {
    pub fn jump(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spike {
    pub platform: Platform,
    pub interval: SpikeInterval,
    pub values: SpikeValuePair,
}

#[derive(Debug, Clone)]
pub struct SpikeDetectOptions {
    pub diff_lag: usize,
    pub threshold_multiplier: f64,
    pub merge_gap_ms: i64,
}

impl Default for SpikeDetectOptions {
    fn default() -> Self {
        Self {
            diff_lag: 2,
            threshold_multiplier: 1.0,
            merge_gap_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectedSpikes {
    pub platform: Platform,
    pub spikes: Vec<Spike>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub diffs_total: usize,
    pub flagged_diffs: usize,
}

impl DetectedSpikes {
    fn empty(platform: Platform) -> Self {
        Self {
            platform,
            spikes: Vec::new(),
            threshold: None,
            diffs_total: 0,
            flagged_diffs: 0,
        }
    }

    pub fn intervals(&self) -> Vec<SpikeInterval> {
        self.spikes.iter().map(|s| s.interval).collect()
    }
}

/// `values[i] - values[i - lag]` for every `i >= lag`.
pub fn finite_differences(values: &[f64], lag: usize) -> Result<Vec<f64>> {
    let required = lag.saturating_add(1);
    if lag == 0 || values.len() < required {
        return Err(SpikeLagError::InsufficientSeriesLength {
            len: values.len(),
            required,
        });
    }
    Ok(values
        .iter()
        .skip(lag)
        .zip(values.iter())
        .map(|(curr, prev)| curr - prev)
        .collect())
}

/// `mean + multiplier * sample_std`; the deviation is 0 below two samples.
pub fn spike_threshold(diffs: &[f64], multiplier: f64) -> Option<f64> {
    if diffs.is_empty() {
        return None;
    }
    let mean = diffs.iter().mean();
    let std_dev = if diffs.len() < 2 {
        0.0
    } else {
        diffs.iter().std_dev()
    };
    let threshold = mean + std_dev * multiplier;
    threshold.is_finite().then_some(threshold)
}

pub fn detect_spikes(
    series: &NormalizedSeries,
    platform: Platform,
    options: &SpikeDetectOptions,
) -> DetectedSpikes {
    let lag = options.diff_lag;
    let diffs = match finite_differences(&series.normalized_values(), lag) {
        Ok(diffs) => diffs,
        Err(err) => {
            tracing::debug!(platform = %platform, error = %err, "no spikes: series too short");
            return DetectedSpikes::empty(platform);
        }
    };

    let mut detected = DetectedSpikes::empty(platform);
    detected.diffs_total = diffs.len();
    let Some(threshold) = spike_threshold(&diffs, options.threshold_multiplier) else {
        return detected;
    };
    detected.threshold = Some(threshold);

    let last_idx = series.len() - 1;
    let mut raw: Vec<SpikeInterval> = Vec::new();
    for (offset, diff) in diffs.iter().enumerate() {
        if *diff <= threshold {
            continue;
        }
        let idx = offset + lag;
        let (Some(start), Some(end)) = (
            series.timestamp(idx - lag),
            series.timestamp(idx.min(last_idx)),
        ) else {
            continue;
        };
        raw.push(SpikeInterval::new(start, end));
    }
    detected.flagged_diffs = raw.len();

    for interval in merge_intervals(raw, options.merge_gap_ms) {
        let (Some(start), Some(end)) = (
            series.value_at(interval.start_ms),
            series.value_at(interval.end_ms),
        ) else {
            tracing::warn!(
                platform = %platform,
                start_ms = interval.start_ms,
                end_ms = interval.end_ms,
                "spike boundary missing from series; dropping spike"
            );
            continue;
        };
        detected.spikes.push(Spike {
            platform,
            interval,
            values: SpikeValuePair { start, end },
        });
    }

    tracing::debug!(
        platform = %platform,
        threshold,
        flagged = detected.flagged_diffs,
        spikes = detected.spikes.len(),
        "spike detection finished"
    );
    detected
}

#[cfg(test)]
mod tests {
    use super::{detect_spikes, finite_differences, spike_threshold, SpikeDetectOptions};
    use crate::error::SpikeLagError;
    use crate::series::{Platform, Series};
    use crate::services::analysis::intervals::SpikeInterval;
    use crate::services::analysis::normalize::{normalize_series, DEFAULT_EPSILON};
    use crate::time::MS_PER_DAY;

    fn daily(values: &[f64]) -> Series {
        let pairs: Vec<(i64, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as i64 * MS_PER_DAY, *v))
            .collect();
        Series::from_pairs(&pairs).expect("series")
    }

    fn day(i: i64) -> i64 {
        i * MS_PER_DAY
    }

    #[test]
    fn finite_differences_use_the_configured_lag() {
        let diffs = finite_differences(&[0.0, 1.0, 3.0, 6.0], 2).expect("diffs");
        assert_eq!(diffs, vec![3.0, 5.0]);
    }

    #[test]
    fn too_short_series_reports_required_length() {
        let err = finite_differences(&[0.0, 1.0], 2).unwrap_err();
        assert!(matches!(
            err,
            SpikeLagError::InsufficientSeriesLength { len: 2, required: 3 }
        ));
    }

    #[test]
    fn too_short_series_yields_no_spikes() {
        let series = normalize_series(&daily(&[0.0, 5.0]), DEFAULT_EPSILON).expect("norm");
        let detected = detect_spikes(&series, Platform::A, &SpikeDetectOptions::default());
        assert!(detected.spikes.is_empty());
        assert_eq!(detected.diffs_total, 0);
    }

    #[test]
    fn constant_series_has_no_spikes_and_finite_threshold() {
        let series = normalize_series(&daily(&[7.0; 30]), DEFAULT_EPSILON).expect("norm");
        let detected = detect_spikes(&series, Platform::B, &SpikeDetectOptions::default());
        assert!(detected.spikes.is_empty());
        assert_eq!(detected.threshold, Some(0.0));
    }

    #[test]
    fn single_difference_threshold_is_the_difference_itself() {
        assert_eq!(spike_threshold(&[0.4], 1.0), Some(0.4));
        assert_eq!(spike_threshold(&[], 1.0), None);
    }

    #[test]
    fn step_is_detected_as_one_merged_interval() {
        let mut values = vec![0.0; 10];
        values.extend(vec![0.8; 9]);
        values.push(1.0);
        let series = normalize_series(&daily(&values), DEFAULT_EPSILON).expect("norm");

        let detected = detect_spikes(&series, Platform::A, &SpikeDetectOptions::default());
        assert_eq!(detected.flagged_diffs, 2, "both lagged diffs cross the step");
        assert_eq!(detected.spikes.len(), 1);

        let spike = detected.spikes[0];
        assert_eq!(spike.interval, SpikeInterval::new(day(8), day(11)));
        assert!(spike.values.start.abs() < 1e-9);
        assert!((spike.values.jump() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn threshold_equal_differences_are_not_spikes() {
        // A unit guard over a range of 7 gives exact eighths, so every lagged
        // diff is exactly 0.25 and equals the threshold.
        let values: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let series = normalize_series(&daily(&values), 1.0).expect("norm");
        let detected = detect_spikes(&series, Platform::A, &SpikeDetectOptions::default());
        assert_eq!(detected.threshold, Some(0.25));
        assert!(detected.spikes.is_empty());
    }

    #[test]
    fn higher_multiplier_suppresses_smaller_bumps() {
        let mut values = vec![0.0; 30];
        values[8] = 0.5;
        for v in values.iter_mut().skip(20) {
            *v = 1.0;
        }
        let series = normalize_series(&daily(&values), DEFAULT_EPSILON).expect("norm");

        let loose = detect_spikes(&series, Platform::A, &SpikeDetectOptions::default());
        let strict = detect_spikes(
            &series,
            Platform::A,
            &SpikeDetectOptions {
                threshold_multiplier: 3.0,
                ..SpikeDetectOptions::default()
            },
        );
        assert_eq!(loose.spikes.len(), 2);
        assert_eq!(strict.spikes.len(), 1);
        assert!(strict
            .spikes
            .iter()
            .all(|s| s.interval.start_ms >= day(18)));
    }
}
