use crate::error::{Result, SpikeLagError};
use crate::series::Series;
use serde::Serialize;
use std::collections::HashMap;

/// Default zero-range guard added to `max - min`.
///
/// Older outputs were produced with a guard of exactly `1.0`; pass that value
/// through `AnalysisConfig::epsilon` to reproduce them.
pub const DEFAULT_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedPoint {
    pub timestamp_ms: i64,
    pub raw_value: f64,
    pub normalized: f64,
}

/// Min/max scaled copy of a [`Series`] with an O(1) timestamp lookup.
#[derive(Debug, Clone)]
pub struct NormalizedSeries {
    points: Vec<NormalizedPoint>,
    by_timestamp: HashMap<i64, usize>,
}

impl NormalizedSeries {
    pub fn points(&self) -> &[NormalizedPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn normalized_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.normalized).collect()
    }

    pub fn timestamp(&self, idx: usize) -> Option<i64> {
        self.points.get(idx).map(|p| p.timestamp_ms)
    }

    pub fn value_at(&self, timestamp_ms: i64) -> Option<f64> {
        self.by_timestamp
            .get(&timestamp_ms)
            .map(|idx| self.points[*idx].normalized)
    }
}

/// `(v - min) / (max - min + epsilon)` for every value.
///
/// A constant input maps to all zeros (`0 / epsilon`), never NaN.
pub fn normalize_values(values: &[f64], epsilon: f64) -> Result<Vec<f64>> {
    if values.is_empty() {
        return Err(SpikeLagError::EmptyInput);
    }
    if !epsilon.is_finite() || epsilon <= 0.0 {
        return Err(SpikeLagError::InvalidConfig(format!(
            "epsilon must be positive and finite (got {epsilon})"
        )));
    }

    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    if !min.is_finite() || !max.is_finite() {
        return Err(SpikeLagError::InvalidSeries(
            "cannot normalize non-finite values".to_string(),
        ));
    }

    let denom = max - min + epsilon;
    Ok(values.iter().map(|v| (v - min) / denom).collect())
}

pub fn normalize_series(series: &Series, epsilon: f64) -> Result<NormalizedSeries> {
    let normalized = normalize_values(&series.values(), epsilon)?;
    let points: Vec<NormalizedPoint> = series
        .points()
        .iter()
        .zip(normalized)
        .map(|(point, normalized)| NormalizedPoint {
            timestamp_ms: point.timestamp_ms,
            raw_value: point.value,
            normalized,
        })
        .collect();
    let by_timestamp = points
        .iter()
        .enumerate()
        .map(|(idx, p)| (p.timestamp_ms, idx))
        .collect();
    Ok(NormalizedSeries {
        points,
        by_timestamp,
    })
}
