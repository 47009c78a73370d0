use super::causation::{CausationLink, LeadDirection};
use super::intervals::SpikeInterval;
use super::normalize::NormalizedSeries;
use super::pairing::GreedyPair;
use crate::error::{Result, SpikeLagError};
use crate::series::Platform;
use crate::time::whole_days_between;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoefficientRecord {
    /// Responding jump divided by triggering jump.
    pub ratio: f64,
    /// Whole days between the two spike starts.
    pub delay_days: i64,
    pub direction: LeadDirection,
    pub link: CausationLink,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CoefficientSet {
    pub a_led: Vec<CoefficientRecord>,
    pub b_led: Vec<CoefficientRecord>,
    pub skipped_zero_jump: usize,
    pub skipped_unresolved: usize,
}

impl CoefficientSet {
    pub fn len(&self) -> usize {
        self.a_led.len() + self.b_led.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self, direction: LeadDirection) -> &[CoefficientRecord] {
        match direction {
            LeadDirection::AFirst => &self.a_led,
            LeadDirection::BFirst => &self.b_led,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GreedyCoefficient {
    pub probe: SpikeInterval,
    pub candidate: SpikeInterval,
    /// Probe jump divided by candidate jump.
    pub coefficient: f64,
}

/// Normalized rise across `interval` (value at end minus value at start).
pub fn jump(series: &NormalizedSeries, interval: SpikeInterval) -> Result<f64> {
    let lookup = |ts: i64| {
        series.value_at(ts).ok_or_else(|| {
            SpikeLagError::InvalidSeries(format!("no normalized value at timestamp {ts}"))
        })
    };
    Ok(lookup(interval.end_ms)? - lookup(interval.start_ms)?)
}

fn ratio(responding: f64, triggering: f64) -> Result<f64> {
    if triggering == 0.0 {
        return Err(SpikeLagError::DivisionByZeroSkip);
    }
    let ratio = responding / triggering;
    if !ratio.is_finite() {
        return Err(SpikeLagError::DivisionByZeroSkip);
    }
    Ok(ratio)
}

pub fn coefficient_for_link(
    link: &CausationLink,
    series_a: &NormalizedSeries,
    series_b: &NormalizedSeries,
) -> Result<CoefficientRecord> {
    let series_for = |platform: Platform| match platform {
        Platform::A => series_a,
        Platform::B => series_b,
    };
    let triggering = jump(series_for(link.earlier_platform), link.earlier_spike)?;
    let responding = jump(series_for(link.later_platform), link.later_spike)?;
    Ok(CoefficientRecord {
        ratio: ratio(responding, triggering)?,
        delay_days: whole_days_between(link.earlier_spike.start_ms, link.later_spike.start_ms),
        direction: link.direction(),
        link: *link,
    })
}

/// Coefficient records for every link, split by which platform led.
///
/// Links whose triggering jump is zero are dropped and counted; they never
/// surface as NaN or as an error.
pub fn compute_coefficients(
    links: &[CausationLink],
    series_a: &NormalizedSeries,
    series_b: &NormalizedSeries,
) -> CoefficientSet {
    let mut out = CoefficientSet::default();
    for link in links {
        match coefficient_for_link(link, series_a, series_b) {
            Ok(record) => match record.direction {
                LeadDirection::AFirst => out.a_led.push(record),
                LeadDirection::BFirst => out.b_led.push(record),
            },
            Err(SpikeLagError::DivisionByZeroSkip) => {
                tracing::debug!(
                    earlier_start_ms = link.earlier_spike.start_ms,
                    platform = %link.earlier_platform,
                    "zero triggering jump; dropping link"
                );
                out.skipped_zero_jump += 1;
            }
            Err(err) => {
                tracing::warn!(error = %err, "unable to score causation link");
                out.skipped_unresolved += 1;
            }
        }
    }
    out
}

/// Coefficients for nearest-start pairs (`probe_jump / candidate_jump`).
///
/// Returns the scored pairs and the number dropped for a zero candidate jump.
pub fn greedy_coefficients(
    pairs: &[GreedyPair],
    probe_series: &NormalizedSeries,
    candidate_series: &NormalizedSeries,
) -> (Vec<GreedyCoefficient>, usize) {
    let mut scored = Vec::with_capacity(pairs.len());
    let mut skipped = 0_usize;
    for pair in pairs {
        let result = jump(probe_series, pair.probe).and_then(|probe_jump| {
            let candidate_jump = jump(candidate_series, pair.candidate)?;
            ratio(probe_jump, candidate_jump)
        });
        match result {
            Ok(coefficient) => scored.push(GreedyCoefficient {
                probe: pair.probe,
                candidate: pair.candidate,
                coefficient,
            }),
            Err(err) => {
                tracing::debug!(error = %err, "dropping greedy pair");
                skipped += 1;
            }
        }
    }
    (scored, skipped)
}
