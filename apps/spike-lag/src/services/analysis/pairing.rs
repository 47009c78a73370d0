use super::intervals::SpikeInterval;
use crate::time::fractional_days_between;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GreedyPair {
    pub probe: SpikeInterval,
    pub candidate: SpikeInterval,
    /// Absolute distance between the two starts, in (fractional) days.
    pub delay_days: f64,
}

/// One-to-one nearest-start pairing without a lookahead window.
///
/// Probes are visited in input order; each claims the still-available
/// candidate whose start is closest to its own start and removes it from the
/// pool. Equidistant candidates resolve to the earliest one in the pool, and
/// an earlier probe always wins over a later one, so input order is part of
/// the result.
pub fn pair_nearest(probes: &[SpikeInterval], candidates: &[SpikeInterval]) -> Vec<GreedyPair> {
    let mut available: Vec<SpikeInterval> = candidates.to_vec();
    let mut pairs: Vec<GreedyPair> = Vec::with_capacity(probes.len().min(candidates.len()));

    for probe in probes {
        let mut nearest: Option<(usize, u64)> = None;
        for (idx, candidate) in available.iter().enumerate() {
            let diff = candidate.start_ms.abs_diff(probe.start_ms);
            match nearest {
                Some((_, best)) if diff >= best => {}
                _ => nearest = Some((idx, diff)),
            }
        }
        let Some((idx, _)) = nearest else {
            break;
        };
        let candidate = available.remove(idx);
        pairs.push(GreedyPair {
            probe: *probe,
            candidate,
            delay_days: fractional_days_between(probe.start_ms, candidate.start_ms),
        });
    }
    pairs
}
