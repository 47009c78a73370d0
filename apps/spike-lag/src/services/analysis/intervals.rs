use serde::{Deserialize, Serialize};

/// Closed `[start, end]` window in epoch milliseconds on one platform's series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpikeInterval {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl SpikeInterval {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self {
            start_ms: start_ms.min(end_ms),
            end_ms: start_ms.max(end_ms),
        }
    }
}

/// Collapse overlapping or touching intervals into maximal disjoint ones.
///
/// Intervals are sorted by `(start, end)` first; the next interval joins the
/// current one when `next.start <= current.end + gap_ms`.
pub fn merge_intervals(mut intervals: Vec<SpikeInterval>, gap_ms: i64) -> Vec<SpikeInterval> {
    if intervals.len() < 2 {
        return intervals;
    }
    intervals.sort();
    let gap_ms = gap_ms.max(0);

    let mut merged: Vec<SpikeInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        if let Some(last) = merged.last_mut() {
            if interval.start_ms <= last.end_ms.saturating_add(gap_ms) {
                last.end_ms = last.end_ms.max(interval.end_ms);
                continue;
            }
        }
        merged.push(interval);
    }
    merged
}
