use super::intervals::SpikeInterval;
use crate::series::Platform;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which platform's spike came first in a linked pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadDirection {
    AFirst,
    BFirst,
}

impl LeadDirection {
    pub fn leader(&self) -> Platform {
        match self {
            LeadDirection::AFirst => Platform::A,
            LeadDirection::BFirst => Platform::B,
        }
    }

    pub fn from_leader(platform: Platform) -> Self {
        match platform {
            Platform::A => LeadDirection::AFirst,
            Platform::B => LeadDirection::BFirst,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CausationLink {
    pub earlier_spike: SpikeInterval,
    pub earlier_platform: Platform,
    pub later_spike: SpikeInterval,
    pub later_platform: Platform,
}

impl CausationLink {
    pub fn direction(&self) -> LeadDirection {
        LeadDirection::from_leader(self.earlier_platform)
    }
}

/// Link chronologically adjacent spikes from different platforms.
///
/// All spikes are merged into one list ordered by `(start, end, platform)` and
/// scanned once, left to right. An adjacent pair becomes a link when neither
/// start timestamp has been consumed yet, the platforms differ, and
/// `next.start <= current.end + window_ms`. Both starts are then consumed.
/// Dense clusters resolve purely by scan order; no global optimum is sought.
pub fn determine_causation(
    a_spikes: &[SpikeInterval],
    b_spikes: &[SpikeInterval],
    window_ms: i64,
) -> Vec<CausationLink> {
    let mut tagged: Vec<(SpikeInterval, Platform)> = a_spikes
        .iter()
        .map(|s| (*s, Platform::A))
        .chain(b_spikes.iter().map(|s| (*s, Platform::B)))
        .collect();
    tagged.sort();

    let mut used_starts: HashSet<i64> = HashSet::new();
    let mut links: Vec<CausationLink> = Vec::new();
    for pair in tagged.windows(2) {
        let (current, current_platform) = pair[0];
        let (next, next_platform) = pair[1];

        if used_starts.contains(&current.start_ms) || used_starts.contains(&next.start_ms) {
            continue;
        }
        if current_platform == next_platform {
            continue;
        }
        if next.start_ms > current.end_ms.saturating_add(window_ms) {
            continue;
        }

        links.push(CausationLink {
            earlier_spike: current,
            earlier_platform: current_platform,
            later_spike: next,
            later_platform: next_platform,
        });
        used_starts.insert(current.start_ms);
        used_starts.insert(next.start_ms);
    }
    links
}
