use crate::error::{Result, SpikeLagError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two engagement sources being compared.
///
/// `A` is the playlist-reach style series, `B` the cumulative short-video
/// count. The ordering (`A < B`) is used as the final tie-breaker when spikes
/// from both platforms are merged chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "platform_a")]
    A,
    #[serde(rename = "platform_b")]
    B,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::A => "platform_a",
            Platform::B => "platform_b",
        }
    }

    pub fn other(&self) -> Platform {
        match self {
            Platform::A => Platform::B,
            Platform::B => Platform::A,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub timestamp_ms: i64,
    pub value: f64,
}

impl TimePoint {
    pub fn new(timestamp_ms: i64, value: f64) -> Self {
        Self {
            timestamp_ms,
            value,
        }
    }
}

/// Daily samples for one song on one platform, strictly ascending by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    points: Vec<TimePoint>,
}

impl Series {
    pub fn new(points: Vec<TimePoint>) -> Result<Self> {
        for window in points.windows(2) {
            if window[1].timestamp_ms <= window[0].timestamp_ms {
                return Err(SpikeLagError::InvalidSeries(format!(
                    "timestamps must be strictly ascending ({} followed by {})",
                    window[0].timestamp_ms, window[1].timestamp_ms
                )));
            }
        }
        if let Some(bad) = points.iter().find(|p| !p.value.is_finite()) {
            return Err(SpikeLagError::InvalidSeries(format!(
                "non-finite value at timestamp {}",
                bad.timestamp_ms
            )));
        }
        Ok(Self { points })
    }

    pub fn from_pairs(pairs: &[(i64, f64)]) -> Result<Self> {
        Self::new(
            pairs
                .iter()
                .map(|(ts, value)| TimePoint::new(*ts, *value))
                .collect(),
        )
    }

    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Keep only the `n` most recent samples.
    pub fn most_recent(&self, n: usize) -> Series {
        let skip = self.points.len().saturating_sub(n);
        Series {
            points: self.points[skip..].to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMeta {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// One platform's series as delivered by a source, with its display metadata.
#[derive(Debug, Clone)]
pub struct SongSeriesPart {
    pub meta: TrackMeta,
    pub series: Series,
}

#[derive(Debug, Clone)]
pub struct SongSeries {
    pub song_id: String,
    pub meta: TrackMeta,
    pub a: Series,
    pub b: Series,
}

impl SongSeries {
    pub fn series(&self, platform: Platform) -> &Series {
        match platform {
            Platform::A => &self.a,
            Platform::B => &self.b,
        }
    }
}
