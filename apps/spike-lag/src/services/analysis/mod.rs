pub mod causation;
pub mod coefficients;
pub mod intervals;
pub mod normalize;
pub mod pairing;
pub mod pipeline;
pub mod spikes;
pub mod stats;
pub mod types;

pub use pipeline::{analyze_song, SongAnalysis};
