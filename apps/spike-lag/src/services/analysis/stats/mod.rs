pub mod aggregate;

pub use aggregate::{AggregateStatistics, PartitionStats, RunningStats};
