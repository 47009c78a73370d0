use crate::series::Platform;
use crate::services::analysis::causation::LeadDirection;
use crate::services::analysis::coefficients::CoefficientRecord;
use crate::services::analysis::pipeline::SongAnalysis;
use crate::services::analysis::types::{AggregateSummary, PartitionSummary, SummaryStats};

/// Count / sum / sum-of-squares accumulator.
///
/// Merging two accumulators gives the same moments regardless of the order
/// samples arrived in (up to float rounding). Non-finite samples are counted
/// and never enter the sums.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    count: u64,
    sum: f64,
    sum_sq: f64,
    rejected: u64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) -> bool {
        if !value.is_finite() {
            self.rejected += 1;
            return false;
        }
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        true
    }

    pub fn merge(&mut self, other: &RunningStats) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        self.rejected += other.rejected;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    /// Sample (n - 1) standard deviation; 0 below two samples.
    pub fn sample_std_dev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let n = self.count as f64;
        let variance = (self.sum_sq - self.sum * self.sum / n) / (n - 1.0);
        if !variance.is_finite() || variance <= 0.0 {
            return 0.0;
        }
        variance.sqrt()
    }

    pub fn summary(&self) -> SummaryStats {
        SummaryStats {
            count: self.count,
            mean: self.mean(),
            std_dev: self.sample_std_dev(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartitionStats {
    pub coefficient: RunningStats,
    pub delay_days: RunningStats,
}

impl PartitionStats {
    pub fn push(&mut self, record: &CoefficientRecord) {
        if self.coefficient.push(record.ratio) {
            self.delay_days.push(record.delay_days as f64);
        }
    }

    pub fn merge(&mut self, other: &PartitionStats) {
        self.coefficient.merge(&other.coefficient);
        self.delay_days.merge(&other.delay_days);
    }

    fn summary(&self, leader: Platform) -> PartitionSummary {
        PartitionSummary {
            leader,
            coefficient: self.coefficient.summary(),
            delay_days: self.delay_days.summary(),
        }
    }
}

/// Cross-song coefficient and delay moments, split by leading platform.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateStatistics {
    pub a_led: PartitionStats,
    pub b_led: PartitionStats,
    pub greedy_delay_days: RunningStats,
    pub greedy_coefficient: RunningStats,
}

impl AggregateStatistics {
    pub fn add_record(&mut self, record: &CoefficientRecord) {
        match record.direction {
            LeadDirection::AFirst => self.a_led.push(record),
            LeadDirection::BFirst => self.b_led.push(record),
        }
    }

    pub fn add_records<'a>(&mut self, records: impl IntoIterator<Item = &'a CoefficientRecord>) {
        for record in records {
            self.add_record(record);
        }
    }

    /// Fold one song in. Greedy delays at or beyond `greedy_max_delay_days`
    /// are excluded from the greedy delay mean.
    pub fn add_song(&mut self, analysis: &SongAnalysis, greedy_max_delay_days: f64) {
        self.add_records(analysis.coefficients.a_led.iter());
        self.add_records(analysis.coefficients.b_led.iter());
        for pair in &analysis.greedy_pairs {
            if pair.delay_days < greedy_max_delay_days {
                self.greedy_delay_days.push(pair.delay_days);
            }
        }
        for scored in &analysis.greedy_coefficients {
            self.greedy_coefficient.push(scored.coefficient);
        }
    }

    pub fn merge(&mut self, other: &AggregateStatistics) {
        self.a_led.merge(&other.a_led);
        self.b_led.merge(&other.b_led);
        self.greedy_delay_days.merge(&other.greedy_delay_days);
        self.greedy_coefficient.merge(&other.greedy_coefficient);
    }

    pub fn partition(&self, direction: LeadDirection) -> &PartitionStats {
        match direction {
            LeadDirection::AFirst => &self.a_led,
            LeadDirection::BFirst => &self.b_led,
        }
    }

    pub fn summary(&self) -> AggregateSummary {
        let rejected: u64 = [
            &self.a_led.coefficient,
            &self.b_led.coefficient,
            &self.greedy_delay_days,
            &self.greedy_coefficient,
        ]
        .iter()
        .map(|stats| stats.rejected())
        .sum();
        AggregateSummary {
            a_led: self.a_led.summary(Platform::A),
            b_led: self.b_led.summary(Platform::B),
            greedy_delay_days: self.greedy_delay_days.summary(),
            greedy_coefficient: self.greedy_coefficient.summary(),
            rejected_non_finite: rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AggregateStatistics, RunningStats};
    use crate::services::analysis::causation::{CausationLink, LeadDirection};
    use crate::services::analysis::coefficients::CoefficientRecord;
    use crate::services::analysis::intervals::SpikeInterval;
    use crate::time::MS_PER_DAY;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn record(ratio: f64, delay_days: i64, direction: LeadDirection) -> CoefficientRecord {
        let leader = direction.leader();
        let start = 1_000;
        CoefficientRecord {
            ratio,
            delay_days,
            direction,
            link: CausationLink {
                earlier_spike: SpikeInterval::new(start, start + 2 * MS_PER_DAY),
                earlier_platform: leader,
                later_spike: SpikeInterval::new(
                    start + delay_days * MS_PER_DAY,
                    start + (delay_days + 2) * MS_PER_DAY,
                ),
                later_platform: leader.other(),
            },
        }
    }

    #[test]
    fn empty_partitions_report_zero() {
        let summary = AggregateStatistics::default().summary();
        for partition in [summary.a_led, summary.b_led] {
            assert_eq!(partition.coefficient.count, 0);
            assert_eq!(partition.coefficient.mean, 0.0);
            assert_eq!(partition.coefficient.std_dev, 0.0);
            assert_eq!(partition.delay_days.mean, 0.0);
            assert_eq!(partition.delay_days.std_dev, 0.0);
        }
        assert_eq!(summary.greedy_delay_days.mean, 0.0);
    }

    #[test]
    fn sample_standard_deviation_uses_n_minus_one() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0] {
            stats.push(v);
        }
        assert_eq!(stats.mean(), 2.5);
        assert!((stats.sample_std_dev() - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12);

        let mut single = RunningStats::default();
        single.push(7.0);
        assert_eq!(single.sample_std_dev(), 0.0);
    }

    #[test]
    fn non_finite_samples_are_rejected_and_counted() {
        let mut stats = RunningStats::default();
        assert!(!stats.push(f64::NAN));
        assert!(!stats.push(f64::INFINITY));
        assert!(stats.push(1.0));
        assert_eq!(stats.count(), 1);
        assert_eq!(stats.rejected(), 2);
        assert!(stats.mean().is_finite());
    }

    #[test]
    fn records_are_split_by_leading_platform() {
        let mut aggregate = AggregateStatistics::default();
        aggregate.add_records(&[
            record(0.5, 2, LeadDirection::AFirst),
            record(1.5, 4, LeadDirection::AFirst),
            record(2.0, 10, LeadDirection::BFirst),
        ]);
        let summary = aggregate.summary();
        assert_eq!(summary.a_led.coefficient.count, 2);
        assert_eq!(summary.a_led.coefficient.mean, 1.0);
        assert_eq!(summary.a_led.delay_days.mean, 3.0);
        assert_eq!(summary.b_led.coefficient.count, 1);
        assert_eq!(summary.b_led.delay_days.std_dev, 0.0);
        assert_eq!(aggregate.partition(LeadDirection::BFirst).delay_days.mean(), 10.0);
    }

    #[test]
    fn merged_partials_match_regardless_of_order() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut records: Vec<CoefficientRecord> = (0..120)
            .map(|_| {
                let direction = if rng.gen_bool(0.5) {
                    LeadDirection::AFirst
                } else {
                    LeadDirection::BFirst
                };
                record(rng.gen_range(0.1..4.0), rng.gen_range(0..21), direction)
            })
            .collect();

        let mut sequential = AggregateStatistics::default();
        sequential.add_records(&records);

        records.shuffle(&mut rng);
        let mut merged = AggregateStatistics::default();
        for chunk in records.chunks(7) {
            let mut partial = AggregateStatistics::default();
            partial.add_records(chunk);
            merged.merge(&partial);
        }

        let (lhs, rhs) = (sequential.summary(), merged.summary());
        for (l, r) in [(lhs.a_led, rhs.a_led), (lhs.b_led, rhs.b_led)] {
            assert_eq!(l.coefficient.count, r.coefficient.count);
            assert!((l.coefficient.mean - r.coefficient.mean).abs() < 1e-9);
            assert!((l.coefficient.std_dev - r.coefficient.std_dev).abs() < 1e-9);
            assert!((l.delay_days.mean - r.delay_days.mean).abs() < 1e-9);
        }
    }
}
