//! Plain-text rendering of analysis results for the terminal.

use crate::series::Platform;
use crate::services::analysis::causation::LeadDirection;
use crate::services::analysis::types::{BatchReport, PartitionSummary, SummaryStats};
use crate::services::analysis::SongAnalysis;
use crate::time::format_date;
use std::fmt::Write;

fn platform_label(platform: Platform) -> &'static str {
    match platform {
        Platform::A => "A",
        Platform::B => "B",
    }
}

pub fn render_song(analysis: &SongAnalysis) -> String {
    let mut out = String::new();
    let title = if analysis.meta.title.is_empty() {
        analysis.song_id.as_str()
    } else {
        analysis.meta.title.as_str()
    };
    match analysis.meta.artist.as_deref() {
        Some(artist) => {
            let _ = writeln!(out, "{title} by {artist} ({})", analysis.song_id);
        }
        None => {
            let _ = writeln!(out, "{title} ({})", analysis.song_id);
        }
    }

    for platform in [Platform::A, Platform::B] {
        let detected = analysis.spikes(platform);
        let threshold = detected
            .threshold
            .map(|t| format!("{t:.4}"))
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(
            out,
            "{platform}: {} spikes (threshold {threshold})",
            detected.spikes.len()
        );
        for spike in &detected.spikes {
            let _ = writeln!(
                out,
                "  {} .. {}  {:.3} -> {:.3}",
                format_date(spike.interval.start_ms),
                format_date(spike.interval.end_ms),
                spike.values.start,
                spike.values.end
            );
        }
    }

    let _ = writeln!(out, "links: {}", analysis.links.len());
    let scored: Vec<_> = analysis
        .coefficients
        .a_led
        .iter()
        .chain(analysis.coefficients.b_led.iter())
        .collect();
    for link in &analysis.links {
        let annotation = scored
            .iter()
            .find(|record| record.link == *link)
            .map(|record| format!("coeff: {:.3}, delay: {}d", record.ratio, record.delay_days))
            .unwrap_or_else(|| "coeff: skipped (zero jump)".to_string());
        let _ = writeln!(
            out,
            "  {} {} -> {} {}  {annotation}",
            platform_label(link.earlier_platform),
            format_date(link.earlier_spike.start_ms),
            platform_label(link.later_platform),
            format_date(link.later_spike.start_ms),
        );
    }

    if !analysis.greedy_pairs.is_empty() {
        let _ = writeln!(out, "nearest-start pairs (B -> A): {}", analysis.greedy_pairs.len());
        for pair in &analysis.greedy_pairs {
            let _ = writeln!(
                out,
                "  B {} ~ A {}  delay: {:.1}d",
                format_date(pair.probe.start_ms),
                format_date(pair.candidate.start_ms),
                pair.delay_days
            );
        }
    }
    out
}

fn stat_line(label: &str, stats: &SummaryStats) -> String {
    format!(
        "{label} = {:.3} \u{00b1} {:.3} (n={})",
        stats.mean, stats.std_dev, stats.count
    )
}

fn partition_block(out: &mut String, partition: &PartitionSummary) {
    let direction = LeadDirection::from_leader(partition.leader);
    let heading = match direction {
        LeadDirection::AFirst => "A leads B",
        LeadDirection::BFirst => "B leads A",
    };
    let _ = writeln!(out, "{heading}");
    let _ = writeln!(out, "  {}", stat_line("C", &partition.coefficient));
    let _ = writeln!(out, "  {}", stat_line("t_d", &partition.delay_days));
}

pub fn render_batch(report: &BatchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "songs: {} requested, {} analyzed, {} failed",
        report.songs_requested, report.songs_analyzed, report.songs_failed
    );
    partition_block(&mut out, &report.aggregate.a_led);
    partition_block(&mut out, &report.aggregate.b_led);
    let _ = writeln!(
        out,
        "nearest-start pairs\n  {}",
        stat_line("t_d", &report.aggregate.greedy_delay_days)
    );
    if report.aggregate.rejected_non_finite > 0 {
        let _ = writeln!(
            out,
            "rejected non-finite samples: {}",
            report.aggregate.rejected_non_finite
        );
    }
    for failure in &report.failures {
        let _ = writeln!(
            out,
            "failed {} [{}]: {}",
            failure.song_id, failure.code, failure.message
        );
    }
    out
}
