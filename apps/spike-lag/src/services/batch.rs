use crate::config::RunConfig;
use crate::error::SpikeLagError;
use crate::services::analysis::pipeline::{analyze_song, SongAnalysis};
use crate::services::analysis::stats::AggregateStatistics;
use crate::services::analysis::types::{BatchReport, SongFailure};
use crate::services::series_cache::{load_song, SeriesSource};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;

fn analyze_one(
    source: &dyn SeriesSource,
    song_id: &str,
    config: &RunConfig,
) -> std::result::Result<SongAnalysis, SpikeLagError> {
    let song = load_song(source, song_id)?;
    analyze_song(&song, &config.analysis)
}

async fn run_song(
    semaphore: Arc<Semaphore>,
    source: Arc<dyn SeriesSource>,
    config: Arc<RunConfig>,
    song_id: String,
) -> Result<std::result::Result<SongAnalysis, SpikeLagError>> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .context("batch concurrency gate closed")?;
    tokio::task::spawn_blocking(move || analyze_one(source.as_ref(), &song_id, &config))
        .await
        .context("song analysis task failed")
}

fn failure(song_id: &str, code: &str, message: String) -> SongFailure {
    SongFailure {
        song_id: song_id.to_string(),
        code: code.to_string(),
        message,
    }
}

/// Analyze many songs concurrently and fold them into one report.
///
/// At most `config.max_concurrency` songs are in flight. Each song runs on a
/// blocking task with its own working set; results are folded back in input
/// order, so the report does not depend on completion order. A failing song
/// is logged, counted and listed, and the rest of the batch carries on.
pub async fn run_batch(
    source: Arc<dyn SeriesSource>,
    song_ids: Vec<String>,
    config: &RunConfig,
) -> Result<BatchReport> {
    config.validate().context("invalid batch configuration")?;

    let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
    let shared_config = Arc::new(config.clone());
    let mut handles = Vec::with_capacity(song_ids.len());
    for song_id in &song_ids {
        let semaphore = semaphore.clone();
        let source = source.clone();
        let config = shared_config.clone();
        let song_id = song_id.clone();
        handles.push(tokio::spawn(run_song(semaphore, source, config, song_id)));
    }

    let mut aggregate = AggregateStatistics::default();
    let mut songs = Vec::new();
    let mut failures = Vec::new();
    for (song_id, handle) in song_ids.iter().zip(handles) {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(err) => Err(anyhow::Error::new(err)),
        };
        match outcome {
            Ok(Ok(analysis)) => {
                aggregate.add_song(&analysis, config.analysis.greedy_max_delay_days);
                songs.push(analysis.summary());
            }
            Ok(Err(err)) => {
                tracing::warn!(song_id = %song_id, code = err.code(), error = %err, "skipping song");
                failures.push(failure(song_id, err.code(), err.to_string()));
            }
            Err(err) => {
                tracing::warn!(song_id = %song_id, error = %err, "song task did not complete");
                failures.push(failure(song_id, "task_failed", format!("{err:#}")));
            }
        }
    }

    tracing::info!(
        requested = song_ids.len(),
        analyzed = songs.len(),
        failed = failures.len(),
        "batch finished"
    );

    Ok(BatchReport {
        songs_requested: song_ids.len(),
        songs_analyzed: songs.len(),
        songs_failed: failures.len(),
        songs,
        failures,
        aggregate: aggregate.summary(),
    })
}

#[cfg(test)]
mod tests {
    use super::run_batch;
    use crate::config::RunConfig;
    use crate::series::{Platform, Series, SongSeriesPart, TrackMeta};
    use crate::services::series_cache::{CsvCacheSource, MemorySource, SeriesSource};
    use crate::time::MS_PER_DAY;
    use std::sync::Arc;

    fn part(title: &str, values: &[f64]) -> SongSeriesPart {
        let pairs: Vec<(i64, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as i64 * MS_PER_DAY, *v))
            .collect();
        SongSeriesPart {
            meta: TrackMeta {
                title: title.to_string(),
                ..TrackMeta::default()
            },
            series: Series::from_pairs(&pairs).expect("series"),
        }
    }

    fn step(flat: usize, level: f64) -> Vec<f64> {
        let mut values = vec![0.0; flat];
        values.extend(vec![level; 19 - flat]);
        values.push(1.0);
        values
    }

    fn source_with(songs: &[(&str, usize, usize)]) -> MemorySource {
        let mut source = MemorySource::new();
        for (id, a_step, b_step) in songs {
            source.insert(id, Platform::A, part(id, &step(*a_step, 0.8)));
            source.insert(id, Platform::B, part(id, &step(*b_step, 0.6)));
        }
        source
    }

    fn config(max_concurrency: usize) -> RunConfig {
        RunConfig {
            max_concurrency,
            ..RunConfig::default()
        }
    }

    #[tokio::test]
    async fn missing_series_is_counted_without_aborting_the_batch() {
        let mut source = source_with(&[("lead-a", 10, 12)]);
        source.insert("half", Platform::A, part("half", &step(10, 0.8)));
        let ids = vec!["lead-a".to_string(), "half".to_string(), "absent".to_string()];

        let report = run_batch(Arc::new(source), ids, &config(2))
            .await
            .expect("batch");
        assert_eq!(report.songs_requested, 3);
        assert_eq!(report.songs_analyzed, 1);
        assert_eq!(report.songs_failed, 2);
        assert_eq!(report.failures[0].song_id, "half");
        assert_eq!(report.failures[0].code, "missing_series");
        assert!(report.failures[0].message.contains("platform_b"));
        assert_eq!(report.failures[1].song_id, "absent");

        assert_eq!(report.aggregate.a_led.coefficient.count, 1);
        assert!((report.aggregate.a_led.coefficient.mean - 0.75).abs() < 1e-6);
        assert_eq!(report.aggregate.a_led.delay_days.mean, 2.0);
        assert_eq!(report.aggregate.b_led.coefficient.count, 0);
        assert_eq!(report.aggregate.b_led.coefficient.mean, 0.0);
    }

    #[tokio::test]
    async fn report_does_not_depend_on_concurrency() {
        let songs = [("s1", 10, 12), ("s2", 12, 10), ("s3", 8, 11), ("s4", 6, 6)];
        let ids: Vec<String> = songs.iter().map(|(id, _, _)| id.to_string()).collect();

        let serial = run_batch(Arc::new(source_with(&songs)), ids.clone(), &config(1))
            .await
            .expect("serial");
        let parallel = run_batch(Arc::new(source_with(&songs)), ids, &config(4))
            .await
            .expect("parallel");

        assert_eq!(serial.songs, parallel.songs);
        assert_eq!(serial.aggregate, parallel.aggregate);
        let order: Vec<&str> = parallel.songs.iter().map(|s| s.song_id.as_str()).collect();
        assert_eq!(order, vec!["s1", "s2", "s3", "s4"]);
        assert!(parallel.aggregate.b_led.coefficient.count >= 1);
    }

    #[tokio::test]
    async fn reads_songs_from_the_csv_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = CsvCacheSource::new(dir.path());
        cache
            .store("cached", Platform::A, &part("Cached", &step(10, 0.8)))
            .expect("store a");
        cache
            .store("cached", Platform::B, &part("Cached", &step(12, 0.6)))
            .expect("store b");
        let source: Arc<dyn SeriesSource> = Arc::new(cache);

        let report = run_batch(source, vec!["cached".to_string()], &config(1))
            .await
            .expect("batch");
        assert_eq!(report.songs_analyzed, 1);
        assert_eq!(report.songs[0].title, "Cached");
        assert_eq!(report.songs[0].links, 1);
    }

    #[tokio::test]
    async fn invalid_configuration_fails_the_whole_batch() {
        let mut bad = config(1);
        bad.analysis.diff_lag = 0;
        let result = run_batch(Arc::new(MemorySource::new()), vec![], &bad).await;
        assert!(result.is_err());
    }
}
