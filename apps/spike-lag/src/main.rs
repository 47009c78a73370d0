use anyhow::{Context, Result};
use clap::Parser;
use spike_lag::cli::{AnalyzeArgs, BatchArgs, Cli, Commands};
use spike_lag::config::RunConfig;
use spike_lag::report;
use spike_lag::services::analysis::analyze_song;
use spike_lag::services::batch::run_batch;
use spike_lag::services::series_cache::{load_song, read_song_list, CsvCacheSource, SeriesSource};
use std::sync::Arc;

fn analyze(config: &RunConfig, args: &AnalyzeArgs) -> Result<()> {
    let source = CsvCacheSource::new(config.cache_dir.clone());
    let song = load_song(&source, &args.song)
        .with_context(|| format!("failed to load song {}", args.song))?;
    let analysis = analyze_song(&song, &config.analysis)
        .with_context(|| format!("failed to analyze song {}", args.song))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print!("{}", report::render_song(&analysis));
    }
    Ok(())
}

async fn batch(config: &RunConfig, args: &BatchArgs) -> Result<()> {
    let song_ids = read_song_list(&args.songs)?;
    if song_ids.is_empty() {
        anyhow::bail!("{} lists no songs", args.songs.display());
    }
    tracing::info!(
        songs = song_ids.len(),
        max_concurrency = config.max_concurrency,
        cache_dir = %config.cache_dir.display(),
        "starting batch"
    );
    let source: Arc<dyn SeriesSource> = Arc::new(CsvCacheSource::new(config.cache_dir.clone()));
    let batch_report = run_batch(source, song_ids, config).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&batch_report)?);
    } else {
        print!("{}", report::render_batch(&batch_report));
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = RunConfig::load(cli.config.as_deref())?;
    config.apply_overrides(&cli.overrides());
    config.validate()?;

    match &cli.command {
        Commands::Analyze(args) => analyze(&config, args),
        Commands::Batch(args) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(batch(&config, args))
        }
    }
}
