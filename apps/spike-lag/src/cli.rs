use crate::config::Overrides;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "spike-lag",
    version,
    about = "Which platform's popularity spikes come first"
)]
pub struct Cli {
    /// JSON config file (falls back to SPIKE_LAG_CONFIG_PATH).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Root of the cached series datasets.
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,
    #[command(flatten)]
    pub analysis: AnalysisArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze one song and print its links and coefficients.
    Analyze(AnalyzeArgs),
    /// Analyze every song in a list and print aggregate statistics.
    Batch(BatchArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct AnalysisArgs {
    #[arg(long, global = true)]
    pub epsilon: Option<f64>,
    #[arg(long, global = true)]
    pub window_days: Option<i64>,
    #[arg(long, global = true)]
    pub multiplier_a: Option<f64>,
    #[arg(long, global = true)]
    pub multiplier_b: Option<f64>,
    /// Analyze the whole cached history instead of the recent window.
    #[arg(long, global = true, default_value_t = false)]
    pub full_history: bool,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[arg(long)]
    pub song: String,
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// File with one song id per line.
    #[arg(long)]
    pub songs: PathBuf,
    #[arg(long)]
    pub max_concurrency: Option<usize>,
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        let max_concurrency = match &self.command {
            Commands::Batch(args) => args.max_concurrency,
            Commands::Analyze(_) => None,
        };
        Overrides {
            cache_dir: self.cache_dir.clone(),
            max_concurrency,
            epsilon: self.analysis.epsilon,
            causation_window_days: self.analysis.window_days,
            threshold_multiplier_a: self.analysis.multiplier_a,
            threshold_multiplier_b: self.analysis.multiplier_b,
            full_history: self.analysis.full_history,
        }
    }
}
