use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "agentreg",
    version,
    about = "CI regression gate for agent/LLM pipelines"
)]
pub struct Cli {
    /// Verbose logging (debug-level tracing to stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute the case suite and append records to the log dir
    Run(RunArgs),
    /// Compare the current run against a baseline and emit the gate verdict
    Check(CheckArgs),
    /// Render a trailing-window regression report
    Report(ReportArgs),
}

#[derive(clap::Args, Clone)]
pub struct RunArgs {
    /// CSV case suite: a single file, or a directory of .csv files merged
    /// in filename order
    pub cases_file: PathBuf,

    #[arg(long, default_value = "runs/agentreg")]
    pub log_dir: PathBuf,

    /// Batch identifier; a fresh UUID when omitted
    #[arg(long)]
    pub run_id: Option<String>,

    /// Execute the whole suite N times for flakiness detection
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Maximum in-flight agent invocations
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Hard per-case deadline in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

#[derive(clap::Args, Clone)]
pub struct CheckArgs {
    #[arg(long, default_value = "runs/agentreg")]
    pub log_dir: PathBuf,

    /// Baseline artifact directory (e.g. downloaded from the last green
    /// main build); takes precedence over --baseline-days
    #[arg(long, conflicts_with = "baseline_days")]
    pub baseline_dir: Option<PathBuf>,

    /// Trailing baseline window in days inside the log dir
    #[arg(long)]
    pub baseline_days: Option<i64>,

    /// Rule/threshold config (defaults to .agentreg.yml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Case suite (file or directory), for per-case min_pass_rate floors
    #[arg(long)]
    pub cases_file: Option<PathBuf>,

    /// PR labels for config override matching
    #[arg(long, value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Changed file paths for config override matching
    #[arg(long, value_delimiter = ',')]
    pub changed_files: Vec<String>,

    /// Write the Markdown verdict here instead of stdout
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Override the S1 pass-rate floor (0..1); wins over the config
    #[arg(long)]
    pub s1_threshold: Option<f64>,

    /// Override the overall pass-rate floor (0..1); wins over the config
    #[arg(long)]
    pub overall_threshold: Option<f64>,

    /// Evaluate this run instead of the latest one in the log dir
    #[arg(long)]
    pub run_id: Option<String>,
}

#[derive(clap::Args, Clone)]
pub struct ReportArgs {
    #[arg(long, default_value = "runs/agentreg")]
    pub log_dir: PathBuf,

    /// Current window size in days
    #[arg(long, default_value_t = 1)]
    pub days: i64,

    /// Baseline window size in days, ending where the current window starts
    #[arg(long, default_value_t = 7)]
    pub baseline_days: i64,

    /// Write the Markdown report here instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}
