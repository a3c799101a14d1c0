use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use codesweep_client::{ReqwestProberFactory, TicketBoxClassifier};
use codesweep_core::config::{EndpointTemplate, RetryConfig, SweepConfig};
use codesweep_core::keyspace::{Alphabet, Keyspace};
use codesweep_core::scheduler::{SweepScheduler, TracingSweepReporter};

mod sink;
use sink::{CsvFileSink, FileSink, JsonFileSink};

#[derive(Parser)]
#[command(
    name = "codesweep",
    version,
    about = "Concurrent access-code sweeper for event ticket pages"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep the full configured keyspace
    Run {
        #[command(flatten)]
        opts: SweepOpts,
    },

    /// Restricted single-symbol sweep for smoke-testing the pipeline
    Smoke {
        /// Symbol repeated for every position of the candidate
        #[arg(short, long, default_value_t = 'A')]
        symbol: char,

        #[command(flatten)]
        opts: SweepOpts,
    },
}

#[derive(Args)]
struct SweepOpts {
    /// Endpoint template; `{code}` is replaced with each candidate
    /// (a template without the placeholder gets the candidate appended)
    #[arg(short, long, env = "CODESWEEP_URL")]
    url: String,

    /// Symbols candidates are drawn from, in order (default: A-Z then 0-9)
    #[arg(long, env = "CODESWEEP_ALPHABET")]
    alphabet: Option<String>,

    /// Candidate length
    #[arg(short, long, env = "CODESWEEP_LENGTH", default_value_t = 6)]
    length: usize,

    /// Worker pool size; also the maximum number of outstanding probes
    #[arg(short, long, env = "CODESWEEP_WORKERS", default_value_t = 10)]
    workers: usize,

    /// Total attempts per candidate, including the first
    #[arg(long, default_value_t = 10)]
    max_attempts: u32,

    /// Base retry backoff in seconds
    #[arg(long, default_value_t = 30.0)]
    base_delay_secs: f64,

    /// Multiplier applied to the backoff after each failed attempt
    #[arg(long, default_value_t = 2.0)]
    backoff_factor: f64,

    /// Upper bound for any single backoff delay, in seconds
    #[arg(long, default_value_t = 900.0)]
    max_delay_secs: f64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Grace period for in-flight probes after Ctrl-C, in seconds
    #[arg(long, default_value_t = 30)]
    cancel_grace_secs: u64,

    /// Output file for discovered codes
    #[arg(short, long, default_value = "codes.json")]
    output: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("codesweep=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { opts } => {
            let alphabet = match &opts.alphabet {
                Some(symbols) => Alphabet::parse(symbols)?,
                None => Alphabet::upper_alphanumeric(),
            };
            run_sweep(alphabet, opts).await
        }
        Commands::Smoke { symbol, opts } => {
            tracing::info!(%symbol, "Smoke sweep over a single-symbol alphabet");
            run_sweep(Alphabet::single(symbol), opts).await
        }
    }
}

async fn run_sweep(alphabet: Alphabet, opts: SweepOpts) -> Result<()> {
    ensure!(opts.workers >= 1, "worker pool size must be at least 1");
    ensure!(
        opts.base_delay_secs >= 0.0 && opts.max_delay_secs >= 0.0,
        "retry delays must be non-negative"
    );
    ensure!(
        opts.backoff_factor >= 1.0,
        "backoff factor must be at least 1.0"
    );

    let keyspace = Keyspace::new(alphabet, opts.length)?;
    let endpoint = EndpointTemplate::new(&opts.url)?;

    let retry = RetryConfig::default()
        .with_max_attempts(opts.max_attempts)
        .with_base_delay(Duration::from_secs_f64(opts.base_delay_secs))
        .with_backoff_factor(opts.backoff_factor)
        .with_max_delay(Duration::from_secs_f64(opts.max_delay_secs));

    let factory = ReqwestProberFactory::new(endpoint)
        .with_retry(retry)
        .with_timeout(Duration::from_secs(opts.timeout_secs));

    let sink = match opts.format {
        OutputFormat::Json => FileSink::Json(JsonFileSink::new(&opts.output)),
        OutputFormat::Csv => FileSink::Csv(CsvFileSink::new(&opts.output)),
    };

    let config = SweepConfig::default()
        .with_workers(opts.workers)
        .with_cancel_grace(Duration::from_secs(opts.cancel_grace_secs));

    let scheduler = SweepScheduler::new(factory, TicketBoxClassifier::new(), sink, config);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let report = scheduler
        .run(&keyspace, cancel, Arc::new(TracingSweepReporter))
        .await
        .context("sweep failed")?;

    let progress = report.progress;
    println!(
        "Swept {} candidates: {} matches, {} conflicts, {} unknown ({} transient, {} fatal, {} malformed)",
        progress.completed,
        progress.matches,
        progress.conflicts,
        progress.unknown(),
        progress.transient_failures,
        progress.fatal_failures,
        progress.malformed,
    );
    for (label, candidate) in &report.results {
        println!("  {label}: {candidate}");
    }
    println!("Results written to {}", opts.output.display());

    Ok(())
}
