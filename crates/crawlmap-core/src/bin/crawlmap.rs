use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crawlmap_core::{RunMode, RunRequest, Runner, WebDriverFactory, LOG_FILE};

/// crawlmap -- explore a web application and record its state graph.
#[derive(Parser, Debug)]
#[command(name = "crawlmap", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl with a configuration file, or the defaults
    #[command(name = "0", alias = "debug")]
    Debug {
        /// Existing output folder
        folder: PathBuf,

        /// Name of the run directory to create
        dirname: String,

        /// Run configuration (config.json format)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Crawl the target of a job record
    #[command(name = "1", alias = "seeded")]
    Seeded {
        /// Job record (url, max_depth, max_minutes)
        job: PathBuf,

        /// Existing output folder
        folder: PathBuf,

        /// Name of the run directory to create
        dirname: String,

        /// Run configuration applied under the job's settings
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Replay a recorded trace with mutated input values
    #[command(name = "2", alias = "mutate")]
    Mutate {
        /// Existing output folder
        folder: PathBuf,

        /// Name of the run directory to create
        dirname: String,

        /// config.json of the recorded run
        config: PathBuf,

        /// traces.json of the recorded run
        traces: PathBuf,

        /// Index of the trace to mutate
        trace_id: usize,

        /// Mutation method id
        method: u32,

        /// Mutation modes, comma separated
        #[arg(value_delimiter = ',', required = true)]
        modes: Vec<u32>,
    },
}

impl Commands {
    fn into_request(self) -> RunRequest {
        match self {
            Commands::Debug {
                folder,
                dirname,
                config,
            } => RunRequest {
                folder,
                name: dirname,
                mode: RunMode::Debug { config },
            },
            Commands::Seeded {
                job,
                folder,
                dirname,
                config,
            } => RunRequest {
                folder,
                name: dirname,
                mode: RunMode::Seeded { job, config },
            },
            Commands::Mutate {
                folder,
                dirname,
                config,
                traces,
                trace_id,
                method,
                modes,
            } => RunRequest {
                folder,
                name: dirname,
                mode: RunMode::Mutate {
                    config,
                    traces,
                    trace_id,
                    method,
                    modes,
                },
            },
        }
    }
}

/// Send logs to `<run>/log.txt`, filtered by `RUST_LOG` (default `info`).
fn init_logging(root: &Path) -> anyhow::Result<()> {
    let path = root.join(LOG_FILE);
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let request = cli.command.into_request();

    let mut runner = Runner::new(WebDriverFactory);
    let prepared = runner
        .prepare(&request)
        .with_context(|| format!("setting up run '{}'", request.name))?;
    init_logging(prepared.run.root())?;

    let summary = runner.run(&prepared)?;
    println!(
        "{}: {} states, {} edges, {} traces",
        summary.root.display(),
        summary.states,
        summary.edges,
        summary.traces
    );
    Ok(())
}
