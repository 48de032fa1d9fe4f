//! The three run modes and their bookkeeping.
//!
//! A run is set up first: inputs are validated and loaded, then the run
//! directory is created and `config.json` written. Setup failures are
//! appended to a top-level error log and no crawl is attempted. Every run
//! whose name was free ends with an `end.json` completion marker.

use std::error::Error;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crawlmap_driver::{Driver, DriverError, WebDriverConfig, WebDriverSession};
use crawlmap_explore::{CrawlContext, Crawler, MemoryDataBank, MutationPlan};
use crawlmap_markup::HtmlAnalyzer;
use crawlmap_model::TracesRecord;

use crate::config::{read_json, RunConfig, CONFIG_FILE};
use crate::error::{RunError, SetupError};
use crate::job::{load_data_bank, JobRecord};
use crate::run_dir::{append_error_log, RunDirectory};

/// Error log of crawl runs (modes 0 and 1).
pub const DEFAULT_ERROR_LOG: &str = "default_log.txt";
/// Error log of mutation runs (mode 2).
pub const MUTANT_ERROR_LOG: &str = "mutant_log.txt";

/// Opens the browser sessions of a run.
pub trait SessionFactory {
    fn open(&mut self, config: &WebDriverConfig) -> Result<Box<dyn Driver>, DriverError>;
}

/// Sessions on a WebDriver server.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebDriverFactory;

impl SessionFactory for WebDriverFactory {
    fn open(&mut self, config: &WebDriverConfig) -> Result<Box<dyn Driver>, DriverError> {
        Ok(Box::new(WebDriverSession::new(config.clone())?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Mode 0: crawl with a configuration file, or the defaults.
    Debug { config: Option<PathBuf> },
    /// Mode 1: crawl the target of a job record.
    Seeded {
        job: PathBuf,
        config: Option<PathBuf>,
    },
    /// Mode 2: replay a recorded trace with mutated input values.
    Mutate {
        config: PathBuf,
        traces: PathBuf,
        trace_id: usize,
        method: u32,
        modes: Vec<u32>,
    },
}

impl RunMode {
    pub fn error_log(&self) -> &'static str {
        match self {
            RunMode::Mutate { .. } => MUTANT_ERROR_LOG,
            _ => DEFAULT_ERROR_LOG,
        }
    }
}

/// Where a run goes and what it does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Existing output folder.
    pub folder: PathBuf,
    /// Name of the run directory created inside `folder`.
    pub name: String,
    pub mode: RunMode,
}

/// A run that passed setup.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub run: RunDirectory,
    pub config: RunConfig,
    pub bank: MemoryDataBank,
    pub plan: Option<MutationPlan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub root: PathBuf,
    pub states: usize,
    pub edges: usize,
    pub traces: usize,
}

pub struct Runner<F> {
    factory: F,
    log_dir: PathBuf,
}

impl<F: SessionFactory> Runner<F> {
    /// Error logs go to the working directory.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            log_dir: PathBuf::from("."),
        }
    }

    pub fn with_log_dir(mut self, dir: &Path) -> Self {
        self.log_dir = dir.to_path_buf();
        self
    }

    /// Set up and run.
    pub fn execute(&mut self, request: &RunRequest) -> Result<RunSummary, RunError> {
        let prepared = self.prepare(request)?;
        self.run(&prepared)
    }

    /// Validate and load the inputs of `request`, then create its run
    /// directory. Failures are appended to the mode's error log and, when
    /// the run name is still free, recorded in a bare run directory's
    /// completion marker.
    pub fn prepare(&self, request: &RunRequest) -> Result<PreparedRun, SetupError> {
        prepare(request).inspect_err(|e| {
            let note = diagnostic(e);
            let log = self.log_dir.join(request.mode.error_log());
            if let Err(io) = append_error_log(&log, &note) {
                error!(log = %log.display(), error = %io, "cannot append to error log");
            }
            if e.leaves_marker() {
                if let Err(io) = RunDirectory::mark_setup_failure(&request.folder, &request.name, &note) {
                    error!(error = %io, "cannot write setup failure marker");
                }
            }
        })
    }

    /// Run a prepared request and write its completion marker.
    pub fn run(&mut self, prepared: &PreparedRun) -> Result<RunSummary, RunError> {
        let result = match &prepared.plan {
            Some(plan) => self.replay_mutants(prepared, plan),
            None => self.crawl(prepared),
        };
        let marker = match &result {
            Ok(summary) => {
                info!(states = summary.states, edges = summary.edges, "run complete");
                prepared.run.write_end(true, "done")
            }
            Err(e) => {
                error!(error = %e, "run failed");
                prepared.run.write_end(false, &diagnostic(e))
            }
        };
        let summary = result?;
        marker?;
        Ok(summary)
    }

    fn sessions(
        &mut self,
        config: &RunConfig,
        count: usize,
    ) -> Result<Vec<Box<dyn Driver>>, DriverError> {
        (0..count)
            .map(|_| self.factory.open(&config.webdriver))
            .collect()
    }

    fn context(
        &mut self,
        prepared: &PreparedRun,
        session_count: usize,
    ) -> Result<CrawlContext, RunError> {
        let config = &prepared.config;
        let sessions = self.sessions(config, session_count)?;
        let ctx = CrawlContext::new(
            config.crawl.clone(),
            sessions,
            Box::new(HtmlAnalyzer::new(config.analyzer.clone())),
            Box::new(prepared.bank.clone()),
        )?
        .with_archive(Box::new(prepared.run.clone()));
        Ok(ctx)
    }

    fn crawl(&mut self, prepared: &PreparedRun) -> Result<RunSummary, RunError> {
        let config = &prepared.config;
        let strategy = config.strategy.build(&config.crawl);
        info!(
            url = %config.crawl.base_url,
            strategy = strategy.name(),
            "crawl starting"
        );
        let ctx = self.context(prepared, strategy.session_count())?;
        let mut crawler = Crawler::new(ctx, strategy)?;
        let report = crawler.run()?;
        let ctx = crawler.into_context();

        let run = &prepared.run;
        let layout = run.layout();
        run.write_json(&config.automata_file, &ctx.graph.automata_record(layout))?;
        let traces = ctx.graph.traces_record(&report.export.traces, layout)?;
        run.write_json(&config.traces_file, &traces)?;
        if !report.export.divergences.is_empty() {
            run.write_json(&config.divergences_file, &report.export.divergences)?;
        }
        Ok(RunSummary {
            root: run.root().to_path_buf(),
            states: report.states,
            edges: report.edges,
            traces: traces.traces.len(),
        })
    }

    fn replay_mutants(
        &mut self,
        prepared: &PreparedRun,
        plan: &MutationPlan,
    ) -> Result<RunSummary, RunError> {
        info!(
            method = plan.method,
            modes = ?plan.modes,
            steps = plan.edges.len(),
            "mutation replay starting"
        );
        let mut ctx = self.context(prepared, 1)?;
        let run = &prepared.run;
        let record = plan.run(&mut ctx, run.layout())?;
        run.write_json(&prepared.config.mutation_traces_file, &record)?;
        run.write_json(
            &prepared.config.automata_file,
            &ctx.graph.automata_record(run.layout()),
        )?;
        Ok(RunSummary {
            root: run.root().to_path_buf(),
            states: ctx.graph.states().len(),
            edges: ctx.graph.edges().len(),
            traces: record.traces.len(),
        })
    }
}

fn prepare(request: &RunRequest) -> Result<PreparedRun, SetupError> {
    RunDirectory::vacant(&request.folder, &request.name)?;

    let (config, plan) = match &request.mode {
        RunMode::Debug { config } => (load_config(config.as_deref())?, None),
        RunMode::Seeded { job, config } => {
            let job = JobRecord::load(job)?;
            let mut config = load_config(config.as_deref())?;
            job.apply(&mut config.crawl);
            (config, None)
        }
        RunMode::Mutate {
            config,
            traces,
            trace_id,
            method,
            modes,
        } => {
            let config = RunConfig::load(config)?;
            let traces: TracesRecord = read_json(traces, "traces file")?;
            let plan = MutationPlan::from_traces(&traces, *trace_id, *method, modes.clone())
                .map_err(|_| SetupError::UnknownTrace {
                    id: *trace_id,
                    count: traces.traces.len(),
                })?;
            (config, Some(plan))
        }
    };
    let bank = load_data_bank(config.data_bank.as_deref())?;

    let run = RunDirectory::create(&request.folder, &request.name, config.layout.clone())?;
    config.save(&run.path(CONFIG_FILE))?;
    Ok(PreparedRun {
        run,
        config,
        bank,
        plan,
    })
}

fn load_config(path: Option<&Path>) -> Result<RunConfig, SetupError> {
    match path {
        Some(path) => RunConfig::load(path),
        None => Ok(RunConfig::default()),
    }
}

/// An error and every error that caused it, one per line.
pub fn diagnostic(err: &dyn Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str("\n  caused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
