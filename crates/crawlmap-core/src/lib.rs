//! Runs of the crawler: configuration, run directories and run modes.

pub mod config;
pub mod error;
pub mod job;
pub mod run_dir;
pub mod runner;

pub use config::{RunConfig, CONFIG_FILE};
pub use error::{RunError, SetupError};
pub use job::{load_data_bank, JobRecord};
pub use run_dir::{append_error_log, EndRecord, RunDirectory, END_FILE, LOG_FILE};
pub use runner::{
    diagnostic, PreparedRun, RunMode, RunRequest, RunSummary, Runner, SessionFactory,
    WebDriverFactory, DEFAULT_ERROR_LOG, MUTANT_ERROR_LOG,
};
