use std::path::PathBuf;

use crawlmap_driver::DriverError;
use crawlmap_explore::CrawlError;
use crawlmap_model::GraphError;

/// Problems found before a run starts. No crawl is attempted after one.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Output folder not found: {0}")]
    MissingFolder(PathBuf),

    #[error("Run directory already exists: {0}")]
    RunExists(PathBuf),

    #[error("File not found: {0}")]
    MissingFile(PathBuf),

    #[error("Malformed {what} '{path}': {source}")]
    Malformed {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown trace id {id}: the traces file holds {count} trace(s)")]
    UnknownTrace { id: usize, count: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SetupError {
    /// Whether `<folder>/<name>` is free to hold the failure marker.
    pub fn leaves_marker(&self) -> bool {
        !matches!(self, SetupError::MissingFolder(_) | SetupError::RunExists(_))
    }
}

/// Failures of a run that got past setup.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
