use crawlmap_driver::DriverError;
use crawlmap_model::GraphError;

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Invalid base URL '{url}': {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("Strategy '{strategy}' needs {needed} session(s), got {got}")]
    SessionCount {
        strategy: String,
        needed: usize,
        got: usize,
    },

    #[error("Mutation replay error: {0}")]
    Mutation(String),
}
