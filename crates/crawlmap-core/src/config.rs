//! Run configuration, persisted as `config.json` in every run directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crawlmap_driver::WebDriverConfig;
use crawlmap_explore::{CrawlConfig, StrategyKind};
use crawlmap_markup::AnalyzerConfig;
use crawlmap_model::RecordLayout;

use crate::error::SetupError;

pub const CONFIG_FILE: &str = "config.json";

/// Everything needed to reproduce a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub webdriver: WebDriverConfig,
    pub strategy: StrategyKind,
    /// Graph artifact, relative to the run directory.
    pub automata_file: String,
    /// Exported traces, relative to the run directory.
    pub traces_file: String,
    /// Mutation replay output, relative to the run directory.
    pub mutation_traces_file: String,
    /// Session divergences found by the differential strategy.
    pub divergences_file: String,
    /// JSON data bank with form values and mutation tables.
    pub data_bank: Option<PathBuf>,
    pub crawl: CrawlConfig,
    pub analyzer: AnalyzerConfig,
    pub layout: RecordLayout,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            webdriver: WebDriverConfig::default(),
            strategy: StrategyKind::Systematic,
            automata_file: "automata.json".to_string(),
            traces_file: "traces.json".to_string(),
            mutation_traces_file: "mutation_traces.json".to_string(),
            divergences_file: "divergences.json".to_string(),
            data_bank: None,
            crawl: CrawlConfig::default(),
            analyzer: AnalyzerConfig::default(),
            layout: RecordLayout::default(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, SetupError> {
        read_json(path, "configuration")
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, json)
    }
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(
    path: &Path,
    what: &'static str,
) -> Result<T, SetupError> {
    if !path.is_file() {
        return Err(SetupError::MissingFile(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| SetupError::Malformed {
        what,
        path: path.to_path_buf(),
        source,
    })
}
