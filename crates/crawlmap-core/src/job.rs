//! Inputs read from disk at setup: the job record of a seeded run and the
//! data bank of form values.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crawlmap_explore::{CrawlConfig, MemoryDataBank};

use crate::config::read_json;
use crate::error::SetupError;

/// A submitted crawl job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub url: String,
    pub max_depth: usize,
    /// Wall-clock budget in minutes.
    pub max_minutes: u64,
}

impl JobRecord {
    pub fn load(path: &Path) -> Result<Self, SetupError> {
        read_json(path, "job record")
    }

    /// Overlay the job's target and limits onto `config`.
    pub fn apply(&self, config: &mut CrawlConfig) {
        config.base_url = self.url.clone();
        config.max_depth = self.max_depth;
        config.max_time_secs = self.max_minutes * 60;
    }
}

/// Load a JSON data bank. A missing path yields an empty bank.
pub fn load_data_bank(path: Option<&Path>) -> Result<MemoryDataBank, SetupError> {
    match path {
        Some(path) => read_json(path, "data bank"),
        None => Ok(MemoryDataBank::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crawlmap_explore::DataBank;

    #[test]
    fn test_job_overrides_target_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        fs::write(
            &path,
            r#"{"url": "http://shop.test/", "max_depth": 6, "max_minutes": 15}"#,
        )
        .unwrap();

        let job = JobRecord::load(&path).unwrap();
        let mut config = CrawlConfig::default();
        job.apply(&mut config);
        assert_eq!(config.base_url, "http://shop.test/");
        assert_eq!(config.max_depth, 6);
        assert_eq!(config.max_time_secs, 900);
    }

    #[test]
    fn test_data_bank_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.json");
        fs::write(
            &path,
            r#"{
                "values": {"email": ["a@test", "b@test"]},
                "mutations": [{"method": 1, "mode": 0, "info": "empty", "value": ""}]
            }"#,
        )
        .unwrap();

        let bank = load_data_bank(Some(&path)).unwrap();
        assert_eq!(bank.values_for("email").len(), 2);
        assert_eq!(bank.mutation_values(1, &[0])[0].info, "empty");
        assert!(load_data_bank(None).unwrap().values.is_empty());
    }
}
