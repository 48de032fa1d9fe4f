use std::fs;
use std::path::Path;

use crawlmap_core::{
    EndRecord, RunConfig, RunError, RunMode, RunRequest, Runner, SessionFactory, SetupError,
    DEFAULT_ERROR_LOG, END_FILE, MUTANT_ERROR_LOG,
};
use crawlmap_driver::{ClickEffect, Driver, DriverError, ScriptedSite, WebDriverConfig};
use crawlmap_explore::{CrawlConfig, MemoryDataBank, MutationTracesRecord};
use crawlmap_markup::{Clickable, InputField};
use crawlmap_model::{AutomataRecord, EdgeRecord, TraceRecord, TracesRecord};

const BASE: &str = "http://app.test/";

struct SiteFactory(ScriptedSite);

impl SessionFactory for SiteFactory {
    fn open(&mut self, _config: &WebDriverConfig) -> Result<Box<dyn Driver>, DriverError> {
        Ok(Box::new(self.0.session()))
    }
}

fn two_level_site() -> ScriptedSite {
    ScriptedSite::new()
        .page(
            "home",
            BASE,
            r#"<html><body><a id="to-a" href="/a">A</a></body></html>"#,
        )
        .page(
            "a",
            "http://app.test/a",
            r#"<html><body><h1>A</h1><a id="to-b" href="/b">B</a></body></html>"#,
        )
        .page("b", "http://app.test/b", "<html><body><h1>B</h1></body></html>")
        .on_click("home", "to-a", ClickEffect::Navigate("a".to_string()))
        .on_click("a", "to-b", ClickEffect::Navigate("b".to_string()))
}

fn login_site() -> ScriptedSite {
    ScriptedSite::new()
        .page(
            "login",
            BASE,
            r#"<html><body><input id="user" type="text"><button id="submit">Log in</button></body></html>"#,
        )
        .page("welcome", "http://app.test/home", "<html><body>Welcome</body></html>")
        .page("denied", "http://app.test/denied", "<html><body>Denied</body></html>")
        .on_click(
            "login",
            "submit",
            ClickEffect::Submit {
                field: "user".to_string(),
                expected: "admin".to_string(),
                on_match: "welcome".to_string(),
                otherwise: "denied".to_string(),
            },
        )
}

fn login_traces() -> TracesRecord {
    let edge = EdgeRecord {
        id: 0,
        from: 0,
        to: 1,
        clickable: Clickable {
            id: Some("submit".to_string()),
            name: None,
            xpath: "/html[1]/body[1]/button[1]".to_string(),
            tag: "button".to_string(),
        },
        inputs: vec![InputField {
            id: Some("user".to_string()),
            name: None,
            xpath: "/html[1]/body[1]/input[1]".to_string(),
            input_type: "text".to_string(),
            value: Some("admin".to_string()),
            info: None,
        }],
        selects: vec![],
        checkboxes: vec![],
        radios: vec![],
        iframe_list: None,
    };
    TracesRecord {
        traces: vec![TraceRecord {
            states: vec![],
            edges: vec![edge],
        }],
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) {
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Config and traces of a recorded login run, plus a data bank with two
/// mutations of method 1.
fn recorded_login_run(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let bank_path = dir.join("bank.json");
    write_json(
        &bank_path,
        &MemoryDataBank::new()
            .with_mutation(1, 0, "valid", "admin")
            .with_mutation(1, 0, "wrong", "guest"),
    );
    let config = RunConfig {
        crawl: CrawlConfig::for_url(BASE),
        data_bank: Some(bank_path),
        ..RunConfig::default()
    };
    let config_path = dir.join("prior_config.json");
    config.save(&config_path).unwrap();
    let traces_path = dir.join("prior_traces.json");
    write_json(&traces_path, &login_traces());
    (config_path, traces_path)
}

#[test]
fn test_seeded_run_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let job = dir.path().join("job.json");
    fs::write(
        &job,
        r#"{"url": "http://app.test/", "max_depth": 2, "max_minutes": 5}"#,
    )
    .unwrap();
    let site = two_level_site();
    let mut runner = Runner::new(SiteFactory(site.clone())).with_log_dir(dir.path());
    let request = RunRequest {
        folder: dir.path().to_path_buf(),
        name: "run".to_string(),
        mode: RunMode::Seeded { job, config: None },
    };

    let summary = runner.execute(&request).unwrap();
    assert_eq!(summary.states, 3);
    assert_eq!(summary.edges, 2);
    assert_eq!(summary.traces, 1);

    let root = dir.path().join("run");
    let end: EndRecord = read_json(&root.join(END_FILE));
    assert!(end.complete);
    assert_eq!(end.note, "done");

    let config: RunConfig = read_json(&root.join("config.json"));
    assert_eq!(config.crawl.base_url, BASE);
    assert_eq!(config.crawl.max_depth, 2);
    assert_eq!(config.crawl.max_time_secs, 300);

    let automata: AutomataRecord = read_json(&root.join("automata.json"));
    assert_eq!(automata.state.len(), 3);
    assert_eq!(automata.edge.len(), 2);
    assert_eq!(automata.state[2].img_path, "screenshot/state/2.png");

    let traces: TracesRecord = read_json(&root.join("traces.json"));
    assert_eq!(traces.traces[0].edges.len(), 2);

    assert!(root.join("dom/1/1.txt").is_file());
    assert!(root.join("screenshot/state/2.png").is_file());
    assert!(!root.join("divergences.json").exists());
    assert_eq!(site.stats().screenshots, 3);
}

#[test]
fn test_existing_run_directory_is_logged_and_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("run")).unwrap();
    let mut runner = Runner::new(SiteFactory(two_level_site())).with_log_dir(dir.path());
    let request = RunRequest {
        folder: dir.path().to_path_buf(),
        name: "run".to_string(),
        mode: RunMode::Debug { config: None },
    };

    let err = runner.execute(&request).unwrap_err();
    assert!(matches!(err, RunError::Setup(SetupError::RunExists(_))));
    assert!(!dir.path().join("run").join(END_FILE).exists());
    let log = fs::read_to_string(dir.path().join(DEFAULT_ERROR_LOG)).unwrap();
    assert!(log.contains("already exists"));
}

#[test]
fn test_missing_job_file_is_marked_without_crawling() {
    let dir = tempfile::tempdir().unwrap();
    let mut runner = Runner::new(SiteFactory(two_level_site())).with_log_dir(dir.path());
    let request = RunRequest {
        folder: dir.path().to_path_buf(),
        name: "run".to_string(),
        mode: RunMode::Seeded {
            job: dir.path().join("missing.json"),
            config: None,
        },
    };

    let err = runner.execute(&request).unwrap_err();
    assert!(matches!(err, RunError::Setup(SetupError::MissingFile(_))));
    let root = dir.path().join("run");
    let end: EndRecord = read_json(&root.join(END_FILE));
    assert!(!end.complete);
    assert!(end.note.starts_with("File not found"));
    assert!(!root.join("config.json").exists());
    assert!(!root.join("dom").exists());
}

#[test]
fn test_failed_run_writes_incomplete_marker() {
    let dir = tempfile::tempdir().unwrap();
    let site = two_level_site();
    let mut runner = Runner::new(SiteFactory(site.clone())).with_log_dir(dir.path());
    // The default configuration has no base URL.
    let request = RunRequest {
        folder: dir.path().to_path_buf(),
        name: "run".to_string(),
        mode: RunMode::Debug { config: None },
    };

    let err = runner.execute(&request).unwrap_err();
    assert!(matches!(err, RunError::Crawl(_)));
    let end: EndRecord = read_json(&dir.path().join("run").join(END_FILE));
    assert!(!end.complete);
    assert!(end.note.starts_with("Crawl error"));
    assert!(!dir.path().join(DEFAULT_ERROR_LOG).exists());
    assert_eq!(site.stats().starts, 0);
}

#[test]
fn test_mutation_run_clusters_replays() {
    let dir = tempfile::tempdir().unwrap();
    let (config, traces) = recorded_login_run(dir.path());
    let site = login_site();
    let mut runner = Runner::new(SiteFactory(site.clone())).with_log_dir(dir.path());
    let request = RunRequest {
        folder: dir.path().to_path_buf(),
        name: "mutants".to_string(),
        mode: RunMode::Mutate {
            config,
            traces,
            trace_id: 0,
            method: 1,
            modes: vec![0],
        },
    };

    let summary = runner.execute(&request).unwrap();
    assert_eq!(summary.traces, 3);
    assert_eq!(summary.states, 3);

    let root = dir.path().join("mutants");
    let record: MutationTracesRecord = read_json(&root.join("mutation_traces.json"));
    assert_eq!(record.method, 1);
    let clusters: Vec<_> = record
        .traces
        .iter()
        .map(|t| t.cluster_value.as_str())
        .collect();
    assert_eq!(clusters, vec!["0-1", "0-1", "0-2"]);
    assert!(record.traces[0].baseline);

    let end: EndRecord = read_json(&root.join(END_FILE));
    assert!(end.complete);
    assert_eq!(site.stats().starts, 3);
}

#[test]
fn test_unknown_trace_id_goes_to_mutant_log() {
    let dir = tempfile::tempdir().unwrap();
    let (config, traces) = recorded_login_run(dir.path());
    let mut runner = Runner::new(SiteFactory(login_site())).with_log_dir(dir.path());
    let request = RunRequest {
        folder: dir.path().to_path_buf(),
        name: "mutants".to_string(),
        mode: RunMode::Mutate {
            config,
            traces,
            trace_id: 4,
            method: 1,
            modes: vec![0],
        },
    };

    let err = runner.execute(&request).unwrap_err();
    assert!(matches!(
        err,
        RunError::Setup(SetupError::UnknownTrace { id: 4, count: 1 })
    ));
    let end: EndRecord = read_json(&dir.path().join("mutants").join(END_FILE));
    assert!(!end.complete);
    let log = fs::read_to_string(dir.path().join(MUTANT_ERROR_LOG)).unwrap();
    assert!(log.contains("Unknown trace id 4"));
}
