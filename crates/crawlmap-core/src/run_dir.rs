//! The on-disk layout of one run.
//!
//! ```text
//! <folder>/<name>/
//!   config.json  automata.json  traces.json  end.json  log.txt
//!   dom/<id>/<id>.txt  <id>_nor.txt  <id>_inputs.json ...
//!   dom/<id>/debug/    restart-replay mismatches while backtracking to <id>
//!   screenshot/state/<id>.png
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crawlmap_explore::StateArchive;
use crawlmap_model::{Observation, RecordLayout, State, StateId, StateRecord};

use crate::error::SetupError;

pub const END_FILE: &str = "end.json";
pub const LOG_FILE: &str = "log.txt";

/// Completion marker written at the end of every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndRecord {
    pub complete: bool,
    /// `done`, or the full diagnostic of the failure.
    pub note: String,
}

/// A run directory and the layout of the artifacts inside it.
#[derive(Debug, Clone)]
pub struct RunDirectory {
    root: PathBuf,
    layout: RecordLayout,
}

impl RunDirectory {
    /// Create `<folder>/<name>` with its artifact directories. `folder` must
    /// exist and `name` must not.
    pub fn create(folder: &Path, name: &str, layout: RecordLayout) -> Result<Self, SetupError> {
        let root = Self::vacant(folder, name)?;
        fs::create_dir_all(root.join(&layout.dom_dir))?;
        fs::create_dir_all(root.join(&layout.state_screenshot_dir))?;
        Ok(Self { root, layout })
    }

    /// Path of `<folder>/<name>` if a run could be created there.
    pub fn vacant(folder: &Path, name: &str) -> Result<PathBuf, SetupError> {
        if !folder.is_dir() {
            return Err(SetupError::MissingFolder(folder.to_path_buf()));
        }
        let root = folder.join(name);
        if root.exists() {
            return Err(SetupError::RunExists(root));
        }
        Ok(root)
    }

    /// Record a setup failure in `<folder>/<name>`, which then holds
    /// nothing but the completion marker.
    pub fn mark_setup_failure(folder: &Path, name: &str, note: &str) -> io::Result<()> {
        let root = folder.join(name);
        fs::create_dir_all(&root)?;
        let run = Self {
            root,
            layout: RecordLayout::default(),
        };
        run.write_end(false, note)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    pub fn write_json<T: Serialize>(&self, file: &str, value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        fs::write(self.path(file), json)
    }

    pub fn write_end(&self, complete: bool, note: &str) -> io::Result<()> {
        self.write_json(
            END_FILE,
            &EndRecord {
                complete,
                note: note.to_string(),
            },
        )
    }

    fn state_dir(&self, id: StateId) -> PathBuf {
        self.root.join(&self.layout.dom_dir).join(id.to_string())
    }
}

impl StateArchive for RunDirectory {
    fn save_state(&mut self, state: &State) -> io::Result<()> {
        let dir = self.state_dir(state.id);
        fs::create_dir_all(&dir)?;
        let id = state.id;

        let observation = state.observation();
        for (k, fragment) in observation.fragments().iter().enumerate() {
            let file = if fragment.frame.is_top() {
                format!("{id}.txt")
            } else {
                format!("{id}_frame{k}.txt")
            };
            fs::write(dir.join(file), &fragment.markup)?;
        }
        fs::write(dir.join(format!("{id}_nor.txt")), observation.fingerprint_text())?;

        let frames: Vec<_> = observation.fragments().iter().map(|f| &f.frame).collect();
        let record = StateRecord::from_state(state, &self.layout);
        let files: [(&str, serde_json::Result<String>); 5] = [
            ("frames", serde_json::to_string_pretty(&frames)),
            ("inputs", serde_json::to_string_pretty(&record.inputs)),
            ("selects", serde_json::to_string_pretty(&record.selects)),
            ("checkboxes", serde_json::to_string_pretty(&record.checkboxes)),
            ("radios", serde_json::to_string_pretty(&record.radios)),
        ];
        for (kind, json) in files {
            fs::write(
                dir.join(format!("{id}_{kind}.json")),
                json.map_err(io::Error::other)?,
            )?;
        }
        debug!(state = id, dir = %dir.display(), "state archived");
        Ok(())
    }

    fn screenshot_path(&mut self, state: StateId) -> io::Result<Option<PathBuf>> {
        Ok(Some(self.root.join(self.layout.img_path(state))))
    }

    fn save_mismatch(
        &mut self,
        target: StateId,
        step: usize,
        expected: &Observation,
        actual: &Observation,
    ) -> io::Result<()> {
        let dir = self.state_dir(target).join("debug");
        fs::create_dir_all(&dir)?;
        for (label, observation) in [("expected", expected), ("actual", actual)] {
            let mut text = format!("{}\n", observation.url);
            text.push_str(&observation.fingerprint_text());
            fs::write(dir.join(format!("{step}_{label}.txt")), text)?;
        }
        Ok(())
    }
}

/// Append a timestamped entry to a top-level error log.
pub fn append_error_log(path: &Path, message: &str) -> io::Result<()> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "[MAIN ERROR-{secs}]: {message}")
}
