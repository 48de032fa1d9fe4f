//! Persistence seam for per-state artifacts.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crawlmap_model::{Observation, State, StateId};

/// Where new states, their screenshots and replay mismatches are written.
pub trait StateArchive {
    /// Persist the markup and controls of a newly added state.
    fn save_state(&mut self, state: &State) -> io::Result<()>;

    /// File the screenshot of `state` should be written to, if screenshots
    /// are kept.
    fn screenshot_path(&mut self, _state: StateId) -> io::Result<Option<PathBuf>> {
        Ok(None)
    }

    /// Persist the expected and actual pages of a restart replay that
    /// diverged at `step` while backtracking to `target`.
    fn save_mismatch(
        &mut self,
        target: StateId,
        step: usize,
        expected: &Observation,
        actual: &Observation,
    ) -> io::Result<()>;
}

/// Keeps nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullArchive;

impl StateArchive for NullArchive {
    fn save_state(&mut self, _state: &State) -> io::Result<()> {
        Ok(())
    }

    fn save_mismatch(
        &mut self,
        _target: StateId,
        _step: usize,
        _expected: &Observation,
        _actual: &Observation,
    ) -> io::Result<()> {
        Ok(())
    }
}

/// What a [`MemoryArchive`] has been handed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveLog {
    pub states: Vec<StateId>,
    /// `(target, step, expected url, actual url)`
    pub mismatches: Vec<(StateId, usize, String, String)>,
}

/// Records archive calls in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    log: Arc<Mutex<ArchiveLog>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> ArchiveLog {
        self.log
            .lock()
            .map(|l| l.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn with_log(&self, f: impl FnOnce(&mut ArchiveLog)) {
        match self.log.lock() {
            Ok(mut log) => f(&mut log),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl StateArchive for MemoryArchive {
    fn save_state(&mut self, state: &State) -> io::Result<()> {
        self.with_log(|log| log.states.push(state.id));
        Ok(())
    }

    fn save_mismatch(
        &mut self,
        target: StateId,
        step: usize,
        expected: &Observation,
        actual: &Observation,
    ) -> io::Result<()> {
        self.with_log(|log| {
            log.mismatches
                .push((target, step, expected.url.clone(), actual.url.clone()))
        });
        Ok(())
    }
}
