//! Form value synthesis.
//!
//! Candidate values come from a [`DataBank`] keyed by the control's name.
//! One random integer in `0..=1000` is drawn per action and applied modulo
//! each control's candidate list, so controls filled together draw
//! correlated rows. Controls without candidates get random values.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crawlmap_markup::FormControls;

/// Upper bound (inclusive) of the per-action pick.
pub const PICK_RANGE: usize = 1000;

const RANDOM_TEXT_LEN: usize = 8;

/// A value used to mutate text inputs, with a label describing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationValue {
    pub info: String,
    pub value: String,
}

/// Source of seed values for form controls.
pub trait DataBank {
    /// Candidate values for the control keyed `key`.
    ///
    /// Select and radio candidates are option indices, checkbox candidates
    /// are `/`-separated index lists.
    fn values_for(&self, key: &str) -> Vec<String>;

    /// Mutation values of `method` restricted to `modes`.
    fn mutation_values(&self, _method: u32, _modes: &[u32]) -> Vec<MutationValue> {
        Vec::new()
    }
}

/// One mutation table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEntry {
    pub method: u32,
    pub mode: u32,
    pub info: String,
    pub value: String,
}

/// A data bank held in memory. Also the on-disk JSON format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryDataBank {
    pub values: HashMap<String, Vec<String>>,
    pub mutations: Vec<MutationEntry>,
}

impl MemoryDataBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(mut self, key: &str, values: &[&str]) -> Self {
        self.values
            .insert(key.to_string(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn with_mutation(mut self, method: u32, mode: u32, info: &str, value: &str) -> Self {
        self.mutations.push(MutationEntry {
            method,
            mode,
            info: info.to_string(),
            value: value.to_string(),
        });
        self
    }
}

impl DataBank for MemoryDataBank {
    fn values_for(&self, key: &str) -> Vec<String> {
        self.values.get(key).cloned().unwrap_or_default()
    }

    fn mutation_values(&self, method: u32, modes: &[u32]) -> Vec<MutationValue> {
        self.mutations
            .iter()
            .filter(|m| m.method == method && modes.contains(&m.mode))
            .map(|m| MutationValue {
                info: m.info.clone(),
                value: m.value.clone(),
            })
            .collect()
    }
}

/// Chooses concrete values for the controls of an action.
pub struct ValueSynthesizer {
    rng: ChaCha8Rng,
    bank: Box<dyn DataBank>,
}

impl ValueSynthesizer {
    pub fn new(rng: ChaCha8Rng, bank: Box<dyn DataBank>) -> Self {
        Self { rng, bank }
    }

    pub fn bank(&self) -> &dyn DataBank {
        self.bank.as_ref()
    }

    /// A copy of `controls` carrying the values to apply.
    pub fn fill(&mut self, controls: &FormControls) -> FormControls {
        let pick = self.rng.gen_range(0..=PICK_RANGE);
        let mut filled = controls.clone();

        for input in &mut filled.inputs {
            let candidates = self.bank.values_for(input.data_key());
            input.value = Some(if candidates.is_empty() {
                self.random_text()
            } else {
                candidates[pick % candidates.len()].clone()
            });
        }

        for select in &mut filled.selects {
            let count = select.options.len();
            let candidates = indices(&self.bank.values_for(select.data_key()), count);
            select.selected = match (candidates.is_empty(), count) {
                (_, 0) => None,
                (true, _) => Some(self.rng.gen_range(0..count)),
                (false, _) => Some(candidates[pick % candidates.len()]),
            };
        }

        for group in &mut filled.checkboxes {
            let count = group.choices.len();
            let candidates: Vec<Vec<usize>> = self
                .bank
                .values_for(&group.name)
                .iter()
                .map(|row| {
                    row.split('/')
                        .filter_map(|i| i.trim().parse::<usize>().ok())
                        .filter(|i| *i < count)
                        .collect()
                })
                .collect();
            group.selected = if candidates.is_empty() {
                self.random_subset(count)
            } else {
                candidates[pick % candidates.len()].clone()
            };
        }

        for group in &mut filled.radios {
            let count = group.choices.len();
            let candidates = indices(&self.bank.values_for(&group.name), count);
            group.selected = match (candidates.is_empty(), count) {
                (_, 0) => None,
                (true, _) => Some(self.rng.gen_range(0..count)),
                (false, _) => Some(candidates[pick % candidates.len()]),
            };
        }

        filled
    }

    fn random_text(&mut self) -> String {
        (0..RANDOM_TEXT_LEN)
            .map(|_| self.rng.gen_range(b'a'..=b'z') as char)
            .collect()
    }

    fn random_subset(&mut self, count: usize) -> Vec<usize> {
        let mut all: Vec<usize> = (0..count).collect();
        all.shuffle(&mut self.rng);
        let keep = self.rng.gen_range(0..=count);
        let mut subset: Vec<usize> = all.into_iter().take(keep).collect();
        subset.sort_unstable();
        subset
    }
}

/// Candidate rows parsed as indices below `count`.
fn indices(rows: &[String], count: usize) -> Vec<usize> {
    rows.iter()
        .filter_map(|r| r.trim().parse::<usize>().ok())
        .filter(|i| *i < count)
        .collect()
}
