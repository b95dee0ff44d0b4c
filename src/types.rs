use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Outcome of one invocation of a routine.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Opaque return value printed by the routine (digest, length, ...)
    pub value: String,
    /// Wall-clock seconds for the whole subprocess
    pub real: f64,
    /// Seconds the routine reports for its inner loop only
    pub user: f64,
    /// Lines printed before the return value
    pub diagnostics: Vec<String>,
}

/// All repetitions of one (routine, size, iterations) combination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Samples {
    pub real: Vec<f64>,
    pub user: Vec<f64>,
    pub last_value: String,
}

impl Samples {
    pub fn push(&mut self, measurement: Measurement) {
        self.real.push(measurement.real);
        self.user.push(measurement.user);
        self.last_value = measurement.value;
    }
}

/// Per-operation cost of one (routine, size) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub iterations: u64,
    /// Reduced real time of one whole invocation, overhead included
    pub raw_real: f64,
    pub real_per_iter: f64,
    pub user_per_iter: f64,
    pub value: String,
    /// `None` when the routine has no expected value to compare against
    pub verified: Option<bool>,
}

/// How repetition samples are reduced to one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    #[default]
    Mean,
    Min,
}

impl Statistic {
    /// Reduce samples; an empty slice reduces to zero.
    pub fn reduce(self, samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        match self {
            Statistic::Mean => samples.iter().sum::<f64>() / samples.len() as f64,
            Statistic::Min => samples.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }
}

/// Iteration count per routine and size, doubled in place when a
/// measurement is swamped by startup overhead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationTable {
    counts: BTreeMap<String, BTreeMap<u64, u64>>,
}

impl IterationTable {
    pub fn set(&mut self, routine: &str, size: u64, iterations: u64) {
        self.counts
            .entry(routine.to_string())
            .or_default()
            .insert(size, iterations);
    }

    pub fn get(&self, routine: &str, size: u64) -> Option<u64> {
        self.counts.get(routine)?.get(&size).copied()
    }

    /// Double the count for a pair and return the new value.
    pub fn double(&mut self, routine: &str, size: u64) -> Option<u64> {
        let count = self.counts.get_mut(routine)?.get_mut(&size)?;
        *count = count.saturating_mul(2);
        Some(*count)
    }
}

/// Results keyed by routine (in insertion order) and size (ascending).
#[derive(Debug, Clone, Default)]
pub struct ResultsMatrix {
    rows: Vec<(String, BTreeMap<u64, AggregateResult>)>,
}

impl ResultsMatrix {
    pub fn insert(&mut self, routine: &str, size: u64, result: AggregateResult) {
        match self.rows.iter_mut().find(|(name, _)| name == routine) {
            Some((_, row)) => {
                row.insert(size, result);
            }
            None => {
                let mut row = BTreeMap::new();
                row.insert(size, result);
                self.rows.push((routine.to_string(), row));
            }
        }
    }

    pub fn get(&self, routine: &str, size: u64) -> Option<&AggregateResult> {
        self.rows
            .iter()
            .find(|(name, _)| name == routine)
            .and_then(|(_, row)| row.get(&size))
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &BTreeMap<u64, AggregateResult>)> {
        self.rows.iter().map(|(name, row)| (name.as_str(), row))
    }
}
