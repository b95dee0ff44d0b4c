use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Deserialize;

use crate::errors::{BenchError, Result};
use crate::types::IterationTable;

/// A benchmark plan as read from the TOML plan file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Data sizes in bytes, strictly ascending
    pub sizes: Vec<u64>,
    pub runtime: RuntimeConfig,
    /// Routine family -> expected return value, one per size
    #[serde(default)]
    pub expected: BTreeMap<String, Vec<String>>,
    /// Optional artifacts that gate some routines
    #[serde(default)]
    pub optional: BTreeMap<String, Requirement>,
    #[serde(default, rename = "routine")]
    pub routines: Vec<RoutineSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Entry-point template; `{routine}` is replaced by the routine name
    #[serde(default = "default_entry")]
    pub entry: String,
    #[serde(default = "default_init")]
    pub init: String,
    #[serde(default = "default_routine_path_var")]
    pub routine_path_var: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub prepend: BTreeMap<String, PrependPath>,
}

/// A search path placed in front of whatever the variable already holds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrependPath {
    pub value: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Requirement {
    pub file: Option<PathBuf>,
    pub probe: Option<String>,
    /// Install step that makes the requirement available
    pub hint: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutineSpec {
    pub name: String,
    pub family: Option<String>,
    pub requires: Option<String>,
    /// Starting iteration count, one per size
    pub iterations: Vec<u64>,
}

fn default_entry() -> String {
    "{routine}".to_string()
}

fn default_init() -> String {
    "init".to_string()
}

fn default_routine_path_var() -> String {
    "ydb_routines".to_string()
}

fn default_separator() -> String {
    ":".to_string()
}

impl RuntimeConfig {
    pub fn entry_for(&self, routine: &str) -> String {
        self.entry.replace("{routine}", routine)
    }
}

impl Plan {
    pub fn load(path: &Path) -> Result<Plan> {
        let text = std::fs::read_to_string(path).map_err(|source| BenchError::PlanRead {
            path: path.to_path_buf(),
            source,
        })?;
        Plan::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Plan> {
        let plan: Plan = toml::from_str(text).map_err(|e| BenchError::Plan {
            detail: e.to_string(),
        })?;
        plan.validate()?;
        Ok(plan)
    }

    fn validate(&self) -> Result<()> {
        if self.sizes.is_empty() {
            return invalid("at least one size is required".to_string());
        }
        if self.sizes.contains(&0) {
            return invalid("sizes must be non-zero".to_string());
        }
        if self.sizes.windows(2).any(|w| w[0] >= w[1]) {
            return invalid(format!("sizes must be strictly ascending: {:?}", self.sizes));
        }

        for (family, values) in &self.expected {
            if values.len() != self.sizes.len() {
                return invalid(format!(
                    "expected values for family '{}' list {} entries, but there are {} sizes",
                    family,
                    values.len(),
                    self.sizes.len()
                ));
            }
        }

        for (name, req) in &self.optional {
            if req.file.is_some() == req.probe.is_some() {
                return invalid(format!(
                    "optional '{}' must set exactly one of `file` or `probe`",
                    name
                ));
            }
        }

        let mut seen = BTreeSet::new();
        for routine in &self.routines {
            if !seen.insert(routine.name.as_str()) {
                return invalid(format!("routine '{}' is defined twice", routine.name));
            }
            if routine.iterations.len() != self.sizes.len() {
                return invalid(format!(
                    "routine '{}' lists {} iteration counts, but there are {} sizes",
                    routine.name,
                    routine.iterations.len(),
                    self.sizes.len()
                ));
            }
            if routine.iterations.contains(&0) {
                return invalid(format!(
                    "routine '{}' has a zero iteration count",
                    routine.name
                ));
            }
            if let Some(family) = &routine.family
                && !self.expected.contains_key(family)
            {
                return invalid(format!(
                    "routine '{}' belongs to unknown family '{}'",
                    routine.name, family
                ));
            }
            if let Some(req) = &routine.requires
                && !self.optional.contains_key(req)
            {
                return invalid(format!(
                    "routine '{}' requires unknown optional '{}'",
                    routine.name, req
                ));
            }
        }

        Ok(())
    }

    /// Keep only the named routines, in plan order.
    pub fn retain_routines(&mut self, names: &[String]) -> Result<()> {
        if let Some(unknown) = names
            .iter()
            .find(|n| !self.routines.iter().any(|r| &r.name == *n))
        {
            return invalid(format!("no routine named '{}' in the plan", unknown));
        }
        self.routines.retain(|r| names.contains(&r.name));
        Ok(())
    }

    /// Fresh iteration counts, owned by the caller for the rest of the run.
    pub fn iteration_table(&self) -> IterationTable {
        let mut table = IterationTable::default();
        for routine in &self.routines {
            for (size, count) in self.sizes.iter().zip(&routine.iterations) {
                table.set(&routine.name, *size, *count);
            }
        }
        table
    }

    pub fn expected_table(&self) -> ExpectedResultTable {
        let families: BTreeMap<&str, Rc<FamilyTable>> = self
            .expected
            .iter()
            .map(|(family, values)| {
                let table = FamilyTable {
                    family: family.clone(),
                    values: self.sizes.iter().copied().zip(values.iter().cloned()).collect(),
                };
                (family.as_str(), Rc::new(table))
            })
            .collect();

        let by_routine = self
            .routines
            .iter()
            .filter_map(|r| {
                let table = families.get(r.family.as_deref()?)?;
                Some((r.name.clone(), Rc::clone(table)))
            })
            .collect();

        ExpectedResultTable { by_routine }
    }
}

fn invalid(detail: String) -> Result<()> {
    Err(BenchError::Plan { detail })
}

/// Expected canonical output of one routine family, by size.
#[derive(Debug, PartialEq)]
pub struct FamilyTable {
    pub family: String,
    values: BTreeMap<u64, String>,
}

/// Routine name -> the family table it shares with its siblings.
#[derive(Debug, Default)]
pub struct ExpectedResultTable {
    by_routine: BTreeMap<String, Rc<FamilyTable>>,
}

impl ExpectedResultTable {
    pub fn lookup(&self, routine: &str, size: u64) -> Option<&str> {
        self.by_routine
            .get(routine)?
            .values
            .get(&size)
            .map(String::as_str)
    }
}
