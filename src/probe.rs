use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{BenchError, Result};
use crate::invoke::Invoker;
use crate::parse::parse_output;
use crate::plan::{Plan, RoutineSpec};

/// Which optional requirements of a plan are present on this machine.
///
/// Computed once before any measurement and never updated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    available: BTreeSet<String>,
    /// Missing requirement -> install hint
    missing: BTreeMap<String, String>,
}

impl Capabilities {
    pub fn allows(&self, routine: &RoutineSpec) -> bool {
        match &routine.requires {
            Some(req) => self.available.contains(req),
            None => true,
        }
    }

    pub fn hint_for(&self, requirement: &str) -> Option<&str> {
        self.missing.get(requirement).map(String::as_str)
    }
}

/// Check the optional requirements the plan's routines depend on.
///
/// Requirements no selected routine names are never checked, so a broken
/// probe for a deselected routine cannot abort the run.
///
/// File requirements are a plain existence check. Probe requirements run the
/// named routine through the usual contract; it must print `1` as its return
/// value when the capability is present. Anything on the probe's stderr means
/// the environment is misconfigured and aborts the run.
pub fn detect(plan: &Plan, invoker: &mut dyn Invoker) -> Result<Capabilities> {
    let mut caps = Capabilities::default();
    let needed: BTreeSet<&str> = plan
        .routines
        .iter()
        .filter_map(|r| r.requires.as_deref())
        .collect();

    for (name, req) in plan.optional.iter().filter(|(name, _)| needed.contains(name.as_str())) {
        let present = match (&req.file, &req.probe) {
            (Some(path), _) => path.exists(),
            (None, Some(probe)) => run_probe(plan, invoker, probe)?,
            (None, None) => false,
        };
        tracing::debug!(requirement = %name, present, "probed optional requirement");

        if present {
            caps.available.insert(name.clone());
        } else {
            caps.missing.insert(name.clone(), req.hint.clone());
        }
    }

    Ok(caps)
}

fn run_probe(plan: &Plan, invoker: &mut dyn Invoker, probe: &str) -> Result<bool> {
    let args = vec![plan.runtime.entry_for(probe), "0".to_string(), "1".to_string()];
    let invocation = invoker.invoke(&args)?;

    if !invocation.stderr.trim().is_empty() {
        return Err(BenchError::Probe {
            name: probe.to_string(),
            stderr: invocation.stderr.trim().to_string(),
        });
    }

    let output = parse_output(probe, &invocation.stdout)?;
    Ok(output.value.trim() == "1")
}
