use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::errors::{BenchError, Result};
use crate::plan::{PrependPath, RuntimeConfig};

const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// Captured, decoded output of one finished subprocess.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock time from spawn to exit
    pub elapsed: Duration,
    /// Exit status description when the child did not succeed
    pub failure: Option<String>,
}

impl Invocation {
    /// Turn an unsuccessful exit into an error naming `routine`.
    pub fn ensure_success(&self, routine: &str) -> Result<()> {
        match &self.failure {
            None => Ok(()),
            Some(status) => Err(BenchError::RoutineFailed {
                routine: routine.to_string(),
                status: status.clone(),
                stderr: self.stderr.trim().to_string(),
            }),
        }
    }
}

/// Runs one external process per call and blocks until it exits.
pub trait Invoker {
    /// `args` follow the runtime's leading arguments: entry point first.
    fn invoke(&mut self, args: &[String]) -> Result<Invocation>;
}

/// Invoker backed by a real OS process.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    program: String,
    leading_args: Vec<String>,
    env: Vec<(String, String)>,
}

impl ProcessInvoker {
    /// Build an invoker whose environment prefers locally built artifacts.
    pub fn new(runtime: &RuntimeConfig, lib_dirs: &[PathBuf], routine_dirs: &[PathBuf]) -> Self {
        let env = resolve_env(runtime, lib_dirs, routine_dirs, |var| std::env::var(var).ok());
        Self {
            program: runtime.program.clone(),
            leading_args: runtime.args.clone(),
            env,
        }
    }
}

impl Invoker for ProcessInvoker {
    fn invoke(&mut self, args: &[String]) -> Result<Invocation> {
        let context = args.first().cloned().unwrap_or_else(|| self.program.clone());
        tracing::debug!(program = %self.program, ?args, "spawning");

        let start = Instant::now();
        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .args(args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| BenchError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let elapsed = start.elapsed();

        if interrupted(&output.status) {
            return Err(BenchError::Cancelled);
        }
        let failure = if output.status.success() {
            None
        } else {
            tracing::debug!(status = %output.status, entry = %context, "child exited unsuccessfully");
            Some(output.status.to_string())
        };

        Ok(Invocation {
            stdout: decode(output.stdout, &context)?,
            stderr: decode(output.stderr, &context)?,
            elapsed,
            failure,
        })
    }
}

#[cfg(unix)]
fn interrupted(status: &std::process::ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(2)
}

#[cfg(not(unix))]
fn interrupted(_status: &std::process::ExitStatus) -> bool {
    false
}

/// Decode child output, keeping the raw bytes on failure.
pub fn decode(bytes: Vec<u8>, context: &str) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| BenchError::Decode {
        context: context.to_string(),
        bytes: e.into_bytes(),
    })
}

/// Compute the variables to set on every child.
///
/// Fixed values from the plan are set verbatim. Search paths are placed in
/// front of the inherited value, with command-line directories ahead of the
/// plan's own entries.
pub fn resolve_env<F>(
    runtime: &RuntimeConfig,
    lib_dirs: &[PathBuf],
    routine_dirs: &[PathBuf],
    inherited: F,
) -> Vec<(String, String)>
where
    F: Fn(&str) -> Option<String>,
{
    let mut prepend: BTreeMap<String, PrependPath> = runtime.prepend.clone();
    push_front(&mut prepend, LIBRARY_PATH_VAR, lib_dirs, ":");
    push_front(&mut prepend, &runtime.routine_path_var, routine_dirs, " ");

    let mut env: Vec<(String, String)> = runtime
        .env
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    for (var, path) in prepend {
        let value = match inherited(&var) {
            Some(existing) if !existing.is_empty() => {
                format!("{}{}{}", path.value, path.separator, existing)
            }
            _ => path.value,
        };
        env.push((var, value));
    }

    env
}

fn push_front(
    prepend: &mut BTreeMap<String, PrependPath>,
    var: &str,
    dirs: &[PathBuf],
    default_separator: &str,
) {
    if dirs.is_empty() {
        return;
    }
    let separator = prepend
        .get(var)
        .map(|p| p.separator.clone())
        .unwrap_or_else(|| default_separator.to_string());
    let joined = dirs
        .iter()
        .map(|d| d.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(&separator);

    let value = match prepend.get(var) {
        Some(existing) => format!("{}{}{}", joined, separator, existing.value),
        None => joined,
    };
    prepend.insert(var.to_string(), PrependPath { value, separator });
}
