use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("Failed to decode output of {context} as UTF-8 (raw bytes: {bytes:?})")]
    Decode { context: String, bytes: Vec<u8> },

    #[error("Probe '{name}' wrote to stderr, refusing to continue: {stderr}")]
    Probe { name: String, stderr: String },

    #[error("Could not parse output of routine '{routine}': {detail}")]
    Parse { routine: String, detail: String },

    #[error("Routine '{routine}' failed ({status}): {stderr}")]
    RoutineFailed {
        routine: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error(
        "Routine '{routine}' at size {size} is still swamped by startup overhead after doubling to {iterations} iterations"
    )]
    NoConvergence {
        routine: String,
        size: u64,
        iterations: u64,
    },

    #[error("Failed to read plan file {path}: {source}")]
    PlanRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid benchmark plan: {detail}")]
    Plan { detail: String },

    #[error("Interrupted")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, BenchError>;
