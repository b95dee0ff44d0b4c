use crate::errors::{BenchError, Result};

/// The trailing lines a routine prints: diagnostics, return value, timing.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineOutput {
    pub value: String,
    /// Inner-loop time in seconds
    pub user: f64,
    pub diagnostics: Vec<String>,
}

/// Parse routine stdout.
///
/// The last line is the inner-loop time in whole microseconds (empty means
/// zero), the line before it is the return value, and anything earlier is
/// diagnostic output that is passed through untouched.
pub fn parse_output(routine: &str, stdout: &str) -> Result<RoutineOutput> {
    let mut lines: Vec<&str> = stdout.lines().collect();

    let timing = lines.pop().unwrap_or("");
    let user = parse_micros(timing).ok_or_else(|| BenchError::Parse {
        routine: routine.to_string(),
        detail: format!("timing line {:?} is not a whole number of microseconds", timing),
    })?;

    let value = lines.pop().unwrap_or("").trim_end_matches('\r').to_string();
    let diagnostics = lines
        .into_iter()
        .map(|l| l.trim_end_matches('\r').to_string())
        .collect();

    Ok(RoutineOutput {
        value,
        user,
        diagnostics,
    })
}

/// Parse the stdout of a benchmarked routine.
///
/// Unlike [`parse_output`], a measurement must carry both a value line and a
/// timing line. Anything shorter means the routine never ran to completion.
pub fn parse_measurement(routine: &str, stdout: &str) -> Result<RoutineOutput> {
    let lines = stdout.lines().count();
    if lines < 2 {
        return Err(BenchError::Parse {
            routine: routine.to_string(),
            detail: format!("expected a value line and a timing line, got {} line(s)", lines),
        });
    }
    parse_output(routine, stdout)
}

fn parse_micros(line: &str) -> Option<f64> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    let micros: u64 = trimmed.parse().ok()?;
    Some(micros as f64 / 1_000_000.0)
}
