use crate::display::Console;
use crate::errors::{BenchError, Result};
use crate::invoke::Invoker;
use crate::parse::parse_measurement;
use crate::plan::{ExpectedResultTable, Plan, RuntimeConfig};
use crate::probe::Capabilities;
use crate::types::{AggregateResult, IterationTable, Measurement, ResultsMatrix, Samples, Statistic};
use crate::verify::{self, Verdict};

/// Tunables of the measurement protocol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Invocations per measurement, also used for calibration
    pub repetitions: usize,
    /// A measurement is swamped when its raw real time is below
    /// `swamp_factor * init_time`
    pub swamp_factor: f64,
    pub statistic: Statistic,
    /// Give up on a (routine, size) pair after this many doublings
    pub max_doublings: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repetitions: 10,
            swamp_factor: 3.0,
            statistic: Statistic::Mean,
            max_doublings: 20,
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub init_time: f64,
    pub matrix: ResultsMatrix,
}

/// Estimate the fixed cost of launching the runtime.
///
/// Runs the init routine, which does no benchmarked work, and reduces the
/// real times only. An init routine that exits unsuccessfully is fatal.
pub fn calibrate(invoker: &mut dyn Invoker, runtime: &RuntimeConfig, settings: &Settings) -> Result<f64> {
    let args = vec![runtime.entry_for(&runtime.init), "0".to_string(), "0".to_string()];
    let mut real = Vec::with_capacity(settings.repetitions);
    for _ in 0..settings.repetitions {
        let invocation = invoker.invoke(&args)?;
        invocation.ensure_success(&runtime.init)?;
        real.push(invocation.elapsed.as_secs_f64());
    }
    let init_time = settings.statistic.reduce(&real);
    tracing::debug!(?real, init_time, "calibrated startup overhead");
    Ok(init_time)
}

/// Invoke a routine once and parse what it printed.
///
/// A non-zero exit or missing output lines is an error, never a zero-cost
/// sample.
pub fn measure_once(
    invoker: &mut dyn Invoker,
    runtime: &RuntimeConfig,
    routine: &str,
    size: u64,
    iterations: u64,
) -> Result<Measurement> {
    let args = vec![
        runtime.entry_for(routine),
        size.to_string(),
        iterations.to_string(),
    ];
    let invocation = invoker.invoke(&args)?;
    invocation.ensure_success(routine)?;
    let output = parse_measurement(routine, &invocation.stdout)?;
    Ok(Measurement {
        value: output.value,
        real: invocation.elapsed.as_secs_f64(),
        user: output.user,
        diagnostics: output.diagnostics,
    })
}

fn collect_samples(
    invoker: &mut dyn Invoker,
    runtime: &RuntimeConfig,
    console: &Console,
    routine: &str,
    size: u64,
    iterations: u64,
    repetitions: usize,
) -> Result<Samples> {
    let mut samples = Samples::default();
    for _ in 0..repetitions {
        let measurement = measure_once(invoker, runtime, routine, size, iterations)?;
        tracing::debug!(
            routine,
            size,
            iterations,
            real = measurement.real,
            user = measurement.user,
            "sample"
        );
        console.diagnostics(&measurement.diagnostics);
        samples.push(measurement);
    }
    Ok(samples)
}

/// Reduce samples to per-iteration costs net of startup overhead.
///
/// Real time below the init time clamps to zero.
pub fn aggregate(samples: &Samples, iterations: u64, init_time: f64, statistic: Statistic) -> AggregateResult {
    let raw_real = statistic.reduce(&samples.real);
    let user = statistic.reduce(&samples.user);
    let iterations_f = iterations.max(1) as f64;
    AggregateResult {
        iterations,
        raw_real,
        real_per_iter: (raw_real - init_time).max(0.0) / iterations_f,
        user_per_iter: user / iterations_f,
        value: samples.last_value.clone(),
        verified: None,
    }
}

/// Measure a (routine, size) pair, doubling its iteration count in `table`
/// until the raw real time clears the swamp threshold.
#[allow(clippy::too_many_arguments)]
pub fn measure_adaptive(
    invoker: &mut dyn Invoker,
    runtime: &RuntimeConfig,
    console: &Console,
    table: &mut IterationTable,
    routine: &str,
    size: u64,
    init_time: f64,
    settings: &Settings,
) -> Result<AggregateResult> {
    let threshold = settings.swamp_factor * init_time;
    let mut doublings = 0;

    loop {
        let iterations = table.get(routine, size).ok_or_else(|| BenchError::Plan {
            detail: format!("no iteration count for routine '{}' at size {}", routine, size),
        })?;

        let samples = collect_samples(
            invoker,
            runtime,
            console,
            routine,
            size,
            iterations,
            settings.repetitions,
        )?;
        let result = aggregate(&samples, iterations, init_time, settings.statistic);
        if result.raw_real >= threshold {
            return Ok(result);
        }

        if doublings >= settings.max_doublings {
            return Err(BenchError::NoConvergence {
                routine: routine.to_string(),
                size,
                iterations,
            });
        }
        doublings += 1;

        let doubled = table.double(routine, size).unwrap_or(iterations);
        if doubled <= iterations {
            return Err(BenchError::NoConvergence {
                routine: routine.to_string(),
                size,
                iterations,
            });
        }
        console.swamped(routine, size, result.raw_real, init_time, doubled);
    }
}

/// Calibrate, then measure and verify every available routine at every size.
pub fn run(
    plan: &Plan,
    invoker: &mut dyn Invoker,
    caps: &Capabilities,
    table: &mut IterationTable,
    settings: &Settings,
    console: &Console,
) -> Result<RunReport> {
    let expected: ExpectedResultTable = plan.expected_table();

    let init_time = calibrate(invoker, &plan.runtime, settings)?;
    console.init_time(init_time);

    let mut matrix = ResultsMatrix::default();
    for routine in &plan.routines {
        if !caps.allows(routine) {
            let requirement = routine.requires.as_deref().unwrap_or_default();
            let hint = caps.hint_for(requirement).unwrap_or_default();
            console.skipped(&routine.name, requirement, hint);
            continue;
        }

        for &size in &plan.sizes {
            let mut result = measure_adaptive(
                invoker,
                &plan.runtime,
                console,
                table,
                &routine.name,
                size,
                init_time,
                settings,
            )?;

            let verdict = verify::check(&expected, &routine.name, size, &result.value);
            if let Verdict::Mismatch { expected: want } = &verdict {
                console.mismatch(&routine.name, size, &result.value, want);
            }
            result.verified = verdict.as_verified();

            console.measured(&routine.name, size, &result);
            matrix.insert(&routine.name, size, result);
        }
    }

    Ok(RunReport { init_time, matrix })
}
