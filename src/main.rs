use std::path::PathBuf;
use std::process;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rtbench::display::{self, Console, JsonContext};
use rtbench::errors::BenchError;
use rtbench::invoke::ProcessInvoker;
use rtbench::measure::{self, Settings};
use rtbench::plan::Plan;
use rtbench::probe;
use rtbench::types::Statistic;

#[derive(Parser)]
#[command(
    name = "rtbench",
    version,
    about = "Measure per-operation cost of routines by timing runtime subprocesses"
)]
struct Cli {
    /// Benchmark plan (TOML)
    #[arg(long, env = "RTBENCH_PLAN", default_value = "bench.toml")]
    plan: PathBuf,

    /// Invocations per measurement and for init-time calibration
    #[arg(short = 'n', long, env = "RTBENCH_REPETITIONS", default_value_t = 10)]
    repetitions: usize,

    /// Retry with doubled iterations while raw time is below this multiple of init time
    #[arg(long, env = "RTBENCH_SWAMP_FACTOR", default_value_t = 3.0)]
    swamp_factor: f64,

    #[arg(long, value_enum, default_value = "mean")]
    statistic: Statistic,

    #[arg(long, default_value_t = 20)]
    max_doublings: u32,

    /// Directory prepended to LD_LIBRARY_PATH
    #[arg(long = "lib-dir", env = "RTBENCH_LIB_DIR", value_delimiter = ':')]
    lib_dirs: Vec<PathBuf>,

    /// Directory prepended to the runtime's routine search path
    #[arg(long = "routine-dir", env = "RTBENCH_ROUTINE_DIR", value_delimiter = ' ')]
    routine_dirs: Vec<PathBuf>,

    /// Only measure these routines
    #[arg(long)]
    only: Vec<String>,

    #[arg(long)]
    json: bool,

    /// Show diagnostic lines printed by routines
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: Cli) -> Result<()> {
    if cli.repetitions == 0 {
        anyhow::bail!("--repetitions must be at least 1");
    }
    if !(cli.swamp_factor.is_finite() && cli.swamp_factor >= 0.0) {
        anyhow::bail!("--swamp-factor must be a non-negative number");
    }

    let mut plan = Plan::load(&cli.plan)?;
    if !cli.only.is_empty() {
        plan.retain_routines(&cli.only)?;
    }

    let settings = Settings {
        repetitions: cli.repetitions,
        swamp_factor: cli.swamp_factor,
        statistic: cli.statistic,
        max_doublings: cli.max_doublings,
    };
    let console = Console {
        verbose: cli.verbose,
        progress_to_stderr: cli.json,
    };

    let mut invoker = ProcessInvoker::new(&plan.runtime, &cli.lib_dirs, &cli.routine_dirs);
    let caps = probe::detect(&plan, &mut invoker)?;
    let mut iterations = plan.iteration_table();

    let report = measure::run(&plan, &mut invoker, &caps, &mut iterations, &settings, &console)?;

    if cli.json {
        let ctx = JsonContext {
            init_time: report.init_time,
            statistic: settings.statistic,
            swamp_factor: settings.swamp_factor,
            sizes: &plan.sizes,
        };
        println!("{}", display::format_json(&ctx, &report.matrix, Utc::now()));
    } else {
        print!("{}", display::format_report(&plan.sizes, &report.matrix));
    }

    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        if let Some(BenchError::Cancelled) = err.downcast_ref::<BenchError>() {
            process::exit(130);
        }
        eprintln!("{}", err);
        process::exit(1);
    }
}
