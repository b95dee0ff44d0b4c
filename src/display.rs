use chrono::{DateTime, Utc};
use owo_colors::{OwoColorize, Stream, Style};
use serde::Serialize;

use crate::types::{AggregateResult, ResultsMatrix, Statistic};

/// Render a magnitude with a single-letter unit suffix.
///
/// Below 1e-3 renders in micro-units (`u`), below 1 in milli-units (`m`),
/// at or above 1e6 in mega-units (`M`), at or above 1e3 in kilo-units (`k`),
/// otherwise as a bare integer. Used for byte sizes and seconds alike.
///
/// The scaled value is truncated rather than rounded so it never reaches the
/// next unit up: 999_999 renders as `999k`, not `1000k`.
pub fn human(value: f64) -> String {
    let (scaled, suffix) = if value < 1e-3 {
        (value * 1e6, "u")
    } else if value < 1.0 {
        (value * 1e3, "m")
    } else if value >= 1e6 {
        (value / 1e6, "M")
    } else if value >= 1e3 {
        (value / 1e3, "k")
    } else {
        (value, "")
    };
    // Absorb float error such as 0.0009 * 1e6 = 899.999...
    format!("{:.0}{}", (scaled + 1e-9).floor(), suffix)
}

/// Matrix cell: per-iteration seconds as whole microseconds.
pub fn format_micros(seconds: f64) -> String {
    format!("{:.0}us", seconds * 1e6)
}

// Style constants
fn style_header() -> Style {
    Style::new().bold()
}

fn style_routine() -> Style {
    Style::new().cyan()
}

/// Operator-facing output for one run.
///
/// Progress lines normally go to stdout. When stdout carries a machine
/// readable report they are moved to stderr instead. Warnings always go to
/// stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct Console {
    pub verbose: bool,
    pub progress_to_stderr: bool,
}

impl Console {
    fn progress(&self, line: &str) {
        if self.progress_to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }

    fn stream(&self) -> Stream {
        if self.progress_to_stderr {
            Stream::Stderr
        } else {
            Stream::Stdout
        }
    }

    pub fn init_time(&self, init_time: f64) {
        self.progress(&format!("init: {:.3}s", init_time));
    }

    pub fn measured(&self, routine: &str, size: u64, result: &AggregateResult) {
        let name = routine
            .if_supports_color(self.stream(), |s| s.style(style_routine()))
            .to_string();
        self.progress(&format!("{} {}", name, format_progress(size, result)));
    }

    pub fn skipped(&self, routine: &str, requirement: &str, hint: &str) {
        self.progress(&format!(
            "skipping {}: {} is not available (enable with: {})",
            routine, requirement, hint
        ));
    }

    pub fn diagnostics(&self, lines: &[String]) {
        if !self.verbose {
            return;
        }
        for line in lines {
            let row = format!("  | {}", line);
            self.progress(&row.if_supports_color(self.stream(), |s| s.dimmed()).to_string());
        }
    }

    pub fn swamped(&self, routine: &str, size: u64, raw_real: f64, init_time: f64, iterations: u64) {
        warn(&format!(
            "{} at size {} took {:.3}s, too close to init time {:.3}s; retrying with {} iterations",
            routine, size, raw_real, init_time, iterations
        ));
    }

    pub fn mismatch(&self, routine: &str, size: u64, observed: &str, expected: &str) {
        warn(&format!(
            "{} at size {} returned {:?}, expected {:?}",
            routine, size, observed, expected
        ));
    }
}

fn warn(message: &str) {
    let label = "warning:"
        .if_supports_color(Stream::Stderr, |s| s.yellow())
        .to_string();
    eprintln!("{} {}", label, message);
}

/// One-line summary of a finished (routine, size) measurement.
pub fn format_progress(size: u64, result: &AggregateResult) -> String {
    format!(
        "{}: {}s real, {}s user per iteration ({:.3}s raw, {} iterations)",
        human(size as f64),
        human(result.real_per_iter),
        human(result.user_per_iter),
        result.raw_real,
        result.iterations
    )
}

/// Routines as rows, sizes as columns, `-` where nothing was measured.
pub fn format_matrix<F>(title: &str, sizes: &[u64], matrix: &ResultsMatrix, pick: F) -> String
where
    F: Fn(&AggregateResult) -> f64,
{
    let mut out = String::new();
    out.push_str(
        &title
            .if_supports_color(Stream::Stdout, |s| s.style(style_header()))
            .to_string(),
    );
    out.push('\n');

    let headers: Vec<String> = sizes.iter().map(|s| human(*s as f64)).collect();
    let rows: Vec<(&str, Vec<String>)> = matrix
        .rows()
        .map(|(name, row)| {
            let cells = sizes
                .iter()
                .map(|size| match row.get(size) {
                    Some(result) => format_micros(pick(result)),
                    None => "-".to_string(),
                })
                .collect();
            (name, cells)
        })
        .collect();

    let name_width = rows
        .iter()
        .map(|(name, _)| name.len())
        .chain(std::iter::once("routine".len()))
        .max()
        .unwrap_or(0);
    let cell_width = rows
        .iter()
        .flat_map(|(_, cells)| cells.iter().map(String::len))
        .chain(headers.iter().map(String::len))
        .max()
        .unwrap_or(0);

    let mut header_line = format!("{:<width$}", "routine", width = name_width);
    for h in &headers {
        header_line.push_str(&format!("  {:>width$}", h, width = cell_width));
    }
    out.push_str(
        &header_line
            .if_supports_color(Stream::Stdout, |s| s.dimmed())
            .to_string(),
    );
    out.push('\n');

    for (name, cells) in &rows {
        let padded = format!("{:<width$}", name, width = name_width);
        out.push_str(
            &padded
                .if_supports_color(Stream::Stdout, |s| s.style(style_routine()))
                .to_string(),
        );
        for cell in cells {
            out.push_str(&format!("  {:>width$}", cell, width = cell_width));
        }
        out.push('\n');
    }

    out
}

/// Real-time matrix followed by the user-time matrix.
pub fn format_report(sizes: &[u64], matrix: &ResultsMatrix) -> String {
    let mut out = String::from("\n");
    out.push_str(&format_matrix(
        "Real time per iteration",
        sizes,
        matrix,
        |r| r.real_per_iter,
    ));
    out.push('\n');
    out.push_str(&format_matrix(
        "User time per iteration",
        sizes,
        matrix,
        |r| r.user_per_iter,
    ));
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    init_time: f64,
    statistic: Statistic,
    swamp_factor: f64,
    sizes: &'a [u64],
    routines: Vec<JsonRoutine<'a>>,
}

#[derive(Serialize)]
struct JsonRoutine<'a> {
    name: &'a str,
    results: Vec<JsonCell<'a>>,
}

#[derive(Serialize)]
struct JsonCell<'a> {
    size: u64,
    #[serde(flatten)]
    result: &'a AggregateResult,
}

pub struct JsonContext<'a> {
    pub init_time: f64,
    pub statistic: Statistic,
    pub swamp_factor: f64,
    pub sizes: &'a [u64],
}

pub fn format_json(ctx: &JsonContext<'_>, matrix: &ResultsMatrix, now: DateTime<Utc>) -> String {
    let routines = matrix
        .rows()
        .map(|(name, row)| JsonRoutine {
            name,
            results: row
                .iter()
                .map(|(size, result)| JsonCell {
                    size: *size,
                    result,
                })
                .collect(),
        })
        .collect();

    let report = JsonReport {
        generated_at: now.to_rfc3339(),
        init_time: ctx.init_time,
        statistic: ctx.statistic,
        swamp_factor: ctx.swamp_factor,
        sizes: ctx.sizes,
        routines,
    };

    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(real: f64, user: f64, iterations: u64) -> AggregateResult {
        AggregateResult {
            iterations,
            raw_real: 0.095,
            real_per_iter: real,
            user_per_iter: user,
            value: "998".to_string(),
            verified: Some(true),
        }
    }

    fn sample_matrix() -> ResultsMatrix {
        // Tests run on a terminal now and then; keep output free of escapes.
        owo_colors::set_override(false);
        let mut matrix = ResultsMatrix::default();
        matrix.insert("cStrlen", 10, result(0.000012, 0.000010, 100000));
        matrix.insert("cStrlen", 1000, result(0.00325, 0.003, 20));
        matrix.insert("luaStrlenLong", 10, result(0.000040, 0.000031, 50000));
        matrix
    }

    // --- human ---

    #[test]
    fn human_bare_integers() {
        assert_eq!(human(1.0), "1");
        assert_eq!(human(10.0), "10");
        assert_eq!(human(999.0), "999");
    }

    #[test]
    fn human_kilo_boundary() {
        assert_eq!(human(1000.0), "1k");
        assert_eq!(human(1500.0), "1k");
        assert_eq!(human(999_999.0), "999k");
        assert_eq!(human(999_500.0), "999k");
    }

    #[test]
    fn human_mega_boundary() {
        assert_eq!(human(1_000_000.0), "1M");
        assert_eq!(human(25_000_000.0), "25M");
    }

    #[test]
    fn human_milli_boundary() {
        assert_eq!(human(0.001), "1m");
        assert_eq!(human(0.5), "500m");
        assert_eq!(human(0.999), "999m");
        assert_eq!(human(0.9996), "999m");
    }

    #[test]
    fn human_micro_below_milli() {
        assert_eq!(human(0.0009), "900u");
        assert_eq!(human(0.000012), "12u");
        assert_eq!(human(0.0), "0u");
    }

    #[test]
    fn human_per_iteration_scenario() {
        assert_eq!(human((0.095 - 0.030) / 20.0), "3m");
    }

    #[test]
    fn human_suffix_is_monotonic() {
        let rank = |s: &str| match s.chars().last() {
            Some('u') => 0,
            Some('m') => 1,
            Some('k') => 3,
            Some('M') => 4,
            _ => 2,
        };
        let values = [
            0.0, 1e-7, 0.0005, 0.000999, 0.001, 0.2, 0.999, 1.0, 42.0, 999.0, 1000.0, 5e4,
            999_999.0, 1e6, 3e9,
        ];
        let ranks: Vec<u8> = values.iter().map(|v| rank(&human(*v))).collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]), "{ranks:?}");
    }

    #[test]
    fn micros_cell() {
        assert_eq!(format_micros((0.095 - 0.030) / 20.0), "3250us");
        assert_eq!(format_micros(0.0), "0us");
    }

    // --- progress ---

    #[test]
    fn progress_line() {
        let line = format_progress(1000, &result(0.00325, 0.003, 20));
        assert_eq!(
            line,
            "1k: 3ms real, 3ms user per iteration (0.095s raw, 20 iterations)"
        );
    }

    // --- matrices ---

    #[test]
    fn matrix_rows_and_columns() {
        let out = format_matrix("Real", &[10, 1000], &sample_matrix(), |r| r.real_per_iter);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Real");
        assert!(lines[1].starts_with("routine"));
        assert!(lines[1].contains("10"));
        assert!(lines[1].contains("1k"));
        assert!(lines[2].starts_with("cStrlen "));
        assert!(lines[2].contains("12us"));
        assert!(lines[2].contains("3250us"));
        assert!(lines[3].starts_with("luaStrlenLong"));
        assert!(lines[3].trim_end().ends_with('-'));
    }

    #[test]
    fn matrix_columns_align() {
        let out = format_matrix("Real", &[10, 1000], &sample_matrix(), |r| r.real_per_iter);
        let widths: Vec<usize> = out.lines().skip(1).map(str::len).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "{widths:?}");
    }

    #[test]
    fn empty_matrix_has_header_only() {
        owo_colors::set_override(false);
        let out = format_matrix("User", &[10], &ResultsMatrix::default(), |r| r.user_per_iter);
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn report_has_real_then_user() {
        let out = format_report(&[10, 1000], &sample_matrix());
        let real = out.find("Real time per iteration").unwrap();
        let user = out.find("User time per iteration").unwrap();
        assert!(real < user);
        assert!(out.contains("3000us"));
    }

    // --- json ---

    #[test]
    fn json_report_shape() {
        let now = DateTime::parse_from_rfc3339("2026-02-18T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let ctx = JsonContext {
            init_time: 0.03,
            statistic: Statistic::Mean,
            swamp_factor: 3.0,
            sizes: &[10, 1000],
        };
        let out = format_json(&ctx, &sample_matrix(), now);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(parsed["generated_at"], "2026-02-18T00:00:00+00:00");
        assert_eq!(parsed["statistic"], "mean");
        assert_eq!(parsed["sizes"], serde_json::json!([10, 1000]));
        let routines = parsed["routines"].as_array().unwrap();
        assert_eq!(routines.len(), 2);
        assert_eq!(routines[0]["name"], "cStrlen");
        let cell = &routines[0]["results"][1];
        assert_eq!(cell["size"], 1000);
        assert_eq!(cell["iterations"], 20);
        assert_eq!(cell["value"], "998");
        assert_eq!(cell["verified"], true);
    }
}
