use std::fmt::Write as _;

use pipelinecloud_core::cert::display_path;
use pipelinecloud_core::{precheck_report, CheckOutcome, EnvSource, PrecheckReport};

use crate::cli::args::{OutputFormat, PrecheckArgs};
use crate::exit_codes::{EXIT_CONFIG_ERROR, EXIT_SUCCESS};

pub fn run(args: PrecheckArgs) -> anyhow::Result<i32> {
    let report = precheck_report(&EnvSource);

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", format_text(&report)),
    }

    Ok(if report.passed() {
        EXIT_SUCCESS
    } else {
        EXIT_CONFIG_ERROR
    })
}

/// Readiness gate for commands that go on to the network.
/// Prints violations to stderr and returns false on failure.
pub(crate) fn gate() -> bool {
    let report = precheck_report(&EnvSource);
    for violation in report.violations() {
        eprintln!("precheck: {violation}");
    }
    report.passed()
}

fn outcome_line(outcome: &CheckOutcome) -> String {
    match outcome {
        CheckOutcome::Passed => "OK".to_string(),
        CheckOutcome::Failed { message } => format!("FAILED ({message})"),
    }
}

pub(crate) fn format_text(report: &PrecheckReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Configuration: {}", outcome_line(&report.config));
    let _ = writeln!(
        out,
        "Certificate:   {} [{}]",
        outcome_line(&report.certificate),
        display_path(report.certificate_path.as_deref())
    );
    let _ = writeln!(
        out,
        "Result:        {}",
        if report.passed() { "ready" } else { "not ready" }
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipelinecloud_core::MapSource;

    #[test]
    fn test_text_report_for_empty_environment() {
        let report = precheck_report(&MapSource::new());
        let text = format_text(&report);
        assert!(text.contains("Configuration: FAILED (The following environment variables are not set"));
        assert!(text.contains("DATABASE_SERVER"));
        assert!(text.contains("[<not configured>]"));
        assert!(text.ends_with("Result:        not ready\n"));
    }
}
