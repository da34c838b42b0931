//! Human-readable reporting
//!
//! Renders a [`CheckResult`] the way the tool prints it: the step trace up
//! to the failure point, then a verdict banner. Rendering is separated
//! from printing so the exact output is testable. Quiet mode is handled by
//! the caller simply not printing; the checker computes the trace either
//! way.

use crate::checker::CheckResult;
use crate::error::CheckError;
use std::fmt::Write;

const SEPARATOR: &str =
    "============================================================";

/// Render the banner line above a check
pub fn render_header(host: &str, port: u16) -> String {
    format!("\nTesting: {}:{}\n{}", host, port, SEPARATOR)
}

/// Render the step trace and verdict for one check
pub fn render_result(result: &CheckResult) -> String {
    let mut out = String::new();

    for step in &result.steps {
        let _ = writeln!(out, "{}", step);
    }

    match &result.outcome {
        Ok(()) => {
            let _ = writeln!(out, "{}", SEPARATOR);
            let _ = write!(out, "✓ UDP FULLY SUPPORTED");
        }
        Err(err @ (CheckError::UdpTimeout | CheckError::UdpValidationFailed(_))) => {
            let _ = writeln!(out, "✗ {}", err);
            let _ = writeln!(out, "{}", SEPARATOR);
            let _ = write!(out, "⚠ UDP relay established but traffic not working");
        }
        Err(err) => {
            let _ = writeln!(out, "✗ {}", err);
            let _ = writeln!(out, "{}", SEPARATOR);
            let _ = write!(out, "{}", verdict_for(err));
        }
    }

    out
}

/// One-line summary for batch output
pub fn render_batch_line(label: &str, result: &CheckResult) -> String {
    match &result.outcome {
        Ok(()) => format!("{:<24} UDP OK ({:.2}s)", label, result.elapsed.as_secs_f64()),
        Err(err) => format!("{:<24} {}", label, err),
    }
}

/// Closing summary for a batch run
pub fn render_batch_summary(passed: usize, total: usize) -> String {
    format!("{}\n{}/{} proxies support UDP", SEPARATOR, passed, total)
}

fn verdict_for(err: &CheckError) -> &'static str {
    match err {
        CheckError::Connection(_) => "CONNECTION FAILED",
        CheckError::Config(_) => "TEST FAILED",
        _ => "UDP NOT SUPPORTED",
    }
}
