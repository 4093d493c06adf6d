//! Human-readable summaries printed to stdout

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Local};
use songcast_group::{GroupReport, JoinError, ReceiverReport};
use songcast_lpec::{format_sender_uri, DeviceProbe, EventSnapshot};
use songcast_verify::{AssertionStatus, FinishReason, TestPlan, VerificationReport};

use crate::cli::Expectation;

const RULE_WIDTH: usize = 70;

pub fn rule(c: char) -> String {
    std::iter::repeat(c).take(RULE_WIDTH).collect()
}

pub fn banner(title: &str, at: DateTime<Local>) -> String {
    format!("{}\n{} ({})\n{}", rule('='), title, at.format("%Y-%m-%d %H:%M:%S"), rule('='))
}

pub fn plan_header(plan: &TestPlan) -> String {
    let mut out = format!("Test plan: {}\n", plan.name);
    if let Some(description) = &plan.description {
        let _ = writeln!(out, "  {}", description);
    }
    for def in &plan.assertions {
        let _ = writeln!(
            out,
            "  {}.{} = '{}' within {:.1}s",
            def.device, def.variable, def.value, def.within_seconds
        );
    }
    out
}

fn receiver_line(receiver: &ReceiverReport) -> String {
    let result = &receiver.result;
    let marker = match (result.joined, receiver.verified_grouped()) {
        (true, true) => "✓",
        (true, false) => "⚠",
        (false, _) => "✗",
    };

    let mut line = format!("{} {} ({})", marker, receiver.display_name, result.receiver_id);
    if result.joined {
        if result.skipped {
            line.push_str(": already grouped");
        } else if let Some(candidate) = &result.final_candidate {
            let _ = write!(
                line,
                ": joined via {} after {} attempt(s)",
                format_sender_uri(&candidate.uri),
                result.attempts
            );
        }
        if !receiver.verified_grouped() {
            line.push_str(", but not grouped on re-read");
        }
    } else {
        match &result.error {
            Some(JoinError::ConvergenceTimeout {
                attempts,
                last_error: Some(error),
            }) => {
                let _ = write!(line, ": not grouped after {} attempt(s) ({})", attempts, error);
            }
            Some(error) => {
                let _ = write!(line, ": {}", error);
            }
            None => line.push_str(": not grouped"),
        }
    }
    line
}

pub fn group_summary(report: &GroupReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule('-'));
    let sender_marker = if report.sender_awake { "✓" } else { "⚠" };
    let _ = writeln!(out, "{} Sender {} ({})", sender_marker, report.sender_name, report.sender_id);
    if let Some(source) = &report.sender_source {
        let _ = writeln!(out, "  source: {}", source);
    }

    for receiver in &report.receivers {
        let _ = writeln!(out, "{}", receiver_line(receiver));
        if let Some(source) = &receiver.source {
            let _ = writeln!(out, "  source: {}", source);
        }
        if let Some(sender) = &receiver.result.final_sender {
            let _ = writeln!(out, "  sender: {}", format_sender_uri(sender));
        }
    }

    let _ = writeln!(out, "{}", rule('-'));
    if report.all_joined() {
        let _ = writeln!(
            out,
            "✓ SUCCESS: {}/{} receiver(s) grouped with {}",
            report.joined_count(),
            report.receivers.len(),
            report.sender_name
        );
    } else {
        let _ = writeln!(
            out,
            "✗ Group incomplete: {}/{} receiver(s) grouped",
            report.joined_count(),
            report.receivers.len()
        );
    }
    out
}

pub fn verification_summary(report: &VerificationReport, reason: FinishReason) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule('='));
    let _ = writeln!(out, "Test Results");
    let _ = writeln!(out, "{}", rule('='));

    for outcome in &report.outcomes {
        let detail = match (outcome.status, outcome.elapsed) {
            (AssertionStatus::Met, Some(elapsed)) => format!(" (after {:.1}s)", elapsed.as_secs_f64()),
            (AssertionStatus::Pending, _) => " (still pending)".to_string(),
            _ => String::new(),
        };
        let marker = match outcome.status {
            AssertionStatus::Met => "✓",
            AssertionStatus::Expired => "✗",
            AssertionStatus::Pending => "⚠",
        };
        let _ = writeln!(out, "{} {} {}{}", marker, outcome.status, outcome.description, detail);
    }

    let total = report.outcomes.len();
    let _ = writeln!(out);
    let _ = writeln!(out, "Passed: {}/{}", report.passed(), total);
    let _ = writeln!(out, "Failed: {}/{}", report.failed(), total);
    if reason == FinishReason::MonitorsStopped {
        let _ = writeln!(out, "✗ All monitors have stopped");
    }
    out
}

pub fn snapshot_line(token: &str, host: &str, snapshot: &EventSnapshot) -> String {
    if snapshot.is_empty() {
        format!("⚠ {} ({}): no receiver state reported", token, host)
    } else {
        format!("✓ {} ({}): {}", token, host, snapshot.summary())
    }
}

pub fn expectation_missed(token: &str, host: &str, expectations: &[Expectation], within: Duration) -> String {
    let wanted: Vec<String> = expectations
        .iter()
        .map(|e| format!("{}='{}'", e.variable, e.value))
        .collect();
    format!(
        "✗ {} ({}): did not report {} within {:.1}s",
        token,
        host,
        wanted.join(", "),
        within.as_secs_f64()
    )
}

pub fn probe_line(address: &str, probe: &DeviceProbe) -> String {
    let mut line = match &probe.identifier {
        Some(identifier) => format!("✓ {}: {}", address, identifier),
        None => format!("⚠ {}: no identifier announced", address),
    };
    match (&probe.room, &probe.name) {
        (Some(room), Some(name)) => {
            let _ = write!(line, " ({} / {})", room, name);
        }
        (Some(label), None) | (None, Some(label)) => {
            let _ = write!(line, " ({})", label);
        }
        (None, None) => {}
    }
    line
}
