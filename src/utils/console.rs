// src/utils/console.rs

//! Operator console: bulk recaps, per-scan feedback and escalation alerts.
//!
//! Lines are built by plain functions; the `print_*` wrappers stamp them with
//! the local time. Alerts go to stderr and are never silenced.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;

use crate::models::{BatchRecap, BatchResult, ScanCounters, ScanOutcome};

static QUIET: AtomicBool = AtomicBool::new(false);

/// Hide routine lines when the configured level is `warn` or `error`.
pub fn init(level: &str) {
    let quiet = matches!(level.to_ascii_lowercase().as_str(), "warn" | "error");
    QUIET.store(quiet, Ordering::Relaxed);
}

fn stamp(line: &str) -> String {
    format!("[{}] {}", Local::now().format("%H:%M:%S"), line)
}

fn out(line: &str) {
    if !QUIET.load(Ordering::Relaxed) {
        println!("{}", stamp(line));
    }
}

fn alert(line: &str) {
    eprintln!("{}", stamp(line));
}

pub fn banner(title: &str) {
    let rule = "═".repeat(48);
    out(&rule);
    out(&format!("  {title}"));
    out(&rule);
}

/// Feedback for one bulk item, if it deserves any.
pub fn item_line(result: &BatchResult) -> Option<String> {
    if !result.success {
        Some(format!("✗ {}", result.message))
    } else if result.warning.is_some() {
        Some(format!("! {}: manifest lookup timed out, placeholder data kept", result.awb))
    } else {
        None
    }
}

pub fn recap_lines(recap: &BatchRecap) -> Vec<String> {
    let mut lines = vec![format!(
        "{} AWBs: {} ok, {} already delivered, {} failed",
        recap.total,
        recap.succeeded,
        recap.already_delivered.len(),
        recap.failed
    )];
    if recap.not_scheduled > 0 {
        lines.push(format!("{} not scheduled", recap.not_scheduled));
    }
    if !recap.already_delivered.is_empty() {
        lines.push(format!("Already delivered: {}", recap.already_delivered.join(", ")));
    }
    lines
}

pub fn print_bulk(results: &[BatchResult], recap: &BatchRecap) {
    results.iter().filter_map(item_line).for_each(|line| out(&line));
    recap_lines(recap).iter().for_each(|line| out(line));
    if recap.aborted {
        alert("Run aborted; remaining AWBs were not scheduled");
    }
}

pub fn escalation_line(awb: &str, message: &str) -> String {
    format!("ALERT {awb}: {message}. Call a supervisor.")
}

/// One line per detection, with the running tallies appended.
pub fn scan_line(outcome: &ScanOutcome, counters: ScanCounters) -> String {
    let head = match outcome {
        ScanOutcome::Success { result } => format!("✓ {}", result.message),
        ScanOutcome::Duplicate { awb } => format!("= {awb} already scanned"),
        ScanOutcome::AlreadyDelivered { awb, message } => escalation_line(awb, message),
        ScanOutcome::Failed { result } => format!("✗ {}", result.message),
    };
    format!(
        "{head}  [ok {} | error {} | duplicate {}]",
        counters.success, counters.error, counters.duplicate
    )
}

pub fn print_scan(outcome: &ScanOutcome, counters: ScanCounters) {
    let line = scan_line(outcome, counters);
    if outcome.needs_escalation() {
        alert(&line);
    } else {
        out(&line);
    }
}

pub fn print_session_end(counters: ScanCounters, escalations: &[String]) {
    out(&format!(
        "Session closed: {} ok, {} errors, {} duplicates",
        counters.success, counters.error, counters.duplicate
    ));
    for awb in escalations {
        alert(&format!("Escalate: {awb}"));
    }
}
