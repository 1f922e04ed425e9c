//! Per-item results and run summaries produced by the pipelines.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, ErrorKind};
use crate::models::HistoryWrite;

/// What the shipment write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    Created,
    Updated,
    Transferred,
    /// Delivered shipment confirmed as delivered again; nothing written
    Unchanged,
}

/// Outcome of running one AWB through the pipeline. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub awb: String,
    pub success: bool,
    pub shipment_success: bool,
    pub history_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<WriteAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    /// Non-fatal degradation, e.g. a manifest timeout that left placeholder data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<ErrorKind>,
    pub message: String,
}

impl BatchResult {
    /// The shipment write failed or was refused; history was not attempted.
    pub fn failed(awb: impl Into<String>, error: &AppError) -> Self {
        Self {
            awb: awb.into(),
            success: false,
            shipment_success: false,
            history_success: false,
            action: None,
            error: Some(error.kind()),
            warning: None,
            message: error.to_string(),
        }
    }

    /// The shipment write committed; history may or may not have.
    pub fn committed(
        awb: impl Into<String>,
        action: WriteAction,
        history: &Result<HistoryWrite, AppError>,
        warning: Option<ErrorKind>,
    ) -> Self {
        let awb = awb.into();
        let (history_success, error, message) = match history {
            Ok(HistoryWrite::Inserted(_)) => (true, None, format!("{awb}: {}", describe(action))),
            Ok(HistoryWrite::AlreadyRecorded) => (
                true,
                None,
                format!("{awb}: {} (history already recorded)", describe(action)),
            ),
            Err(e) => (
                false,
                Some(e.kind()),
                format!("{awb}: {} but history not written: {e}", describe(action)),
            ),
        };

        Self {
            awb,
            success: history_success,
            shipment_success: true,
            history_success,
            action: Some(action),
            error,
            warning,
            message,
        }
    }

    pub fn is_already_delivered(&self) -> bool {
        self.error == Some(ErrorKind::AlreadyDelivered)
    }
}

fn describe(action: WriteAction) -> &'static str {
    match action {
        WriteAction::Created => "created",
        WriteAction::Updated => "updated",
        WriteAction::Transferred => "transferred to new courier",
        WriteAction::Unchanged => "already delivered, unchanged",
    }
}

/// End-of-batch summary presented to the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchRecap {
    pub total: usize,
    pub succeeded: usize,
    pub already_delivered: Vec<String>,
    pub failed: usize,
    /// AWBs never scheduled because the run was aborted
    pub not_scheduled: usize,
    pub aborted: bool,
}

impl BatchRecap {
    pub fn from_results(results: &[BatchResult], total: usize, aborted: bool) -> Self {
        let mut recap = Self {
            total,
            not_scheduled: total.saturating_sub(results.len()),
            aborted,
            ..Self::default()
        };

        for result in results {
            if result.success {
                recap.succeeded += 1;
            } else if result.is_already_delivered() {
                recap.already_delivered.push(result.awb.clone());
            } else {
                recap.failed += 1;
            }
        }
        recap
    }
}

/// Feedback for a single camera detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanOutcome {
    Success { result: BatchResult },
    /// Already processed earlier in this session; pipeline not re-run
    Duplicate { awb: String },
    /// Delivered-lock hit; a supervisor must look at the parcel
    AlreadyDelivered { awb: String, message: String },
    Failed { result: BatchResult },
}

impl ScanOutcome {
    pub fn awb(&self) -> &str {
        match self {
            Self::Success { result } | Self::Failed { result } => &result.awb,
            Self::Duplicate { awb } | Self::AlreadyDelivered { awb, .. } => awb,
        }
    }

    pub fn needs_escalation(&self) -> bool {
        match self {
            Self::AlreadyDelivered { .. } => true,
            Self::Failed { result } => result.error.is_some_and(ErrorKind::needs_escalation),
            _ => false,
        }
    }
}

/// Live tallies for a scan session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanCounters {
    pub success: usize,
    pub error: usize,
    pub duplicate: usize,
}

/// One row of the scan session's result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEntry {
    pub outcome: ScanOutcome,
    pub scanned_at: DateTime<Utc>,
}
