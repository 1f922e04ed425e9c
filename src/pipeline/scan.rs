// src/pipeline/scan.rs

//! Continuous scan pipeline.
//!
//! Each camera detection carries one AWB. A [`ScanSession`] lives from scan
//! start to scan end and owns the session-local duplicate set, the live
//! counters and the most-recent-first result list.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::{ErrorKind, Result};
use crate::models::{ScanConfig, ScanCounters, ScanEntry, ScanOutcome};
use crate::services::{AwbNormalizer, Reconciler, UpdateContext};
use crate::utils::console;

/// Creates scan sessions bound to the shared reconciler.
pub struct ScanProcessor {
    reconciler: Arc<Reconciler>,
    config: ScanConfig,
}

impl ScanProcessor {
    pub fn new(reconciler: Arc<Reconciler>, config: ScanConfig) -> Self {
        Self { reconciler, config }
    }

    /// Start a session with the configured status and location.
    pub fn start_session(&self, courier_id: &str) -> ScanSession {
        let ctx = UpdateContext::new(
            self.config.status,
            Some(courier_id.trim().to_string()),
            self.config.location.clone(),
        );
        self.start_session_with(ctx)
    }

    pub fn start_session_with(&self, ctx: UpdateContext) -> ScanSession {
        log::info!(
            "Scan session started for {:?} -> {}",
            ctx.courier_id,
            ctx.status
        );
        ScanSession {
            reconciler: Arc::clone(&self.reconciler),
            ctx,
            seen: HashSet::new(),
            counters: ScanCounters::default(),
            results: Vec::new(),
        }
    }
}

/// End-of-session tallies.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub counters: ScanCounters,
    pub processed: usize,
    /// AWBs that hit the delivered lock and need a supervisor
    pub escalations: Vec<String>,
}

/// State for one continuous scan run. Dropping it forgets every AWB seen.
pub struct ScanSession {
    reconciler: Arc<Reconciler>,
    ctx: UpdateContext,
    seen: HashSet<String>,
    counters: ScanCounters,
    results: Vec<ScanEntry>,
}

impl ScanSession {
    /// Handle one detection.
    ///
    /// An AWB already committed in this session is reported as a duplicate
    /// without touching the store. Failed scans are not remembered, so the
    /// courier can retry them.
    pub async fn process_single_scan(&mut self, awb_text: &str) -> ScanOutcome {
        let canonical = AwbNormalizer::canonicalize(awb_text);

        let outcome = if self.seen.contains(&canonical) {
            self.counters.duplicate += 1;
            ScanOutcome::Duplicate { awb: canonical }
        } else {
            // Scans arrive one at a time, so no ordering offset is needed.
            let result = self.reconciler.process(awb_text, &self.ctx, 0).await;

            if result.shipment_success {
                self.seen.insert(result.awb.clone());
            }

            if result.success {
                self.counters.success += 1;
                ScanOutcome::Success { result }
            } else {
                self.counters.error += 1;
                if result.error == Some(ErrorKind::AlreadyDelivered) {
                    log::warn!("{} already delivered; supervisor check needed", result.awb);
                    ScanOutcome::AlreadyDelivered {
                        awb: result.awb,
                        message: result.message,
                    }
                } else {
                    ScanOutcome::Failed { result }
                }
            }
        };

        self.record(outcome.clone());
        outcome
    }

    pub fn counters(&self) -> ScanCounters {
        self.counters
    }

    /// Results, most recent first; one entry per AWB.
    pub fn results(&self) -> &[ScanEntry] {
        &self.results
    }

    /// Close the session and summarize it.
    pub fn finish(self) -> ScanSummary {
        let escalations = self
            .results
            .iter()
            .filter(|entry| entry.outcome.needs_escalation())
            .map(|entry| entry.outcome.awb().to_string())
            .collect();

        log::info!(
            "Scan session closed: {} ok, {} errors, {} duplicates",
            self.counters.success,
            self.counters.error,
            self.counters.duplicate
        );
        ScanSummary {
            counters: self.counters,
            processed: self.results.len(),
            escalations,
        }
    }

    /// A repeat scan replaces the AWB's earlier row in place, others go on top.
    fn record(&mut self, outcome: ScanOutcome) {
        let entry = ScanEntry {
            outcome,
            scanned_at: Utc::now(),
        };
        match self
            .results
            .iter_mut()
            .find(|existing| existing.outcome.awb() == entry.outcome.awb())
        {
            Some(existing) => *existing = entry,
            None => self.results.insert(0, entry),
        }
    }
}

/// Console entry point: one AWB per stdin line until EOF.
pub async fn run_scan(mut session: ScanSession) -> Result<ScanSummary> {
    console::banner("Continuous Scan");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let outcome = session.process_single_scan(&line).await;
        console::print_scan(&outcome, session.counters());
    }

    let summary = session.finish();
    console::print_session_end(summary.counters, &summary.escalations);
    Ok(summary)
}
