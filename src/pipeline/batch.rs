// src/pipeline/batch.rs

//! Bulk update pipeline.
//!
//! A pasted AWB list is processed in fixed-size groups. Items inside a group
//! run concurrently with a staggered start; groups run one after another with
//! a short pause. Abort is checked only between groups, so dispatched items
//! always finish.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future;
use serde::Serialize;

use crate::models::{BatchConfig, BatchRecap, BatchResult};
use crate::services::{Reconciler, UpdateContext};
use crate::utils::console;
use crate::utils::split_awb_list;

/// Cooperative stop flag shared between the caller and a running batch.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop scheduling further groups. In-flight items still complete.
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-item results in submission order plus the recap.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub results: Vec<BatchResult>,
    pub recap: BatchRecap,
}

/// Runs bulk submissions through the shared reconciler.
pub struct BatchProcessor {
    reconciler: Arc<Reconciler>,
    config: BatchConfig,
}

impl BatchProcessor {
    pub fn new(reconciler: Arc<Reconciler>, config: BatchConfig) -> Self {
        Self { reconciler, config }
    }

    /// Context used by `submit_bulk`: the configured status and location.
    pub fn default_context(&self, courier_id: &str) -> UpdateContext {
        UpdateContext::new(
            self.config.status,
            Some(courier_id.trim().to_string()),
            self.config.location.clone(),
        )
    }

    /// Assign every AWB in `awb_list_text` to `courier_id`.
    pub async fn submit_bulk(&self, awb_list_text: &str, courier_id: &str) -> BatchReport {
        let ctx = self.default_context(courier_id);
        self.submit_bulk_with(awb_list_text, &ctx, &AbortHandle::new())
            .await
    }

    /// Full form: explicit context and an abort handle.
    pub async fn submit_bulk_with(
        &self,
        awb_list_text: &str,
        ctx: &UpdateContext,
        abort: &AbortHandle,
    ) -> BatchReport {
        let awbs = split_awb_list(awb_list_text);
        let total = awbs.len();
        let group_size = self.config.group_size.max(1);
        let stagger = Duration::from_millis(self.config.stagger_ms);
        let pause = Duration::from_millis(self.config.group_pause_ms);

        log::info!(
            "Bulk update: {} AWBs in groups of {} -> {}",
            total,
            group_size,
            ctx.status
        );

        let mut results = Vec::with_capacity(total);
        let mut aborted = false;

        for (group_index, group) in awbs.chunks(group_size).enumerate() {
            if group_index > 0 {
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
                if abort.is_aborted() {
                    aborted = true;
                    break;
                }
            }

            let jobs = group.iter().enumerate().map(|(i, raw)| {
                let delay = stagger.saturating_mul(i as u32);
                async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    // Offset restarts per group, bounding how far history is shifted.
                    self.reconciler.process(raw, ctx, i).await
                }
            });
            results.extend(future::join_all(jobs).await);

            log::debug!("Bulk progress: {}/{}", results.len(), total);
        }

        if aborted {
            log::warn!(
                "Bulk update aborted after {} of {} AWBs",
                results.len(),
                total
            );
        }

        let recap = BatchRecap::from_results(&results, total, aborted);
        log::info!(
            "Bulk update done: {} succeeded, {} already delivered, {} failed",
            recap.succeeded,
            recap.already_delivered.len(),
            recap.failed
        );
        BatchReport { results, recap }
    }
}

/// Console entry point: run a bulk submission and print the recap.
pub async fn run_bulk(
    processor: &BatchProcessor,
    awb_list_text: &str,
    ctx: &UpdateContext,
    abort: &AbortHandle,
) -> BatchReport {
    console::banner("Bulk Status Update");
    let report = processor.submit_bulk_with(awb_list_text, ctx, abort).await;
    console::print_bulk(&report.results, &report.recap);
    report
}
