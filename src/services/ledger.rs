// src/services/ledger.rs

//! History ledger service.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::Result;
use crate::models::{HistoryEntry, HistoryWrite, NewHistoryEntry, ShipmentStatus};
use crate::storage::Backend;

/// Append-only status log per AWB.
///
/// Automated pipelines go through [`HistoryLedger::append_history`], which
/// records each (awb, status) pair at most once. Manual updates use
/// [`HistoryLedger::record_manual`] and may repeat a status.
#[derive(Clone)]
pub struct HistoryLedger {
    store: Arc<dyn Backend>,
    offset_ms: u64,
}

impl HistoryLedger {
    pub fn new(store: Arc<dyn Backend>, offset_ms: u64) -> Self {
        Self { store, offset_ms }
    }

    /// Record a transition unless the same (awb, status) is already recorded.
    ///
    /// `position` is the item's index within its concurrent group; the
    /// timestamp is shifted by `position * offset_ms` so inserts stamped in the
    /// same millisecond still sort in submission order. Serial callers pass 0.
    #[allow(clippy::too_many_arguments)]
    pub async fn append_history(
        &self,
        awb: &str,
        status: ShipmentStatus,
        location: &str,
        notes: &str,
        at: DateTime<Utc>,
        position: usize,
        updated_by: Option<&str>,
    ) -> Result<HistoryWrite> {
        let entry = NewHistoryEntry::new(awb, status, location, notes, self.perturb(at, position))
            .with_updated_by(updated_by.map(str::to_string));

        let write = self.store.insert_history_unique(entry).await?;
        if write == HistoryWrite::AlreadyRecorded {
            log::debug!("History for {} / {} already recorded", awb, status);
        }
        Ok(write)
    }

    /// Append unconditionally (manual single updates).
    pub async fn record_manual(&self, entry: NewHistoryEntry) -> Result<u64> {
        self.store.insert_history(entry).await
    }

    /// Ordered timeline for an AWB.
    pub async fn timeline(&self, awb: &str) -> Result<Vec<HistoryEntry>> {
        self.store.list_history(awb).await
    }

    /// Remove every entry for an AWB.
    pub async fn clear(&self, awb: &str) -> Result<usize> {
        self.store.delete_history(awb).await
    }

    fn perturb(&self, at: DateTime<Utc>, position: usize) -> DateTime<Utc> {
        let offset = i64::try_from(self.offset_ms.saturating_mul(position as u64)).unwrap_or(0);
        at + TimeDelta::try_milliseconds(offset).unwrap_or_else(TimeDelta::zero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::storage::MemoryStore;

    fn ledger() -> HistoryLedger {
        HistoryLedger::new(Arc::new(MemoryStore::new()), 1)
    }

    #[tokio::test]
    async fn test_repeated_append_records_once() {
        let ledger = ledger();
        let now = Utc::now();

        for position in 0..5 {
            ledger
                .append_history(
                    "BE1",
                    ShipmentStatus::OutForDelivery,
                    "Hub",
                    "",
                    now,
                    position,
                    None,
                )
                .await
                .unwrap();
        }

        assert_eq!(ledger.timeline("BE1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_append_reports_already_recorded() {
        let ledger = ledger();
        let now = Utc::now();
        let first = ledger
            .append_history("BE1", ShipmentStatus::Shipped, "Hub", "", now, 0, None)
            .await
            .unwrap();
        let second = ledger
            .append_history("BE1", ShipmentStatus::Shipped, "Hub", "", now, 1, None)
            .await
            .unwrap();

        assert!(matches!(first, HistoryWrite::Inserted(_)));
        assert_eq!(second, HistoryWrite::AlreadyRecorded);
    }

    #[tokio::test]
    async fn test_same_instant_inserts_are_ordered_by_position() {
        let ledger = ledger();
        let now = Utc::now();

        for (position, awb) in ["BE3", "BE1", "BE2"].iter().enumerate() {
            ledger
                .append_history(awb, ShipmentStatus::OutForDelivery, "Hub", "", now, position, None)
                .await
                .unwrap();
        }

        let t1 = ledger.timeline("BE1").await.unwrap()[0].created_at;
        let t2 = ledger.timeline("BE2").await.unwrap()[0].created_at;
        let t3 = ledger.timeline("BE3").await.unwrap()[0].created_at;
        assert!(t3 < t1 && t1 < t2);
    }

    #[tokio::test]
    async fn test_manual_updates_append_freely() {
        let ledger = ledger();
        for _ in 0..3 {
            ledger
                .record_manual(NewHistoryEntry::new(
                    "BE1",
                    ShipmentStatus::Exception,
                    "Gate",
                    "Recipient absent",
                    Utc::now(),
                ))
                .await
                .unwrap();
        }

        assert_eq!(ledger.timeline("BE1").await.unwrap().len(), 3);
        assert_eq!(ledger.clear("BE1").await.unwrap(), 3);
    }
}
