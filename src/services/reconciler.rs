// src/services/reconciler.rs

//! Per-AWB pipeline shared by bulk, scan and manual entry points.
//!
//! normalize → shipment upsert (resolving the manifest for new AWBs) →
//! history append. Steps for one AWB run strictly in order; a shipment
//! failure skips history, a history failure leaves the shipment committed.

use chrono::Utc;

use crate::error::{AppError, ErrorKind, Result};
use crate::models::{BatchResult, GeoPoint, NewHistoryEntry, ShipmentStatus, WriteAction};
use crate::services::{AwbNormalizer, HistoryLedger, ShipmentService, UpsertOutcome};

/// Who is updating, to what, and where.
#[derive(Debug, Clone)]
pub struct UpdateContext {
    pub status: ShipmentStatus,
    pub courier_id: Option<String>,
    pub location: String,
    /// Free text; a default note is derived when empty
    pub notes: String,
}

impl UpdateContext {
    pub fn new(
        status: ShipmentStatus,
        courier_id: Option<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            status,
            courier_id,
            location: location.into(),
            notes: String::new(),
        }
    }
}

/// A single operator/courier update with optional evidence.
#[derive(Debug, Clone)]
pub struct ManualUpdate {
    pub context: UpdateContext,
    pub gps: Option<GeoPoint>,
    pub photo_ref: Option<String>,
    pub updated_by: Option<String>,
}

/// Runs AWBs through normalizer, shipment service and ledger.
#[derive(Clone)]
pub struct Reconciler {
    normalizer: AwbNormalizer,
    shipments: ShipmentService,
    ledger: HistoryLedger,
}

impl Reconciler {
    pub fn new(
        normalizer: AwbNormalizer,
        shipments: ShipmentService,
        ledger: HistoryLedger,
    ) -> Self {
        Self {
            normalizer,
            shipments,
            ledger,
        }
    }

    pub fn normalizer(&self) -> &AwbNormalizer {
        &self.normalizer
    }

    pub fn shipments(&self) -> &ShipmentService {
        &self.shipments
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    /// Automated pipeline for one raw AWB; never fails, the result says how it went.
    pub async fn process(&self, raw: &str, ctx: &UpdateContext, position: usize) -> BatchResult {
        let awb = match self.normalizer.parse(raw) {
            Ok(awb) => awb,
            Err(e) => {
                log::warn!("Rejected {:?}: {}", raw.trim(), e);
                return BatchResult::failed(AwbNormalizer::canonicalize(raw), &e);
            }
        };

        let at = Utc::now();
        let upsert = match self
            .shipments
            .upsert_status(&awb, ctx.status, ctx.courier_id.as_deref(), at)
            .await
        {
            Ok(upsert) => upsert,
            Err(e) => return Self::shipment_failed(awb.as_str(), &e),
        };

        let notes = Self::notes_for(ctx, &upsert);
        let history = self
            .ledger
            .append_history(
                awb.as_str(),
                upsert.shipment.current_status,
                &ctx.location,
                &notes,
                at,
                position,
                ctx.courier_id.as_deref(),
            )
            .await;
        if let Err(e) = &history {
            log::error!("History write for {} failed: {}", awb, e);
        }

        let warning = (upsert.manifest_timed_out && upsert.shipment.is_unresolved())
            .then_some(ErrorKind::NetworkTimeout);
        BatchResult::committed(awb.as_str(), upsert.action, &history, warning)
    }

    /// Manual single update; history is appended even if the status repeats.
    pub async fn manual_update(&self, raw: &str, update: &ManualUpdate) -> Result<BatchResult> {
        let ctx = &update.context;
        let awb = self.normalizer.parse(raw)?;
        let at = Utc::now();

        let upsert = match self
            .shipments
            .upsert_status(&awb, ctx.status, ctx.courier_id.as_deref(), at)
            .await
        {
            Ok(upsert) => upsert,
            Err(e) => return Ok(Self::shipment_failed(awb.as_str(), &e)),
        };

        let mut entry = NewHistoryEntry::new(
            awb.as_str(),
            upsert.shipment.current_status,
            &ctx.location,
            Self::notes_for(ctx, &upsert),
            at,
        )
        .with_updated_by(update.updated_by.clone().or_else(|| ctx.courier_id.clone()));
        entry.gps = update.gps;
        entry.photo_ref = update.photo_ref.clone();

        let history = self
            .ledger
            .record_manual(entry)
            .await
            .map(crate::models::HistoryWrite::Inserted);
        if let Err(e) = &history {
            log::error!("History write for {} failed: {}", awb, e);
        }

        Ok(BatchResult::committed(awb.as_str(), upsert.action, &history, None))
    }

    fn shipment_failed(awb: &str, error: &AppError) -> BatchResult {
        if error.kind().needs_escalation() {
            log::warn!("{}: {} (escalate, do not retry)", awb, error);
        } else {
            log::error!("{}: {}", awb, error);
        }
        BatchResult::failed(awb, error)
    }

    fn notes_for(ctx: &UpdateContext, upsert: &UpsertOutcome) -> String {
        if !ctx.notes.trim().is_empty() {
            return ctx.notes.trim().to_string();
        }
        let courier = ctx.courier_id.as_deref().unwrap_or("unknown courier");
        match upsert.action {
            WriteAction::Created if upsert.shipment.is_unresolved() => {
                format!("Registered by {courier}; manifest not found")
            }
            WriteAction::Created => format!("Registered by {courier}"),
            WriteAction::Transferred => format!("Handed over to {courier}"),
            WriteAction::Updated | WriteAction::Unchanged => {
                format!("Status set to {} by {courier}", upsert.shipment.current_status)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::DateTime;

    use crate::models::{CarrierConfig, HistoryEntry, HistoryWrite, Shipment, ShipmentUpdate};
    use crate::services::ManifestResolver;
    use crate::storage::{Backend, CourierDirectory, HistoryStore, MemoryStore, ShipmentStore};

    fn reconciler_over(backend: Arc<dyn Backend>) -> Reconciler {
        let resolver = ManifestResolver::new(Duration::from_millis(50));
        Reconciler::new(
            AwbNormalizer::new(&CarrierConfig::default()),
            ShipmentService::new(backend.clone(), resolver),
            HistoryLedger::new(backend, 1),
        )
    }

    fn reconciler(store: Arc<MemoryStore>) -> Reconciler {
        reconciler_over(store)
    }

    /// Store whose shipment or history writes can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_shipments: bool,
        fail_history: bool,
    }

    impl FlakyStore {
        fn refuse(&self, fail: bool, what: &str) -> Result<()> {
            if fail {
                Err(AppError::persistence(format!("{what} table unavailable")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ShipmentStore for FlakyStore {
        async fn get_shipment(&self, awb: &str) -> Result<Option<Shipment>> {
            self.inner.get_shipment(awb).await
        }
        async fn insert_shipment(&self, shipment: &Shipment) -> Result<bool> {
            self.refuse(self.fail_shipments, "shipment")?;
            self.inner.insert_shipment(shipment).await
        }
        async fn update_unless_delivered(
            &self,
            awb: &str,
            update: &ShipmentUpdate,
        ) -> Result<u64> {
            self.refuse(self.fail_shipments, "shipment")?;
            self.inner.update_unless_delivered(awb, update).await
        }
        async fn transfer_courier(
            &self,
            awb: &str,
            courier: &str,
            at: DateTime<Utc>,
        ) -> Result<u64> {
            self.refuse(self.fail_shipments, "shipment")?;
            self.inner.transfer_courier(awb, courier, at).await
        }
        async fn delete_shipment(&self, awb: &str) -> Result<bool> {
            self.inner.delete_shipment(awb).await
        }
    }

    #[async_trait]
    impl HistoryStore for FlakyStore {
        async fn list_history(&self, awb: &str) -> Result<Vec<HistoryEntry>> {
            self.inner.list_history(awb).await
        }
        async fn insert_history(&self, entry: NewHistoryEntry) -> Result<u64> {
            self.refuse(self.fail_history, "history")?;
            self.inner.insert_history(entry).await
        }
        async fn insert_history_unique(&self, entry: NewHistoryEntry) -> Result<HistoryWrite> {
            self.refuse(self.fail_history, "history")?;
            self.inner.insert_history_unique(entry).await
        }
        async fn delete_history(&self, awb: &str) -> Result<usize> {
            self.inner.delete_history(awb).await
        }
    }

    #[async_trait]
    impl CourierDirectory for FlakyStore {
        async fn courier_name(&self, courier_id: &str) -> Result<Option<String>> {
            self.inner.courier_name(courier_id).await
        }
    }

    fn ctx(courier: &str) -> UpdateContext {
        UpdateContext::new(ShipmentStatus::OutForDelivery, Some(courier.to_string()), "Hub")
    }

    #[tokio::test]
    async fn test_invalid_awb_never_touches_store() {
        let store = Arc::new(MemoryStore::new());
        let result = reconciler(store.clone()).process("XX12 34", &ctx("a"), 0).await;

        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::InvalidFormat));
        assert_eq!(store.operation_count(), 0);
    }

    #[tokio::test]
    async fn test_process_creates_shipment_and_history() {
        let store = Arc::new(MemoryStore::new());
        let rec = reconciler(store);
        let result = rec.process(" bce100001 ", &ctx("a"), 0).await;

        assert!(result.success && result.shipment_success && result.history_success);
        assert_eq!(result.awb, "BCE100001");
        assert_eq!(result.action, Some(WriteAction::Created));

        let timeline = rec.ledger().timeline("BCE100001").await.unwrap();
        assert_eq!(timeline.len(), 1);
        assert!(timeline[0].notes.contains("manifest not found"));
        assert_eq!(timeline[0].updated_by.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_handoff_note_names_new_courier() {
        let rec = reconciler(Arc::new(MemoryStore::new()));
        rec.process("BE7", &ctx("a"), 0).await;
        let result = rec.process("BE7", &ctx("b"), 0).await;

        assert_eq!(result.action, Some(WriteAction::Transferred));
        let view = rec.shipments().track("BE7").await.unwrap().unwrap();
        assert_eq!(view.shipment.courier_id.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_manual_update_repeats_status_with_evidence() {
        let rec = reconciler(Arc::new(MemoryStore::new()));
        let update = ManualUpdate {
            context: UpdateContext {
                notes: "Left with neighbour".into(),
                ..UpdateContext::new(ShipmentStatus::Exception, Some("a".into()), "Gate")
            },
            gps: Some(GeoPoint { lat: -6.9, lng: 107.6 }),
            photo_ref: Some("photos/be9.jpg".into()),
            updated_by: Some("ops-1".into()),
        };

        rec.manual_update("BE9", &update).await.unwrap();
        let result = rec.manual_update("BE9", &update).await.unwrap();
        assert!(result.success);

        let timeline = rec.ledger().timeline("BE9").await.unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[1].photo_ref.as_deref(), Some("photos/be9.jpg"));
        assert_eq!(timeline[1].updated_by.as_deref(), Some("ops-1"));
        assert_eq!(timeline[1].notes, "Left with neighbour");
    }

    #[tokio::test]
    async fn test_manual_update_rejects_bad_awb() {
        let rec = reconciler(Arc::new(MemoryStore::new()));
        let update = ManualUpdate {
            context: ctx("a"),
            gps: None,
            photo_ref: None,
            updated_by: None,
        };
        let err = rec.manual_update("", &update).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[tokio::test]
    async fn test_shipment_write_failure_skips_history() {
        let store = Arc::new(FlakyStore {
            fail_shipments: true,
            ..FlakyStore::default()
        });
        let result = reconciler_over(store.clone()).process("BE40", &ctx("a"), 0).await;

        assert!(!result.success);
        assert!(!result.shipment_success && !result.history_success);
        assert_eq!(result.error, Some(ErrorKind::PersistenceError));
        assert!(store.inner.get_shipment("BE40").await.unwrap().is_none());
        assert!(store.inner.list_history("BE40").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_write_failure_keeps_shipment() {
        let store = Arc::new(FlakyStore {
            fail_history: true,
            ..FlakyStore::default()
        });
        let result = reconciler_over(store.clone()).process("BE41", &ctx("a"), 0).await;

        assert!(result.shipment_success);
        assert!(!result.history_success);
        assert!(!result.success);
        assert_eq!(result.action, Some(WriteAction::Created));
        assert_eq!(result.error, Some(ErrorKind::PersistenceError));

        let shipment = store.inner.get_shipment("BE41").await.unwrap().unwrap();
        assert_eq!(shipment.current_status, ShipmentStatus::OutForDelivery);
        assert!(store.inner.list_history("BE41").await.unwrap().is_empty());
    }
}
