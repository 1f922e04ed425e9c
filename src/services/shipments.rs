// src/services/shipments.rs

//! Shipment state machine.
//!
//! Applies one status update to the authoritative record:
//!
//! - unseen AWB: resolve the manifest, then create the row
//! - delivered row: refuse any other status (`AlreadyDelivered`)
//! - out-for-delivery row, same status, other courier: handoff, verified by re-read
//! - anything else: plain update
//!
//! Every write is a conditional store call. When one affects no rows the row
//! changed underneath us, so we re-read and classify what happened.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{HistoryEntry, Shipment, ShipmentStatus, ShipmentUpdate, WriteAction};
use crate::services::Awb;
use crate::services::manifest::ManifestResolver;
use crate::storage::Backend;

/// What `upsert_status` did and the row as it stands afterwards.
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub action: WriteAction,
    pub shipment: Shipment,
    /// A manifest source timed out while backfilling a new row
    pub manifest_timed_out: bool,
}

/// A shipment with its timeline and courier display name.
#[derive(Debug, Clone)]
pub struct TrackingView {
    pub shipment: Shipment,
    pub courier_name: Option<String>,
    pub history: Vec<HistoryEntry>,
}

/// Service owning the delivered-lock and handoff rules.
#[derive(Clone)]
pub struct ShipmentService {
    store: Arc<dyn Backend>,
    resolver: ManifestResolver,
}

impl ShipmentService {
    pub fn new(store: Arc<dyn Backend>, resolver: ManifestResolver) -> Self {
        Self { store, resolver }
    }

    /// Apply `status` (and optionally a courier) to the shipment.
    pub async fn upsert_status(
        &self,
        awb: &Awb,
        status: ShipmentStatus,
        courier_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        match self.store.get_shipment(awb.as_str()).await? {
            None => self.create(awb, status, courier_id, at).await,
            Some(row) => self.apply(row, status, courier_id, at).await,
        }
    }

    /// Shipment, ordered history and courier name for an AWB.
    pub async fn track(&self, awb: &str) -> Result<Option<TrackingView>> {
        let Some(shipment) = self.store.get_shipment(awb).await? else {
            return Ok(None);
        };

        let courier_name = match &shipment.courier_id {
            Some(id) => self.store.courier_name(id).await?,
            None => None,
        };
        let history = self.store.list_history(awb).await?;

        Ok(Some(TrackingView {
            shipment,
            courier_name,
            history,
        }))
    }

    /// Operator delete; cascades to the shipment's history.
    pub async fn delete(&self, awb: &str) -> Result<bool> {
        let existed = self.store.delete_shipment(awb).await?;
        if existed {
            log::info!("Deleted shipment {} and its history", awb);
        }
        Ok(existed)
    }

    async fn create(
        &self,
        awb: &Awb,
        status: ShipmentStatus,
        courier_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let resolution = self.resolver.resolve(awb).await;
        let shipment = Shipment::create(
            awb.as_str(),
            status,
            courier_id.map(str::to_string),
            resolution.record.as_ref(),
            at,
        );

        if self.store.insert_shipment(&shipment).await? {
            match shipment.manifest_source {
                Some(source) => log::info!("Created {} from {}", awb, source),
                None => log::warn!("Created {} with unresolved sender/receiver", awb),
            }
            return Ok(UpsertOutcome {
                action: WriteAction::Created,
                shipment,
                manifest_timed_out: resolution.timed_out,
            });
        }

        // Another writer created the row between our read and insert.
        log::debug!("{} was created concurrently; applying as update", awb);
        let row = self.require(awb.as_str()).await?;
        self.apply(row, status, courier_id, at).await
    }

    async fn apply(
        &self,
        row: Shipment,
        status: ShipmentStatus,
        courier_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        if row.is_delivered() {
            return Self::delivered(row, status);
        }

        if let Some(new_courier) = courier_id.filter(|_| row.is_handoff(status, courier_id)) {
            return self.transfer(&row.awb, new_courier, at).await;
        }

        let update = ShipmentUpdate {
            status,
            courier_id: courier_id.map(str::to_string),
            updated_at: at,
        };
        let rows = self.store.update_unless_delivered(&row.awb, &update).await?;
        let current = self.require(&row.awb).await?;

        if rows == 0 {
            if current.is_delivered() {
                return Self::delivered(current, status);
            }
            return Err(AppError::persistence(format!(
                "update of {} affected no rows",
                row.awb
            )));
        }

        log::debug!("{}: {} -> {}", row.awb, row.current_status, status);
        Ok(UpsertOutcome {
            action: WriteAction::Updated,
            shipment: current,
            manifest_timed_out: false,
        })
    }

    async fn transfer(
        &self,
        awb: &str,
        courier_id: &str,
        at: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let rows = self.store.transfer_courier(awb, courier_id, at).await?;

        // Re-read: a write can report success and still be a silent no-op.
        let current = self.store.get_shipment(awb).await?;
        match current {
            Some(shipment) if shipment.courier_id.as_deref() == Some(courier_id) => {
                log::info!("{} handed over to courier {}", awb, courier_id);
                Ok(UpsertOutcome {
                    action: WriteAction::Transferred,
                    shipment,
                    manifest_timed_out: false,
                })
            }
            Some(shipment) if rows == 0 && shipment.is_delivered() => {
                Self::delivered(shipment, ShipmentStatus::OutForDelivery)
            }
            other => {
                let actual = other.and_then(|s| s.courier_id);
                log::error!(
                    "Handoff of {} to {} not applied; courier is {:?}",
                    awb,
                    courier_id,
                    actual
                );
                Err(AppError::TransferVerificationFailed {
                    awb: awb.to_string(),
                    expected: courier_id.to_string(),
                    actual,
                })
            }
        }
    }

    /// Delivered is absorbing: confirming it is a no-op, anything else is refused.
    fn delivered(row: Shipment, status: ShipmentStatus) -> Result<UpsertOutcome> {
        if status == ShipmentStatus::Delivered {
            return Ok(UpsertOutcome {
                action: WriteAction::Unchanged,
                shipment: row,
                manifest_timed_out: false,
            });
        }
        log::warn!("{} is delivered; refusing {}", row.awb, status);
        Err(AppError::AlreadyDelivered {
            awb: row.awb,
            attempted: status,
        })
    }

    async fn require(&self, awb: &str) -> Result<Shipment> {
        self.store
            .get_shipment(awb)
            .await?
            .ok_or_else(|| AppError::persistence(format!("shipment {awb} disappeared mid-update")))
    }
}
