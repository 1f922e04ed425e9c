//! In-memory storage backend.
//!
//! Used for single-process runs and tests. State lives for the lifetime of
//! the store; nothing touches disk.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::tables::Tables;
use super::{CourierDirectory, HistoryStore, ShipmentStore};
use crate::error::Result;
use crate::models::{Courier, HistoryEntry, HistoryWrite, NewHistoryEntry, Shipment, ShipmentUpdate};

/// Memory-backed shipment, history and courier tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    operations: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose courier directory holds the given couriers.
    pub fn with_couriers(couriers: Vec<Courier>) -> Self {
        let mut tables = Tables::default();
        tables.set_couriers(couriers);
        Self {
            tables: Mutex::new(tables),
            operations: AtomicUsize::new(0),
        }
    }

    /// Number of store calls served so far.
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    async fn tables(&self) -> tokio::sync::MutexGuard<'_, Tables> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        self.tables.lock().await
    }
}

#[async_trait]
impl ShipmentStore for MemoryStore {
    async fn get_shipment(&self, awb: &str) -> Result<Option<Shipment>> {
        Ok(self.tables().await.get(awb))
    }

    async fn insert_shipment(&self, shipment: &Shipment) -> Result<bool> {
        Ok(self.tables().await.insert_if_absent(shipment))
    }

    async fn update_unless_delivered(&self, awb: &str, update: &ShipmentUpdate) -> Result<u64> {
        Ok(self.tables().await.update_unless_delivered(awb, update))
    }

    async fn transfer_courier(
        &self,
        awb: &str,
        courier_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        Ok(self.tables().await.transfer(awb, courier_id, at))
    }

    async fn delete_shipment(&self, awb: &str) -> Result<bool> {
        Ok(self.tables().await.delete(awb))
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn list_history(&self, awb: &str) -> Result<Vec<HistoryEntry>> {
        Ok(self.tables().await.list_history(awb))
    }

    async fn insert_history(&self, entry: NewHistoryEntry) -> Result<u64> {
        Ok(self.tables().await.insert_history(entry))
    }

    async fn insert_history_unique(&self, entry: NewHistoryEntry) -> Result<HistoryWrite> {
        Ok(self.tables().await.insert_history_unique(entry))
    }

    async fn delete_history(&self, awb: &str) -> Result<usize> {
        Ok(self.tables().await.delete_history(awb))
    }
}

#[async_trait]
impl CourierDirectory for MemoryStore {
    async fn courier_name(&self, courier_id: &str) -> Result<Option<String>> {
        Ok(self.tables().await.courier_name(courier_id))
    }
}
