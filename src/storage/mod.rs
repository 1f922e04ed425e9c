//! Storage abstractions for shipments, history and the courier directory.
//!
//! Every check-then-write the engine needs is a single conditional call on
//! the store, so two devices racing on the same AWB cannot both win:
//!
//! - `insert_shipment`: insert only if the AWB has no row yet
//! - `update_unless_delivered`: update where status is not delivered
//! - `transfer_courier`: reassign where status is out for delivery
//! - `insert_history_unique`: insert only if (awb, status) is not recorded
//!
//! ## Local layout
//!
//! ```text
//! {root}/
//! ├── config.toml          # Engine configuration
//! ├── shipments.json       # Authoritative shipment rows
//! ├── history.json         # History ledger
//! ├── couriers.json        # Courier directory (read-only)
//! └── manifest/
//!     ├── branch.json      # Branch-scoped manifest table
//!     └── central.json     # Central manifest table
//! ```

pub mod local;
pub mod memory;
mod tables;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{HistoryEntry, HistoryWrite, NewHistoryEntry, Shipment, ShipmentUpdate};

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStore;

/// Authoritative shipment rows.
#[async_trait]
pub trait ShipmentStore: Send + Sync {
    async fn get_shipment(&self, awb: &str) -> Result<Option<Shipment>>;

    /// Insert unless a row for the AWB already exists. Returns whether it inserted.
    async fn insert_shipment(&self, shipment: &Shipment) -> Result<bool>;

    /// Update the row unless it is delivered. Returns the affected row count.
    async fn update_unless_delivered(&self, awb: &str, update: &ShipmentUpdate) -> Result<u64>;

    /// Reassign the courier of an out-for-delivery row. Returns the affected row count.
    async fn transfer_courier(&self, awb: &str, courier_id: &str, at: DateTime<Utc>)
    -> Result<u64>;

    /// Delete the row and cascade to its history. Returns whether a row existed.
    async fn delete_shipment(&self, awb: &str) -> Result<bool>;
}

/// Append-only status history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Entries for an AWB ordered by `(created_at, sequence)`.
    async fn list_history(&self, awb: &str) -> Result<Vec<HistoryEntry>>;

    /// Append unconditionally. Returns the assigned sequence.
    async fn insert_history(&self, entry: NewHistoryEntry) -> Result<u64>;

    /// Append unless an entry with the same (awb, status) exists.
    async fn insert_history_unique(&self, entry: NewHistoryEntry) -> Result<HistoryWrite>;

    /// Remove every entry for an AWB. Returns how many were removed.
    async fn delete_history(&self, awb: &str) -> Result<usize>;
}

/// Read-only lookup of courier display names.
#[async_trait]
pub trait CourierDirectory: Send + Sync {
    async fn courier_name(&self, courier_id: &str) -> Result<Option<String>>;
}

/// A backend serving every store the engine needs.
pub trait Backend: ShipmentStore + HistoryStore + CourierDirectory {}

impl<T: ShipmentStore + HistoryStore + CourierDirectory> Backend for T {}
