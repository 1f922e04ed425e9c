// src/models/mod.rs

//! Domain models for the reconciliation engine.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod history;
mod manifest;
mod outcome;
mod shipment;

// Re-export all public types
pub use config::{BatchConfig, CarrierConfig, Config, ManifestConfig, ScanConfig};
pub use history::{GeoPoint, HistoryEntry, HistoryWrite, NewHistoryEntry};
pub use manifest::{Courier, ManifestRecord, ManifestRow, SourceTag};
pub use outcome::{BatchRecap, BatchResult, ScanCounters, ScanEntry, ScanOutcome, WriteAction};
pub use shipment::{Party, Shipment, ShipmentStatus, ShipmentUpdate, UNRESOLVED_MARKER};
