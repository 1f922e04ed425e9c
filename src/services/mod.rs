//! Service layer for the reconciliation engine.
//!
//! This module contains the business logic for:
//! - AWB canonicalization and validation (`AwbNormalizer`)
//! - Manifest backfill across sources (`ManifestResolver`)
//! - The shipment state machine (`ShipmentService`)
//! - The deduplicated status log (`HistoryLedger`)
//! - The per-AWB pipeline tying them together (`Reconciler`)

mod ledger;
pub mod manifest;
mod normalizer;
#[cfg(feature = "partner")]
mod partner;
mod reconciler;
mod shipments;

pub use ledger::HistoryLedger;
pub use manifest::{ManifestResolver, ManifestSource, Resolution, TableSource};
pub use normalizer::{Awb, AwbNormalizer};
#[cfg(feature = "partner")]
pub use partner::PartnerManifest;
pub use reconciler::{ManualUpdate, Reconciler, UpdateContext};
pub use shipments::{ShipmentService, TrackingView, UpsertOutcome};
