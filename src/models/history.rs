//! History ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ShipmentStatus;

/// Opaque GPS fix attached to a manual update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A recorded status transition, keyed by `(awb, sequence)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub awb: String,
    pub sequence: u64,
    pub status: ShipmentStatus,
    pub location: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

/// History entry before the store assigns its sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub awb: String,
    pub status: ShipmentStatus,
    pub location: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub gps: Option<GeoPoint>,
    pub photo_ref: Option<String>,
    pub updated_by: Option<String>,
}

impl NewHistoryEntry {
    pub fn new(
        awb: impl Into<String>,
        status: ShipmentStatus,
        location: impl Into<String>,
        notes: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            awb: awb.into(),
            status,
            location: location.into(),
            notes: notes.into(),
            created_at,
            gps: None,
            photo_ref: None,
            updated_by: None,
        }
    }

    pub fn with_updated_by(mut self, updated_by: Option<String>) -> Self {
        self.updated_by = updated_by;
        self
    }

    pub fn into_entry(self, sequence: u64) -> HistoryEntry {
        HistoryEntry {
            awb: self.awb,
            sequence,
            status: self.status,
            location: self.location,
            notes: self.notes,
            created_at: self.created_at,
            gps: self.gps,
            photo_ref: self.photo_ref,
            updated_by: self.updated_by,
        }
    }
}

/// Result of an automated history append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWrite {
    /// A new entry was inserted with this sequence number
    Inserted(u64),
    /// An entry for the same (awb, status) already existed
    AlreadyRecorded,
}
