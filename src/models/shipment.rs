//! Shipment record and delivery status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{ManifestRecord, SourceTag};

/// Marker stored in party fields when no manifest source knew the AWB.
pub const UNRESOLVED_MARKER: &str = "[UNRESOLVED]";

/// Delivery lifecycle status.
///
/// `Processed → Shipped → InTransit → OutForDelivery → Delivered`, with
/// `Exception` reachable from any non-terminal state. `Delivered` absorbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Processed,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    Exception,
}

impl ShipmentStatus {
    pub const ALL: [ShipmentStatus; 6] = [
        Self::Processed,
        Self::Shipped,
        Self::InTransit,
        Self::OutForDelivery,
        Self::Delivered,
        Self::Exception,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Shipped => "shipped",
            Self::InTransit => "in_transit",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Exception => "exception",
        }
    }

    /// Delivered is the only terminal state.
    pub fn is_terminal(self) -> bool {
        self == Self::Delivered
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| AppError::validation(format!("unknown shipment status '{s}'")))
    }
}

/// Name, address and phone of a sender or receiver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Party {
    pub name: String,
    pub address: String,
    pub phone: String,
}

impl Party {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            phone: phone.into(),
        }
    }

    /// Party with every field set to [`UNRESOLVED_MARKER`].
    pub fn placeholder() -> Self {
        Self::new(UNRESOLVED_MARKER, UNRESOLVED_MARKER, UNRESOLVED_MARKER)
    }

    pub fn is_placeholder(&self) -> bool {
        self.name == UNRESOLVED_MARKER
    }
}

/// Authoritative shipment record keyed by AWB.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shipment {
    pub awb: String,
    pub current_status: ShipmentStatus,
    #[serde(default)]
    pub courier_id: Option<String>,
    pub sender: Party,
    pub receiver: Party,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub dimensions: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    /// Where the party data came from; `None` when unresolved
    #[serde(default)]
    pub manifest_source: Option<SourceTag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// Build a new shipment, backfilling parties from the manifest when known.
    pub fn create(
        awb: impl Into<String>,
        status: ShipmentStatus,
        courier_id: Option<String>,
        manifest: Option<&ManifestRecord>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let (sender, receiver, source) = match manifest {
            Some(record) => (
                record.sender.clone(),
                record.receiver.clone(),
                Some(record.source),
            ),
            None => (Party::placeholder(), Party::placeholder(), None),
        };

        Self {
            awb: awb.into(),
            current_status: status,
            courier_id,
            sender,
            receiver,
            weight_kg: None,
            dimensions: None,
            service_type: None,
            manifest_source: source,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.current_status.is_terminal()
    }

    pub fn is_unresolved(&self) -> bool {
        self.manifest_source.is_none() && self.receiver.is_placeholder()
    }

    /// A handoff moves an out-for-delivery parcel to another courier.
    pub fn is_handoff(&self, status: ShipmentStatus, courier_id: Option<&str>) -> bool {
        self.current_status == ShipmentStatus::OutForDelivery
            && status == ShipmentStatus::OutForDelivery
            && courier_id.is_some_and(|id| self.courier_id.as_deref() != Some(id))
    }
}

/// Field changes for an existing shipment row.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentUpdate {
    pub status: ShipmentStatus,
    pub courier_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}
