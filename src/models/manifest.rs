//! Read-only manifest records used to backfill new shipments.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Party;

/// Origin of a manifest record, in lookup priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    BranchManifest,
    CentralManifest,
    PartnerApi,
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BranchManifest => "branch manifest",
            Self::CentralManifest => "central manifest",
            Self::PartnerApi => "partner api",
        })
    }
}

/// Sender/receiver details declared upstream for an AWB.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestRecord {
    pub awb: String,
    pub sender: Party,
    pub receiver: Party,
    pub source: SourceTag,
}

/// Row of a local manifest table file (the table supplies the source tag).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestRow {
    pub awb: String,
    pub sender: Party,
    pub receiver: Party,
}

impl ManifestRow {
    pub fn tagged(&self, source: SourceTag) -> ManifestRecord {
        ManifestRecord {
            awb: self.awb.clone(),
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            source,
        }
    }
}

/// Entry of the courier directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Courier {
    pub id: String,
    pub name: String,
}
