//! In-process table state shared by the memory and local backends.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::{
    Courier, HistoryEntry, HistoryWrite, NewHistoryEntry, Shipment, ShipmentStatus,
    ShipmentUpdate,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    shipments: BTreeMap<String, Shipment>,
    history: Vec<HistoryEntry>,
    couriers: Vec<Courier>,
    next_sequence: u64,
}

impl Tables {
    pub fn from_parts(
        shipments: Vec<Shipment>,
        history: Vec<HistoryEntry>,
        couriers: Vec<Courier>,
    ) -> Self {
        let next_sequence = history.iter().map(|e| e.sequence).max().unwrap_or(0) + 1;
        Self {
            shipments: shipments.into_iter().map(|s| (s.awb.clone(), s)).collect(),
            history,
            couriers,
            next_sequence,
        }
    }

    pub fn shipments(&self) -> Vec<&Shipment> {
        self.shipments.values().collect()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn set_couriers(&mut self, couriers: Vec<Courier>) {
        self.couriers = couriers;
    }

    pub fn get(&self, awb: &str) -> Option<Shipment> {
        self.shipments.get(awb).cloned()
    }

    pub fn insert_if_absent(&mut self, shipment: &Shipment) -> bool {
        if self.shipments.contains_key(&shipment.awb) {
            return false;
        }
        self.shipments.insert(shipment.awb.clone(), shipment.clone());
        true
    }

    pub fn update_unless_delivered(&mut self, awb: &str, update: &ShipmentUpdate) -> u64 {
        match self.shipments.get_mut(awb) {
            Some(row) if !row.is_delivered() => {
                row.current_status = update.status;
                if let Some(courier_id) = &update.courier_id {
                    row.courier_id = Some(courier_id.clone());
                }
                row.updated_at = update.updated_at;
                1
            }
            _ => 0,
        }
    }

    pub fn transfer(&mut self, awb: &str, courier_id: &str, at: DateTime<Utc>) -> u64 {
        match self.shipments.get_mut(awb) {
            Some(row) if row.current_status == ShipmentStatus::OutForDelivery => {
                row.courier_id = Some(courier_id.to_string());
                row.updated_at = at;
                1
            }
            _ => 0,
        }
    }

    /// Removes the row and its history.
    pub fn delete(&mut self, awb: &str) -> bool {
        let existed = self.shipments.remove(awb).is_some();
        self.delete_history(awb);
        existed
    }

    pub fn list_history(&self, awb: &str) -> Vec<HistoryEntry> {
        let mut entries: Vec<HistoryEntry> = self
            .history
            .iter()
            .filter(|e| e.awb == awb)
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.sequence.cmp(&b.sequence))
        });
        entries
    }

    pub fn insert_history(&mut self, entry: NewHistoryEntry) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.history.push(entry.into_entry(sequence));
        sequence
    }

    pub fn insert_history_unique(&mut self, entry: NewHistoryEntry) -> HistoryWrite {
        let recorded = self
            .history
            .iter()
            .any(|e| e.awb == entry.awb && e.status == entry.status);
        if recorded {
            HistoryWrite::AlreadyRecorded
        } else {
            HistoryWrite::Inserted(self.insert_history(entry))
        }
    }

    pub fn delete_history(&mut self, awb: &str) -> usize {
        let before = self.history.len();
        self.history.retain(|e| e.awb != awb);
        before - self.history.len()
    }

    pub fn courier_name(&self, courier_id: &str) -> Option<String> {
        self.couriers
            .iter()
            .find(|c| c.id == courier_id)
            .map(|c| c.name.clone())
    }
}
