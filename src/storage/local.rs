//! Local filesystem storage implementation.
//!
//! Keeps the tables in memory. A mutation is applied to a copy, the affected
//! JSON file is rewritten from that copy while the table lock is held, and the
//! copy replaces the live tables only once the write succeeded. Files are
//! written atomically (temp + rename).

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::tables::Tables;
use super::{CourierDirectory, HistoryStore, ShipmentStore};
use crate::error::{AppError, Result};
use crate::models::{
    Courier, HistoryEntry, HistoryWrite, ManifestRow, NewHistoryEntry, Shipment, ShipmentUpdate,
    SourceTag,
};

const SHIPMENTS_KEY: &str = "shipments.json";
const HISTORY_KEY: &str = "history.json";
const COURIERS_KEY: &str = "couriers.json";

/// Local filesystem storage backend.
pub struct LocalStorage {
    root_dir: PathBuf,
    tables: Mutex<Tables>,
}

impl LocalStorage {
    /// Open the storage rooted at the given directory, loading existing tables.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        tokio::fs::create_dir_all(&root_dir).await?;

        let mut storage = Self {
            root_dir,
            tables: Mutex::new(Tables::default()),
        };

        let shipments: Vec<Shipment> = storage.read_json(SHIPMENTS_KEY).await?.unwrap_or_default();
        let history: Vec<HistoryEntry> = storage.read_json(HISTORY_KEY).await?.unwrap_or_default();
        let couriers: Vec<Courier> = storage.read_json(COURIERS_KEY).await?.unwrap_or_default();

        log::debug!(
            "Loaded {} shipments, {} history entries, {} couriers from {}",
            shipments.len(),
            history.len(),
            couriers.len(),
            storage.root_dir.display()
        );

        storage.tables = Mutex::new(Tables::from_parts(shipments, history, couriers));
        Ok(storage)
    }

    pub fn root_dir(&self) -> &PathBuf {
        &self.root_dir
    }

    /// Read a local manifest table; a missing file is an empty table.
    pub async fn read_manifest(&self, source: SourceTag) -> Result<Vec<ManifestRow>> {
        let key = match source {
            SourceTag::BranchManifest => "manifest/branch.json",
            SourceTag::CentralManifest => "manifest/central.json",
            SourceTag::PartnerApi => {
                return Err(AppError::config("partner manifest is not stored locally"));
            }
        };
        Ok(self.read_json(key).await?.unwrap_or_default())
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn persist_shipments(&self, tables: &Tables) -> Result<()> {
        self.write_json(SHIPMENTS_KEY, &tables.shipments()).await
    }

    async fn persist_history(&self, tables: &Tables) -> Result<()> {
        self.write_json(HISTORY_KEY, tables.history()).await
    }
}

#[async_trait]
impl ShipmentStore for LocalStorage {
    async fn get_shipment(&self, awb: &str) -> Result<Option<Shipment>> {
        Ok(self.tables.lock().await.get(awb))
    }

    async fn insert_shipment(&self, shipment: &Shipment) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let inserted = next.insert_if_absent(shipment);
        if inserted {
            self.persist_shipments(&next).await?;
            *tables = next;
        }
        Ok(inserted)
    }

    async fn update_unless_delivered(&self, awb: &str, update: &ShipmentUpdate) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let rows = next.update_unless_delivered(awb, update);
        if rows > 0 {
            self.persist_shipments(&next).await?;
            *tables = next;
        }
        Ok(rows)
    }

    async fn transfer_courier(
        &self,
        awb: &str,
        courier_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let rows = next.transfer(awb, courier_id, at);
        if rows > 0 {
            self.persist_shipments(&next).await?;
            *tables = next;
        }
        Ok(rows)
    }

    async fn delete_shipment(&self, awb: &str) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let existed = next.delete(awb);
        // History first; a failed second write leaves no orphaned entries.
        self.persist_history(&next).await?;
        self.persist_shipments(&next).await?;
        *tables = next;
        Ok(existed)
    }
}

#[async_trait]
impl HistoryStore for LocalStorage {
    async fn list_history(&self, awb: &str) -> Result<Vec<HistoryEntry>> {
        Ok(self.tables.lock().await.list_history(awb))
    }

    async fn insert_history(&self, entry: NewHistoryEntry) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let sequence = next.insert_history(entry);
        self.persist_history(&next).await?;
        *tables = next;
        Ok(sequence)
    }

    async fn insert_history_unique(&self, entry: NewHistoryEntry) -> Result<HistoryWrite> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let write = next.insert_history_unique(entry);
        if matches!(write, HistoryWrite::Inserted(_)) {
            self.persist_history(&next).await?;
            *tables = next;
        }
        Ok(write)
    }

    async fn delete_history(&self, awb: &str) -> Result<usize> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let removed = next.delete_history(awb);
        if removed > 0 {
            self.persist_history(&next).await?;
            *tables = next;
        }
        Ok(removed)
    }
}

#[async_trait]
impl CourierDirectory for LocalStorage {
    async fn courier_name(&self, courier_id: &str) -> Result<Option<String>> {
        Ok(self.tables.lock().await.courier_name(courier_id))
    }
}
