// src/engine.rs

//! Wiring: builds the services from a [`Config`] and a storage backend.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::models::{BatchResult, Config, ManifestRow, SourceTag};
use crate::pipeline::{AbortHandle, BatchProcessor, BatchReport, ScanProcessor, ScanSession};
use crate::services::{
    AwbNormalizer, HistoryLedger, ManifestResolver, ManualUpdate, Reconciler, ShipmentService,
    TableSource, TrackingView, UpdateContext,
};
use crate::storage::{Backend, LocalStorage};

/// Fully wired reconciliation engine.
pub struct Engine {
    config: Config,
    reconciler: Arc<Reconciler>,
    batch: BatchProcessor,
    scan: ScanProcessor,
}

impl Engine {
    pub fn new(config: Config, backend: Arc<dyn Backend>, resolver: ManifestResolver) -> Self {
        log::debug!("Manifest sources: {:?}", resolver.source_tags());

        let reconciler = Arc::new(Reconciler::new(
            AwbNormalizer::new(&config.carrier),
            ShipmentService::new(Arc::clone(&backend), resolver),
            HistoryLedger::new(backend, config.batch.history_offset_ms),
        ));

        Self {
            batch: BatchProcessor::new(Arc::clone(&reconciler), config.batch.clone()),
            scan: ScanProcessor::new(Arc::clone(&reconciler), config.scan.clone()),
            reconciler,
            config,
        }
    }

    /// Open the JSON backend under `storage_dir` with its manifest tables.
    pub async fn open_local(config: Config, storage_dir: &Path) -> Result<Self> {
        let storage = LocalStorage::open(storage_dir).await?;
        let branch = storage.read_manifest(SourceTag::BranchManifest).await?;
        let central = storage.read_manifest(SourceTag::CentralManifest).await?;
        log::info!(
            "Loaded manifests: {} branch rows, {} central rows",
            branch.len(),
            central.len()
        );

        let resolver = Self::build_resolver(&config, branch, central)?;
        Ok(Self::new(config, Arc::new(storage), resolver))
    }

    /// Branch table, then central table, then (if enabled) the partner API.
    pub fn build_resolver(
        config: &Config,
        branch: Vec<ManifestRow>,
        central: Vec<ManifestRow>,
    ) -> Result<ManifestResolver> {
        let resolver = ManifestResolver::new(Duration::from_millis(config.manifest.timeout_ms))
            .with_source(Arc::new(TableSource::new(SourceTag::BranchManifest, branch)))
            .with_source(Arc::new(TableSource::new(SourceTag::CentralManifest, central)));

        #[cfg(feature = "partner")]
        let resolver = if config.manifest.partner_enabled {
            let client = crate::utils::http::create_async_client(&config.manifest)?;
            resolver.with_source(Arc::new(crate::services::PartnerManifest::new(
                client,
                &config.manifest.partner_base_url,
                &config.carrier.partner_prefixes,
            )?))
        } else {
            resolver
        };

        Ok(resolver)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn batch(&self) -> &BatchProcessor {
        &self.batch
    }

    pub async fn submit_bulk(&self, awb_list_text: &str, courier_id: &str) -> BatchReport {
        self.batch.submit_bulk(awb_list_text, courier_id).await
    }

    pub async fn submit_bulk_with(
        &self,
        awb_list_text: &str,
        ctx: &UpdateContext,
        abort: &AbortHandle,
    ) -> BatchReport {
        self.batch.submit_bulk_with(awb_list_text, ctx, abort).await
    }

    pub fn start_scan(&self, courier_id: &str) -> ScanSession {
        self.scan.start_session(courier_id)
    }

    pub fn start_scan_with(&self, ctx: UpdateContext) -> ScanSession {
        self.scan.start_session_with(ctx)
    }

    pub async fn update(&self, awb: &str, update: &ManualUpdate) -> Result<BatchResult> {
        self.reconciler.manual_update(awb, update).await
    }

    pub async fn track(&self, awb: &str) -> Result<Option<TrackingView>> {
        self.reconciler
            .shipments()
            .track(&AwbNormalizer::canonicalize(awb))
            .await
    }

    pub async fn delete(&self, awb: &str) -> Result<bool> {
        self.reconciler
            .shipments()
            .delete(&AwbNormalizer::canonicalize(awb))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::Party;

    #[tokio::test]
    async fn test_open_local_reads_manifest_tables() {
        let dir = tempfile::tempdir().unwrap();
        let rows = vec![ManifestRow {
            awb: "bce777".into(),
            sender: Party::new("Toko", "Jl. A", "01"),
            receiver: Party::new("Dewi", "Jl. B", "02"),
        }];
        tokio::fs::create_dir_all(dir.path().join("manifest"))
            .await
            .unwrap();
        tokio::fs::write(
            dir.path().join("manifest/central.json"),
            serde_json::to_vec(&rows).unwrap(),
        )
        .await
        .unwrap();

        let mut config = Config::default();
        config.manifest.partner_enabled = false;
        let engine = Engine::open_local(config, dir.path()).await.unwrap();

        let report = engine.submit_bulk("BCE777", "a").await;
        assert!(report.results[0].success);

        let view = engine.track("bce777").await.unwrap().unwrap();
        assert_eq!(view.shipment.receiver.name, "Dewi");
        assert_eq!(view.shipment.manifest_source, Some(SourceTag::CentralManifest));
        assert!(engine.delete("BCE777").await.unwrap());
    }

    #[test]
    fn test_resolver_order() {
        let config = Config::default();
        let tags = Engine::build_resolver(&config, vec![], vec![])
            .unwrap()
            .source_tags();
        assert_eq!(tags[..2], [SourceTag::BranchManifest, SourceTag::CentralManifest]);
    }
}
