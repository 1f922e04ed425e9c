// src/services/manifest.rs

//! Manifest resolver.
//!
//! Backfills sender/receiver data for AWBs the shipment store has never seen.
//! Sources are tried in a fixed priority order; inside a source every lookup
//! variant is tried in turn, each call bounded by a short timeout so an
//! unreachable source cannot stall a batch. Not-found, timeouts and source
//! errors all advance to the next candidate. Dropping the `resolve` future
//! cancels the lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, ErrorKind, Result};
use crate::models::{ManifestRecord, ManifestRow, SourceTag};
use crate::services::Awb;

/// Outcome of asking one source about a list of candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLookup {
    pub record: Option<ManifestRecord>,
    /// At least one call ran out of time
    pub timed_out: bool,
}

/// A place manifest records can be looked up.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    fn tag(&self) -> SourceTag;

    /// Whether this source can know the AWB at all.
    fn covers(&self, _awb: &Awb) -> bool {
        true
    }

    /// Look up a single candidate AWB.
    async fn find(&self, candidate: &str) -> Result<Option<ManifestRecord>>;

    /// Try candidates in order; the first match wins.
    async fn lookup(&self, candidates: &[String], per_call: Duration) -> SourceLookup {
        let mut timed_out = false;

        for candidate in candidates {
            match tokio::time::timeout(per_call, self.find(candidate)).await {
                Ok(Ok(Some(record))) => {
                    return SourceLookup {
                        record: Some(record),
                        timed_out,
                    };
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    timed_out |= e.kind() == ErrorKind::NetworkTimeout;
                    log::warn!("{} lookup for {} failed: {}", self.tag(), candidate, e);
                }
                Err(_) => {
                    timed_out = true;
                    let e = AppError::NetworkTimeout {
                        source_name: self.tag().to_string(),
                        awb: candidate.clone(),
                    };
                    log::warn!("{} (budget {}ms)", e, per_call.as_millis());
                }
            }
        }

        SourceLookup {
            record: None,
            timed_out,
        }
    }
}

/// A locally queryable manifest table, matched case-insensitively.
#[derive(Debug, Clone)]
pub struct TableSource {
    tag: SourceTag,
    rows: HashMap<String, ManifestRow>,
}

impl TableSource {
    pub fn new(tag: SourceTag, rows: Vec<ManifestRow>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| (row.awb.trim().to_uppercase(), row))
            .collect();
        Self { tag, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl ManifestSource for TableSource {
    fn tag(&self) -> SourceTag {
        self.tag
    }

    async fn find(&self, candidate: &str) -> Result<Option<ManifestRecord>> {
        Ok(self
            .rows
            .get(&candidate.trim().to_uppercase())
            .map(|row| row.tagged(self.tag)))
    }
}

/// Result of resolving one AWB across every source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub record: Option<ManifestRecord>,
    /// Some source timed out, so the miss may not be authoritative
    pub timed_out: bool,
}

/// Ordered chain of manifest sources.
#[derive(Clone)]
pub struct ManifestResolver {
    sources: Vec<Arc<dyn ManifestSource>>,
    per_call: Duration,
}

impl ManifestResolver {
    pub fn new(per_call: Duration) -> Self {
        Self {
            sources: Vec::new(),
            per_call,
        }
    }

    /// Append a source at the lowest priority so far.
    pub fn with_source(mut self, source: Arc<dyn ManifestSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn source_tags(&self) -> Vec<SourceTag> {
        self.sources.iter().map(|s| s.tag()).collect()
    }

    /// Return the first record found, tagged with its source.
    pub async fn resolve(&self, awb: &Awb) -> Resolution {
        let mut timed_out = false;

        for source in self.sources.iter().filter(|s| s.covers(awb)) {
            let lookup = source.lookup(awb.variants(), self.per_call).await;
            timed_out |= lookup.timed_out;

            if let Some(record) = lookup.record {
                log::debug!("{} resolved from {}", awb, record.source);
                return Resolution {
                    record: Some(record),
                    timed_out,
                };
            }
        }

        log::debug!("{} not found in any manifest source", awb);
        Resolution {
            record: None,
            timed_out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::models::{CarrierConfig, Party};
    use crate::services::AwbNormalizer;

    fn row(awb: &str, receiver: &str) -> ManifestRow {
        ManifestRow {
            awb: awb.into(),
            sender: Party::new("Toko", "Jl. Pasar 1", "0800"),
            receiver: Party::new(receiver, "Jl. Mawar 2", "0811"),
        }
    }

    fn awb(raw: &str) -> Awb {
        AwbNormalizer::new(&CarrierConfig::default())
            .parse(raw)
            .unwrap()
    }

    /// Never answers within any reasonable budget.
    struct StallingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ManifestSource for StallingSource {
        fn tag(&self) -> SourceTag {
            SourceTag::PartnerApi
        }

        async fn find(&self, _candidate: &str) -> Result<Option<ManifestRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_branch_table_wins_over_central() {
        let resolver = ManifestResolver::new(Duration::from_millis(100))
            .with_source(Arc::new(TableSource::new(
                SourceTag::BranchManifest,
                vec![row("BCE1", "Branch Ani")],
            )))
            .with_source(Arc::new(TableSource::new(
                SourceTag::CentralManifest,
                vec![row("BCE1", "Central Ani")],
            )));

        let resolution = resolver.resolve(&awb("bce1")).await;
        let record = resolution.record.unwrap();
        assert_eq!(record.source, SourceTag::BranchManifest);
        assert_eq!(record.receiver.name, "Branch Ani");
        assert_eq!(record.awb, "BCE1");
    }

    #[tokio::test]
    async fn test_matches_stripped_variant() {
        let resolver = ManifestResolver::new(Duration::from_millis(100)).with_source(Arc::new(
            TableSource::new(SourceTag::CentralManifest, vec![row("100007", "Sari")]),
        ));

        let record = resolver.resolve(&awb("BCE100007")).await.record.unwrap();
        assert_eq!(record.receiver.name, "Sari");
        assert_eq!(record.source, SourceTag::CentralManifest);
    }

    #[tokio::test]
    async fn test_timeout_advances_to_next_source() {
        let stalling = Arc::new(StallingSource {
            calls: AtomicUsize::new(0),
        });
        let resolver = ManifestResolver::new(Duration::from_millis(20))
            .with_source(stalling.clone())
            .with_source(Arc::new(TableSource::new(
                SourceTag::CentralManifest,
                vec![row("BE9", "Dewi")],
            )));

        let resolution = resolver.resolve(&awb("BE9")).await;
        assert!(resolution.timed_out);
        assert_eq!(resolution.record.unwrap().receiver.name, "Dewi");
        // One call per variant: "BE9" and "9"
        assert_eq!(stalling.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_sources_resolve_to_none() {
        let resolver = ManifestResolver::new(Duration::from_millis(50)).with_source(Arc::new(
            TableSource::new(SourceTag::BranchManifest, vec![row("BE1", "X")]),
        ));

        let resolution = resolver.resolve(&awb("BCE100001")).await;
        assert_eq!(resolution, Resolution::default());
    }
}
