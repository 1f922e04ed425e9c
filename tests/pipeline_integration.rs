//! End-to-end checks of the bulk and scan pipelines against the in-memory
//! backend, with a local TCP responder standing in for the partner API.

use std::sync::Arc;

use shiptrack::Engine;
use shiptrack::error::ErrorKind;
use shiptrack::models::{Config, ScanOutcome, ShipmentStatus, SourceTag, WriteAction};
use shiptrack::services::{ManualUpdate, UpdateContext};
use shiptrack::storage::MemoryStore;

fn offline_config() -> Config {
    let mut config = Config::default();
    config.manifest.partner_enabled = false;
    config.batch.stagger_ms = 0;
    config.batch.group_pause_ms = 0;
    config
}

fn engine_with(config: Config, store: Arc<MemoryStore>) -> Engine {
    let resolver = Engine::build_resolver(&config, Vec::new(), Vec::new()).unwrap();
    Engine::new(config, store, resolver)
}

fn engine() -> Engine {
    engine_with(offline_config(), Arc::new(MemoryStore::new()))
}

#[tokio::test]
async fn test_unprefixed_awbs_never_reach_the_store() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(offline_config(), Arc::clone(&store));

    let report = engine.submit_bulk("XX100001, 12345\nZZ9", "kurir-a").await;

    assert_eq!(report.recap.failed, 3);
    assert!(
        report
            .results
            .iter()
            .all(|r| r.error == Some(ErrorKind::InvalidFormat))
    );
    assert_eq!(store.operation_count(), 0);
}

#[tokio::test]
async fn test_delivered_shipment_is_locked() {
    let engine = engine();
    let delivered = ManualUpdate {
        context: UpdateContext::new(ShipmentStatus::Delivered, Some("kurir-a".into()), "Door"),
        gps: None,
        photo_ref: Some("pod/be8.jpg".into()),
        updated_by: None,
    };
    assert!(engine.update("BE8", &delivered).await.unwrap().success);

    let report = engine.submit_bulk("BE8", "kurir-b").await;
    assert_eq!(report.recap.already_delivered, vec!["BE8".to_string()]);
    assert_eq!(report.recap.succeeded, 0);

    let view = engine.track("BE8").await.unwrap().unwrap();
    assert_eq!(view.shipment.current_status, ShipmentStatus::Delivered);
    assert_eq!(view.shipment.courier_id.as_deref(), Some("kurir-a"));
    assert_eq!(view.history.len(), 1);
}

#[tokio::test]
async fn test_repeated_bulk_updates_record_history_once() {
    let engine = engine();
    for _ in 0..3 {
        let report = engine.submit_bulk("BE1 BE2", "kurir-a").await;
        assert_eq!(report.recap.succeeded, 2);
    }

    for awb in ["BE1", "BE2"] {
        let view = engine.track(awb).await.unwrap().unwrap();
        assert_eq!(view.history.len(), 1);
        assert_eq!(view.history[0].status, ShipmentStatus::OutForDelivery);
    }
}

#[tokio::test]
async fn test_same_awb_twice_batch_vs_scan() {
    let engine = engine();

    let report = engine.submit_bulk("BE5\nBE5", "kurir-a").await;
    assert_eq!(report.results.len(), 2);
    assert!(report.results.iter().all(|r| r.success));

    let mut session = engine.start_scan("kurir-a");
    assert!(matches!(
        session.process_single_scan("BE6").await,
        ScanOutcome::Success { .. }
    ));
    assert_eq!(
        session.process_single_scan("be6").await,
        ScanOutcome::Duplicate { awb: "BE6".into() }
    );
    assert_eq!(session.counters().duplicate, 1);
}

#[tokio::test]
async fn test_handoff_between_couriers() {
    let engine = engine();
    engine.submit_bulk("BE7", "kurir-a").await;

    let report = engine.submit_bulk("BE7", "kurir-b").await;
    assert_eq!(report.results[0].action, Some(WriteAction::Transferred));
    assert!(report.results[0].success);

    let view = engine.track("BE7").await.unwrap().unwrap();
    assert_eq!(view.shipment.courier_id.as_deref(), Some("kurir-b"));
    assert_eq!(view.shipment.current_status, ShipmentStatus::OutForDelivery);
}

#[tokio::test]
async fn test_unknown_awb_gets_placeholder_parties() {
    let engine = engine();
    let report = engine.submit_bulk("BCE100001", "kurir-a").await;
    assert!(report.results[0].success);
    assert_eq!(report.results[0].warning, None);

    let view = engine.track("BCE100001").await.unwrap().unwrap();
    assert!(view.shipment.is_unresolved());
    assert!(view.shipment.sender.is_placeholder());
    assert!(view.shipment.receiver.is_placeholder());
    assert_eq!(view.shipment.current_status, ShipmentStatus::OutForDelivery);
}

#[tokio::test]
async fn test_delete_cascades_history() {
    let engine = engine();
    engine.submit_bulk("BE9", "kurir-a").await;

    assert!(engine.delete("be9").await.unwrap());
    assert!(engine.track("BE9").await.unwrap().is_none());
    assert!(!engine.delete("BE9").await.unwrap());
}

#[cfg(feature = "partner")]
mod partner {
    use super::*;

    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const FOUND: &str = r#"{
        "success": true,
        "data": {
            "penerima": {
                "nama_penerima": "Siti Aminah",
                "alamat_penerima": "Jl. Kenanga 5, Bandung",
                "no_penerima": "081234567"
            },
            "pengirim": {
                "nama_pengirim": "Toko Makmur",
                "alamat_pengirim": "Jl. Braga 1",
                "no_pengirim": "0227654321"
            }
        }
    }"#;

    /// Minimal HTTP/1.1 responder. Knows BE200002 only; `stall` never answers.
    async fn spawn_partner(stall: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();

                    if stall {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        return;
                    }

                    let known = "GET /manifest/search?awb_number=BE200002 ";
                    let (status, body) = if request.starts_with(known) {
                        ("200 OK", FOUND)
                    } else {
                        ("404 Not Found", r#"{"success": false, "data": null}"#)
                    };
                    let response = format!(
                        "HTTP/1.1 {status}\r\n\
                         Content-Type: application/json\r\n\
                         Content-Length: {}\r\n\
                         Connection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{addr}")
    }

    fn partner_engine(base_url: String, timeout_ms: u64) -> Engine {
        let mut config = offline_config();
        config.manifest.partner_enabled = true;
        config.manifest.partner_base_url = base_url;
        config.manifest.timeout_ms = timeout_ms;
        engine_with(config, Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_partner_endpoint_fills_receiver() {
        let engine = partner_engine(spawn_partner(false).await, 2_000);

        let report = engine.submit_bulk("BE200002", "kurir-a").await;
        assert!(report.results[0].success);

        let view = engine.track("BE200002").await.unwrap().unwrap();
        assert_eq!(view.shipment.manifest_source, Some(SourceTag::PartnerApi));
        assert_eq!(view.shipment.receiver.name, "Siti Aminah");
        assert_eq!(view.shipment.receiver.address, "Jl. Kenanga 5, Bandung");
        assert_eq!(view.shipment.receiver.phone, "081234567");
        assert_eq!(view.shipment.sender.name, "Toko Makmur");
    }

    #[tokio::test]
    async fn test_partner_miss_leaves_placeholder_without_warning() {
        let engine = partner_engine(spawn_partner(false).await, 2_000);

        let report = engine.submit_bulk("BE404404", "kurir-a").await;
        assert!(report.results[0].success);
        assert_eq!(report.results[0].warning, None);
        assert!(engine.track("BE404404").await.unwrap().unwrap().shipment.is_unresolved());
    }

    #[tokio::test]
    async fn test_partner_timeout_degrades_to_placeholder() {
        let engine = partner_engine(spawn_partner(true).await, 100);

        let report = engine.submit_bulk("BE300003", "kurir-a").await;
        let result = &report.results[0];
        assert!(result.success);
        assert_eq!(result.warning, Some(ErrorKind::NetworkTimeout));

        let view = engine.track("BE300003").await.unwrap().unwrap();
        assert!(view.shipment.is_unresolved());
        assert_eq!(view.shipment.current_status, ShipmentStatus::OutForDelivery);
    }
}
