//! End-to-end harvest runs against a mock upstream
//!
//! These tests validate the full run workflow including:
//! - Page failure isolation
//! - Idempotent reruns and checkpoint dedup before detail calls
//! - Validation gate
//! - Export after a run
//! - Session finalization when the run aborts

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tender_common::SessionStatus;
use tender_harvest::api::endpoints::{DETAIL_PATH, LIST_PATH};
use tender_harvest::api::{ApiClient, RetryPolicy};
use tender_harvest::pacing::RecordingSleeper;
use tender_harvest::{ExportFormat, HarvestConfig, Harvester, Normalizer, Store};
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Helper to build a raw listing row
fn row(id: &str, title: &str) -> Value {
    json!({
        "bidPbancNo": id,
        "bidPbancNm": title,
        "grpNm": "Metro Transit",
        "prcmBsneSeCdNm": "Services",
        "pbancPstgDt": "20240205",
        "onbsPrnmntEdDt": "2024/02/20 17:00"
    })
}

/// Helper to mount one listing page
async fn mount_page(server: &MockServer, page: u32, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(LIST_PATH))
        .and(body_partial_json(json!({"dlParamM": {"currentPage": page}})))
        .respond_with(response)
        .mount(server)
        .await;
}

fn page_of(rows: Vec<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "result": rows }))
}

fn harvester(server: &MockServer, store: Store, sleeper: &RecordingSleeper) -> Harvester<ApiClient> {
    let sleeper: Arc<RecordingSleeper> = Arc::new(sleeper.clone());
    let client = ApiClient::new(server.uri(), RetryPolicy::default())
        .expect("client builds")
        .with_sleeper(sleeper.clone());
    Harvester::new(client, store, Normalizer::new(server.uri())).with_sleeper(sleeper)
}

#[tokio::test]
async fn test_failed_page_does_not_stop_other_pages() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_of(vec![row("P1-A", "Bus shelters"), row("P1-B", "Ticket machines")])).await;
    mount_page(&server, 2, ResponseTemplate::new(500)).await;
    mount_page(&server, 3, page_of(vec![row("P3-A", "Depot cleaning")])).await;

    let sleeper = RecordingSleeper::new();
    let store = Store::open_in_memory().unwrap();
    let harvester = harvester(&server, store.clone(), &sleeper);
    let config = HarvestConfig::builder().max_pages(3).build().unwrap();

    let outcome = harvester.run(&config).await.unwrap();

    assert_eq!(outcome.stats.pages_processed, 2);
    assert_eq!(outcome.stats.pages_failed, 1);
    assert_eq!(outcome.stats.found, 3);
    assert_eq!(outcome.stats.collected, 3);
    assert_eq!(store.record_count().unwrap(), 3);

    // page delay, two backoffs on page 2, page delay; none after the last page
    assert_eq!(
        sleeper.waits(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(1),
        ]
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent_and_skips_before_detail() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_of(vec![row("I-1", "Signal upgrade"), row("I-2", "Track inspection")])).await;
    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"bscAmt": "250000", "dmndComp": "Rail Office"})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("tenders.db");
    let sleeper = RecordingSleeper::new();
    let config = HarvestConfig::builder().fetch_details(true).build().unwrap();

    let first = harvester(&server, Store::open(&db_path).unwrap(), &sleeper)
        .run(&config)
        .await
        .unwrap();
    assert_eq!(first.stats.collected, 2);
    assert_eq!(first.collected[0].budget, "250000");
    assert_eq!(first.collected[0].counterparty.as_deref(), Some("Rail Office"));
    assert_eq!(first.collected[0].due_date.as_deref(), Some("2024-02-20"));

    let store = Store::open(&db_path).unwrap();
    let first_dump = dir.path().join("first.json");
    store.export_all(ExportFormat::Json, &first_dump).unwrap();

    let second = harvester(&server, store.clone(), &sleeper)
        .run(&config)
        .await
        .unwrap();
    assert_eq!(second.stats.found, 2);
    assert_eq!(second.stats.collected, 0);
    assert_eq!(second.stats.skipped, 2);
    assert!(second.collected.is_empty());

    let second_dump = dir.path().join("second.json");
    store.export_all(ExportFormat::Json, &second_dump).unwrap();
    assert_eq!(
        std::fs::read_to_string(&first_dump).unwrap(),
        std::fs::read_to_string(&second_dump).unwrap()
    );

    let stats = store.get_stats().unwrap();
    assert_eq!(stats.total_records, 2);
    assert_eq!(stats.successful, 2);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_untitled_notice_is_never_persisted() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_of(vec![json!({"bidPbancNo": "U-1"}), row("U-2", "Escalator service")])).await;

    let sleeper = RecordingSleeper::new();
    let store = Store::open_in_memory().unwrap();
    let outcome = harvester(&server, store.clone(), &sleeper)
        .run(&HarvestConfig::default())
        .await
        .unwrap();

    assert_eq!(outcome.stats.errors, 1);
    assert_eq!(outcome.stats.collected, 1);
    assert!(!store.is_already_done("U-1").unwrap());
    assert!(store.is_already_done("U-2").unwrap());
    assert_eq!(store.record_count().unwrap(), 1);
}

#[tokio::test]
async fn test_detail_failure_keeps_notice_unenriched() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_of(vec![row("F-1", "Platform lighting")])).await;
    Mock::given(method("POST"))
        .and(path(DETAIL_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = RecordingSleeper::new();
    let config = HarvestConfig::builder().fetch_details(true).build().unwrap();
    let outcome = harvester(&server, Store::open_in_memory().unwrap(), &sleeper)
        .run(&config)
        .await
        .unwrap();

    assert_eq!(outcome.stats.collected, 1);
    assert_eq!(outcome.collected[0].budget, "");
    assert!(outcome.collected[0].raw_payload.get("detail").is_none());
    assert_eq!(sleeper.waits(), vec![config.detail_delay]);
}

#[tokio::test]
async fn test_csv_export_after_run() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_of(vec![row("C-1", "Uniforms, winter batch")])).await;

    let dir = TempDir::new().unwrap();
    let sleeper = RecordingSleeper::new();
    let store = Store::open(dir.path().join("tenders.db")).unwrap();
    harvester(&server, store.clone(), &sleeper)
        .run(&HarvestConfig::default())
        .await
        .unwrap();

    let csv_path = dir.path().join("out").join("tenders.csv");
    assert_eq!(store.export_all(ExportFormat::Csv, &csv_path).unwrap(), 1);

    let bytes = std::fs::read(&csv_path).unwrap();
    assert!(bytes.starts_with(b"\xEF\xBB\xBF"));
    let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("id,title,organization,category"));
    let record = lines.next().unwrap();
    assert!(record.starts_with("C-1,\"Uniforms, winter batch\",Metro Transit,Services"));
    assert!(record.contains("2024-02-05"));
}

#[tokio::test]
async fn test_aborted_run_still_finalizes_session() {
    let server = MockServer::start().await;
    mount_page(&server, 1, page_of(vec![row("X-1", "Ventilation")])).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("tenders.db");
    let store = Store::open(&db_path).unwrap();

    // Make the checkpoint lookup fail mid-run
    rusqlite::Connection::open(&db_path)
        .unwrap()
        .execute_batch("DROP TABLE completion;")
        .unwrap();

    let sleeper = RecordingSleeper::new();
    let result = harvester(&server, store.clone(), &sleeper)
        .run(&HarvestConfig::default())
        .await;

    assert!(result.is_err());
    assert_eq!(store.record_count().unwrap(), 0);

    let session = store.session(1).unwrap().expect("session row exists");
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.finished_at.is_some());
    assert_eq!(session.stats.pages_processed, 1);
    assert_eq!(session.stats.found, 1);
}
