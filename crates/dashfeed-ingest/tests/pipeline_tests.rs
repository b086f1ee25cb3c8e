//! End-to-end pipeline tests
//!
//! Each test serves a source from a wiremock server and runs the pipeline
//! against a `RecordingSink`, so the statements that would reach Postgres can
//! be inspected directly.

use chrono::{NaiveDate, NaiveDateTime};
use dashfeed_ingest::config::TaskConfig;
use dashfeed_ingest::error::{ExtractionError, FetchError, IngestError};
use dashfeed_ingest::pipeline::{Pipeline, SourceDescriptor};
use dashfeed_ingest::record::RunMetadata;
use dashfeed_ingest::sink::{RecordingSink, StatementKind};
use dashfeed_ingest::sources::{hospital_status, Task};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOSPITAL_PAGE: &str = r#"
<html><body>
<span id="lblTime">Tuesday, March 05, 2024 02:07:09 PM</span>
<table id="tblHospitals">
  <tr><th>Hospital</th><th>Yellow Alert</th><th>Red Alert</th><th>Mini Disaster</th>
      <th>ReRoute</th><th>Trauma ByPass</th><th>Capacity</th></tr>
  <tr><td>Mercy</td><td>11:00</td><td>12:05</td><td></td><td></td><td></td><td>40</td></tr>
  <tr><td>St. Agnes</td><td></td><td></td><td></td><td>09:30</td><td></td><td>12</td></tr>
  <tr><td>Shock Trauma</td><td></td><td></td><td></td><td></td><td>10:45</td><td>9</td></tr>
  <tr><td>Union</td><td></td><td></td><td>08:15</td><td></td><td></td><td>7</td></tr>
  <tr><td>O'Connor General</td><td></td><td></td><td></td><td></td><td></td><td>3</td></tr>
</table>
</body></html>"#;

const EMPTY_HOSPITAL_PAGE: &str = r#"
<html><body>
<table id="tblHospitals">
  <tr><th>Hospital</th><th>Yellow Alert</th><th>Red Alert</th></tr>
</table>
</body></html>"#;

const ALERT_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:cap="urn:oasis:names:tc:emergency:cap:1.1">
  <updated>2024-03-05T09:15:00-05:00</updated>
  <entry>
    <title>Flood Warning issued March 05 at 9:10AM EST by NWS</title>
    <link href="https://alerts.weather.gov/cap/wwacapget.php?x=MD1"/>
    <published>2024-03-05T09:10:00-05:00</published>
    <updated>2024-03-05T09:10:00-05:00</updated>
    <summary>Minor flooding is occurring</summary>
    <cap:event>Flood Warning</cap:event>
    <cap:areaDesc>Montgomery</cap:areaDesc>
  </entry>
</feed>"#;

fn started_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 5)
        .and_then(|d| d.and_hms_opt(14, 10, 0))
        .unwrap()
}

/// Task defaults pointed at the mock server, retrying without delay
fn config_for(descriptor: &SourceDescriptor, url: String, attempts: u32) -> TaskConfig {
    let mut config = descriptor.defaults.clone();
    config.source.url = Some(url);
    config.source.retry_attempts = attempts;
    config.source.retry_delay_secs = 0;
    config.source.timeout_secs = 5;
    config
}

async fn serve_hospital_page(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/hospitals"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn run_hospitals(server: &MockServer, attempts: u32, sink: &mut RecordingSink) -> dashfeed_ingest::Result<dashfeed_ingest::RunReport> {
    let descriptor = hospital_status::descriptor();
    let config = config_for(&descriptor, format!("{}/hospitals", server.uri()), attempts);
    let pipeline = Pipeline::new(descriptor, config)?;
    pipeline
        .run_with(sink, RunMetadata::start_at("hospital-status", started_at()))
        .await
}

// ============================================================================
// Hospital status
// ============================================================================

#[tokio::test]
async fn test_hospital_page_replaces_table() {
    let server = MockServer::start().await;
    serve_hospital_page(&server, HOSPITAL_PAGE).await;

    let mut sink = RecordingSink::new();
    sink.seed_table(hospital_status::TABLE, 12);
    let report = run_hospitals(&server, 1, &mut sink).await.unwrap();

    assert_eq!(report.requests, 1);
    assert_eq!(report.records, 5);
    assert_eq!(report.rows_written, 5);
    assert_eq!(report.generated_at.to_string(), "2024-03-05 14:07:09");
    assert_eq!(sink.row_count(hospital_status::TABLE), 5);

    let committed = sink.committed();
    assert_eq!(committed.len(), 1);
    let statements = &committed[0];
    assert_eq!(
        statements[0].kind,
        StatementKind::Delete {
            table: hospital_status::TABLE.to_string()
        }
    );
    assert!(statements[1].is_insert());
    assert_eq!(statements.last().unwrap().kind, StatementKind::UpdateTracking);
}

#[tokio::test]
async fn test_hospital_status_precedence() {
    let server = MockServer::start().await;
    serve_hospital_page(&server, HOSPITAL_PAGE).await;

    let mut sink = RecordingSink::new();
    run_hospitals(&server, 1, &mut sink).await.unwrap();

    let insert = &sink.committed()[0][1].sql;
    assert!(insert.contains(
        "('Mercy', 'red', '11:00', '12:05', NULL, NULL, NULL, '2024-03-05 14:10:00')"
    ));
    assert!(insert.contains("('St. Agnes', 'yellow', NULL, NULL, NULL, '09:30', NULL,"));
    assert!(insert.contains("('Shock Trauma', 't_bypass',"));
    assert!(insert.contains("('Union', 'mini',"));
    assert!(insert.contains("('O''Connor General', 'normal',"));
}

#[tokio::test]
async fn test_every_destination_column_is_written() {
    let server = MockServer::start().await;
    serve_hospital_page(&server, HOSPITAL_PAGE).await;

    let mut sink = RecordingSink::new();
    run_hospitals(&server, 1, &mut sink).await.unwrap();

    let insert = &sink.committed()[0][1].sql;
    assert!(insert.starts_with(
        "INSERT INTO \"RealTime_HospitalStatus\" (\"Linkname\", \"Status\", \"Yellow\", \"Red\", \
         \"Mini\", \"ReRoute\", \"t_bypass\", \"DataGenerated\") VALUES"
    ));
    assert!(!insert.contains("Capacity"));
}

#[tokio::test]
async fn test_tracking_row_records_source_generation_time() {
    let server = MockServer::start().await;
    serve_hospital_page(&server, HOSPITAL_PAGE).await;

    let mut sink = RecordingSink::new();
    run_hospitals(&server, 1, &mut sink).await.unwrap();

    let committed = sink.committed();
    let tracking = &committed[0].last().unwrap().sql;
    assert_eq!(
        tracking,
        "UPDATE \"RealTime_TaskTracking\" SET \"lastRun\" = '2024-03-05 14:10:00', \
         \"DataGenerated\" = '2024-03-05 14:07:09' WHERE \"taskName\" = 'HospitalStatus'"
    );
}

#[tokio::test]
async fn test_rerun_produces_identical_writes() {
    let server = MockServer::start().await;
    serve_hospital_page(&server, HOSPITAL_PAGE).await;

    let mut sink = RecordingSink::new();
    run_hospitals(&server, 1, &mut sink).await.unwrap();
    run_hospitals(&server, 1, &mut sink).await.unwrap();

    let committed = sink.committed();
    assert_eq!(committed.len(), 2);
    assert_eq!(committed[0], committed[1]);
    assert_eq!(sink.row_count(hospital_status::TABLE), 5);
}

// ============================================================================
// Retry
// ============================================================================

#[tokio::test]
async fn test_empty_page_is_retried_until_rows_appear() {
    let server = MockServer::start().await;

    // Mocks match in mount order; the empty page expires after two answers
    Mock::given(method("GET"))
        .and(path("/hospitals"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY_HOSPITAL_PAGE))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hospitals"))
        .respond_with(ResponseTemplate::new(200).set_body_string(HOSPITAL_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let mut sink = RecordingSink::new();
    let report = run_hospitals(&server, 4, &mut sink).await.unwrap();

    assert_eq!(report.rows_written, 5);
    assert_eq!(sink.committed().len(), 1);
    assert_eq!(sink.rolled_back(), 0);
}

#[tokio::test]
async fn test_exhausted_retries_write_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hospitals"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EMPTY_HOSPITAL_PAGE))
        .expect(3)
        .mount(&server)
        .await;

    let mut sink = RecordingSink::new();
    sink.seed_table(hospital_status::TABLE, 12);
    let err = run_hospitals(&server, 3, &mut sink).await.unwrap_err();

    assert!(matches!(
        err,
        IngestError::RetriesExhausted {
            attempts: 3,
            last: ExtractionError::EmptySource(_)
        }
    ));
    assert!(sink.committed().is_empty());
    assert_eq!(sink.row_count(hospital_status::TABLE), 12);
}

#[tokio::test]
async fn test_http_error_status_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hospitals"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let mut sink = RecordingSink::new();
    let err = run_hospitals(&server, 4, &mut sink).await.unwrap_err();

    assert!(matches!(
        err,
        IngestError::Fetch(FetchError::Status { status: 503, .. })
    ));
    assert!(sink.statements().is_empty());
}

#[tokio::test]
async fn test_failed_write_keeps_previous_rows() {
    let server = MockServer::start().await;
    serve_hospital_page(&server, HOSPITAL_PAGE).await;

    // Statement 1 is the first INSERT
    let mut sink = RecordingSink::failing_at(1);
    sink.seed_table(hospital_status::TABLE, 12);
    let err = run_hospitals(&server, 1, &mut sink).await.unwrap_err();

    assert!(matches!(err, IngestError::Write(_)));
    assert_eq!(sink.rolled_back(), 1);
    assert!(sink.committed().is_empty());
    assert_eq!(sink.row_count(hospital_status::TABLE), 12);
}

// ============================================================================
// Per-area sources
// ============================================================================

#[tokio::test]
async fn test_alert_rows_carry_their_county() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cap"))
        .and(query_param("x", "MDC031"))
        .and(query_param("y", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ALERT_FEED))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cap"))
        .and(query_param("x", "MDC510"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ALERT_FEED))
        .expect(1)
        .mount(&server)
        .await;

    let descriptor = Task::CapAlerts.descriptor();
    let mut config = config_for(&descriptor, format!("{}/cap", server.uri()), 1);
    config.source.areas = vec!["24031".to_string(), "24510".to_string()];

    let pipeline = Pipeline::new(descriptor, config).unwrap();
    let mut sink = RecordingSink::new();
    let report = pipeline
        .run_with(&mut sink, RunMetadata::start_at("cap-alerts", started_at()))
        .await
        .unwrap();

    assert_eq!(report.requests, 2);
    assert_eq!(report.rows_written, 2);

    let insert = &sink.committed()[0][1].sql;
    assert!(insert.contains("('24031', 'Flood Warning issued"));
    assert!(insert.contains("('24510', 'Flood Warning issued"));
    assert_eq!(report.generated_at.to_string(), "2024-03-05 09:15:00");
}

#[tokio::test]
async fn test_one_failing_area_aborts_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("x", "MDC031"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ALERT_FEED))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("x", "MDC510"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let descriptor = Task::CapAlerts.descriptor();
    let mut config = config_for(&descriptor, format!("{}/cap", server.uri()), 2);
    config.source.areas = vec!["24031".to_string(), "24510".to_string()];

    let pipeline = Pipeline::new(descriptor, config).unwrap();
    let mut sink = RecordingSink::new();
    let err = pipeline
        .run_with(&mut sink, RunMetadata::start_at("cap-alerts", started_at()))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::RetriesExhausted { attempts: 2, .. }));
    assert!(sink.statements().is_empty());
}

// ============================================================================
// Configuration and diagnostics
// ============================================================================

#[tokio::test]
async fn test_raw_responses_are_dumped() {
    let server = MockServer::start().await;
    serve_hospital_page(&server, HOSPITAL_PAGE).await;
    let dir = tempfile::tempdir().unwrap();

    let descriptor = hospital_status::descriptor();
    let mut config = config_for(&descriptor, format!("{}/hospitals", server.uri()), 1);
    config.source.raw_dump_dir = Some(dir.path().to_path_buf());

    let pipeline = Pipeline::new(descriptor, config).unwrap();
    let mut sink = RecordingSink::new();
    pipeline
        .run_with(&mut sink, RunMetadata::start_at("hospital-status", started_at()))
        .await
        .unwrap();

    let dumped = std::fs::read_to_string(dir.path().join("hospital-status_0.html")).unwrap();
    assert_eq!(dumped, HOSPITAL_PAGE);
}

#[test]
fn test_config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("hospital-status.toml");
    std::fs::write(
        &file,
        r#"
chunk_size = 250

[source]
url = "http://county.test/a, http://county.test/b"
retry_attempts = 6

[database]
name = "dashboard"
"#,
    )
    .unwrap();

    let descriptor = hospital_status::descriptor();
    let config = TaskConfig::load(descriptor.name, Some(&file), descriptor.defaults.clone()).unwrap();

    assert_eq!(config.chunk_size, 250);
    assert_eq!(config.source.endpoints().len(), 2);
    assert_eq!(config.source.retry_attempts, 6);
    assert_eq!(config.source.retry_delay_secs, 10);
    assert_eq!(config.database.name.as_deref(), Some("dashboard"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_config_file_is_an_error() {
    let descriptor = hospital_status::descriptor();
    let result = TaskConfig::load(
        descriptor.name,
        Some(std::path::Path::new("/nonexistent/hospital-status.toml")),
        descriptor.defaults.clone(),
    );
    assert!(result.is_err());
}

#[test]
fn test_pipeline_requires_an_endpoint() {
    let descriptor = Task::RitisBottlenecks.descriptor();
    let config = descriptor.defaults.clone();
    assert!(matches!(
        Pipeline::new(descriptor, config),
        Err(IngestError::Config(_))
    ));
}
