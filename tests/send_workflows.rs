//! Integration tests for complete send jobs.
//!
//! Transports are replaced by recording doubles; no SMTP server is involved.

use async_trait::async_trait;
use mailmerge::mailmerge_config::{ConfigError, RecipeConfig, TransportSpec};
use mailmerge::mailmerge_mail::{
    BodyFormat, ChannelDelivery, Email, MailError, MessagingChannel, StaticChannelRegistry,
    Transport,
};
use mailmerge::*;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

// =============================================================================
// Test doubles
// =============================================================================

#[derive(Default)]
struct Log {
    connects: usize,
    disconnects: usize,
    sent: Vec<Email>,
}

#[derive(Clone, Default)]
struct RecordingFactory {
    log: Arc<Mutex<Log>>,
    refuse_connect: bool,
    reject: Option<String>,
}

impl RecordingFactory {
    fn log(&self) -> std::sync::MutexGuard<'_, Log> {
        self.log.lock().unwrap()
    }
}

struct RecordingTransport {
    log: Arc<Mutex<Log>>,
    refuse_connect: bool,
    reject: Option<String>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn connect(&mut self) -> mailmerge_mail::Result<()> {
        if self.refuse_connect {
            return Err(MailError::Connect("authentication failed".to_string()));
        }
        self.log.lock().unwrap().connects += 1;
        Ok(())
    }

    async fn send(&mut self, email: &Email) -> mailmerge_mail::Result<()> {
        let recipient = email.recipient()?;
        if self.reject.as_deref() == Some(recipient.email.as_str()) {
            return Err(MailError::Smtp("550 mailbox unavailable".to_string()));
        }
        self.log.lock().unwrap().sent.push(email.clone());
        Ok(())
    }

    async fn disconnect(&mut self) -> mailmerge_mail::Result<()> {
        self.log.lock().unwrap().disconnects += 1;
        Ok(())
    }
}

#[async_trait]
impl TransportFactory for RecordingFactory {
    async fn create(
        &self,
        _spec: &TransportSpec,
        _format: BodyFormat,
    ) -> mailmerge::Result<Box<dyn Transport>> {
        Ok(Box::new(RecordingTransport {
            log: self.log.clone(),
            refuse_connect: self.refuse_connect,
            reject: self.reject.clone(),
        }))
    }
}

struct RecordingChannel {
    id: String,
    sender: Option<String>,
    deliveries: Arc<Mutex<Vec<ChannelDelivery>>>,
}

#[async_trait]
impl MessagingChannel for RecordingChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    async fn deliver(&self, delivery: ChannelDelivery) -> mailmerge_mail::Result<()> {
        self.deliveries.lock().unwrap().push(delivery);
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn row(value: Value) -> ContactRow {
    value.as_object().cloned().unwrap()
}

fn config(overrides: Value) -> RecipeConfig {
    let mut config = RecipeConfig::from_value(json!({
        "recipient_column": "email",
        "use_sender_value": true,
        "sender_value": "news@example.com",
        "use_subject_value": true,
        "subject_value": "Hi {{name}}",
        "use_body_value": true,
        "body_value": "Hello {{name}}",
        "body_format": "text",
        "attachment_type": "none",
    }))
    .unwrap();
    if let Value::Object(map) = overrides {
        config.merge(map);
    }
    config
}

fn contacts(rows: Vec<Value>) -> MemoryRowSource {
    MemoryRowSource::new(
        vec![ColumnSchema::string("name"), ColumnSchema::string("email")],
        rows.into_iter().map(row).collect(),
    )
}

async fn run(
    job: MailJob,
    mut source: MemoryRowSource,
) -> (mailmerge::Result<JobSummary>, MemorySink) {
    let mut sink = MemorySink::new();
    let result = job.run(&mut source, &mut sink).await;
    (result, sink)
}

// =============================================================================
// Row outcomes
// =============================================================================

#[tokio::test]
async fn test_single_contact_is_sent() {
    let factory = RecordingFactory::default();
    let job = MailJob::new(config(json!({}))).transports(Arc::new(factory.clone()));

    let (result, sink) = run(job, contacts(vec![json!({"name": "Ana", "email": "a@x.com"})])).await;

    let summary = result.unwrap();
    assert_eq!(summary, JobSummary { sent: 1, succeeded: 1, failed: 0 });
    assert_eq!(sink.rows.len(), 1);
    assert_eq!(sink.rows[0][STATUS_COLUMN], "SUCCESS");
    assert_eq!(sink.rows[0][ERROR_COLUMN], Value::Null);

    let log = factory.log();
    assert_eq!(log.sent[0].subject, "Hi Ana");
    assert_eq!(log.sent[0].body, "Hello Ana\n\n");
    assert_eq!(log.sent[0].from, "news@example.com");
}

#[tokio::test]
async fn test_rows_keep_order_and_columns() {
    let factory = RecordingFactory::default();
    let job = MailJob::new(config(json!({}))).transports(Arc::new(factory.clone()));
    let names = ["Ana", "Bo", "Cy", "Di", "Ed", "Flo", "Gus"];
    let rows = names
        .iter()
        .map(|n| json!({"name": n, "email": format!("{}@x.com", n.to_lowercase())}))
        .collect();

    let (result, sink) = run(job, contacts(rows)).await;

    assert_eq!(result.unwrap().succeeded, names.len());
    for (out, name) in sink.rows.iter().zip(names) {
        assert_eq!(out["name"], name);
        assert_eq!(out["email"], format!("{}@x.com", name.to_lowercase()));
        assert_eq!(out[STATUS_COLUMN], "SUCCESS");
    }
    let recipients: Vec<String> = factory.log().sent.iter().map(|e| e.to.clone()).collect();
    assert_eq!(recipients[0], "ana@x.com");
    assert_eq!(recipients[6], "gus@x.com");

    let schema = sink.schema.unwrap();
    let columns: Vec<&str> = schema.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(columns, vec!["name", "email", STATUS_COLUMN, ERROR_COLUMN]);
}

#[tokio::test]
async fn test_missing_recipient_fails_only_that_row() {
    let factory = RecordingFactory::default();
    let job = MailJob::new(config(json!({}))).transports(Arc::new(factory.clone()));

    let (result, sink) = run(
        job,
        contacts(vec![
            json!({"name": "Ana", "email": "a@x.com"}),
            json!({"name": "Bo", "email": ""}),
            json!({"name": "Cy", "email": "c@x.com"}),
        ]),
    )
    .await;

    assert_eq!(result.unwrap(), JobSummary { sent: 3, succeeded: 2, failed: 1 });
    assert_eq!(sink.rows[1][STATUS_COLUMN], "FAILED");
    let error = sink.rows[1][ERROR_COLUMN].as_str().unwrap();
    assert!(error.contains("recipient"), "unexpected error: {error}");
    assert_eq!(sink.rows[2][STATUS_COLUMN], "SUCCESS");
    assert_eq!(factory.log().sent.len(), 2);
}

#[tokio::test]
async fn test_row_without_recipient_key_fails_only_that_row() {
    let factory = RecordingFactory::default();
    let job = MailJob::new(config(json!({}))).transports(Arc::new(factory.clone()));

    let (result, sink) = run(
        job,
        contacts(vec![
            json!({"name": "Ana", "email": "a@x.com"}),
            json!({"name": "Bo"}),
            json!({"name": "Cy", "email": "c@x.com"}),
        ]),
    )
    .await;

    assert_eq!(result.unwrap(), JobSummary { sent: 3, succeeded: 2, failed: 1 });
    assert_eq!(
        sink.rows[1],
        row(json!({
            "name": "Bo",
            STATUS_COLUMN: "FAILED",
            ERROR_COLUMN: "Missing recipient",
        }))
    );
    for i in [0, 2] {
        assert_eq!(sink.rows[i][STATUS_COLUMN], "SUCCESS");
        assert_eq!(sink.rows[i][ERROR_COLUMN], Value::Null);
    }
    let log = factory.log();
    let recipients: Vec<&str> = log.sent.iter().map(|e| e.to.as_str()).collect();
    assert_eq!(recipients, ["a@x.com", "c@x.com"]);
}

#[tokio::test]
async fn test_undefined_variable_fails_row() {
    let factory = RecordingFactory::default();
    let job = MailJob::new(config(json!({"body_value": "Hello {{ nickname }}"})))
        .transports(Arc::new(factory.clone()));

    let (result, sink) = run(job, contacts(vec![json!({"name": "Ana", "email": "a@x.com"})])).await;

    assert_eq!(result.unwrap().failed, 1);
    assert!(
        sink.rows[0][ERROR_COLUMN]
            .as_str()
            .unwrap()
            .starts_with("Could not render body template")
    );
    assert!(factory.log().sent.is_empty());
}

#[tokio::test]
async fn test_send_failure_is_recorded() {
    let factory = RecordingFactory {
        reject: Some("b@x.com".to_string()),
        ..Default::default()
    };
    let job = MailJob::new(config(json!({}))).transports(Arc::new(factory.clone()));

    let (result, sink) = run(
        job,
        contacts(vec![
            json!({"name": "Bo", "email": "b@x.com"}),
            json!({"name": "Cy", "email": "c@x.com"}),
        ]),
    )
    .await;

    assert_eq!(result.unwrap().failed, 1);
    assert_eq!(sink.rows[0][ERROR_COLUMN], "SMTP error: 550 mailbox unavailable");
    assert_eq!(sink.rows[1][STATUS_COLUMN], "SUCCESS");
}

// =============================================================================
// Job lifecycle
// =============================================================================

#[tokio::test]
async fn test_zero_rows_still_disconnects_once() {
    let factory = RecordingFactory::default();
    let job = MailJob::new(config(json!({}))).transports(Arc::new(factory.clone()));

    let (result, sink) = run(job, contacts(vec![])).await;

    assert_eq!(result.unwrap(), JobSummary::default());
    assert!(sink.schema.is_some());
    let log = factory.log();
    assert_eq!(log.connects, 1);
    assert_eq!(log.disconnects, 1);
}

#[tokio::test]
async fn test_unknown_body_column_writes_nothing() {
    let factory = RecordingFactory::default();
    let job = MailJob::new(config(json!({"use_body_value": false, "body_column": "notes"})))
        .transports(Arc::new(factory.clone()));

    let (result, sink) = run(job, contacts(vec![json!({"name": "Ana", "email": "a@x.com"})])).await;

    assert!(matches!(
        result,
        Err(JobError::Config(ConfigError::UnknownColumn { field: "body", .. }))
    ));
    assert!(sink.schema.is_none());
    assert!(sink.rows.is_empty());
    assert_eq!(factory.log().connects, 0);
}

#[tokio::test]
async fn test_connect_failure_aborts_before_rows() {
    let factory = RecordingFactory {
        refuse_connect: true,
        ..Default::default()
    };
    let job = MailJob::new(config(json!({}))).transports(Arc::new(factory.clone()));

    let (result, sink) = run(job, contacts(vec![json!({"name": "Ana", "email": "a@x.com"})])).await;

    assert!(matches!(result, Err(JobError::TransportConnect(MailError::Connect(_)))));
    assert!(sink.rows.is_empty());
    assert_eq!(factory.log().disconnects, 0);
}

#[tokio::test]
async fn test_template_syntax_error_aborts_job() {
    let job = MailJob::new(config(json!({"subject_value": "Hi {{ name"})))
        .transports(Arc::new(RecordingFactory::default()));

    let (result, sink) = run(job, contacts(vec![json!({"name": "Ana", "email": "a@x.com"})])).await;

    assert!(matches!(result, Err(JobError::Template(_))));
    assert!(sink.schema.is_none());
}

// =============================================================================
// Channels
// =============================================================================

#[tokio::test]
async fn test_channel_sender_overrides_configured_sender() {
    let deliveries = Arc::new(Mutex::new(Vec::new()));
    let registry = StaticChannelRegistry::new().register(RecordingChannel {
        id: "ops-mail".to_string(),
        sender: Some("ops@example.com".to_string()),
        deliveries: deliveries.clone(),
    });
    let job = MailJob::new(config(json!({
        "mail_channel": "ops-mail__|*_S",
        "use_sender_value": false,
        "sender_value": "",
    })))
    .channels(Arc::new(registry));

    let (result, _) = run(job, contacts(vec![json!({"name": "Ana", "email": "a@x.com"})])).await;

    assert_eq!(result.unwrap().succeeded, 1);
    let deliveries = deliveries.lock().unwrap();
    assert_eq!(deliveries[0].sender, None);
    assert_eq!(deliveries[0].recipient, "a@x.com");
    assert_eq!(deliveries[0].body, "Hello Ana\n\n");
    assert!(deliveries[0].plain_text);
}

#[tokio::test]
async fn test_channel_without_sender_gets_configured_sender() {
    let deliveries = Arc::new(Mutex::new(Vec::new()));
    let registry = StaticChannelRegistry::new().register(RecordingChannel {
        id: "relay".to_string(),
        sender: None,
        deliveries: deliveries.clone(),
    });
    let job = MailJob::new(config(json!({"mail_channel": "relay"}))).channels(Arc::new(registry));

    let (result, _) = run(job, contacts(vec![json!({"name": "Ana", "email": "a@x.com"})])).await;

    assert_eq!(result.unwrap().succeeded, 1);
    assert_eq!(
        deliveries.lock().unwrap()[0].sender.as_deref(),
        Some("news@example.com")
    );
}

#[tokio::test]
async fn test_unknown_channel_is_fatal() {
    let job = MailJob::new(config(json!({"mail_channel": "nowhere"})));

    let (result, sink) = run(job, contacts(vec![json!({"name": "Ana", "email": "a@x.com"})])).await;

    assert!(matches!(
        result,
        Err(JobError::TransportConnect(MailError::UnknownChannel(id))) if id == "nowhere"
    ));
    assert!(sink.rows.is_empty());
}

// =============================================================================
// Attachments
// =============================================================================

fn orders() -> MemoryTable {
    MemoryTable::new("SALES", "orders", vec!["id".to_string(), "total".to_string()])
        .with_rows(vec![row(json!({"id": 1, "total": 9.5})), row(json!({"id": 2, "total": 3}))])
        .with_spreadsheet(b"xlsx".to_vec())
}

#[tokio::test]
async fn test_attachments_shared_by_every_message() {
    let factory = RecordingFactory::default();
    let job = MailJob::new(config(json!({
        "attachment_type": "csv",
        "body_value": "{{ name }}: {{ attachments.orders.data | length }} orders",
    })))
    .project_key("SALES")
    .attachment(Arc::new(orders()))
    .transports(Arc::new(factory.clone()));

    let (result, _) = run(
        job,
        contacts(vec![
            json!({"name": "Ana", "email": "a@x.com"}),
            json!({"name": "Bo", "email": "b@x.com"}),
        ]),
    )
    .await;

    assert_eq!(result.unwrap().succeeded, 2);
    let log = factory.log();
    assert_eq!(log.sent[0].body, "Ana: 2 orders\n\n");
    for email in &log.sent {
        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].filename, "SALES.orders.csv");
    }
    assert!(Arc::ptr_eq(&log.sent[0].attachments, &log.sent[1].attachments));
}

#[tokio::test]
async fn test_excel_attachment() {
    let factory = RecordingFactory::default();
    let table = Arc::new(orders());
    let job = MailJob::new(config(json!({
        "attachment_type": "excel",
        "apply_coloring_excel": true,
    })))
    .attachment(table.clone())
    .capabilities(PlatformCapabilities::all())
    .transports(Arc::new(factory.clone()));

    let (result, _) = run(job, contacts(vec![json!({"name": "Ana", "email": "a@x.com"})])).await;

    assert_eq!(result.unwrap().succeeded, 1);
    assert_eq!(factory.log().sent[0].attachments[0].filename, "SALES.orders.xlsx");
    assert_eq!(table.requests(), vec![RawFormat::Spreadsheet { apply_coloring: true }]);
}

#[tokio::test]
async fn test_attachment_fetch_failure_is_fatal() {
    let factory = RecordingFactory::default();
    let job = MailJob::new(config(json!({"attachment_type": "csv"})))
        .attachment(Arc::new(orders().unavailable()))
        .transports(Arc::new(factory.clone()));

    let (result, sink) = run(job, contacts(vec![json!({"name": "Ana", "email": "a@x.com"})])).await;

    assert!(matches!(result, Err(JobError::AttachmentFetch { .. })));
    assert!(sink.rows.is_empty());
    assert_eq!(factory.log().connects, 0);
}
