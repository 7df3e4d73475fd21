//! End-to-end runs over CSV files.

use async_trait::async_trait;
use mailmerge::mailmerge_config::RecipeConfig;
use mailmerge::mailmerge_mail::{ChannelDelivery, MessagingChannel, StaticChannelRegistry};
use mailmerge::{CsvOutputSink, CsvRowSource, CsvTable, MailJob};
use std::fs;
use std::sync::{Arc, Mutex};

struct Outbox {
    deliveries: Arc<Mutex<Vec<ChannelDelivery>>>,
}

#[async_trait]
impl MessagingChannel for Outbox {
    fn id(&self) -> &str {
        "outbox"
    }

    fn sender(&self) -> Option<&str> {
        Some("outbox@example.com")
    }

    async fn deliver(&self, delivery: ChannelDelivery) -> mailmerge_mail::Result<()> {
        self.deliveries.lock().unwrap().push(delivery);
        Ok(())
    }
}

#[tokio::test]
async fn test_contacts_file_to_outcomes_file() {
    let dir = tempfile::tempdir().unwrap();
    let contacts_path = dir.path().join("contacts.csv");
    let orders_path = dir.path().join("orders.csv");
    let job_path = dir.path().join("job.toml");
    let output_path = dir.path().join("outcomes.csv");

    fs::write(&contacts_path, "name,email\nAna,a@x.com\nBo,\n").unwrap();
    fs::write(&orders_path, "id,total\n1,9.5\n").unwrap();
    fs::write(
        &job_path,
        r#"
recipient_column = "email"
mail_channel = "outbox__|*_S"
use_subject_value = true
subject_value = "Orders for {{ name }}"
use_body_value = true
body_format = "html"
html_body_value = "<p>{{ name }}</p>{{ attachments.orders.html_table }}"
attachment_type = "csv"
"#,
    )
    .unwrap();

    let deliveries = Arc::new(Mutex::new(Vec::new()));
    let registry = StaticChannelRegistry::new().register(Outbox {
        deliveries: deliveries.clone(),
    });

    let job = MailJob::new(RecipeConfig::from_file(&job_path).unwrap())
        .project_key("LOCAL")
        .attachment(Arc::new(CsvTable::open(&orders_path, "LOCAL").unwrap()))
        .channels(Arc::new(registry));

    let mut contacts = CsvRowSource::open(&contacts_path).unwrap();
    let mut output = CsvOutputSink::create(&output_path).unwrap();
    let summary = job.run(&mut contacts, &mut output).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);

    let written = fs::read_to_string(&output_path).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines[0], "name,email,sendmail_status,sendmail_error");
    assert_eq!(lines[1], "Ana,a@x.com,SUCCESS,");
    assert_eq!(lines[2], "Bo,,FAILED,Missing recipient");

    let deliveries = deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].subject, "Orders for Ana");
    assert!(!deliveries[0].plain_text);
    assert!(deliveries[0].body.starts_with("<p>Ana</p><table border=\"0\" class=\"dataframe\">"));
    assert_eq!(deliveries[0].attachments[0].filename, "LOCAL.orders.csv");
    assert_eq!(deliveries[0].attachments[0].data, b"id\ttotal\n1\t9.5\n".to_vec());
}
