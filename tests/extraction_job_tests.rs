//! Extraction job tests: the persistence gate, batch contract enforcement,
//! forward progress guarantees, and store-backed status.

mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use intake::config::ExtractionConfig;
use intake::extraction::{ExtractionJob, InferenceError, MessageInference};
use intake::repositories::message::NewMessage;
use intake::repositories::{ExtractedPropertyRepository, MessageRepository};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::json;
use uuid::Uuid;

use test_utils::{MockInference, setup_db};

fn extraction_config() -> ExtractionConfig {
    ExtractionConfig {
        interval_seconds: 300,
        batch_size: 10,
        min_confidence: 0.3,
        autostart: false,
    }
}

async fn seed_message(db: &Arc<DatabaseConnection>, body: &str) -> Uuid {
    let messages = MessageRepository::new(db.clone());
    let model = messages
        .insert_if_new(NewMessage {
            tenant_id: "tenant-a".to_string(),
            group_id: "group-1".to_string(),
            group_name: "group one".to_string(),
            sender: "919876543210".to_string(),
            body: body.to_string(),
            payload: None,
            content_hash: intake::dedup::content_hash(
                &format!("sender-{}", Uuid::new_v4()),
                body,
            ),
            sent_at: Utc::now(),
        })
        .await
        .expect("insert message")
        .expect("not a duplicate");
    model.id
}

fn job_with(
    db: &Arc<DatabaseConnection>,
    inference: Arc<MockInference>,
    config: ExtractionConfig,
) -> Arc<ExtractionJob> {
    ExtractionJob::new(
        MessageRepository::new(db.clone()),
        ExtractedPropertyRepository::new(db.clone()),
        inference,
        config,
    )
}

fn candidate(listing_type: &str, confidence: f64) -> serde_json::Value {
    json!({
        "listing_type": listing_type,
        "property_type": "apartment",
        "location": "HSR Layout",
        "price": 32000,
        "bedrooms": 3,
        "parsing_confidence": confidence
    })
}

#[tokio::test]
async fn confidence_gate_keeps_only_qualifying_candidates() {
    let db = setup_db().await;
    seed_message(&db, "text one").await;
    let target = seed_message(&db, "text two with dual listing").await;
    seed_message(&db, "text three").await;

    // Three results: the second carries two candidates, 0.9 and 0.2.
    let inference = MockInference::new(vec![Ok(vec![
        MessageInference { properties: vec![] },
        MessageInference {
            properties: vec![candidate("rental", 0.9), candidate("sale", 0.2)],
        },
        MessageInference { properties: vec![] },
    ])]);

    let job = job_with(&db, inference, extraction_config());
    let summary = job.run_pass().await.expect("pass succeeds");

    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.extracted, 1);
    assert_eq!(summary.discarded, 1);
    assert!(!summary.batch_failed);

    let records = intake::models::ExtractedProperty::find()
        .all(&*db)
        .await
        .expect("query records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].message_id, target);
    assert_eq!(records[0].listing_type, "rental");
    assert!(records[0].confidence > 0.3);

    // Every fetched message is processed afterwards.
    let messages = MessageRepository::new(db.clone());
    assert_eq!(messages.processed_count().await.unwrap(), 3);
}

#[tokio::test]
async fn unrecognized_listing_type_is_discarded() {
    let db = setup_db().await;
    seed_message(&db, "some listing text").await;

    let inference = MockInference::new(vec![Ok(vec![MessageInference {
        properties: vec![candidate("timeshare", 0.95)],
    }])]);

    let job = job_with(&db, inference, extraction_config());
    let summary = job.run_pass().await.expect("pass succeeds");

    assert_eq!(summary.extracted, 0);
    assert_eq!(summary.discarded, 1);

    let records = intake::models::ExtractedProperty::find()
        .all(&*db)
        .await
        .expect("query records");
    assert!(records.is_empty());
}

#[tokio::test]
async fn count_mismatch_marks_whole_batch_processed() {
    let db = setup_db().await;
    seed_message(&db, "first text").await;
    seed_message(&db, "second text").await;
    seed_message(&db, "third text").await;

    // Contract violation: 3 inputs, 2 results.
    let inference = MockInference::new(vec![Ok(vec![
        MessageInference { properties: vec![candidate("sale", 0.9)] },
        MessageInference { properties: vec![] },
    ])]);

    let job = job_with(&db, inference, extraction_config());
    let summary = job.run_pass().await.expect("pass survives the violation");

    assert!(summary.batch_failed);
    assert_eq!(summary.extracted, 0);

    let messages = MessageRepository::new(db.clone());
    assert_eq!(messages.processed_count().await.unwrap(), 3);
    assert!(
        messages.fetch_unprocessed(10).await.unwrap().is_empty(),
        "a failed batch must leave zero unprocessed messages behind"
    );

    let records = intake::models::ExtractedProperty::find()
        .all(&*db)
        .await
        .expect("query records");
    assert!(records.is_empty(), "no records from an unusable batch");
}

#[tokio::test]
async fn inference_error_marks_whole_batch_processed() {
    let db = setup_db().await;
    seed_message(&db, "first text").await;
    seed_message(&db, "second text").await;

    let inference = MockInference::new(vec![Err(InferenceError::Status {
        status: 503,
        body: "overloaded".to_string(),
    })]);

    let job = job_with(&db, inference, extraction_config());
    let summary = job.run_pass().await.expect("pass survives the error");

    assert!(summary.batch_failed);
    let messages = MessageRepository::new(db.clone());
    assert_eq!(messages.processed_count().await.unwrap(), 2);
}

#[tokio::test]
async fn empty_body_messages_skip_the_inference_call() {
    let db = setup_db().await;
    seed_message(&db, "   ").await;

    let inference = MockInference::new(vec![]);
    let job = job_with(&db, inference.clone(), extraction_config());
    let summary = job.run_pass().await.expect("pass succeeds");

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.without_text, 1);
    assert!(inference.calls().is_empty(), "no inference call for empty text");

    let messages = MessageRepository::new(db.clone());
    assert_eq!(messages.processed_count().await.unwrap(), 1);
}

#[tokio::test]
async fn pass_respects_batch_size_oldest_first() {
    let db = setup_db().await;
    for i in 0..5 {
        seed_message(&db, &format!("listing number {}", i)).await;
    }

    let mut config = extraction_config();
    config.batch_size = 2;

    let inference = MockInference::new(vec![
        Ok(vec![MessageInference::default(), MessageInference::default()]),
        Ok(vec![MessageInference::default(), MessageInference::default()]),
    ]);
    let job = job_with(&db, inference.clone(), config);

    let first = job.run_pass().await.unwrap();
    assert_eq!(first.fetched, 2);
    let second = job.run_pass().await.unwrap();
    assert_eq!(second.fetched, 2);

    let calls = inference.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], vec!["listing number 0", "listing number 1"]);
    assert_eq!(calls[1], vec!["listing number 2", "listing number 3"]);
}

#[tokio::test]
async fn start_is_idempotent_and_stop_cancels() {
    let db = setup_db().await;
    let inference = MockInference::new(vec![]);
    let job = job_with(&db, inference, extraction_config());

    assert!(job.start(Some(Duration::from_secs(300))));
    assert!(!job.start(None), "second start must be refused");
    assert!(job.is_running());

    assert!(job.stop());
    assert!(!job.stop(), "stopping a stopped job is a no-op");
}

#[tokio::test]
async fn status_reports_store_backed_aggregates() {
    let db = setup_db().await;
    seed_message(&db, "first listing").await;
    seed_message(&db, "second listing").await;

    let inference = MockInference::new(vec![Ok(vec![
        MessageInference { properties: vec![candidate("rental", 0.8)] },
        MessageInference { properties: vec![candidate("sale", 0.6)] },
    ])]);

    let job = job_with(&db, inference, extraction_config());

    let before = job.status().await.expect("status");
    assert!(!before.running);
    assert_eq!(before.total_messages, 2);
    assert_eq!(before.processed_messages, 0);
    assert_eq!(before.extracted_records, 0);

    job.run_pass().await.expect("pass succeeds");

    let after = job.status().await.expect("status");
    assert_eq!(after.processed_messages, 2);
    assert_eq!(after.extracted_records, 2);
    let mean = after.mean_confidence.expect("mean confidence");
    assert!((mean - 0.7).abs() < 0.01);
}
