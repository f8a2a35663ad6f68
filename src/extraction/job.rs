//! # Extraction Job
//!
//! Recurring, cancellable background task that pulls stored-but-unprocessed
//! messages in batches, calls the inference service, validates/normalizes
//! the results, and persists extracted property records.
//!
//! Forward progress is guaranteed batch by batch: every fetched message is
//! marked processed by the end of its pass, whether enrichment succeeded,
//! produced nothing, or the whole batch failed the inference contract.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use metrics::{counter, histogram};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::ExtractionConfig;
use crate::extraction::inference::InferenceClient;
use crate::extraction::normalize::normalize_candidate;
use crate::models::message::Model as MessageModel;
use crate::repositories::extracted_property::NewExtractedProperty;
use crate::repositories::{ExtractedPropertyRepository, MessageRepository};

/// Outcome of one extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct PassSummary {
    /// Messages fetched from the unprocessed queue
    pub fetched: usize,
    /// Messages without text, marked processed without an inference call
    pub without_text: usize,
    /// Property records persisted
    pub extracted: usize,
    /// Candidates discarded by the listing-type/confidence gate
    pub discarded: usize,
    /// Whether the batch failed the inference contract and was marked
    /// processed wholesale
    pub batch_failed: bool,
}

/// Job status reported from the durable store, accurate across restarts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobStatus {
    /// Whether the recurring timer is currently active
    pub running: bool,
    /// Total stored messages
    pub total_messages: u64,
    /// Messages the job has attempted
    pub processed_messages: u64,
    /// Total extracted property records
    pub extracted_records: u64,
    /// Mean parsing confidence over all extracted records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_confidence: Option<f64>,
}

struct RunningJob {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Background extraction service.
pub struct ExtractionJob {
    messages: MessageRepository,
    properties: ExtractedPropertyRepository,
    inference: Arc<dyn InferenceClient>,
    config: ExtractionConfig,
    // Weak handle to our own Arc so `start` can hand the loop task an
    // owning reference.
    self_ref: Weak<ExtractionJob>,
    runtime: Mutex<Option<RunningJob>>,
}

impl ExtractionJob {
    pub fn new(
        messages: MessageRepository,
        properties: ExtractedPropertyRepository,
        inference: Arc<dyn InferenceClient>,
        config: ExtractionConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            messages,
            properties,
            inference,
            config,
            self_ref: self_ref.clone(),
            runtime: Mutex::new(None),
        })
    }

    /// Start the recurring job: one pass immediately, then on a fixed timer.
    ///
    /// Idempotent start: returns `false` without side effects when the job
    /// is already running. `interval` overrides the configured cadence.
    pub fn start(&self, interval: Option<Duration>) -> bool {
        let mut guard = self.runtime.lock().expect("runtime lock");
        if let Some(running) = guard.as_ref()
            && !running.task.is_finished()
        {
            return false;
        }

        let interval = interval.unwrap_or(Duration::from_secs(self.config.interval_seconds));
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let Some(job) = self.self_ref.upgrade() else {
            return false;
        };

        let task = tokio::spawn(async move {
            info!(interval_seconds = interval.as_secs(), "Extraction job started");
            job.tick().await;

            loop {
                tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    _ = sleep(interval) => job.tick().await,
                }
            }

            info!("Extraction job stopped");
        });

        *guard = Some(RunningJob { cancel, task });
        true
    }

    /// Cancel the timer. An in-flight pass is allowed to finish; nothing is
    /// aborted. Returns `false` when the job was not running.
    pub fn stop(&self) -> bool {
        let mut guard = self.runtime.lock().expect("runtime lock");
        match guard.take() {
            Some(running) => {
                running.cancel.cancel();
                !running.task.is_finished()
            }
            None => false,
        }
    }

    /// Whether the recurring timer is active.
    pub fn is_running(&self) -> bool {
        let guard = self.runtime.lock().expect("runtime lock");
        guard
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    async fn tick(&self) {
        let started = Instant::now();
        match self.run_pass().await {
            Ok(summary) => {
                debug!(
                    fetched = summary.fetched,
                    without_text = summary.without_text,
                    extracted = summary.extracted,
                    discarded = summary.discarded,
                    batch_failed = summary.batch_failed,
                    "Extraction pass completed"
                );
            }
            Err(err) => {
                // The loop outlives individual failures; the next tick retries.
                error!(error = %err, "Extraction pass failed");
                counter!("extraction_pass_failures_total").increment(1);
            }
        }
        histogram!("extraction_pass_duration_ms")
            .record(started.elapsed().as_secs_f64() * 1_000.0);
    }

    /// Execute one extraction pass over at most `batch_size` messages.
    pub async fn run_pass(&self) -> anyhow::Result<PassSummary> {
        let batch = self.messages.fetch_unprocessed(self.config.batch_size).await?;
        let mut summary = PassSummary {
            fetched: batch.len(),
            ..PassSummary::default()
        };

        if batch.is_empty() {
            return Ok(summary);
        }

        let (with_text, without_text): (Vec<MessageModel>, Vec<MessageModel>) = batch
            .into_iter()
            .partition(|message| !message.body.trim().is_empty());

        // Nothing to enrich in empty-bodied rows; mark them done immediately.
        if !without_text.is_empty() {
            let ids: Vec<Uuid> = without_text.iter().map(|m| m.id).collect();
            self.messages.mark_processed(&ids).await?;
            summary.without_text = ids.len();
        }

        if with_text.is_empty() {
            return Ok(summary);
        }

        let texts: Vec<String> = with_text.iter().map(|m| m.body.clone()).collect();

        let results = match self.inference.batch_infer(&texts).await {
            Ok(results) if results.len() == texts.len() => results,
            Ok(results) => {
                // Contract violation: the batch is unusable, but it must not
                // wedge the queue. Mark everything processed and move on.
                error!(
                    expected = texts.len(),
                    received = results.len(),
                    "Inference result count mismatch, marking batch processed"
                );
                self.fail_batch(&with_text).await?;
                summary.batch_failed = true;
                return Ok(summary);
            }
            Err(err) => {
                error!(error = %err, "Batch inference call failed, marking batch processed");
                self.fail_batch(&with_text).await?;
                summary.batch_failed = true;
                return Ok(summary);
            }
        };

        for (message, result) in with_text.iter().zip(results) {
            let raw_response = serde_json::to_value(&result).ok();

            for candidate_raw in &result.properties {
                let candidate = normalize_candidate(candidate_raw);

                // Persistence gate: recognized listing type and confidence
                // strictly above the floor.
                let Some(listing_type) = candidate.listing_type else {
                    summary.discarded += 1;
                    counter!("extraction_candidates_discarded_total").increment(1);
                    continue;
                };
                if candidate.confidence <= self.config.min_confidence {
                    summary.discarded += 1;
                    counter!("extraction_candidates_discarded_total").increment(1);
                    continue;
                }

                let record = NewExtractedProperty {
                    message_id: message.id,
                    tenant_id: message.tenant_id.clone(),
                    listing_type: listing_type.as_str().to_string(),
                    property_type: candidate
                        .property_type
                        .map(|p| p.as_str().to_string()),
                    location: candidate.location,
                    price: candidate.price,
                    bedrooms: candidate.bedrooms,
                    bathrooms: candidate.bathrooms,
                    area_sqft: candidate.area_sqft,
                    furnishing: candidate.furnishing.map(|f| f.as_str().to_string()),
                    parking: candidate.parking,
                    parking_count: candidate.parking_count,
                    contact: candidate.contact,
                    confidence: candidate.confidence,
                    raw_response: raw_response.clone(),
                };

                match self.properties.insert(record).await {
                    Ok(_) => {
                        summary.extracted += 1;
                        counter!("extraction_records_saved_total").increment(1);
                    }
                    Err(err) => {
                        // Isolated to this message; the rest of the batch
                        // continues.
                        warn!(
                            message_id = %message.id,
                            tenant_id = %message.tenant_id,
                            error = %err,
                            "Failed to persist extracted property"
                        );
                        counter!("extraction_record_save_failures_total").increment(1);
                    }
                }
            }

            // Exactly once per message, regardless of candidate outcomes.
            self.messages.mark_processed(&[message.id]).await?;
        }

        counter!("extraction_passes_total").increment(1);
        Ok(summary)
    }

    /// Report job status from the durable store.
    pub async fn status(&self) -> anyhow::Result<JobStatus> {
        let total_messages = self.messages.total_count().await?;
        let processed_messages = self.messages.processed_count().await?;
        let aggregates = self.properties.aggregates().await?;

        Ok(JobStatus {
            running: self.is_running(),
            total_messages,
            processed_messages,
            extracted_records: aggregates.total_records,
            mean_confidence: aggregates.mean_confidence,
        })
    }

    async fn fail_batch(&self, batch: &[MessageModel]) -> anyhow::Result<()> {
        counter!("extraction_batches_failed_total").increment(1);
        let ids: Vec<Uuid> = batch.iter().map(|m| m.id).collect();
        self.messages.mark_processed(&ids).await?;
        Ok(())
    }
}
