//! Batched ticket analysis against a completion endpoint.
//!
//! Tickets go out in fixed-size batches, one request in flight at a time.
//! Each batch is retried under the [`RetryPolicy`]; a batch that exhausts its
//! attempts stops the run with cursor and results intact so a later `run`
//! picks up at the same batch. Pause requests are honoured between batches.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::completion::CompletionClient;
use crate::error::CompletionError;
use crate::job::{AnalysisJob, JobState, PauseSignal};
use crate::models::Record;
use crate::retry::{Attempt, RetryPolicy};

pub const BATCH_SIZE: usize = 15;

pub const EXTRACTION_FIELDS: [&str; 6] = [
    "ticket_id",
    "website_issue",
    "reason_not_buying",
    "angry_reason",
    "device_quality",
    "pricing_topic",
];

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    BatchStarted {
        batch: usize,
        total_batches: usize,
        tickets: usize,
    },
    AttemptFailed {
        batch: usize,
        attempt: u32,
        retry_in: Duration,
        message: String,
    },
    BatchSucceeded {
        batch: usize,
        extracted: usize,
        progress: u8,
    },
    Paused {
        cursor: usize,
    },
    Stopped {
        batch: usize,
        attempts: u32,
        message: String,
    },
    Completed {
        results: usize,
    },
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::BatchStarted {
                batch,
                total_batches,
                tickets,
            } => write!(
                f,
                "Sending batch {batch}/{total_batches} ({tickets} tickets)..."
            ),
            PipelineEvent::AttemptFailed {
                batch,
                attempt,
                retry_in,
                ..
            } => write!(
                f,
                "Batch {batch} failed (Attempt {attempt}). Retrying in {}s...",
                retry_in.as_secs()
            ),
            PipelineEvent::BatchSucceeded {
                batch,
                extracted,
                progress,
            } => write!(
                f,
                "Batch {batch} success. Extracted {extracted} items. ({progress}%)"
            ),
            PipelineEvent::Paused { cursor } => {
                write!(f, "Paused by user after {cursor} tickets.")
            }
            PipelineEvent::Stopped {
                batch,
                attempts,
                message,
            } => write!(
                f,
                "Stopped at batch {batch} due to error: {message}. Processing paused after {attempts} attempts."
            ),
            PipelineEvent::Completed { results } => {
                write!(f, "All batches processed. {results} results.")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Paused,
    Stopped { message: String },
}

pub fn build_prompt(batch: &[Record]) -> String {
    let tickets = serde_json::to_string(batch).unwrap_or_else(|_| "[]".to_string());
    let fields: String = EXTRACTION_FIELDS
        .iter()
        .map(|field| format!("- {field}\n"))
        .collect();

    format!(
        "Analyze the following customer service tickets.\n\
         For each ticket, extract the information into the specific JSON format provided in the schema.\n\
         \n\
         FIELDS:\n\
         {fields}\
         \n\
         TICKETS:\n\
         {tickets}\n\
         \n\
         OUTPUT MUST BE A RAW JSON ARRAY. DO NOT ADD MARKDOWN.\n"
    )
}

/// Model output must be a bare JSON array; fenced or wrapped output is rejected.
pub fn parse_batch(text: &str) -> Result<Vec<Value>, CompletionError> {
    serde_json::from_str(text).map_err(CompletionError::NotJsonArray)
}

pub struct Pipeline<C> {
    client: C,
    config: PipelineConfig,
    events: Option<UnboundedSender<PipelineEvent>>,
}

impl<C: CompletionClient> Pipeline<C> {
    pub fn new(client: C, config: PipelineConfig) -> Self {
        Self {
            client,
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Drives `job` from its cursor until it completes, pauses or stops.
    pub async fn run(&self, job: &mut AnalysisJob, model: &str, pause: &PauseSignal) -> RunOutcome {
        if !job.can_run() {
            return RunOutcome::Completed;
        }

        let batch_size = self.config.batch_size.max(1);
        let total = job.tickets.len();
        let total_batches = job.total_batches(batch_size);

        pause.take();
        job.state = JobState::Running;
        job.last_error = None;
        info!(job = %job.id, cursor = job.cursor, total, "analysis running");

        while job.cursor < total {
            if pause.take() {
                job.state = JobState::Paused;
                info!(job = %job.id, cursor = job.cursor, "analysis paused");
                self.emit(PipelineEvent::Paused { cursor: job.cursor });
                return RunOutcome::Paused;
            }

            let start = job.cursor;
            let end = (start + batch_size).min(total);
            let batch = start / batch_size + 1;
            let prompt = build_prompt(&job.tickets[start..end]);

            info!(batch, total_batches, tickets = end - start, "sending batch");
            self.emit(PipelineEvent::BatchStarted {
                batch,
                total_batches,
                tickets: end - start,
            });

            let client = &self.client;
            let prompt = prompt.as_str();
            let attempt = self
                .config
                .retry
                .run(
                    move |_| async move { parse_batch(&client.complete(model, prompt).await?) },
                    |attempt, err: &CompletionError, retry_in| {
                        warn!(batch, attempt, error = %err, "batch attempt failed");
                        self.emit(PipelineEvent::AttemptFailed {
                            batch,
                            attempt,
                            retry_in,
                            message: err.to_string(),
                        });
                    },
                )
                .await;

            match attempt {
                Attempt::Succeeded { value, .. } => {
                    let extracted = value.len();
                    job.results.extend(value);
                    job.cursor = end;
                    let progress = job.progress_percent();
                    info!(batch, extracted, progress, "batch succeeded");
                    self.emit(PipelineEvent::BatchSucceeded {
                        batch,
                        extracted,
                        progress,
                    });
                }
                Attempt::Exhausted { error: err, attempts } => {
                    let message = err.to_string();
                    error!(batch, attempts, error = %message, "batch failed, analysis stopped");
                    job.state = JobState::Stopped;
                    job.last_error = Some(message.clone());
                    self.emit(PipelineEvent::Stopped {
                        batch,
                        attempts,
                        message: message.clone(),
                    });
                    return RunOutcome::Stopped { message };
                }
            }
        }

        job.state = JobState::Completed;
        info!(job = %job.id, results = job.results.len(), "analysis complete");
        self.emit(PipelineEvent::Completed {
            results: job.results.len(),
        });
        RunOutcome::Completed
    }
}
