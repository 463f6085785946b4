use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
}

/// A resumable analysis session over one ticket file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: Uuid,
    pub tickets: Vec<Record>,
    /// Index of the next ticket not yet covered by a successful batch.
    pub cursor: usize,
    pub results: Vec<Value>,
    pub state: JobState,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl AnalysisJob {
    pub fn new(tickets: Vec<Record>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tickets,
            cursor: 0,
            results: Vec::new(),
            state: JobState::Idle,
            last_error: None,
        }
    }

    pub fn can_run(&self) -> bool {
        matches!(
            self.state,
            JobState::Idle | JobState::Paused | JobState::Stopped
        )
    }

    pub fn total_batches(&self, batch_size: usize) -> usize {
        self.tickets.len().div_ceil(batch_size.max(1))
    }

    /// Percentage of tickets covered, rounded, capped at 100.
    pub fn progress_percent(&self) -> u8 {
        if self.tickets.is_empty() {
            return 100;
        }
        let percent = (self.cursor as f64 / self.tickets.len() as f64 * 100.0).round();
        percent.min(100.0) as u8
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(path, body)
            .with_context(|| format!("failed to write checkpoint {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read checkpoint {}", path.display()))?;
        let job = serde_json::from_str(&body)
            .with_context(|| format!("checkpoint {} is not a saved job", path.display()))?;
        Ok(job)
    }
}

/// Shared pause request, honoured between batches.
#[derive(Debug, Clone, Default)]
pub struct PauseSignal(Arc<AtomicBool>);

impl PauseSignal {
    /// Raises the request. Returns `true` when one was already pending.
    pub fn request(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Consumes a pending request, returning whether there was one.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}
