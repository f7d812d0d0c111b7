//! Append-only history store with file-based persistence.
//!
//! Histories are stored as newline-delimited JSON (JSONL), one directory per
//! workflow, for simplicity and easy debugging/inspection.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::domain::{History, HistoryEvent, HistoryEventType};

use super::error::CoordinationError;

/// File-based history store using JSONL format
pub struct HistoryStore {
    /// Directory containing the workflow's files
    workflow_dir: PathBuf,

    /// Path to the history.jsonl file
    history_path: PathBuf,
}

impl HistoryStore {
    /// Create or open the store for a workflow under the configured home
    pub async fn open(workflow_id: &str) -> Result<Self> {
        let base_dir = Self::base_directory()?;
        Self::open_at(&base_dir, workflow_id).await
    }

    /// Create or open the store for a workflow under an explicit base directory
    pub async fn open_at(base_dir: &Path, workflow_id: &str) -> Result<Self> {
        validate_workflow_id(workflow_id)?;

        let workflow_dir = base_dir.join(workflow_id);
        fs::create_dir_all(&workflow_dir)
            .await
            .with_context(|| format!("Failed to create history directory: {}", workflow_dir.display()))?;

        let history_path = workflow_dir.join("history.jsonl");

        Ok(Self {
            workflow_dir,
            history_path,
        })
    }

    /// Get the base directory for all histories (~/.signalflow/histories or $SIGNALFLOW_HOME/histories)
    pub fn base_directory() -> Result<PathBuf> {
        crate::config::histories_dir()
    }

    /// Get the path to the history file
    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    /// Get the workflow directory
    pub fn workflow_dir(&self) -> &Path {
        &self.workflow_dir
    }

    /// Append an event to the log
    pub async fn append(&self, event: &HistoryEvent) -> Result<()> {
        self.append_all(std::slice::from_ref(event)).await
    }

    /// Append events to the log in order
    pub async fn append_all(&self, events: &[HistoryEvent]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open history file: {}",
                    self.history_path.display()
                )
            })?;

        write_events(file, events).await
    }

    /// Persist a whole workflow history, replacing whatever was stored before.
    ///
    /// Sequences restart at 1 for every run, so a second run under the same
    /// workflow id overwrites the first rather than extending it.
    pub async fn save(&self, history: &History) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.history_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open history file: {}",
                    self.history_path.display()
                )
            })?;

        write_events(file, history.events()).await
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<HistoryEvent>> {
        if !self.history_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.history_path)
            .await
            .with_context(|| format!("Failed to open history file: {}", self.history_path.display()))?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut events = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: HistoryEvent = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse history event: {}", line))?;
            events.push(event);
        }

        Ok(events)
    }

    /// Load the persisted history
    pub async fn load(&self) -> Result<History> {
        Ok(History::from_events(self.replay().await?))
    }

    /// Get the last event of a specific type
    pub async fn last_event_of_type(&self, event_type: HistoryEventType) -> Result<Option<HistoryEvent>> {
        let events = self.replay().await?;
        Ok(events.into_iter().rev().find(|e| e.event_type == event_type))
    }

    /// List all workflow ids with a persisted history under a base directory
    pub async fn list_workflows(base_dir: &Path) -> Result<Vec<String>> {
        if !base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut workflows = Vec::new();
        let mut entries = fs::read_dir(base_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() && entry.path().join("history.jsonl").exists() {
                if let Some(name) = entry.file_name().to_str() {
                    workflows.push(name.to_string());
                }
            }
        }

        workflows.sort();
        Ok(workflows)
    }
}

async fn write_events(mut file: File, events: &[HistoryEvent]) -> Result<()> {
    for event in events {
        let json = serde_json::to_string(event).context("Failed to serialize history event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write history event")?;
    }
    file.flush().await.context("Failed to flush history")?;

    Ok(())
}

/// Reject workflow ids that would escape the histories directory
fn validate_workflow_id(workflow_id: &str) -> Result<(), CoordinationError> {
    let invalid = workflow_id.is_empty()
        || workflow_id == "."
        || workflow_id.contains("..")
        || workflow_id.contains('/')
        || workflow_id.contains('\\');

    if invalid {
        return Err(CoordinationError::InvalidWorkflowId(workflow_id.to_string()));
    }
    Ok(())
}
