// Arrangement progress tracing
// Append-only JSONL trace, one file per request, read by the surrounding job runner

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stages of one arrangement request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Import,
    MelodySelection,
    ChorusDetection,
    Accompaniment,
    HandSplit,
    Export,
}

impl Stage {
    /// Overall progress when this stage completes
    pub fn progress(&self) -> f32 {
        match self {
            Stage::Import => 0.15,
            Stage::MelodySelection => 0.3,
            Stage::ChorusDetection => 0.5,
            Stage::Accompaniment => 0.7,
            Stage::HandSplit => 0.85,
            Stage::Export => 1.0,
        }
    }
}

/// A single line of the trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// RFC 3339 timestamp
    pub timestamp: String,

    pub task_id: String,

    pub stage: Stage,

    /// Overall request progress [0.0, 1.0]
    pub progress: f32,

    pub message: String,

    /// Optional structured data (note counts, paths)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    /// Entry marking a completed stage
    pub fn completed(task_id: &str, stage: Stage, message: impl Into<String>) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            task_id: task_id.to_string(),
            stage,
            progress: stage.progress(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize to a JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Appends trace entries to a JSONL file
pub struct TraceWriter {
    task_id: String,
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(task_id: impl Into<String>, file_path: PathBuf) -> Self {
        TraceWriter {
            task_id: task_id.into(),
            file_path,
        }
    }

    /// Append an entry, creating the file if needed
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        file.write_all(entry.to_json_line()?.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Record a completed stage; failures are logged, never fatal to the request
    pub fn stage(&self, stage: Stage, message: impl Into<String>, data: Option<serde_json::Value>) {
        let mut entry = TraceEntry::completed(&self.task_id, stage, message);
        if let Some(data) = data {
            entry = entry.with_data(data);
        }
        if let Err(e) = self.write(&entry) {
            log::warn!("Failed to write trace entry to {}: {}", self.file_path.display(), e);
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(line)?);
    }

    Ok(entries)
}
