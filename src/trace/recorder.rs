//! Trace recorder implementation

use crate::error::{Result, TraceError};
use crate::trace::ExecutionTrace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

/// Records completed execution traces for debugging and analysis
///
/// The recorder is a persistence sink: each execution owns its trace while
/// it runs and hands a copy over at finalization. With a file configured,
/// the archive is rewritten after every recorded trace.
pub struct TraceRecorder {
    traces: RwLock<Vec<ExecutionTrace>>,
    file_path: Option<PathBuf>,
    auto_save: bool,
}

/// Archive of recorded traces, as persisted to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceArchive {
    /// Metadata about the archive
    pub metadata: TraceArchiveMetadata,

    /// All recorded traces
    pub traces: Vec<ExecutionTrace>,
}

/// Metadata for a trace archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceArchiveMetadata {
    /// Unique identifier for this archive
    pub id: String,

    /// When the archive was written
    pub saved_at: DateTime<Utc>,

    /// Version of the archive format
    pub version: String,

    /// Total number of recorded traces
    pub total_traces: usize,

    /// Total number of steps across all traces
    pub total_steps: usize,
}

impl TraceRecorder {
    /// Create a new in-memory recorder
    pub fn new() -> Self {
        Self {
            traces: RwLock::new(Vec::new()),
            file_path: None,
            auto_save: false,
        }
    }

    /// Create a recorder that saves to a file
    pub fn with_file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            traces: RwLock::new(Vec::new()),
            file_path: Some(path.as_ref().to_path_buf()),
            auto_save: true,
        }
    }

    /// Create a recorder with an auto-generated filename under `traces/`
    pub fn with_auto_filename() -> Self {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("trace_{}.json", timestamp);

        let traces_dir = Path::new("traces");
        if !traces_dir.exists() {
            std::fs::create_dir_all(traces_dir).ok();
        }

        Self::with_file(traces_dir.join(filename))
    }

    /// Record a completed execution trace
    pub async fn record(&self, trace: &ExecutionTrace) -> Result<()> {
        {
            let mut traces = self.traces.write().await;
            traces.push(trace.clone());
        }

        if self.auto_save {
            self.save().await?;
        }

        Ok(())
    }

    /// Get all recorded traces
    pub async fn traces(&self) -> Vec<ExecutionTrace> {
        self.traces.read().await.clone()
    }

    /// Get the number of recorded traces
    pub async fn trace_count(&self) -> usize {
        self.traces.read().await.len()
    }

    /// Save the archive to file
    pub async fn save(&self) -> Result<()> {
        if let Some(path) = &self.file_path {
            let archive = self.build_archive().await;
            let json = serde_json::to_string_pretty(&archive).map_err(|e| {
                TraceError::RecordingFailed {
                    message: format!("Failed to serialize trace archive: {}", e),
                }
            })?;

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }

            fs::write(path, json).await?;
        }

        Ok(())
    }

    /// Load a trace archive from file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<TraceArchive> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(TraceError::LoadFailed {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = fs::read_to_string(path).await?;
        let archive: TraceArchive =
            serde_json::from_str(&content).map_err(|_| TraceError::InvalidFormat)?;

        Ok(archive)
    }

    async fn build_archive(&self) -> TraceArchive {
        let traces = self.traces.read().await.clone();
        let total_steps = traces.iter().map(|t| t.len()).sum();

        let metadata = TraceArchiveMetadata {
            id: uuid::Uuid::new_v4().to_string(),
            saved_at: Utc::now(),
            version: "1.0".to_string(),
            total_traces: traces.len(),
            total_steps,
        };

        TraceArchive { metadata, traces }
    }

    /// Clear all recorded traces
    pub async fn clear(&self) {
        let mut traces = self.traces.write().await;
        traces.clear();
    }

    /// Get the file path if set
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{Step, StepAction};

    fn sample_trace(id: &str) -> ExecutionTrace {
        let mut trace = ExecutionTrace::new(id.to_string(), "sample task".to_string());
        trace.steps.push(Step {
            index: 1,
            thought: "thinking".to_string(),
            action: StepAction::FinalAnswer {
                content: "done".to_string(),
            },
            observation: None,
            timestamp: Utc::now(),
            duration_ms: 5,
        });
        trace.completed_at = Some(Utc::now());
        trace
    }

    #[tokio::test]
    async fn records_traces_in_order() {
        let recorder = TraceRecorder::new();
        recorder.record(&sample_trace("a")).await.unwrap();
        recorder.record(&sample_trace("b")).await.unwrap();

        let traces = recorder.traces().await;
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].execution_id, "a");
        assert_eq!(traces[1].execution_id, "b");
    }

    #[tokio::test]
    async fn archive_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.json");

        let recorder = TraceRecorder::with_file(&path);
        recorder.record(&sample_trace("persisted")).await.unwrap();

        let archive = TraceRecorder::load(&path).await.unwrap();
        assert_eq!(archive.metadata.total_traces, 1);
        assert_eq!(archive.metadata.total_steps, 1);
        assert_eq!(archive.traces[0].execution_id, "persisted");
    }

    #[tokio::test]
    async fn loading_missing_file_fails() {
        let result = TraceRecorder::load("/nonexistent/archive.json").await;
        assert!(result.is_err());
    }
}
