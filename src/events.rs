// Copy-completed notifications
//
// The core hands back plain `CopyCompletedEvent` values; publishing them is
// done through an `EventSink`:
// - TracingSink: writes the event to the log
// - JsonLinesSink: appends one JSON object per event to a file for the host

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::copy::PathPair;
use crate::error::{Result, CopySubsError};

/// Emitted once per video folder whose copy unit ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyCompletedEvent {
    /// Opaque identifier of the originating download
    pub download_id: String,
    /// Folder the subtitles were taken from
    pub source_dir: PathBuf,
    /// Video folder the subtitles were copied into
    pub dest_dir: PathBuf,
    /// Files actually copied, possibly none
    pub path_pairs: Vec<PathPair>,
    pub completed_at: DateTime<Utc>,
}

impl CopyCompletedEvent {
    pub fn new(download_id: impl Into<String>, source_dir: PathBuf, dest_dir: PathBuf, path_pairs: Vec<PathPair>) -> Self {
        Self {
            download_id: download_id.into(),
            source_dir,
            dest_dir,
            path_pairs,
            completed_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &CopyCompletedEvent) -> Result<()>;
}

pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn publish(&self, event: &CopyCompletedEvent) -> Result<()> {
        info!(
            download_id = %event.download_id,
            copied = event.path_pairs.len(),
            "Copied subtitles from {} to {}",
            event.source_dir.display(),
            event.dest_dir.display()
        );
        Ok(())
    }
}

pub struct JsonLinesSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl EventSink for JsonLinesSink {
    async fn publish(&self, event: &CopyCompletedEvent) -> Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| CopySubsError::Event(format!("cannot open {}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Collects events in memory; handy for hosts that poll and for tests.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<CopyCompletedEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<CopyCompletedEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn publish(&self, event: &CopyCompletedEvent) -> Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
