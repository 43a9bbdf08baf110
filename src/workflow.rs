use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::Config;
use crate::copy::{is_forced_location, CopyOrchestrator, CopyPlan};
use crate::error::{Result, CopySubsError};
use crate::events::{CopyCompletedEvent, EventSink, TracingSink};
use crate::language::{LanguageScorer, TargetLanguage, WhatlangScorer};
use crate::scan::FolderScanner;
use crate::scoring::ScoringEngine;
use crate::selector::{CandidateSelector, ScoredCandidate, Selection};

/// One entry of the host's declared file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredFile {
    pub path: PathBuf,
}

/// A finished download as reported by the host.
#[derive(Debug, Clone)]
pub struct DownloadFinished {
    pub download_id: String,
    /// Directory the download was saved to
    pub location: PathBuf,
    pub files: Vec<DeclaredFile>,
}

pub struct Workflow {
    config: Arc<Config>,
    target: TargetLanguage,
    scorer: Arc<dyn LanguageScorer>,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let target = config.target_language()?;
        if target.detector_lang().is_none() {
            warn!(
                "No content detection available for '{}'; only filename tags will identify it",
                config.lang
            );
        }

        Ok(Self {
            config: Arc::new(config),
            target,
            scorer: Arc::new(WhatlangScorer::new()),
            sinks: vec![Arc::new(TracingSink)],
        })
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn LanguageScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Find video folders for a finished download, pick subtitles for each and copy them.
    ///
    /// Scoring runs per video folder on the blocking pool; copies run on a
    /// pool bounded by `copy.workers`. Every copy unit yields one event,
    /// which is published to all sinks and returned.
    pub async fn handle_download(&self, download: &DownloadFinished) -> Result<Vec<CopyCompletedEvent>> {
        let location = download.location.clone();
        if !location.is_dir() {
            return Err(CopySubsError::NotFound(location));
        }

        let forced = is_forced_location(&location, &self.config.forced_marker);
        info!(
            "Download {} finished in {} (forced: {})",
            download.download_id,
            location.display(),
            forced
        );

        let video_folders = self.video_folders(&location, &download.files).await?;
        info!("Found {} video folder(s)", video_folders.len());

        let mut scoring = JoinSet::new();
        for folder in video_folders {
            let config = self.config.clone();
            let scorer = self.scorer.clone();
            let target = self.target.clone();
            scoring.spawn_blocking(move || {
                let selection = select_with(&config, scorer.as_ref(), &target, &folder);
                (folder, selection)
            });
        }

        let workers = Arc::new(Semaphore::new(self.config.copy.workers));
        let mut copies = JoinSet::new();
        while let Some(joined) = scoring.join_next().await {
            let (video_folder, selection) = match joined {
                Ok(result) => result,
                Err(e) => {
                    warn!("Scoring task failed: {}", e);
                    continue;
                }
            };

            let candidate = match selection {
                Selection::Candidate(candidate) => candidate,
                Selection::AlreadySatisfied { .. } => continue,
                Selection::NoCandidate => {
                    info!("No subtitles found for {}", video_folder.display());
                    continue;
                }
            };

            let plan = CopyPlan {
                source_dir: candidate.folder,
                video_folder,
                files: candidate.files,
                forced,
            };
            let download_id = download.download_id.clone();
            let workers = workers.clone();
            copies.spawn(async move {
                let _permit = workers.acquire_owned().await.ok();
                execute_plan(&download_id, &plan).await
            });
        }

        let mut events = Vec::new();
        while let Some(joined) = copies.join_next().await {
            match joined {
                Ok(event) => {
                    self.publish(&event).await;
                    events.push(event);
                }
                Err(e) => warn!("Copy task failed: {}", e),
            }
        }

        Ok(events)
    }

    /// Selection for one video folder, without copying anything.
    pub fn select(&self, video_folder: &Path) -> Selection {
        select_with(&self.config, self.scorer.as_ref(), &self.target, video_folder)
    }

    /// All scorable candidates for one video folder, best first.
    pub fn rank(&self, video_folder: &Path) -> Vec<ScoredCandidate> {
        let scanner = FolderScanner::new(&self.config.scan);
        let engine = ScoringEngine::new(&self.config.scoring, &scanner, self.scorer.as_ref());
        CandidateSelector::new(&scanner, engine).rank_candidates(video_folder, &self.target)
    }

    async fn video_folders(&self, location: &Path, files: &[DeclaredFile]) -> Result<BTreeSet<PathBuf>> {
        let config = self.config.clone();
        let location = location.to_path_buf();
        let declared: Vec<PathBuf> = files.iter().map(|file| file.path.clone()).collect();

        tokio::task::spawn_blocking(move || {
            FolderScanner::new(&config.scan).derive_video_folders(&location, &declared)
        })
        .await
        .map_err(|e| CopySubsError::Io(std::io::Error::other(e)))
    }

    async fn publish(&self, event: &CopyCompletedEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.publish(event).await {
                warn!("Failed to publish copy event: {}", e);
            }
        }
    }
}

/// Run one copy unit and describe what it did.
pub async fn execute_plan(download_id: &str, plan: &CopyPlan) -> CopyCompletedEvent {
    let path_pairs = CopyOrchestrator::execute(plan).await;
    CopyCompletedEvent::new(
        download_id,
        plan.source_dir.clone(),
        plan.video_folder.clone(),
        path_pairs,
    )
}

fn select_with(config: &Config, scorer: &dyn LanguageScorer, target: &TargetLanguage, folder: &Path) -> Selection {
    let scanner = FolderScanner::new(&config.scan);
    let engine = ScoringEngine::new(&config.scoring, &scanner, scorer);
    CandidateSelector::new(&scanner, engine).select_best(folder, target)
}
