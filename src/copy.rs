use serde::{Deserialize, Serialize};
use std::fs::FileTimes;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::error::{Result, CopySubsError};
use crate::scoring::LabeledFile;

const FORCED_TAG: &str = "forced";

/// (source, destination) of one file actually copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPair {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Files to copy from the winning candidate into a video folder.
#[derive(Debug, Clone)]
pub struct CopyPlan {
    pub source_dir: PathBuf,
    pub video_folder: PathBuf,
    pub files: Vec<LabeledFile>,
    pub forced: bool,
}

impl CopyPlan {
    /// (source, destination) for every file in the plan.
    pub fn destinations(&self) -> Vec<(PathBuf, PathBuf)> {
        self.files
            .iter()
            .map(|file| {
                (
                    self.source_dir.join(&file.file_name),
                    self.video_folder
                        .join(destination_name(&file.file_name, file.label.as_deref(), self.forced)),
                )
            })
            .collect()
    }
}

/// Whether a download location marks its subtitles as forced.
pub fn is_forced_location(location: &Path, marker: &str) -> bool {
    location
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase() == marker.to_lowercase())
        .unwrap_or(false)
}

/// Insert the language and forced tags before the extension, unless present.
///
/// `episode.srt` + `ru` + forced becomes `episode.ru.forced.srt`;
/// `episode.ru.srt` + `ru` stays `episode.ru.srt`.
pub fn destination_name(file_name: &str, label: Option<&str>, forced: bool) -> String {
    let (mut stem, extension) = match file_name.rfind('.') {
        Some(dot) if dot > 0 => (file_name[..dot].to_string(), &file_name[dot..]),
        _ => (file_name.to_string(), ""),
    };

    let tokens: Vec<String> = stem.split('.').skip(1).map(str::to_lowercase).collect();
    let has = |tag: &str| tokens.iter().any(|token| token == &tag.to_lowercase());

    if let Some(label) = label.filter(|label| !label.is_empty()) {
        if !has(label) {
            stem.push('.');
            stem.push_str(label);
        }
    }
    if forced && !has(FORCED_TAG) {
        stem.push('.');
        stem.push_str(FORCED_TAG);
    }

    format!("{}{}", stem, extension)
}

pub struct CopyOrchestrator;

impl CopyOrchestrator {
    /// Copy every file of `plan`, skipping destinations that already exist.
    ///
    /// Failures only affect the file they happen on; the returned pairs are
    /// the files actually written.
    pub async fn execute(plan: &CopyPlan) -> Vec<PathPair> {
        let mut copied = Vec::new();

        for (source, destination) in plan.destinations() {
            match copy_file(&source, &destination).await {
                Ok(true) => {
                    info!("Copied {} to {}", source.display(), destination.display());
                    copied.push(PathPair { source, destination });
                }
                Ok(false) => {
                    info!("{} already exists in the destination. Skipping.", destination.display());
                }
                Err(e) => {
                    warn!("{}", e);
                }
            }
        }

        copied
    }
}

/// Copy content, permissions and timestamps. `Ok(false)` when the destination exists.
async fn copy_file(source: &Path, destination: &Path) -> Result<bool> {
    let copy_error = |reason: String| CopySubsError::Copy {
        source_path: source.to_path_buf(),
        destination: destination.to_path_buf(),
        reason,
    };

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| copy_error(format!("cannot create {}: {}", parent.display(), e)))?;
    }

    let mut reader = fs::File::open(source)
        .await
        .map_err(|e| copy_error(e.to_string()))?;

    // create_new is the existence check and the creation in one step
    let mut writer = match fs::OpenOptions::new().write(true).create_new(true).open(destination).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_error(e.to_string())),
    };

    let transfer = async move {
        tokio::io::copy(&mut reader, &mut writer).await?;
        let metadata = reader.metadata().await?;
        writer.set_permissions(metadata.permissions()).await?;

        let mut times = FileTimes::new();
        if let Ok(modified) = metadata.modified() {
            times = times.set_modified(modified);
        }
        if let Ok(accessed) = metadata.accessed() {
            times = times.set_accessed(accessed);
        }
        let writer = writer.into_std().await;
        writer.set_times(times)?;
        Ok::<_, io::Error>(())
    };

    if let Err(e) = transfer.await {
        // leave nothing half-written behind so a later run can retry
        if let Err(remove_err) = fs::remove_file(destination).await {
            warn!(
                "Could not remove partial copy {}: {}; it will block later retries",
                destination.display(),
                remove_err
            );
        }
        return Err(copy_error(e.to_string()));
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    fn labeled(name: &str, label: Option<&str>) -> LabeledFile {
        LabeledFile {
            file_name: name.to_string(),
            label: label.map(str::to_string),
        }
    }

    #[test]
    fn test_destination_name_tags() {
        assert_eq!(destination_name("Ep01.srt", Some("ru"), false), "Ep01.ru.srt");
        assert_eq!(destination_name("Ep01.srt", Some("ru"), true), "Ep01.ru.forced.srt");
        assert_eq!(destination_name("Ep01.srt", None, true), "Ep01.forced.srt");
        assert_eq!(destination_name("Ep01.srt", None, false), "Ep01.srt");
        assert_eq!(destination_name("Show.S01E01.ass", Some("ru"), false), "Show.S01E01.ru.ass");
        assert_eq!(destination_name("noext", Some("ru"), false), "noext.ru");
    }

    #[test]
    fn test_destination_name_is_idempotent() {
        assert_eq!(destination_name("episode.ru.srt", Some("ru"), false), "episode.ru.srt");
        assert_eq!(destination_name("episode.RU.Forced.srt", Some("ru"), true), "episode.RU.Forced.srt");

        let once = destination_name("episode.srt", Some("ru"), true);
        assert_eq!(destination_name(&once, Some("ru"), true), once);
    }

    #[test]
    fn test_forced_location() {
        assert!(is_forced_location(Path::new("/downloads/Anime"), "anime"));
        assert!(!is_forced_location(Path::new("/downloads/anime/Show"), "anime"));
        assert!(!is_forced_location(Path::new("/"), "anime"));
    }

    #[tokio::test]
    async fn test_execute_copies_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        dir.child("S1/Ep01.mkv").touch().unwrap();
        dir.child("S1/Subs/Ep01.srt").write_str("1\n00:00:01,000 --> 00:00:02,000\nПривет\n").unwrap();

        let plan = CopyPlan {
            source_dir: dir.path().join("S1/Subs"),
            video_folder: dir.path().join("S1"),
            files: vec![labeled("Ep01.srt", Some("ru"))],
            forced: false,
        };

        let copied = CopyOrchestrator::execute(&plan).await;
        assert_eq!(
            copied,
            vec![PathPair {
                source: dir.path().join("S1/Subs/Ep01.srt"),
                destination: dir.path().join("S1/Ep01.ru.srt"),
            }]
        );
        dir.child("S1/Ep01.ru.srt").assert("1\n00:00:01,000 --> 00:00:02,000\nПривет\n");

        let again = CopyOrchestrator::execute(&plan).await;
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_existing_destination_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        dir.child("src/a.srt").write_str("new").unwrap();
        dir.child("dst/a.srt").write_str("old").unwrap();

        let plan = CopyPlan {
            source_dir: dir.path().join("src"),
            video_folder: dir.path().join("dst"),
            files: vec![labeled("a.srt", None)],
            forced: false,
        };

        assert!(CopyOrchestrator::execute(&plan).await.is_empty());
        dir.child("dst/a.srt").assert("old");
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let dir = TempDir::new().unwrap();
        dir.child("src/b.srt").write_str("b").unwrap();

        let plan = CopyPlan {
            source_dir: dir.path().join("src"),
            video_folder: dir.path().join("dst/new"),
            files: vec![labeled("missing.srt", None), labeled("b.srt", None)],
            forced: true,
        };

        let copied = CopyOrchestrator::execute(&plan).await;
        assert_eq!(copied.len(), 1);
        assert_eq!(copied[0].destination, dir.path().join("dst/new/b.forced.srt"));
        assert!(!dir.path().join("dst/new/missing.forced.srt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_transfer_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        // a directory opens fine on unix but fails on read
        dir.child("src/a.srt").create_dir_all().unwrap();
        let destination = dir.path().join("dst/a.srt");

        let result = copy_file(&dir.path().join("src/a.srt"), &destination).await;
        assert!(matches!(result, Err(CopySubsError::Copy { .. })));
        assert!(!destination.exists());

        dir.child("src/b.srt").write_str("b").unwrap();
        assert!(copy_file(&dir.path().join("src/b.srt"), &destination).await.unwrap());
    }

    #[tokio::test]
    async fn test_modified_time_is_preserved() {
        let dir = TempDir::new().unwrap();
        let source = dir.child("src/a.srt");
        source.write_str("a").unwrap();
        let old = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000_000);
        std::fs::File::options()
            .write(true)
            .open(source.path())
            .unwrap()
            .set_modified(old)
            .unwrap();

        assert!(copy_file(source.path(), &dir.path().join("dst/a.srt")).await.unwrap());
        let copied = std::fs::metadata(dir.path().join("dst/a.srt")).unwrap();
        assert_eq!(copied.modified().unwrap(), old);
    }
}
