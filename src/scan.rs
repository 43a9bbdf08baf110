use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::ScanConfig;
use crate::error::{Result, CopySubsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Video,
    /// Styled formats (ass/ssa)
    SubtitleA,
    /// Plain timed formats (srt)
    SubtitleB,
    Other,
}

impl FileKind {
    pub fn is_subtitle(self) -> bool {
        matches!(self, FileKind::SubtitleA | FileKind::SubtitleB)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub kind: FileKind,
}

impl FileEntry {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub struct FolderScanner {
    video: Vec<String>,
    subtitle_a: Vec<String>,
    subtitle_b: Vec<String>,
    max_depth: usize,
}

impl FolderScanner {
    pub fn new(config: &ScanConfig) -> Self {
        let suffixes = |exts: &[String]| {
            exts.iter()
                .map(|ext| format!(".{}", ext.trim_start_matches('.').to_lowercase()))
                .collect()
        };

        Self {
            video: suffixes(&config.video_extensions),
            subtitle_a: suffixes(&config.subtitle_a_extensions),
            subtitle_b: suffixes(&config.subtitle_b_extensions),
            max_depth: config.max_depth,
        }
    }

    /// Classify a path by its suffix, without touching the filesystem.
    pub fn classify<P: AsRef<Path>>(&self, path: P) -> FileKind {
        let name = path.as_ref().to_string_lossy().to_lowercase();
        let has = |suffixes: &[String]| suffixes.iter().any(|s| name.ends_with(s.as_str()));

        if has(&self.video) {
            FileKind::Video
        } else if has(&self.subtitle_a) {
            FileKind::SubtitleA
        } else if has(&self.subtitle_b) {
            FileKind::SubtitleB
        } else {
            FileKind::Other
        }
    }

    /// Files directly inside `dir`, sorted by path.
    pub fn list_immediate_children<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<FileEntry>> {
        let dir = dir.as_ref();
        let read_dir = fs::read_dir(dir).map_err(|e| CopySubsError::from_io(e, dir))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| CopySubsError::from_io(e, dir))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let kind = self.classify(&path);
            entries.push(FileEntry { path, kind });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Like [`list_immediate_children`](Self::list_immediate_children), but an
    /// unreadable directory simply has no entries.
    pub fn list_or_empty<P: AsRef<Path>>(&self, dir: P) -> Vec<FileEntry> {
        let dir = dir.as_ref();
        match self.list_immediate_children(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping {}: {}", dir.display(), e);
                Vec::new()
            }
        }
    }

    /// Depth-first walk of everything under `dir` (including `dir`).
    ///
    /// Symlinks are followed, but each real directory is entered at most once
    /// and depth is capped, so the walk always terminates.
    pub fn walk_recursive<P: AsRef<Path>>(&self, dir: P) -> impl Iterator<Item = PathBuf> {
        let mut visited: HashSet<PathBuf> = HashSet::new();

        let mut walker = WalkDir::new(dir.as_ref())
            .follow_links(true)
            .max_depth(self.max_depth)
            .sort_by_file_name()
            .into_iter();

        std::iter::from_fn(move || {
            loop {
                let entry = match walker.next()? {
                    Ok(entry) => entry,
                    Err(e) => {
                        debug!("Walk error: {}", e);
                        continue;
                    }
                };

                if entry.file_type().is_dir() {
                    let real = fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());
                    if !visited.insert(real) {
                        walker.skip_current_dir();
                        continue;
                    }
                }

                return Some(entry.into_path());
            }
        })
    }

    /// Directories at or below `dir`, excluding `dir` itself.
    pub fn descendant_dirs<P: AsRef<Path>>(&self, dir: P) -> Vec<PathBuf> {
        let dir = dir.as_ref();
        self.walk_recursive(dir)
            .filter(|path| path != dir && path.is_dir())
            .collect()
    }

    /// Directories reachable from the declared files that directly contain a video.
    ///
    /// Each declared file contributes its top-level segment below `root`; every
    /// such segment is searched independently and the results de-duplicated.
    pub fn derive_video_folders<P, Q>(&self, root: P, declared: &[Q]) -> BTreeSet<PathBuf>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let root = root.as_ref();
        let top_levels: BTreeSet<PathBuf> = declared
            .iter()
            .filter_map(|file| top_level_segment(root, file.as_ref()))
            .collect();

        let mut folders = BTreeSet::new();
        for segment in top_levels {
            let start = root.join(&segment);
            debug!("Searching for videos under {}", start.display());

            for path in self.walk_recursive(&start) {
                if self.classify(&path) == FileKind::Video && path.is_file() {
                    if let Some(parent) = path.parent() {
                        folders.insert(parent.to_path_buf());
                    }
                }
            }
        }
        folders
    }
}

/// First path component of `file` relative to `root`.
fn top_level_segment(root: &Path, file: &Path) -> Option<PathBuf> {
    let relative = if file.is_absolute() {
        pathdiff::diff_paths(file, root)?
    } else {
        file.to_path_buf()
    };

    match relative.components().next()? {
        Component::Normal(segment) => Some(PathBuf::from(segment)),
        _ => None,
    }
}
