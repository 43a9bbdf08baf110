//! Folder scoring: how good a directory is as the subtitle source for a video folder.
//!
//! Each candidate gets one [`Score`] built from five signals with strictly
//! descending weight: language match, full episode count, event density,
//! share of styled subtitles, share of plain subtitles. Smaller is better.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::config::ScoringConfig;
use crate::language::{LanguageScorer, TargetLanguage};
use crate::scan::{FileEntry, FileKind, FolderScanner};
use crate::subtitle::{self, SubtitleSample};

// Tier multipliers. Each tier exceeds the largest possible sum of all tiers
// below it: format_b <= 100, format_a <= 100, density <= 1000.
const FORMAT_B_WEIGHT: i64 = 1;
const FORMAT_A_WEIGHT: i64 = 1_000;
const DENSITY_WEIGHT: i64 = 1_000_000;
const COUNT_WEIGHT: i64 = 10_000_000_000;
const LANGUAGE_WEIGHT: i64 = 100_000_000_000;

/// Rank of a candidate folder; more negative is strictly preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Score(i64);

impl Score {
    /// Subtitles already sit next to the videos; beats every computed score.
    pub const ALREADY_SATISFIED: Score = Score(i64::MIN);
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Score::ALREADY_SATISFIED {
            write!(f, "satisfied")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Aggregated per-candidate signals, already quantized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScoreSignals {
    pub language: bool,
    pub count: bool,
    /// Mean density in thousandths, capped at 1000
    pub density: u16,
    /// Percent of sampled files in a styled format
    pub format_a: u8,
    /// Percent of sampled files in a plain format
    pub format_b: u8,
}

impl ScoreSignals {
    pub fn score(&self) -> Score {
        let total = i64::from(self.language) * LANGUAGE_WEIGHT
            + i64::from(self.count) * COUNT_WEIGHT
            + i64::from(self.density.min(1000)) * DENSITY_WEIGHT
            + i64::from(self.format_a.min(100)) * FORMAT_A_WEIGHT
            + i64::from(self.format_b.min(100)) * FORMAT_B_WEIGHT;
        Score(-total)
    }
}

/// A subtitle file in a candidate folder with the language tag to apply on copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabeledFile {
    pub file_name: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderScore {
    pub score: Score,
    pub signals: ScoreSignals,
    pub files: Vec<LabeledFile>,
}

/// What one sampled file contributed.
#[derive(Debug, Clone, Copy)]
struct FileSignal {
    language: f64,
    density: f64,
    accepted: bool,
}

pub struct ScoringEngine<'a> {
    config: &'a ScoringConfig,
    scanner: &'a FolderScanner,
    scorer: &'a dyn LanguageScorer,
}

impl<'a> ScoringEngine<'a> {
    pub fn new(config: &'a ScoringConfig, scanner: &'a FolderScanner, scorer: &'a dyn LanguageScorer) -> Self {
        Self { config, scanner, scorer }
    }

    /// Score `candidate` for a video folder needing `required` subtitle files.
    ///
    /// Returns `None` when the folder holds no subtitles at all.
    pub fn score_folder(&self, target: &TargetLanguage, required: usize, candidate: &Path) -> Option<FolderScore> {
        let subtitles: Vec<FileEntry> = self
            .scanner
            .list_or_empty(candidate)
            .into_iter()
            .filter(|entry| entry.kind.is_subtitle())
            .collect();

        if subtitles.is_empty() {
            return None;
        }

        let folder_named = candidate
            .file_name()
            .map(|name| target.names_folder(&name.to_string_lossy()))
            .unwrap_or(false);

        let sample = pick_sample(&subtitles, self.config.sample_size);
        let signals: Vec<FileSignal> = sample
            .iter()
            .map(|entry| self.score_file(target, entry, folder_named))
            .collect();
        let n = sample.len() as f64;

        let mean_language = signals.iter().map(|s| s.language).sum::<f64>() / n;
        let mean_density = signals.iter().map(|s| s.density).sum::<f64>() / n;
        let count_of = |kind: FileKind| sample.iter().filter(|entry| entry.kind == kind).count() as f64;

        let aggregate = ScoreSignals {
            language: mean_language > self.config.acceptance_threshold,
            count: subtitles.len() >= required,
            density: (mean_density.min(1.0) * 1000.0).round() as u16,
            format_a: (count_of(FileKind::SubtitleA) / n * 100.0).round() as u8,
            format_b: (count_of(FileKind::SubtitleB) / n * 100.0).round() as u8,
        };

        let label = majority_label(target, &signals);
        let files = subtitles
            .iter()
            .map(|entry| LabeledFile {
                file_name: entry.file_name(),
                label: label.clone(),
            })
            .collect();

        let score = aggregate.score();
        debug!(
            "Scored {}: {} (language={}, count={}, density={}, ass={}%, srt={}%)",
            candidate.display(),
            score,
            aggregate.language,
            aggregate.count,
            aggregate.density,
            aggregate.format_a,
            aggregate.format_b
        );

        Some(FolderScore {
            score,
            signals: aggregate,
            files,
        })
    }

    /// `folder_named`: the candidate folder itself is named for the language,
    /// which tags every file in it like a filename tag would.
    fn score_file(&self, target: &TargetLanguage, entry: &FileEntry, folder_named: bool) -> FileSignal {
        let file_name = entry.file_name();
        let tagged = folder_named || target.is_tagged(&file_name);

        let sample = match subtitle::analyze(&entry.path) {
            Ok(sample) => Some(sample),
            Err(e) => {
                debug!("Not using {} for content scoring: {}", entry.path.display(), e);
                None
            }
        };

        let language = if tagged {
            1.0
        } else {
            sample
                .as_ref()
                .map(|sample| self.content_language(target, sample))
                .unwrap_or(0.0)
        };

        let density = sample
            .as_ref()
            .map(|sample| subtitle::density(sample, self.config.reference_density))
            .unwrap_or(0.0);

        debug!("{}: tagged={}, language={:.2}, density={:.2}", file_name, tagged, language, density);

        FileSignal {
            language,
            density,
            accepted: language > self.config.acceptance_threshold,
        }
    }

    /// Mean detected probability over a window taken from the middle of the file.
    fn content_language(&self, target: &TargetLanguage, sample: &SubtitleSample) -> f64 {
        let window = sample.middle_window(self.config.window_size);
        let total: f64 = window
            .iter()
            .map(|event| self.scorer.probability(target, &event.text))
            .sum();

        let divisor = sample.coverage().min(self.config.window_size);
        if divisor == 0 {
            0.0
        } else {
            total / divisor as f64
        }
    }
}

/// Evenly spread selection of at most `size` files.
fn pick_sample(files: &[FileEntry], size: usize) -> Vec<&FileEntry> {
    let size = size.max(1);
    if files.len() <= size {
        return files.iter().collect();
    }
    (0..size).map(|i| &files[i * files.len() / size]).collect()
}

/// One label for the whole folder if every sampled file agrees, otherwise none.
fn majority_label(target: &TargetLanguage, signals: &[FileSignal]) -> Option<String> {
    if signals.iter().all(|s| s.accepted) {
        Some(target.primary().to_string())
    } else {
        None
    }
}

/// Order candidates best first: lower score, then smaller path.
pub fn compare_candidates(a: (Score, &Path), b: (Score, &Path)) -> Ordering {
    a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::language::MockLanguageScorer;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    fn srt_with(lines: usize, text: &str) -> String {
        (0..lines)
            .map(|i| {
                let start = i as u64 * 5;
                format!(
                    "{}\n00:{:02}:{:02},000 --> 00:{:02}:{:02},500\n{}\n",
                    i + 1,
                    start / 60,
                    start % 60,
                    start / 60,
                    start % 60,
                    text
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn fixed_scorer(p: f64) -> MockLanguageScorer {
        let mut scorer = MockLanguageScorer::new();
        scorer.expect_probability().returning(move |_, _| p);
        scorer
    }

    fn signals(language: bool, count: bool, density: u16, format_a: u8, format_b: u8) -> ScoreSignals {
        ScoreSignals { language, count, density, format_a, format_b }
    }

    #[test]
    fn test_language_tier_dominates() {
        let best_lower = signals(false, true, 1000, 100, 100).score();
        let language_only = signals(true, false, 0, 0, 0).score();
        assert!(language_only < best_lower);
    }

    #[test]
    fn test_every_tier_dominates_lower_ones() {
        assert!(signals(false, true, 0, 0, 0).score() < signals(false, false, 1000, 100, 100).score());
        assert!(signals(false, false, 1, 0, 0).score() < signals(false, false, 0, 100, 100).score());
        assert!(signals(false, false, 0, 1, 0).score() < signals(false, false, 0, 0, 100).score());
        assert!(signals(false, false, 0, 0, 1).score() < signals(false, false, 0, 0, 0).score());
        assert!(Score::ALREADY_SATISFIED < signals(true, true, 1000, 100, 100).score());
    }

    #[test]
    fn test_tie_break_by_path() {
        let score = signals(true, true, 500, 0, 100).score();
        let ordering = compare_candidates((score, Path::new("/t/b")), (score, Path::new("/t/a")));
        assert_eq!(ordering, Ordering::Greater);
    }

    #[test]
    fn test_empty_folder_is_not_a_candidate() {
        let dir = TempDir::new().unwrap();
        dir.child("readme.txt").write_str("hi").unwrap();
        let scanner = FolderScanner::new(&ScanConfig::default());
        let config = ScoringConfig::default();
        let scorer = fixed_scorer(1.0);
        let engine = ScoringEngine::new(&config, &scanner, &scorer);
        let target = TargetLanguage::parse("ru").unwrap();

        assert!(engine.score_folder(&target, 1, dir.path()).is_none());
        assert!(engine.score_folder(&target, 1, &dir.path().join("missing")).is_none());
    }

    #[test]
    fn test_content_detection_labels_folder() {
        let dir = TempDir::new().unwrap();
        dir.child("Ep01.srt").write_str(&srt_with(40, "Привет")).unwrap();
        let scanner = FolderScanner::new(&ScanConfig::default());
        let config = ScoringConfig::default();
        let scorer = fixed_scorer(0.9);
        let engine = ScoringEngine::new(&config, &scanner, &scorer);
        let target = TargetLanguage::parse("ru|rus|russian").unwrap();

        let result = engine.score_folder(&target, 1, dir.path()).unwrap();
        assert!(result.signals.language);
        assert!(result.signals.count);
        assert_eq!(result.signals.format_b, 100);
        assert_eq!(result.signals.format_a, 0);
        assert!(result.signals.density > 0);
        assert_eq!(
            result.files,
            vec![LabeledFile { file_name: "Ep01.srt".to_string(), label: Some("ru".to_string()) }]
        );
    }

    #[test]
    fn test_filename_tag_skips_detection() {
        let dir = TempDir::new().unwrap();
        dir.child("Ep01.rus.srt").write_str(&srt_with(10, "x")).unwrap();
        let scanner = FolderScanner::new(&ScanConfig::default());
        let config = ScoringConfig::default();
        let mut scorer = MockLanguageScorer::new();
        scorer.expect_probability().never();
        let engine = ScoringEngine::new(&config, &scanner, &scorer);
        let target = TargetLanguage::parse("ru|rus|russian").unwrap();

        let result = engine.score_folder(&target, 2, dir.path()).unwrap();
        assert!(result.signals.language);
        assert!(!result.signals.count);
        assert_eq!(result.files[0].label.as_deref(), Some("ru"));
    }

    #[test]
    fn test_folder_named_for_language_counts_as_tagged() {
        let dir = TempDir::new().unwrap();
        dir.child("Rus/Ep01.srt").write_str(&srt_with(10, "x")).unwrap();
        dir.child("Eng/Ep01.srt").write_str(&srt_with(10, "x")).unwrap();
        let scanner = FolderScanner::new(&ScanConfig::default());
        let config = ScoringConfig::default();
        let scorer = fixed_scorer(0.0);
        let engine = ScoringEngine::new(&config, &scanner, &scorer);
        let target = TargetLanguage::parse("ru|rus|russian").unwrap();

        let rus = engine.score_folder(&target, 1, &dir.path().join("Rus")).unwrap();
        let eng = engine.score_folder(&target, 1, &dir.path().join("Eng")).unwrap();
        assert!(rus.signals.language);
        assert!(!eng.signals.language);
        assert!(rus.score < eng.score);
        assert_eq!(rus.files[0].label.as_deref(), Some("ru"));
        assert_eq!(eng.files[0].label, None);
    }

    #[test]
    fn test_split_vote_disables_labels() {
        let dir = TempDir::new().unwrap();
        dir.child("Ep01.ru.srt").write_str(&srt_with(10, "a")).unwrap();
        dir.child("Ep02.ru.srt").write_str(&srt_with(10, "b")).unwrap();
        dir.child("Ep03.srt").write_str(&srt_with(10, "c")).unwrap();
        let scanner = FolderScanner::new(&ScanConfig::default());
        let config = ScoringConfig::default();
        let scorer = fixed_scorer(0.0);
        let engine = ScoringEngine::new(&config, &scanner, &scorer);
        let target = TargetLanguage::parse("ru").unwrap();

        let result = engine.score_folder(&target, 3, dir.path()).unwrap();
        // mean 2/3 still clears the folder-level threshold
        assert!(result.signals.language);
        assert_eq!(result.files.len(), 3);
        assert!(result.files.iter().all(|file| file.label.is_none()));
    }

    #[test]
    fn test_unsampled_files_share_the_vote() {
        let dir = TempDir::new().unwrap();
        for i in 1..=6 {
            dir.child(format!("Ep0{}.ru.ass", i)).write_str("not a script").unwrap();
        }
        let scanner = FolderScanner::new(&ScanConfig::default());
        let config = ScoringConfig::default();
        let scorer = fixed_scorer(0.0);
        let engine = ScoringEngine::new(&config, &scanner, &scorer);
        let target = TargetLanguage::parse("ru").unwrap();

        let result = engine.score_folder(&target, 6, dir.path()).unwrap();
        assert_eq!(result.files.len(), 6);
        assert!(result.files.iter().all(|file| file.label.as_deref() == Some("ru")));
        // unparseable files keep their tag and format signals
        assert_eq!(result.signals.density, 0);
        assert_eq!(result.signals.format_a, 100);
    }

    #[test]
    fn test_unparseable_untagged_file_scores_zero_language() {
        let dir = TempDir::new().unwrap();
        dir.child("Ep01.srt").write_str("garbage without timings").unwrap();
        let scanner = FolderScanner::new(&ScanConfig::default());
        let config = ScoringConfig::default();
        let mut scorer = MockLanguageScorer::new();
        scorer.expect_probability().never();
        let engine = ScoringEngine::new(&config, &scanner, &scorer);
        let target = TargetLanguage::parse("ru").unwrap();

        let result = engine.score_folder(&target, 1, dir.path()).unwrap();
        assert!(!result.signals.language);
        assert!(result.signals.count);
        assert_eq!(result.files[0].label, None);
    }

    #[test]
    fn test_pick_sample_spreads() {
        let files: Vec<FileEntry> = (0..9)
            .map(|i| FileEntry { path: format!("{}.srt", i).into(), kind: FileKind::SubtitleB })
            .collect();
        let picked: Vec<_> = pick_sample(&files, 3).iter().map(|e| e.file_name()).collect();
        assert_eq!(picked, vec!["0.srt", "3.srt", "6.srt"]);
        assert_eq!(pick_sample(&files[..2], 3).len(), 2);
    }
}
