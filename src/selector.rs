use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::language::TargetLanguage;
use crate::scan::{FileKind, FolderScanner};
use crate::scoring::{compare_candidates, FolderScore, LabeledFile, Score, ScoringEngine};

#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub folder: PathBuf,
    pub score: Score,
    pub files: Vec<LabeledFile>,
}

/// Outcome of looking for subtitles for one video folder.
#[derive(Debug, Clone, Serialize)]
pub enum Selection {
    /// At least as many subtitles as videos already sit in the folder.
    AlreadySatisfied { score: Score },
    /// Best scoring candidate folder.
    Candidate(ScoredCandidate),
    /// No folder below the video folder holds subtitles.
    NoCandidate,
}

pub struct CandidateSelector<'a> {
    scanner: &'a FolderScanner,
    engine: ScoringEngine<'a>,
}

impl<'a> CandidateSelector<'a> {
    pub fn new(scanner: &'a FolderScanner, engine: ScoringEngine<'a>) -> Self {
        Self { scanner, engine }
    }

    pub fn select_best(&self, video_folder: &Path, target: &TargetLanguage) -> Selection {
        match self.rank(video_folder, target) {
            Ranking::Satisfied => Selection::AlreadySatisfied {
                score: Score::ALREADY_SATISFIED,
            },
            Ranking::Ranked(candidates) => match candidates.into_iter().next() {
                Some(best) => {
                    info!(
                        "Best subtitle source for {}: {} (score {})",
                        video_folder.display(),
                        best.folder.display(),
                        best.score
                    );
                    Selection::Candidate(best)
                }
                None => Selection::NoCandidate,
            },
        }
    }

    /// Every scorable candidate, best first. Empty when the short-circuit fires.
    pub fn rank_candidates(&self, video_folder: &Path, target: &TargetLanguage) -> Vec<ScoredCandidate> {
        match self.rank(video_folder, target) {
            Ranking::Satisfied => Vec::new(),
            Ranking::Ranked(candidates) => candidates,
        }
    }

    fn rank(&self, video_folder: &Path, target: &TargetLanguage) -> Ranking {
        let entries = self.scanner.list_or_empty(video_folder);
        let required = entries.iter().filter(|entry| entry.kind == FileKind::Video).count();
        let present = entries.iter().filter(|entry| entry.kind.is_subtitle()).count();

        if present >= required {
            info!(
                "{} already has {} subtitle(s) for {} video(s)",
                video_folder.display(),
                present,
                required
            );
            return Ranking::Satisfied;
        }

        let mut candidates: Vec<ScoredCandidate> = self
            .scanner
            .descendant_dirs(video_folder)
            .into_iter()
            .filter_map(|folder| {
                let FolderScore { score, files, .. } = self.engine.score_folder(target, required, &folder)?;
                Some(ScoredCandidate { folder, score, files })
            })
            .collect();

        candidates.sort_by(|a, b| compare_candidates((a.score, &a.folder), (b.score, &b.folder)));
        debug!("{} candidate folder(s) for {}", candidates.len(), video_folder.display());
        Ranking::Ranked(candidates)
    }
}

enum Ranking {
    Satisfied,
    Ranked(Vec<ScoredCandidate>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ScanConfig, ScoringConfig};
    use crate::language::MockLanguageScorer;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    const SRT: &str = "1\n00:00:01,000 --> 00:00:02,000\nline\n\n2\n00:20:00,000 --> 00:20:01,000\nline\n";

    fn target() -> TargetLanguage {
        TargetLanguage::parse("ru|rus|russian").unwrap()
    }

    #[test]
    fn test_short_circuit_scores_nothing() {
        let dir = TempDir::new().unwrap();
        dir.child("Ep01.mkv").touch().unwrap();
        dir.child("Ep01.srt").write_str(SRT).unwrap();
        dir.child("Subs/Ep01.ru.srt").write_str(SRT).unwrap();

        let scanner = FolderScanner::new(&ScanConfig::default());
        let config = ScoringConfig::default();
        let mut scorer = MockLanguageScorer::new();
        scorer.expect_probability().never();
        let selector = CandidateSelector::new(&scanner, ScoringEngine::new(&config, &scanner, &scorer));

        let selection = selector.select_best(dir.path(), &target());
        assert!(matches!(selection, Selection::AlreadySatisfied { score } if score == Score::ALREADY_SATISFIED));
        assert!(selector.rank_candidates(dir.path(), &target()).is_empty());
    }

    #[test]
    fn test_picks_language_match_over_count() {
        let dir = TempDir::new().unwrap();
        dir.child("Ep01.mkv").touch().unwrap();
        dir.child("Ep02.mkv").touch().unwrap();
        dir.child("Eng/Ep01.en.srt").write_str(SRT).unwrap();
        dir.child("Eng/Ep02.en.srt").write_str(SRT).unwrap();
        dir.child("Rus/Ep01.ru.srt").write_str(SRT).unwrap();
        dir.child("Fonts/font.ttf").touch().unwrap();

        let scanner = FolderScanner::new(&ScanConfig::default());
        let config = ScoringConfig::default();
        let mut scorer = MockLanguageScorer::new();
        scorer.expect_probability().returning(|_, _| 0.0);
        let selector = CandidateSelector::new(&scanner, ScoringEngine::new(&config, &scanner, &scorer));

        let ranked = selector.rank_candidates(dir.path(), &target());
        assert_eq!(ranked.len(), 2);

        match selector.select_best(dir.path(), &target()) {
            Selection::Candidate(best) => {
                assert_eq!(best.folder, dir.path().join("Rus"));
                assert_eq!(best.files[0].label.as_deref(), Some("ru"));
            }
            other => panic!("unexpected selection: {:?}", other),
        }
    }

    #[test]
    fn test_untagged_files_prefer_folder_named_for_language() {
        let dir = TempDir::new().unwrap();
        dir.child("Ep01.mkv").touch().unwrap();
        dir.child("Eng/Ep01.srt").write_str(SRT).unwrap();
        dir.child("Rus/Ep01.srt").write_str(SRT).unwrap();

        let scanner = FolderScanner::new(&ScanConfig::default());
        let config = ScoringConfig::default();
        let mut scorer = MockLanguageScorer::new();
        scorer.expect_probability().returning(|_, _| 0.0);
        let selector = CandidateSelector::new(&scanner, ScoringEngine::new(&config, &scanner, &scorer));

        match selector.select_best(dir.path(), &target()) {
            Selection::Candidate(best) => {
                assert_eq!(best.folder, dir.path().join("Rus"));
                assert_eq!(best.files[0].label.as_deref(), Some("ru"));
            }
            other => panic!("unexpected selection: {:?}", other),
        }
    }

    #[test]
    fn test_equal_scores_prefer_smaller_path() {
        let dir = TempDir::new().unwrap();
        dir.child("Ep01.mkv").touch().unwrap();
        dir.child("b/Ep01.ru.srt").write_str(SRT).unwrap();
        dir.child("a/Ep01.ru.srt").write_str(SRT).unwrap();

        let scanner = FolderScanner::new(&ScanConfig::default());
        let config = ScoringConfig::default();
        let scorer = MockLanguageScorer::new();
        let selector = CandidateSelector::new(&scanner, ScoringEngine::new(&config, &scanner, &scorer));

        let ranked = selector.rank_candidates(dir.path(), &target());
        assert_eq!(ranked[0].score, ranked[1].score);
        assert_eq!(ranked[0].folder, dir.path().join("a"));
    }

    #[test]
    fn test_nested_candidates_are_found() {
        let dir = TempDir::new().unwrap();
        dir.child("Ep01.mkv").touch().unwrap();
        dir.child("Extras/Subs/Rus/Ep01.ru.ass").write_str("[Events]\nFormat: Start, End, Text\nDialogue: 0:00:01.00,0:00:02.00,x\n").unwrap();

        let scanner = FolderScanner::new(&ScanConfig::default());
        let config = ScoringConfig::default();
        let scorer = MockLanguageScorer::new();
        let selector = CandidateSelector::new(&scanner, ScoringEngine::new(&config, &scanner, &scorer));

        match selector.select_best(dir.path(), &target()) {
            Selection::Candidate(best) => assert_eq!(best.folder, dir.path().join("Extras/Subs/Rus")),
            other => panic!("unexpected selection: {:?}", other),
        }
    }

    #[test]
    fn test_no_candidate() {
        let dir = TempDir::new().unwrap();
        dir.child("Ep01.mkv").touch().unwrap();
        dir.child("Extras/poster.jpg").touch().unwrap();

        let scanner = FolderScanner::new(&ScanConfig::default());
        let config = ScoringConfig::default();
        let scorer = MockLanguageScorer::new();
        let selector = CandidateSelector::new(&scanner, ScoringEngine::new(&config, &scanner, &scorer));

        assert!(matches!(selector.select_best(dir.path(), &target()), Selection::NoCandidate));
    }
}
