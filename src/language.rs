//! Target language handling and text language probability.

use regex::Regex;
use tracing::debug;
use whatlang::{Detector, Lang};

use crate::error::{Result, CopySubsError};

/// Below this many letters a line is too short to classify.
const MIN_LETTERS: usize = 2;

/// From this many letters on, a line is long enough to tell related languages of one script apart.
const DISCRIMINATING_LETTERS: usize = 40;

/// The configured `lang` value: `|`-delimited identifiers, primary first.
#[derive(Debug, Clone)]
pub struct TargetLanguage {
    alternatives: Vec<String>,
    suffix_pattern: Regex,
    detected: Option<Lang>,
}

impl TargetLanguage {
    /// Parse a `lang` setting such as `ru|rus|russian`.
    ///
    /// The raw string is embedded as-is in the filename tag pattern, so it
    /// must already be regex-safe.
    pub fn parse(raw: &str) -> Result<Self> {
        let alternatives: Vec<String> = raw
            .split('|')
            .map(|alt| alt.trim().to_lowercase())
            .filter(|alt| !alt.is_empty())
            .collect();

        if alternatives.is_empty() {
            return Err(CopySubsError::Config("lang must name at least one language".to_string()));
        }

        let suffix_pattern = Regex::new(&format!(r"(?i)\.(?:{})\.", raw.trim()))
            .map_err(|e| CopySubsError::Config(format!("lang is not a valid pattern: {}", e)))?;

        let detected = alternatives.iter().find_map(|alt| resolve_lang(alt));

        Ok(Self {
            alternatives,
            suffix_pattern,
            detected,
        })
    }

    /// Primary identifier, used as the filename tag.
    pub fn primary(&self) -> &str {
        &self.alternatives[0]
    }

    pub fn alternatives(&self) -> &[String] {
        &self.alternatives
    }

    /// Whether a file name already carries a `.{lang}.` tag.
    pub fn is_tagged(&self, file_name: &str) -> bool {
        self.suffix_pattern.is_match(file_name)
    }

    /// Whether a folder name spells out the language, e.g. `Rus` or `[RU] Subs`.
    pub fn names_folder(&self, folder_name: &str) -> bool {
        folder_name
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
            .any(|token| self.alternatives.iter().any(|alt| *alt == token))
    }

    /// Language as known to the detector, if any alternative maps to one.
    pub fn detector_lang(&self) -> Option<Lang> {
        self.detected
    }
}

/// Map a configured identifier (ISO 639-1, ISO 639-3 or English name) to a detector language.
fn resolve_lang(identifier: &str) -> Option<Lang> {
    if let Some(lang) = Lang::from_code(identifier) {
        return Some(lang);
    }

    let iso3 = match identifier {
        "af" => "afr",
        "ar" => "ara",
        "be" => "bel",
        "bg" => "bul",
        "bn" => "ben",
        "ca" => "cat",
        "cs" => "ces",
        "da" => "dan",
        "de" => "deu",
        "el" => "ell",
        "en" => "eng",
        "eo" => "epo",
        "es" => "spa",
        "et" => "est",
        "fa" => "pes",
        "fi" => "fin",
        "fr" => "fra",
        "he" => "heb",
        "hi" => "hin",
        "hr" => "hrv",
        "hu" => "hun",
        "hy" => "hye",
        "id" => "ind",
        "it" => "ita",
        "ja" => "jpn",
        "ka" => "kat",
        "ko" => "kor",
        "la" => "lat",
        "lt" => "lit",
        "lv" => "lav",
        "mk" => "mkd",
        "nb" | "no" => "nob",
        "nl" => "nld",
        "pl" => "pol",
        "pt" => "por",
        "ro" => "ron",
        "ru" => "rus",
        "sk" => "slk",
        "sl" => "slv",
        "sr" => "srp",
        "sv" => "swe",
        "th" => "tha",
        "tr" => "tur",
        "uk" => "ukr",
        "vi" => "vie",
        "zh" => "cmn",
        _ => "",
    };
    if !iso3.is_empty() {
        return Lang::from_code(iso3);
    }

    Lang::all()
        .iter()
        .copied()
        .find(|lang| lang.eng_name().eq_ignore_ascii_case(identifier))
}

/// Estimates how likely a sample of text is written in the target language.
#[cfg_attr(test, mockall::automock)]
pub trait LanguageScorer: Send + Sync {
    /// Probability in `[0, 1]`; `0` when the sample cannot be classified.
    fn probability(&self, target: &TargetLanguage, sample: &str) -> f64;
}

/// Line scorer backed by `whatlang`.
///
/// Subtitle lines are too short for trigram confidence to mean much, so a
/// line counts as a hit (`1.0`) when it is written in the target's script,
/// unless it is long enough for the full detector to reliably name another
/// language of that script.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangScorer;

impl WhatlangScorer {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageScorer for WhatlangScorer {
    fn probability(&self, target: &TargetLanguage, sample: &str) -> f64 {
        let Some(wanted) = target.detector_lang() else {
            return 0.0;
        };

        let letters = sample.chars().filter(|c| c.is_alphabetic()).count();
        if letters < MIN_LETTERS {
            return 0.0;
        }

        // only the target is allowed, so this answers "right script or not"
        if Detector::with_allowlist(vec![wanted]).detect_lang(sample).is_none() {
            return 0.0;
        }

        if letters >= DISCRIMINATING_LETTERS {
            if let Some(info) = whatlang::detect(sample) {
                if info.lang() != wanted && info.is_reliable() {
                    debug!("Sample detected as {} instead of {}", info.lang().code(), wanted.code());
                    return 0.0;
                }
            }
        }

        1.0
    }
}
