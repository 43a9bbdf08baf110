// Subtitle timing analysis
//
// Parses a subtitle file into its ordered event list so the scoring engine
// can judge how complete a track is (event density) and sample its text:
// - srt: plain numbered blocks with `-->` timings
// - ass: Advanced/Sub Station Alpha `[Events]` sections (also covers ssa)

pub mod ass;
pub mod srt;

use std::path::Path;
use tracing::debug;

use crate::error::{Result, CopySubsError};

/// One timed subtitle event. Times are in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEvent {
    pub start: u64,
    pub end: u64,
    pub text: String,
}

/// Parsed events of one subtitle file.
#[derive(Debug, Clone, Default)]
pub struct SubtitleSample {
    pub events: Vec<SubtitleEvent>,
}

impl SubtitleSample {
    pub fn new(mut events: Vec<SubtitleEvent>) -> Self {
        events.sort_by_key(|event| (event.start, event.end));
        Self { events }
    }

    /// Number of events.
    pub fn coverage(&self) -> usize {
        self.events.len()
    }

    /// End time of the last event, in milliseconds.
    pub fn span(&self) -> u64 {
        self.events.iter().map(|event| event.end).max().unwrap_or(0)
    }

    /// Up to `window` event texts centered on the middle of the file.
    pub fn middle_window(&self, window: usize) -> &[SubtitleEvent] {
        let len = self.events.len();
        let window = window.min(len);
        let start = (len / 2).saturating_sub(window / 2).min(len - window);
        &self.events[start..start + window]
    }
}

/// Parse the subtitle file at `path`.
pub fn analyze<P: AsRef<Path>>(path: P) -> Result<SubtitleSample> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| CopySubsError::from_io(e, path))?;
    let content = decode_text(&bytes);

    let events = if ass::looks_like_ass(&content) {
        ass::parse_ass(&content).map_err(|reason| CopySubsError::parse(path, reason))?
    } else {
        srt::parse_srt(&content).map_err(|reason| CopySubsError::parse(path, reason))?
    };

    if events.is_empty() {
        return Err(CopySubsError::parse(path, "no subtitle events"));
    }

    debug!("Parsed {} events from {}", events.len(), path.display());
    Ok(SubtitleSample::new(events))
}

/// Events per millisecond relative to `reference_density`; `0` when the
/// sample has no timeline to measure.
pub fn density(sample: &SubtitleSample, reference_density: f64) -> f64 {
    let span = sample.span();
    if span == 0 || reference_density <= 0.0 {
        return 0.0;
    }
    (sample.coverage() as f64 / span as f64) / reference_density
}

/// Decode subtitle bytes, honouring UTF-8 and UTF-16 byte order marks.
fn decode_text(bytes: &[u8]) -> String {
    match bytes {
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}
