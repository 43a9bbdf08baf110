use super::SubtitleEvent;

/// Parse SubRip content into events.
///
/// Blocks are separated by blank lines; the index line is optional. A block
/// without a timing line, or with an unreadable one, makes the whole file
/// unusable.
pub fn parse_srt(content: &str) -> Result<Vec<SubtitleEvent>, String> {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut events = Vec::new();

    for (block_no, block) in normalized.split("\n\n").enumerate() {
        let lines: Vec<&str> = block
            .lines()
            .map(str::trim_end)
            .skip_while(|line| line.trim().is_empty())
            .collect();
        if lines.is_empty() {
            continue;
        }

        let timing_at = lines
            .iter()
            .position(|line| line.contains("-->"))
            .ok_or_else(|| format!("block {} has no timing line", block_no + 1))?;
        if timing_at > 1 {
            return Err(format!("block {} has text before its timing line", block_no + 1));
        }

        let (start, end) = parse_timing_line(lines[timing_at])
            .ok_or_else(|| format!("block {} has a malformed timing line: {}", block_no + 1, lines[timing_at]))?;

        let text = lines[timing_at + 1..]
            .iter()
            .map(|line| strip_markup(line))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        events.push(SubtitleEvent { start, end, text });
    }

    Ok(events)
}

/// Parse `00:00:01,000 --> 00:00:02,500` (trailing position hints ignored).
fn parse_timing_line(line: &str) -> Option<(u64, u64)> {
    let (start, rest) = line.split_once("-->")?;
    let end = rest.split_whitespace().next()?;
    Some((parse_srt_time(start.trim())?, parse_srt_time(end)?))
}

/// Parse `HH:MM:SS,mmm` (a `.` separator is tolerated) into milliseconds.
fn parse_srt_time(value: &str) -> Option<u64> {
    let (clock, millis) = value.split_once([',', '.']).unwrap_or((value, "0"));
    let mut parts = clock.split(':');
    let hours: u64 = parts.next()?.trim().parse().ok()?;
    let minutes: u64 = parts.next()?.trim().parse().ok()?;
    let seconds: u64 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }

    let digits = millis.trim();
    if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // "5" means 500ms, "05" means 50ms
    let millis: u64 = format!("{:0<3}", digits).parse().ok()?;

    Some(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
}

/// Drop `<i>`-style tags and `{\an8}`-style override blocks.
fn strip_markup(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut closing = None;
    for c in line.chars() {
        match (closing, c) {
            (None, '<') => closing = Some('>'),
            (None, '{') => closing = Some('}'),
            (Some(end), c) if c == end => closing = None,
            (Some(_), _) => {}
            (None, c) => out.push(c),
        }
    }
    out.trim().to_string()
}
