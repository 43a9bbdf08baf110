use super::SubtitleEvent;

pub fn looks_like_ass(content: &str) -> bool {
    content.lines().take(50).any(|line| {
        let line = line.trim().to_ascii_lowercase();
        line == "[script info]" || line == "[events]"
    })
}

/// Parse the `[Events]` section of an ASS/SSA script.
///
/// Column positions come from the section's `Format:` line; `Text` is always
/// the last column and may itself contain commas.
pub fn parse_ass(content: &str) -> Result<Vec<SubtitleEvent>, String> {
    let mut in_events = false;
    let mut columns: Option<Columns> = None;
    let mut events = Vec::new();

    for (line_no, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.starts_with('[') && line.ends_with(']') {
            in_events = line.eq_ignore_ascii_case("[events]");
            continue;
        }
        if !in_events {
            continue;
        }

        if let Some(format) = strip_key(line, "Format") {
            columns = Some(Columns::from_format(format)?);
        } else if let Some(fields) = strip_key(line, "Dialogue") {
            let columns = columns
                .as_ref()
                .ok_or_else(|| format!("line {}: Dialogue before Format", line_no + 1))?;
            events.push(columns.event(fields).ok_or_else(|| format!("line {}: malformed Dialogue", line_no + 1))?);
        }
    }

    if columns.is_none() {
        return Err("missing [Events] Format line".to_string());
    }
    Ok(events)
}

struct Columns {
    count: usize,
    start: usize,
    end: usize,
    text: usize,
}

impl Columns {
    fn from_format(format: &str) -> Result<Self, String> {
        let names: Vec<String> = format.split(',').map(|name| name.trim().to_ascii_lowercase()).collect();
        let find = |wanted: &str| {
            names
                .iter()
                .position(|name| name == wanted)
                .ok_or_else(|| format!("Format line has no {} column", wanted))
        };

        let columns = Self {
            count: names.len(),
            start: find("start")?,
            end: find("end")?,
            text: find("text")?,
        };
        if columns.text != columns.count - 1 {
            return Err("Text must be the last Format column".to_string());
        }
        Ok(columns)
    }

    fn event(&self, fields: &str) -> Option<SubtitleEvent> {
        let values: Vec<&str> = fields.splitn(self.count, ',').collect();
        if values.len() != self.count {
            return None;
        }
        Some(SubtitleEvent {
            start: parse_ass_time(values[self.start])?,
            end: parse_ass_time(values[self.end])?,
            text: strip_overrides(values[self.text]),
        })
    }
}

fn strip_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (name, rest) = line.split_once(':')?;
    name.trim().eq_ignore_ascii_case(key).then(|| rest.trim_start())
}

/// Parse `H:MM:SS.cc` into milliseconds.
fn parse_ass_time(value: &str) -> Option<u64> {
    let mut parts = value.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(hours * 3_600_000 + minutes * 60_000 + (seconds * 1000.0).round() as u64)
}

/// Remove `{...}` override blocks and turn `\N`, `\n`, `\h` into spaces.
fn strip_overrides(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_block = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => in_block = true,
            '}' => in_block = false,
            _ if in_block => {}
            '\\' if matches!(chars.peek(), Some('N' | 'n' | 'h')) => {
                chars.next();
                out.push(' ');
            }
            c => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
