use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use toml::Value;

use crate::error::{Result, CopySubsError};
use crate::language::TargetLanguage;

fn default_forced_marker() -> String {
    "anime".to_string()
}

fn default_max_depth() -> usize {
    32
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `|`-delimited language identifiers, primary first (e.g. "ru|rus|russian")
    pub lang: String,
    /// Download folder name that marks subtitles as forced
    #[serde(default = "default_forced_marker")]
    pub forced_marker: String,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub copy: CopyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Extensions counted as episodes
    pub video_extensions: Vec<String>,
    /// Styled subtitle formats, preferred when scoring
    pub subtitle_a_extensions: Vec<String>,
    /// Plain timed subtitle formats
    pub subtitle_b_extensions: Vec<String>,
    /// Maximum directory depth for recursive walks
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Number of files sampled per candidate folder
    pub sample_size: usize,
    /// Number of subtitle lines fed to language detection
    pub window_size: usize,
    /// Mean language probability a file needs to be labeled
    pub acceptance_threshold: f64,
    /// Events per millisecond of a typical full episode track
    pub reference_density: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyConfig {
    /// Maximum number of video folders copied concurrently
    pub workers: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            video_extensions: vec!["mkv".to_string(), "mp4".to_string(), "avi".to_string()],
            subtitle_a_extensions: vec!["ass".to_string(), "ssa".to_string()],
            subtitle_b_extensions: vec!["srt".to_string()],
            max_depth: default_max_depth(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            sample_size: 3,
            window_size: 30,
            acceptance_threshold: 0.65,
            // ~300 events over a 24 minute episode
            reference_density: 0.0002,
        }
    }
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lang: "ru|rus|russian".to_string(),
            forced_marker: default_forced_marker(),
            scan: ScanConfig::default(),
            scoring: ScoringConfig::default(),
            copy: CopyConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CopySubsError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| CopySubsError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CopySubsError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| CopySubsError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        TargetLanguage::parse(&self.lang)?;
        if self.scoring.sample_size == 0 {
            return Err(CopySubsError::Config("scoring.sample_size must be at least 1".to_string()));
        }
        if self.scoring.window_size == 0 {
            return Err(CopySubsError::Config("scoring.window_size must be at least 1".to_string()));
        }
        if !(self.scoring.reference_density > 0.0) {
            return Err(CopySubsError::Config("scoring.reference_density must be positive".to_string()));
        }
        if self.copy.workers == 0 {
            return Err(CopySubsError::Config("copy.workers must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn target_language(&self) -> Result<TargetLanguage> {
        TargetLanguage::parse(&self.lang)
    }

    /// Flat view of every setting, keyed by dotted path (`scoring.window_size`).
    pub fn get_entries(&self) -> Result<BTreeMap<String, String>> {
        let value = Value::try_from(self)?;
        let mut entries = BTreeMap::new();
        flatten_into(&mut entries, "", &value);
        Ok(entries)
    }

    /// Bulk-replace settings from a flat mapping and return the updated config.
    ///
    /// Each value is coerced to the type of the setting it replaces; arrays
    /// are given as comma-separated strings.
    pub fn set_entries(&self, entries: &BTreeMap<String, String>) -> Result<Config> {
        let mut root = Value::try_from(self)?;

        for (key, raw) in entries {
            let slot = lookup_mut(&mut root, key)
                .ok_or_else(|| CopySubsError::Config(format!("Unknown config key: {}", key)))?;
            *slot = coerce(slot, raw)
                .map_err(|reason| CopySubsError::Config(format!("Invalid value for {}: {}", key, reason)))?;
        }

        let config: Config = root.try_into()?;
        config.validate()?;
        Ok(config)
    }
}

fn flatten_into(entries: &mut BTreeMap<String, String>, prefix: &str, value: &Value) {
    match value {
        Value::Table(table) => {
            for (key, child) in table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(entries, &path, child);
            }
        }
        Value::String(s) => {
            entries.insert(prefix.to_string(), s.clone());
        }
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(",");
            entries.insert(prefix.to_string(), joined);
        }
        other => {
            entries.insert(prefix.to_string(), other.to_string());
        }
    }
}

fn lookup_mut<'a>(root: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    let mut current = root;
    for part in key.split('.') {
        current = current.as_table_mut()?.get_mut(part)?;
    }
    match current {
        Value::Table(_) => None,
        leaf => Some(leaf),
    }
}

fn coerce(existing: &Value, raw: &str) -> std::result::Result<Value, String> {
    let raw = raw.trim();
    match existing {
        Value::String(_) => Ok(Value::String(raw.to_string())),
        Value::Integer(_) => raw
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| e.to_string()),
        Value::Float(_) => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| e.to_string()),
        Value::Boolean(_) => raw
            .parse::<bool>()
            .map(Value::Boolean)
            .map_err(|e| e.to_string()),
        Value::Array(_) => Ok(Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        )),
        other => Err(format!("unsupported setting type {}", other.type_str())),
    }
}
