use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CopySubsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Failed to parse subtitle {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not copy {} to {}: {reason}", .source_path.display(), .destination.display())]
    Copy {
        source_path: PathBuf,
        destination: PathBuf,
        reason: String,
    },

    #[error("Event delivery error: {0}")]
    Event(String),
}

impl CopySubsError {
    /// Map an IO failure on `path` to the listing taxonomy.
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => CopySubsError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => CopySubsError::PermissionDenied(path.to_path_buf()),
            _ => CopySubsError::Io(err),
        }
    }

    pub fn parse<P: AsRef<Path>>(path: P, reason: impl Into<String>) -> Self {
        CopySubsError::Parse {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CopySubsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_maps_listing_errors() {
        let path = Path::new("/missing");
        let err = CopySubsError::from_io(io::Error::from(io::ErrorKind::NotFound), path);
        assert!(matches!(err, CopySubsError::NotFound(p) if p == path));

        let err = CopySubsError::from_io(io::Error::from(io::ErrorKind::PermissionDenied), path);
        assert!(matches!(err, CopySubsError::PermissionDenied(_)));

        let err = CopySubsError::from_io(io::Error::other("boom"), path);
        assert!(matches!(err, CopySubsError::Io(_)));
    }
}
