use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Zone-related errors
#[derive(Debug, Error)]
pub enum ZoneError {
    /// The zone source could not be read (missing file, permissions, ...)
    #[error("Zone source {} is unreadable: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The zone grammar parser rejected the source
    #[error("Malformed zone {source_label} line {line}: {message}")]
    MalformedZone {
        source_label: String,
        line: usize,
        message: String,
    },

    /// Zone source exceeds the size limit
    #[error("Zone source exceeds maximum size of {limit} bytes")]
    FileTooLarge { limit: usize },
}

impl ZoneError {
    pub fn malformed(source_label: &str, line: usize, message: impl Into<String>) -> Self {
        ZoneError::MalformedZone {
            source_label: source_label.to_string(),
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ZoneError>;
