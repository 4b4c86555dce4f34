use thiserror::Error;

use crate::dns::ParseError;
use crate::zone::ZoneError;

#[derive(Error, Debug)]
pub enum DnsError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid DNS packet: {0}")]
    InvalidPacket(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Forwarding to {server} failed: {reason}")]
    ForwardingFailure { server: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Zone(#[from] ZoneError),
}

impl From<std::io::Error> for DnsError {
    fn from(err: std::io::Error) -> Self {
        DnsError::Io(err.to_string())
    }
}

impl From<ParseError> for DnsError {
    fn from(err: ParseError) -> Self {
        DnsError::Parse(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid forward server: {0}")]
    InvalidForwardServer(String),

    #[error("Invalid poll interval: {0}")]
    InvalidPollInterval(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid CNAME chase depth: {0}")]
    InvalidCnameDepth(String),

    #[error("Failed to read config file {path}: {reason}")]
    FileRead { path: String, reason: String },

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, DnsError>;
