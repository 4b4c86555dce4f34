use crate::error::ConfigError;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// How a CNAME target found in the zone is chased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChaseMode {
    /// Resolve the target directly against the snapshot the query holds
    #[default]
    InProcess,
    /// Send a query for the target to this server's own listener
    Loopback,
}

impl FromStr for ChaseMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in-process" | "inprocess" => Ok(ChaseMode::InProcess),
            "loopback" => Ok(ChaseMode::Loopback),
            _ => Err(ConfigError::ParseError(format!("Invalid CNAME chase mode: {}", s))),
        }
    }
}

/// How the zone watcher notices a changed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatchMode {
    /// Compare the source's modification time every interval
    #[default]
    Poll,
    /// Filesystem notifications, drained every interval
    Notify,
}

impl FromStr for WatchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "poll" => Ok(WatchMode::Poll),
            "notify" => Ok(WatchMode::Notify),
            _ => Err(ConfigError::ParseError(format!("Invalid watch mode: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Zone source to serve
    pub zone_file: PathBuf,

    /// Origin for relative names in the zone source
    pub origin: Option<String>,

    /// Address to bind the DNS server to
    pub bind_addr: SocketAddr,

    /// Upstream server for names the zone does not answer (None = disabled)
    pub forward_server: Option<SocketAddr>,

    /// How often the zone source is checked for changes
    pub poll_interval: Duration,

    /// Timeout for a single forwarded exchange
    pub forward_timeout: Duration,

    /// Maximum number of CNAME hops chased for one question
    pub max_cname_depth: usize,

    pub cname_chase: ChaseMode,

    pub watch_mode: WatchMode,

    /// Whether to accept queries over TCP as well as UDP
    pub enable_tcp: bool,

    /// Max number of concurrent DNS queries to handle
    pub max_concurrent_queries: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            zone_file: PathBuf::from("default.zone"),
            origin: None,
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 53),
            forward_server: Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 53)),
            poll_interval: Duration::from_secs(30),
            forward_timeout: Duration::from_secs(5),
            max_cname_depth: 8,
            cname_chase: ChaseMode::InProcess,
            watch_mode: WatchMode::Poll,
            enable_tcp: true,
            max_concurrent_queries: 10000,
        }
    }
}

/// On-disk form of the configuration; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub zone_file: Option<PathBuf>,
    pub origin: Option<String>,
    pub bind_addr: Option<String>,
    pub forward_server: Option<String>,
    /// Seconds
    pub poll_interval: Option<u64>,
    /// Seconds
    pub forward_timeout: Option<u64>,
    pub max_cname_depth: Option<usize>,
    pub cname_chase: Option<ChaseMode>,
    pub watch_mode: Option<WatchMode>,
    pub enable_tcp: Option<bool>,
    pub max_concurrent_queries: Option<usize>,
}

impl ServerConfig {
    /// Load a TOML file over the defaults
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut config = Self::default();
        config.apply_toml(&contents)?;
        Ok(config)
    }

    pub fn apply_toml(&mut self, contents: &str) -> Result<(), ConfigError> {
        let file: FileConfig =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(zone_file) = file.zone_file {
            self.zone_file = zone_file;
        }
        if let Some(origin) = file.origin {
            self.origin = Some(origin);
        }
        if let Some(bind_addr) = file.bind_addr {
            self.bind_addr = parse_bind_addr(&bind_addr)?;
        }
        if let Some(forward_server) = file.forward_server {
            self.forward_server = parse_forward_server(&forward_server)?;
        }
        if let Some(secs) = file.poll_interval {
            self.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = file.forward_timeout {
            self.forward_timeout = Duration::from_secs(secs);
        }
        if let Some(depth) = file.max_cname_depth {
            self.max_cname_depth = depth;
        }
        if let Some(mode) = file.cname_chase {
            self.cname_chase = mode;
        }
        if let Some(mode) = file.watch_mode {
            self.watch_mode = mode;
        }
        if let Some(enable_tcp) = file.enable_tcp {
            self.enable_tcp = enable_tcp;
        }
        if let Some(max) = file.max_concurrent_queries {
            self.max_concurrent_queries = max;
        }
        Ok(())
    }

    /// Override with BIFROST_* environment variables if present
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(zone_file) = var("BIFROST_ZONE_FILE") {
            self.zone_file = PathBuf::from(zone_file);
        }

        if let Some(origin) = var("BIFROST_ORIGIN") {
            self.origin = Some(origin);
        }

        if let Some(bind_addr) = var("BIFROST_BIND_ADDR") {
            self.bind_addr = parse_bind_addr(&bind_addr)?;
        }

        if let Some(forward_server) = var("BIFROST_FORWARD_SERVER") {
            self.forward_server = parse_forward_server(&forward_server)?;
        }

        if let Some(interval) = var("BIFROST_POLL_INTERVAL") {
            let secs = interval
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidPollInterval(interval.clone()))?;
            self.poll_interval = Duration::from_secs(secs);
        }

        if let Some(timeout_str) = var("BIFROST_FORWARD_TIMEOUT") {
            let secs = timeout_str
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(timeout_str.clone()))?;
            self.forward_timeout = Duration::from_secs(secs);
        }

        if let Some(depth) = var("BIFROST_MAX_CNAME_DEPTH") {
            self.max_cname_depth = depth
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidCnameDepth(depth.clone()))?;
        }

        if let Some(mode) = var("BIFROST_CNAME_CHASE") {
            self.cname_chase = mode.parse()?;
        }

        if let Some(mode) = var("BIFROST_WATCH_MODE") {
            self.watch_mode = mode.parse()?;
        }

        if let Some(enable_tcp) = var("BIFROST_ENABLE_TCP") {
            self.enable_tcp = parse_bool(&enable_tcp, true);
        }

        if let Some(max) = var("BIFROST_MAX_CONCURRENT_QUERIES") {
            self.max_concurrent_queries = max.parse::<usize>().map_err(|_| {
                ConfigError::ParseError(format!("Invalid max concurrent queries: {}", max))
            })?;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.forward_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        if self.forward_timeout.as_secs() > 300 {
            return Err(ConfigError::InvalidTimeout(
                "Timeout too large (max 300 seconds)".to_string(),
            ));
        }

        if self.max_cname_depth == 0 || self.max_cname_depth > 32 {
            return Err(ConfigError::InvalidCnameDepth(format!(
                "{} (must be between 1 and 32)",
                self.max_cname_depth
            )));
        }

        if self.max_concurrent_queries == 0 {
            return Err(ConfigError::ParseError(
                "Max concurrent queries must be greater than 0".to_string(),
            ));
        }

        // Forwarding to ourselves would loop every unanswered query
        if let Some(server) = self.forward_server {
            if server == self.bind_addr || server == self.self_addr() {
                return Err(ConfigError::InvalidForwardServer(format!(
                    "{} is this server's own address",
                    server
                )));
            }
        }

        Ok(())
    }

    /// Address at which this server can query itself.
    pub fn self_addr(&self) -> SocketAddr {
        match self.bind_addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => {
                SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.bind_addr.port())
            }
            IpAddr::V6(ip) if ip.is_unspecified() => {
                SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), self.bind_addr.port())
            }
            _ => self.bind_addr,
        }
    }
}

/// Parse a bind address; a bare port binds all IPv4 interfaces.
pub fn parse_bind_addr(s: &str) -> Result<SocketAddr, ConfigError> {
    let s = s.trim();
    if let Ok(port) = s.parse::<u16>() {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    s.parse()
        .map_err(|_| ConfigError::InvalidBindAddress(s.to_string()))
}

/// Parse a forward server; `none`, `disabled` or empty turn forwarding off
/// and a bare IP gets port 53.
pub fn parse_forward_server(s: &str) -> Result<Option<SocketAddr>, ConfigError> {
    let s = s.trim();
    match s.to_lowercase().as_str() {
        "" | "none" | "disabled" | "off" => return Ok(None),
        _ => {}
    }
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(Some(addr));
    }
    s.parse::<IpAddr>()
        .map(|ip| Some(SocketAddr::new(ip, 53)))
        .map_err(|_| ConfigError::InvalidForwardServer(s.to_string()))
}

/// Parse a boolean from a string, with a default value for invalid input
fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}
