//! Authoritative zone data: parsing, the served snapshot, and reloading.

pub mod errors;
pub mod loader;
pub mod parser;
pub mod record;
pub mod snapshot;
pub mod store;
pub mod watcher;

pub use errors::{Result, ZoneError};
pub use loader::{ZoneLoader, load_initial};
pub use parser::{ZoneParser, parse_zone_text};
pub use record::ZoneRecord;
pub use snapshot::{ZoneSnapshot, ZoneStats};
pub use store::RecordStore;
pub use watcher::{ChangeDetector, MtimePoller, NotifyDetector, ReloadOutcome, ZoneWatcher};

/// Zone constants
pub mod constants {
    /// Default TTL if not specified (1 hour)
    pub const DEFAULT_TTL: u32 = 3600;

    /// Maximum zone file size (10MB)
    pub const MAX_ZONE_FILE_SIZE: usize = 10 * 1024 * 1024;

    /// Maximum nesting of `$INCLUDE` directives
    pub const MAX_INCLUDE_DEPTH: usize = 8;
}
