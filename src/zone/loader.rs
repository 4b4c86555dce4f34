use super::parser::parse_zone_text;
use super::{RecordStore, Result, ZoneError, ZoneSnapshot, constants};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Reads and parses the zone source into a fresh snapshot.
///
/// The loader never touches a [`RecordStore`]; installing the result is the
/// caller's job, so a failed load cannot disturb the served zone.
#[derive(Debug, Clone)]
pub struct ZoneLoader {
    path: PathBuf,
    origin_hint: String,
}

impl ZoneLoader {
    pub fn new(path: impl Into<PathBuf>, origin_hint: Option<&str>) -> Self {
        Self {
            path: path.into(),
            origin_hint: origin_hint.unwrap_or_default().to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<ZoneSnapshot> {
        debug!("Loading zone from {}", self.path.display());

        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| self.unreadable(e))?;
        if metadata.len() > constants::MAX_ZONE_FILE_SIZE as u64 {
            return Err(ZoneError::FileTooLarge {
                limit: constants::MAX_ZONE_FILE_SIZE,
            });
        }

        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.unreadable(e))?;
        let label = self.path.to_string_lossy();
        let records = parse_zone_text(&bytes, &self.origin_hint, &label)?;

        Ok(ZoneSnapshot::from_records(records))
    }

    /// Modification time of the zone source.
    pub async fn source_modified(&self) -> Result<SystemTime> {
        tokio::fs::metadata(&self.path)
            .await
            .and_then(|m| m.modified())
            .map_err(|e| self.unreadable(e))
    }

    fn unreadable(&self, source: std::io::Error) -> ZoneError {
        ZoneError::SourceUnreadable {
            path: self.path.clone(),
            source,
        }
    }
}

/// Startup load: must succeed before the server accepts queries.
pub async fn load_initial(loader: &ZoneLoader, store: &RecordStore) -> Result<usize> {
    // Timestamp first, so an edit racing the load triggers a reload later
    let modified = loader.source_modified().await?;
    let snapshot = loader.load().await?;
    let count = snapshot.len();

    info!(
        "Loaded zone {}: {}",
        loader.path().display(),
        snapshot.stats()
    );
    store.replace(snapshot);
    store.set_last_modified(Some(modified));
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn zone_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_partitions_ns() {
        let file = zone_file(
            "$ORIGIN example.com.\n@ 300 IN NS ns1\n@ 300 IN A 192.0.2.1\nns1 300 IN A 192.0.2.53\n",
        );
        let loader = ZoneLoader::new(file.path(), None);
        let snapshot = loader.load().await.unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.ns_records().len(), 1);
        assert_eq!(snapshot.ns_records()[0].name(), "example.com.");
    }

    #[tokio::test]
    async fn test_missing_source_is_unreadable() {
        let loader = ZoneLoader::new("/nonexistent/bifrost/zone.db", None);
        assert!(matches!(
            loader.load().await,
            Err(ZoneError::SourceUnreadable { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_source() {
        let file = zone_file("www.example.com. IN A 999.1.1.1\n");
        let loader = ZoneLoader::new(file.path(), None);
        assert!(matches!(
            loader.load().await,
            Err(ZoneError::MalformedZone { line: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_load_initial_installs_snapshot() {
        let file = zone_file("www 60 IN A 192.0.2.7\n");
        let loader = ZoneLoader::new(file.path(), Some("example.org"));
        let store = RecordStore::new();

        let count = load_initial(&loader, &store).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.snapshot().records()[0].name(), "www.example.org.");
        assert!(store.last_modified().is_some());
    }

    #[tokio::test]
    async fn test_load_initial_failure_leaves_store_empty() {
        let file = zone_file("broken line without type\n");
        let loader = ZoneLoader::new(file.path(), None);
        let store = RecordStore::new();

        assert!(load_initial(&loader, &store).await.is_err());
        assert!(store.snapshot().is_empty());
        assert_eq!(store.last_modified(), None);
    }
}
