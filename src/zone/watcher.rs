use super::{RecordStore, ZoneError, ZoneLoader};
use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Capability for detecting that the zone source changed since last asked.
#[async_trait]
pub trait ChangeDetector: Send {
    async fn check_for_change(&mut self) -> bool;
}

/// Polls the zone source's modification time.
pub struct MtimePoller {
    path: PathBuf,
    store: Arc<RecordStore>,
}

impl MtimePoller {
    pub fn new(path: impl Into<PathBuf>, store: Arc<RecordStore>) -> Self {
        Self {
            path: path.into(),
            store,
        }
    }
}

#[async_trait]
impl ChangeDetector for MtimePoller {
    async fn check_for_change(&mut self) -> bool {
        let modified = match tokio::fs::metadata(&self.path)
            .await
            .and_then(|m| m.modified())
        {
            Ok(modified) => modified,
            Err(e) => {
                warn!("Failed to stat zone source {}: {}", self.path.display(), e);
                return false;
            }
        };

        if self.store.last_modified() == Some(modified) {
            return false;
        }
        // Recorded before the reload so a slow reload is not re-triggered
        self.store.set_last_modified(Some(modified));
        true
    }
}

/// Filesystem-notification detector.
///
/// Events are buffered by the `notify` backend thread and drained on each
/// check, so reloads still happen at most once per watcher tick.
pub struct NotifyDetector {
    file_name: Option<std::ffi::OsString>,
    events: mpsc::UnboundedReceiver<Event>,
    _watcher: RecommendedWatcher,
}

impl NotifyDetector {
    pub fn new(path: &Path) -> notify::Result<Self> {
        let (tx, events) = mpsc::unbounded_channel();

        let mut watcher: RecommendedWatcher = Watcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    if let Err(e) = tx.send(event) {
                        debug!("Dropping zone watch event: {}", e);
                    }
                }
                Err(e) => error!("Zone watch error: {}", e),
            },
            notify::Config::default(),
        )?;

        // Watch the directory; editors often replace the file instead of writing it
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!("Watching {} for zone changes", dir.display());

        Ok(Self {
            file_name: path.file_name().map(|n| n.to_os_string()),
            events,
            _watcher: watcher,
        })
    }

    fn is_relevant(&self, event: &Event) -> bool {
        matches!(
            event.kind,
            EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
        ) && event
            .paths
            .iter()
            .any(|p| p.file_name() == self.file_name.as_deref())
    }
}

#[async_trait]
impl ChangeDetector for NotifyDetector {
    async fn check_for_change(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.events.try_recv() {
            if self.is_relevant(&event) {
                debug!("Zone source event: {:?}", event.kind);
                changed = true;
            }
        }
        changed
    }
}

/// Result of a single watcher tick.
#[derive(Debug)]
pub enum ReloadOutcome {
    Unchanged,
    Reloaded { records: usize },
    /// The previous snapshot stays in service
    Failed(ZoneError),
}

/// Background task that reloads the zone when its source changes.
pub struct ZoneWatcher {
    loader: ZoneLoader,
    store: Arc<RecordStore>,
    detector: Box<dyn ChangeDetector>,
    interval: Duration,
    force_reload: Arc<AtomicBool>,
}

impl ZoneWatcher {
    pub fn new(
        loader: ZoneLoader,
        store: Arc<RecordStore>,
        detector: Box<dyn ChangeDetector>,
        interval: Duration,
    ) -> Self {
        Self {
            loader,
            store,
            detector,
            interval,
            force_reload: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Watcher using modification-time polling.
    pub fn polling(loader: ZoneLoader, store: Arc<RecordStore>, interval: Duration) -> Self {
        let detector = MtimePoller::new(loader.path(), store.clone());
        Self::new(loader, store, Box::new(detector), interval)
    }

    /// Make the next tick reload regardless of the detector.
    pub fn request_reload(&self) {
        self.force_reload.store(true, Ordering::SeqCst);
    }

    pub async fn tick(&mut self) -> ReloadOutcome {
        let forced = self.force_reload.swap(false, Ordering::SeqCst);
        let changed = self.detector.check_for_change().await;
        if !changed && !forced {
            return ReloadOutcome::Unchanged;
        }

        debug!(
            "Reloading zone {} (changed={}, forced={})",
            self.loader.path().display(),
            changed,
            forced
        );
        match self.loader.load().await {
            Ok(snapshot) => {
                let records = snapshot.len();
                info!(
                    "Reloaded zone {}: {}",
                    self.loader.path().display(),
                    snapshot.stats()
                );
                self.store.replace(snapshot);
                ReloadOutcome::Reloaded { records }
            }
            Err(e) => {
                warn!("Zone reload failed, keeping previous records: {}", e);
                ReloadOutcome::Failed(e)
            }
        }
    }

    /// Tick every interval until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let hangup = self.spawn_hangup_handler();

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Zone watcher started for {} (interval {:?})",
            self.loader.path().display(),
            self.interval
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    info!("Zone watcher shutting down");
                    break;
                }
            }
        }

        if let Some(handle) = hangup {
            handle.abort();
        }
    }

    /// SIGHUP schedules a reload on the next tick.
    #[cfg(unix)]
    fn spawn_hangup_handler(&self) -> Option<tokio::task::JoinHandle<()>> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(sighup) => sighup,
            Err(e) => {
                warn!("Failed to install SIGHUP handler: {}", e);
                return None;
            }
        };
        let force_reload = self.force_reload.clone();
        Some(tokio::spawn(async move {
            while sighup.recv().await.is_some() {
                info!("Received SIGHUP, zone reload scheduled");
                force_reload.store(true, Ordering::SeqCst);
            }
        }))
    }

    #[cfg(not(unix))]
    fn spawn_hangup_handler(&self) -> Option<tokio::task::JoinHandle<()>> {
        None
    }
}
