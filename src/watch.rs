//! Rebuild-on-change for the source tree
//!
//! [`SourceWatcher`] subscribes to filesystem notifications under the source
//! root and rebuilds whenever a descriptor file is created, modified or
//! removed. Bursts of events (an editor saving several files, a `git
//! checkout`) collapse into one build once the tree has been quiet for the
//! debounce window. Builds go through [`Publisher::publish`], which holds the
//! publisher's build lock, so a watcher rebuild never overlaps another build.

use crate::error::Result;
use crate::publisher::{PublishReport, Publisher};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Default quiet period before a rebuild starts
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Collapses a burst of change notifications into one trigger
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_change: Option<Instant>,
}

impl Debouncer {
    /// Debouncer firing after `window` without further changes
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_change: None,
        }
    }

    /// Note a change at `now`
    pub fn record(&mut self, now: Instant) {
        self.last_change = Some(now);
    }

    /// Whether a trigger is due at `now`; consumes the pending change if so
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.last_change {
            Some(at) if now.duration_since(at) >= self.window => {
                self.last_change = None;
                true
            }
            _ => false,
        }
    }

    /// Whether a change is waiting for the window to close
    pub fn is_pending(&self) -> bool {
        self.last_change.is_some()
    }
}

/// Watches a publisher's source root and rebuilds on descriptor changes
pub struct SourceWatcher {
    publisher: Publisher,
    source_root: PathBuf,
    debounce: Duration,
    stop: Arc<AtomicBool>,
}

impl SourceWatcher {
    /// Watcher for the publisher's configured source root
    pub fn new(publisher: Publisher) -> Self {
        let configured = publisher.context().source_root.clone();
        let source_root = fs::canonicalize(&configured).unwrap_or(configured);
        Self {
            publisher,
            source_root,
            debounce: DEFAULT_DEBOUNCE,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the quiet period before a rebuild
    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    /// Flag that ends [`SourceWatcher::run`] when set
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Whether a changed path should trigger a rebuild
    pub fn is_relevant(&self, path: &Path) -> bool {
        let extension = &self.publisher.context().extension;
        path.starts_with(&self.source_root)
            && path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
    }

    fn is_relevant_event(&self, event: &Event) -> bool {
        !matches!(event.kind, EventKind::Access(_)) && event.paths.iter().any(|p| self.is_relevant(p))
    }

    /// Watch until the stop flag is set, rebuilding after each burst
    ///
    /// `on_build` receives the outcome of every rebuild. A failed rebuild is
    /// reported there and does not stop the watcher.
    pub fn run<F>(&self, mut on_build: F) -> Result<()>
    where
        F: FnMut(Result<PublishReport>),
    {
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&self.source_root, RecursiveMode::Recursive)?;
        info!("Watching {:?} for changes", self.source_root);

        let mut debouncer = Debouncer::new(self.debounce);
        let tick = self.debounce.min(Duration::from_millis(100));

        while !self.stop.load(Ordering::Relaxed) {
            match rx.recv_timeout(tick) {
                Ok(Ok(event)) => {
                    if self.is_relevant_event(&event) {
                        trace!(?event.kind, paths = ?event.paths, "source change");
                        debouncer.record(Instant::now());
                    }
                }
                Ok(Err(e)) => warn!("Watcher error: {}", e),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Watcher channel closed");
                    break;
                }
            }

            if debouncer.fire(Instant::now()) {
                debug!("Source changed; rebuilding");
                on_build(self.publisher.publish());
            }
        }

        info!("Stopped watching {:?}", self.source_root);
        Ok(())
    }
}
