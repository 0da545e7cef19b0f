//! File watching for the notes store.
//!
//! Uses the notify crate for cross-platform file system events. An external
//! edit to the store file (another session, a hand edit) surfaces as a
//! debounced change so the caller can reload and run the pull-back pass.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

/// Watches a single file and emits debounced change notifications.
pub struct StoreWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    watch_root: PathBuf,
    target_path: PathBuf,
    target_name: Option<OsString>,
    debounce: Duration,
    pending_since: Option<Instant>,
}

impl StoreWatcher {
    /// Create a watcher for `path`.
    ///
    /// # Errors
    /// Returns an error if the file watcher cannot be created or the path
    /// cannot be watched.
    pub fn new(path: impl AsRef<Path>, debounce: Duration) -> notify::Result<Self> {
        // Canonicalize so event paths from the OS (which are always absolute
        // and canonical) match our stored paths.
        let target_path = path
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| path.as_ref().to_path_buf());
        let target_name = target_path.file_name().map(std::ffi::OsStr::to_os_string);
        let watch_root = watch_root_for(&target_path);

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&watch_root, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            rx,
            watch_root,
            target_path,
            target_name,
            debounce,
            pending_since: None,
        })
    }

    /// The canonical path of the file being watched.
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Returns true once a debounced file change is ready.
    pub fn take_change_ready(&mut self) -> bool {
        let mut saw_relevant_event = false;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(ev) if self.is_relevant(&ev) => {
                    saw_relevant_event = true;
                }
                Ok(ev) => {
                    debug!(kind = ?ev.kind, paths = ?ev.paths, "ignoring unrelated event");
                }
                Err(err) => {
                    debug!(%err, "watcher error");
                }
            }
        }

        if saw_relevant_event {
            self.pending_since = Some(Instant::now());
        }

        let Some(pending_since) = self.pending_since else {
            return false;
        };
        if pending_since.elapsed() >= self.debounce {
            self.pending_since = None;
            return true;
        }
        false
    }

    fn is_relevant(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            path == &self.watch_root
                || path == &self.target_path
                || self
                    .target_name
                    .as_ref()
                    .is_some_and(|name| path.file_name().is_some_and(|f| f == name))
        })
    }
}

// Watch the containing directory: editors that replace files atomically
// (rename-over) drop the inode the watch was registered on.
fn watch_root_for(target: &Path) -> PathBuf {
    target
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_watch_root_is_parent_directory() {
        assert_eq!(
            watch_root_for(Path::new("/tmp/notes/marginalia.org")),
            PathBuf::from("/tmp/notes")
        );
        assert_eq!(watch_root_for(Path::new("marginalia.org")), PathBuf::from("."));
    }

    #[test]
    fn test_change_detected_after_debounce() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.org");
        fs::write(&path, "* T\n").unwrap();

        let mut watcher = StoreWatcher::new(&path, Duration::from_millis(10)).unwrap();
        assert!(!watcher.take_change_ready());

        fs::write(&path, "* T\nedited\n").unwrap();

        // Poll until the event arrives and the debounce window passes.
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut ready = false;
        while Instant::now() < deadline {
            if watcher.take_change_ready() {
                ready = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(ready, "expected a change notification");
    }
}
