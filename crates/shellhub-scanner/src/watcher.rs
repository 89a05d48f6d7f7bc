//! Directory watcher for local sources.
//!
//! Uses FSEvents on macOS and inotify on Linux, debounced per source. A
//! batch touching any container file requests one scan of that source;
//! the scan itself works out what changed.

use crate::ScanError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use shellhub_core::Source;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

type ScanRequest = Arc<dyn Fn(&str) + Send + Sync>;

/// Watches the directories of local sources.
pub struct SourceWatcher {
    debounce: Duration,
    on_change: ScanRequest,
    watches: HashMap<String, Debouncer<RecommendedWatcher, RecommendedCache>>,
}

impl SourceWatcher {
    /// `on_change` is called with the source name after each relevant batch.
    pub fn new<F>(debounce: Duration, on_change: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            debounce,
            on_change: Arc::new(on_change),
            watches: HashMap::new(),
        }
    }

    /// Start watching a source. Sources without a local directory are ignored.
    pub fn watch(&mut self, source: &Source) -> Result<(), ScanError> {
        let Some(root) = source.local_path() else {
            return Ok(());
        };
        let root = root
            .canonicalize()
            .map_err(|e| ScanError::Watcher(format!("{}: {}", root.display(), e)))?;

        let name = source.name.clone();
        let on_change = Arc::clone(&self.on_change);

        let mut debouncer = new_debouncer(
            self.debounce,
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    if events.iter().any(|e| is_container_change(&e.event)) {
                        debug!(source = %name, "Container change detected");
                        on_change(&name);
                    }
                }
                Err(errors) => {
                    for e in errors {
                        warn!(source = %name, error = %e, "Watcher error");
                    }
                }
            },
        )
        .map_err(|e| ScanError::Watcher(e.to_string()))?;

        debouncer
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| ScanError::Watcher(e.to_string()))?;

        info!(source = %source.name, path = ?root, "Started watching");
        self.watches.insert(source.name.clone(), debouncer);
        Ok(())
    }

    /// Stop watching a source. Dropping the debouncer stops its thread.
    pub fn unwatch(&mut self, name: &str) -> bool {
        self.watches.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.watches.clear();
    }

    pub fn is_watching(&self, name: &str) -> bool {
        self.watches.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}

/// Whether `event` created, modified or removed an environment file.
fn is_container_change(event: &Event) -> bool {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    );
    relevant && event.paths.iter().any(|p| is_container_path(p))
}

fn is_container_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}
