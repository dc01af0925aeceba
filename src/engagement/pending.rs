// PendingSet: per-key in-flight guards with a quiescence window.
//
// A key is "pending" from the moment a guard is acquired until `window`
// after the guard is dropped. Settled entries are never swept by a timer;
// they expire lazily the next time the set is consulted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
enum Entry {
    InFlight,
    Settled(Instant),
}

type Entries = Arc<Mutex<HashMap<String, Entry>>>;

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<String, Entry>> {
    entries.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone)]
pub struct PendingSet {
    window: Duration,
    entries: Entries,
}

impl PendingSet {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Claim `key`. Returns None while another claim is in flight or still
    /// inside its quiescence window.
    pub fn try_acquire(&self, key: &str) -> Option<PendingGuard> {
        let mut entries = lock(&self.entries);
        let now = Instant::now();
        let window = self.window;
        entries.retain(|_, entry| match entry {
            Entry::InFlight => true,
            Entry::Settled(at) => now.duration_since(*at) < window,
        });

        if entries.contains_key(key) {
            return None;
        }
        entries.insert(key.to_string(), Entry::InFlight);
        Some(PendingGuard {
            key: key.to_string(),
            entries: Arc::clone(&self.entries),
        })
    }

    pub fn is_pending(&self, key: &str) -> bool {
        match lock(&self.entries).get(key) {
            Some(Entry::InFlight) => true,
            Some(Entry::Settled(at)) => at.elapsed() < self.window,
            None => false,
        }
    }
}

/// Holds a key in flight. Dropping it starts the quiescence window.
#[derive(Debug)]
pub struct PendingGuard {
    key: String,
    entries: Entries,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        lock(&self.entries).insert(std::mem::take(&mut self.key), Entry::Settled(Instant::now()));
    }
}
