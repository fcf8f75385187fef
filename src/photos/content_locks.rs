use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serializes row writes and unpins per content id, and remembers recent
/// unpins so an upload whose blob was unpinned mid-flight can re-pin it.
///
/// Epochs: an upload notes the current epoch before its `put`; every unpin
/// bumps the epoch after it returns. An upload that later finds an unpin of
/// its content id newer than its start cannot trust its own pin.
#[derive(Default)]
pub struct ContentLocks {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    epoch: u64,
    locks: HashMap<String, Arc<AsyncMutex<()>>>,
    /// Start epochs of uploads in flight, with multiplicity.
    in_flight: BTreeMap<u64, usize>,
    /// Latest unpin epoch per content id, kept only while an older upload runs.
    unpinned: HashMap<String, u64>,
}

impl Inner {
    fn prune(&mut self) {
        match self.in_flight.keys().next().copied() {
            Some(oldest) => self.unpinned.retain(|_, at| *at > oldest),
            None => self.unpinned.clear(),
        }
        self.locks.retain(|_, m| Arc::strong_count(m) > 1);
    }
}

/// Held for the duration of one upload.
pub struct UploadTicket<'a> {
    locks: &'a ContentLocks,
    started: u64,
}

impl UploadTicket<'_> {
    pub fn unpinned_since_start(&self, content_id: &str) -> bool {
        let inner = self.locks.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .unpinned
            .get(content_id)
            .is_some_and(|at| *at > self.started)
    }
}

impl Drop for UploadTicket<'_> {
    fn drop(&mut self) {
        let mut inner = self.locks.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(n) = inner.in_flight.get_mut(&self.started) {
            *n -= 1;
            if *n == 0 {
                inner.in_flight.remove(&self.started);
            }
        }
        inner.prune();
    }
}

impl ContentLocks {
    pub fn begin_upload(&self) -> UploadTicket<'_> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let started = inner.epoch;
        *inner.in_flight.entry(started).or_default() += 1;
        UploadTicket { locks: self, started }
    }

    pub async fn lock(&self, content_id: &str) -> OwnedMutexGuard<()> {
        let m = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.prune();
            inner
                .locks
                .entry(content_id.to_string())
                .or_default()
                .clone()
        };
        m.lock_owned().await
    }

    /// Call after every unpin attempt, successful or not, while holding the lock.
    pub fn record_unpin(&self, content_id: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.epoch += 1;
        let at = inner.epoch;
        inner.unpinned.insert(content_id.to_string(), at);
        inner.prune();
    }

    #[cfg(test)]
    fn tracked(&self) -> (usize, usize) {
        let inner = self.inner.lock().unwrap();
        (inner.locks.len(), inner.unpinned.len())
    }
}
