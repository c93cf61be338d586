//! Blocking iterator over cache changes
//!
//! - Blocking: `recv()`, `for change in iter`
//! - Non-blocking: `try_recv()`, `try_iter()`
//! - Timeout: `recv_timeout()`, `timeout_iter()`

use std::sync::mpsc;
use std::time::Duration;

use crate::change::CacheChange;

/// Blocking iterator over [`CacheChange`] records
///
/// Each iterator has its own channel and sees every change made after it was
/// created. Dropping it unsubscribes.
///
/// # Example
///
/// ```rust,ignore
/// let changes = cache.changes();
///
/// // Drain what is pending without blocking
/// for change in changes.try_iter() {
///     println!("{}", change);
/// }
///
/// // Wait up to a second for the next one
/// if let Some(change) = changes.recv_timeout(Duration::from_secs(1)) {
///     println!("{:?}", change.vehicle_id());
/// }
/// ```
pub struct ChangeIterator {
    rx: mpsc::Receiver<CacheChange>,
}

impl ChangeIterator {
    pub(crate) fn new(rx: mpsc::Receiver<CacheChange>) -> Self {
        Self { rx }
    }

    /// Block until the next change; `None` once the cache is gone
    pub fn recv(&self) -> Option<CacheChange> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<CacheChange> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<CacheChange> {
        self.rx.try_recv().ok()
    }

    /// Iterator over the changes already queued
    pub fn try_iter(&self) -> TryIter<'_> {
        TryIter { inner: self }
    }

    /// Iterator that waits up to `timeout` for each change
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_> {
        TimeoutIter {
            inner: self,
            timeout,
        }
    }
}

impl Iterator for ChangeIterator {
    type Item = CacheChange;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

pub struct TryIter<'a> {
    inner: &'a ChangeIterator,
}

impl<'a> Iterator for TryIter<'a> {
    type Item = CacheChange;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

pub struct TimeoutIter<'a> {
    inner: &'a ChangeIterator,
    timeout: Duration,
}

impl<'a> Iterator for TimeoutIter<'a> {
    type Item = CacheChange;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeKind;
    use fleet_protocol::VehicleId;
    use std::thread;
    use std::time::Instant;

    fn change(version: u64) -> CacheChange {
        CacheChange::new(ChangeKind::Inserted(VehicleId::new(version)), version)
    }

    #[test]
    fn test_try_iter_drains_pending() {
        let (tx, rx) = mpsc::channel();
        let iter = ChangeIterator::new(rx);

        for v in 1..=3 {
            tx.send(change(v)).unwrap();
        }

        let versions: Vec<_> = iter.try_iter().map(|c| c.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert!(iter.try_recv().is_none());
    }

    #[test]
    fn test_recv_timeout_expires() {
        let (_tx, rx) = mpsc::channel();
        let iter = ChangeIterator::new(rx);

        let start = Instant::now();
        assert!(iter.recv_timeout(Duration::from_millis(50)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn test_blocking_recv_across_threads() {
        let (tx, rx) = mpsc::channel();
        let iter = ChangeIterator::new(rx);

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.send(change(7)).unwrap();
        });

        assert_eq!(iter.recv().map(|c| c.version), Some(7));
    }

    #[test]
    fn test_closed_channel_ends_iteration() {
        let (tx, rx) = mpsc::channel();
        let iter = ChangeIterator::new(rx);
        tx.send(change(1)).unwrap();
        drop(tx);

        assert_eq!(iter.count(), 1);
    }
}
