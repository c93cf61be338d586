//! Per-vehicle state cache
//!
//! [`VehicleCache`] folds vehicle events into one [`VehicleSnapshot`] per id.
//! The whole map is published through a `tokio::sync::watch` channel as a
//! copy-on-write `Arc<BTreeMap>`, so readers get a consistent view without
//! holding a lock and can await the next change.
//!
//! ```rust
//! use fleet_protocol::{LocationUpdate, StatusUpdate, VehicleId, VehicleStatus};
//! use fleet_state::VehicleCache;
//!
//! let cache = VehicleCache::new();
//! let id = VehicleId::new(1);
//!
//! cache.apply_status(&StatusUpdate::new(id, VehicleStatus::Available));
//! cache.apply_location(&LocationUpdate::new(id).with_position(10.0, 20.0));
//!
//! let snapshot = cache.get(id).unwrap();
//! assert_eq!(snapshot.position(), Some((10.0, 20.0)));
//! assert_eq!(snapshot.status, Some(VehicleStatus::Available));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace};

use fleet_protocol::{
    LocationUpdate, ServerEvent, ServiceUpdate, StatusUpdate, TrackingUpdate, VehicleCreated,
    VehicleId, VehicleRecord,
};

use crate::change::{CacheChange, ChangeKind};
use crate::iter::ChangeIterator;
use crate::snapshot::{VehiclePatch, VehicleSnapshot};

/// Read-only view of every tracked vehicle
pub type VehicleMap = BTreeMap<VehicleId, VehicleSnapshot>;

struct Inner {
    view: watch::Sender<Arc<VehicleMap>>,
    version: AtomicU64,
    subscribers: Mutex<Vec<mpsc::Sender<CacheChange>>>,
}

/// Shared map of vehicle id to latest known snapshot
///
/// Clones share the same map. Mutation only happens through the merge rule
/// of [`VehiclePatch`]; readers get immutable `Arc` views.
#[derive(Clone)]
pub struct VehicleCache {
    inner: Arc<Inner>,
}

impl VehicleCache {
    pub fn new() -> Self {
        let (view, _) = watch::channel(Arc::new(VehicleMap::new()));
        Self {
            inner: Arc::new(Inner {
                view,
                version: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Fold any patch into the snapshot of its vehicle
    ///
    /// Creates the snapshot on first sight. Returns whether the cache changed.
    pub fn apply<P: VehiclePatch + ?Sized>(&self, patch: &P) -> bool {
        let id = patch.target();
        self.mutate(|vehicles| match vehicles.get(&id) {
            Some(existing) => {
                let mut next = existing.clone();
                if !next.merge(patch) {
                    return None;
                }
                Arc::make_mut(vehicles).insert(id, next);
                Some(ChangeKind::Updated(id))
            }
            None => {
                Arc::make_mut(vehicles).insert(id, VehicleSnapshot::from_patch(patch));
                Some(ChangeKind::Inserted(id))
            }
        })
    }

    pub fn apply_location(&self, update: &LocationUpdate) -> bool {
        self.apply(update)
    }

    /// Fleet-channel position; same merge as [`apply_location`](Self::apply_location)
    pub fn apply_tracking(&self, update: &TrackingUpdate) -> bool {
        self.apply(update)
    }

    pub fn apply_status(&self, update: &StatusUpdate) -> bool {
        self.apply(update)
    }

    pub fn apply_service(&self, update: &ServiceUpdate) -> bool {
        self.apply(update)
    }

    pub fn insert_created(&self, created: &VehicleCreated) -> bool {
        self.apply(created)
    }

    /// Drop a retired vehicle, returning its last snapshot
    pub fn remove(&self, id: VehicleId) -> Option<VehicleSnapshot> {
        let mut removed = None;
        self.mutate(|vehicles| {
            if !vehicles.contains_key(&id) {
                return None;
            }
            removed = Arc::make_mut(vehicles).remove(&id);
            Some(ChangeKind::Removed(id))
        });
        removed
    }

    /// Merge an initial set of records, e.g. from a REST fetch
    ///
    /// Returns how many snapshots were created or changed.
    pub fn seed<I>(&self, records: I) -> usize
    where
        I: IntoIterator<Item = VehicleRecord>,
    {
        let changed = records
            .into_iter()
            .filter(|record| self.apply(record))
            .count();
        debug!(changed, total = self.len(), "Seeded vehicle cache");
        changed
    }

    /// Fold a decoded server event; non-vehicle events are ignored
    pub fn apply_event(&self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::LocationUpdate(update) => self.apply_location(update),
            ServerEvent::TrackingUpdate(update) => self.apply_tracking(update),
            ServerEvent::StatusUpdate(update) => self.apply_status(update),
            ServerEvent::ServiceUpdate(update) => self.apply_service(update),
            ServerEvent::VehicleCreated(created) => self.insert_created(created),
            ServerEvent::VehicleDeleted(deleted) => self.remove(deleted.vehicle_id).is_some(),
            _ => false,
        }
    }

    pub fn get(&self, id: VehicleId) -> Option<VehicleSnapshot> {
        self.inner.view.borrow().get(&id).cloned()
    }

    pub fn contains(&self, id: VehicleId) -> bool {
        self.inner.view.borrow().contains_key(&id)
    }

    /// The current map; later changes do not affect it
    pub fn snapshot(&self) -> Arc<VehicleMap> {
        self.inner.view.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.view.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every snapshot
    pub fn clear(&self) {
        self.mutate(|vehicles| {
            if vehicles.is_empty() {
                return None;
            }
            *vehicles = Arc::new(VehicleMap::new());
            Some(ChangeKind::Cleared)
        });
    }

    /// Receiver of the whole view, marked changed on every mutation
    pub fn subscribe(&self) -> watch::Receiver<Arc<VehicleMap>> {
        self.inner.view.subscribe()
    }

    /// Blocking iterator over changes made from now on
    pub fn changes(&self) -> ChangeIterator {
        let (tx, rx) = mpsc::channel();
        self.inner.subscribers.lock().push(tx);
        ChangeIterator::new(rx)
    }

    /// Number of changes applied so far
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Apply `f` under the view's write lock, publishing the change it reports
    fn mutate<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Arc<VehicleMap>) -> Option<ChangeKind>,
    {
        self.inner.view.send_if_modified(|vehicles| match f(vehicles) {
            Some(kind) => {
                let version = self.inner.version.fetch_add(1, Ordering::AcqRel) + 1;
                let change = CacheChange::new(kind, version);
                trace!(change = %change, "Vehicle cache changed");
                self.notify(change);
                true
            }
            None => false,
        })
    }

    fn notify(&self, change: CacheChange) {
        self.inner
            .subscribers
            .lock()
            .retain(|tx| tx.send(change.clone()).is_ok());
    }
}

impl Default for VehicleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VehicleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VehicleCache")
            .field("vehicles", &self.len())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_protocol::{VehicleDeleted, VehicleStatus};
    use std::time::Duration;

    fn id(n: u64) -> VehicleId {
        VehicleId::new(n)
    }

    #[test]
    fn test_first_event_creates_snapshot() {
        let cache = VehicleCache::new();
        assert!(cache.apply_location(&LocationUpdate::new(id(1)).with_position(1.0, 2.0)));

        let snapshot = cache.get(id(1)).unwrap();
        assert_eq!(snapshot.position(), Some((1.0, 2.0)));
        assert_eq!(snapshot.status, None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_partial_merge_through_cache() {
        let cache = VehicleCache::new();
        cache.apply_location(&LocationUpdate::new(id(1)).with_position(10.0, 20.0));
        cache.apply_status(&StatusUpdate::new(id(1), VehicleStatus::Available));

        let mut update = LocationUpdate::new(id(1));
        update.latitude = Some(11.0);
        cache.apply_location(&update);

        let snapshot = cache.get(id(1)).unwrap();
        assert_eq!(snapshot.position(), Some((11.0, 20.0)));
        assert_eq!(snapshot.status, Some(VehicleStatus::Available));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_changes() {
        let cache = VehicleCache::new();
        cache.apply_location(&LocationUpdate::new(id(1)).with_position(1.0, 1.0));

        let before = cache.snapshot();
        cache.apply_location(&LocationUpdate::new(id(1)).with_position(2.0, 2.0));
        cache.apply_location(&LocationUpdate::new(id(2)).with_position(3.0, 3.0));

        assert_eq!(before.len(), 1);
        assert_eq!(before[&id(1)].position(), Some((1.0, 1.0)));
        assert_eq!(cache.snapshot().len(), 2);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = VehicleCache::new();
        cache.apply_status(&StatusUpdate::new(id(1), VehicleStatus::Rented));
        cache.apply_status(&StatusUpdate::new(id(2), VehicleStatus::Rented));

        let removed = cache.remove(id(1)).unwrap();
        assert_eq!(removed.status, Some(VehicleStatus::Rented));
        assert!(cache.remove(id(1)).is_none());
        assert!(!cache.contains(id(1)));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_version_counts_only_real_changes() {
        let cache = VehicleCache::new();
        let update = LocationUpdate::new(id(1)).with_position(1.0, 1.0);

        cache.apply_location(&update);
        cache.apply_location(&update);
        cache.remove(id(9));
        cache.clear();
        cache.clear();

        assert_eq!(cache.version(), 2);
    }

    #[test]
    fn test_changes_iterator() {
        let cache = VehicleCache::new();
        cache.apply_status(&StatusUpdate::new(id(1), VehicleStatus::Available));

        let changes = cache.changes();
        cache.apply_status(&StatusUpdate::new(id(1), VehicleStatus::Rented));
        cache.apply_status(&StatusUpdate::new(id(2), VehicleStatus::Available));
        cache.remove(id(1));
        cache.clear();

        let kinds: Vec<_> = changes.try_iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChangeKind::Updated(id(1)),
                ChangeKind::Inserted(id(2)),
                ChangeKind::Removed(id(1)),
                ChangeKind::Cleared,
            ]
        );
    }

    #[test]
    fn test_dropped_change_iterator_is_pruned() {
        let cache = VehicleCache::new();
        drop(cache.changes());
        cache.apply_status(&StatusUpdate::new(id(1), VehicleStatus::Available));
        assert!(cache.inner.subscribers.lock().is_empty());
    }

    #[test]
    fn test_apply_event_routes_by_variant() {
        let cache = VehicleCache::new();
        let mut record = VehicleRecord::new(id(5));
        record.license_plate = Some("B-FL 500".into());

        assert!(cache.apply_event(&ServerEvent::VehicleCreated(VehicleCreated {
            vehicle: record,
            timestamp: None,
        })));
        assert!(cache.apply_event(&ServerEvent::TrackingUpdate(TrackingUpdate(
            LocationUpdate::new(id(5)).with_position(52.5, 13.4)
        ))));
        assert_eq!(
            cache.get(id(5)).unwrap().license_plate.as_deref(),
            Some("B-FL 500")
        );

        assert!(cache.apply_event(&ServerEvent::VehicleDeleted(VehicleDeleted {
            vehicle_id: id(5),
            timestamp: None,
        })));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_sees_each_change() {
        let cache = VehicleCache::new();
        let mut rx = cache.subscribe();

        let writer = cache.clone();
        tokio::spawn(async move {
            writer.apply_status(&StatusUpdate::new(id(3), VehicleStatus::Reserved));
        });

        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            rx.borrow().get(&id(3)).and_then(|s| s.status),
            Some(VehicleStatus::Reserved)
        );
    }
}
