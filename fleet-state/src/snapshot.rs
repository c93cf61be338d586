//! Vehicle snapshots and the partial-merge rule
//!
//! Every inbound vehicle payload is a [`VehiclePatch`]: a set of fields that
//! may or may not be present. Merging a patch overwrites exactly the fields it
//! carries and keeps everything else, so a location ping never clears the
//! status and a status change never clears the position.
//!
//! The timestamp is only ever taken from the patch. Patches are applied in
//! arrival order; an older embedded timestamp arriving later still wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleet_protocol::{
    LocationUpdate, ServiceUpdate, StatusUpdate, TrackingUpdate, VehicleCreated, VehicleId,
    VehicleRecord, VehicleStatus,
};

/// Last known state of one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// km/h
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub address: Option<String>,
    pub status: Option<VehicleStatus>,
    pub service_status: Option<String>,
    pub last_service_date: Option<DateTime<Utc>>,
    pub next_service_date: Option<DateTime<Utc>>,
    pub mileage: Option<u64>,
    pub license_plate: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<u16>,
    /// Timestamp carried by the last patch that had one
    pub last_updated: Option<DateTime<Utc>>,
}

impl VehicleSnapshot {
    /// An empty snapshot; every field unknown
    pub fn new(id: VehicleId) -> Self {
        Self {
            id,
            latitude: None,
            longitude: None,
            speed: None,
            heading: None,
            address: None,
            status: None,
            service_status: None,
            last_service_date: None,
            next_service_date: None,
            mileage: None,
            license_plate: None,
            make: None,
            model: None,
            year: None,
            last_updated: None,
        }
    }

    /// Snapshot holding only the fields of `patch`
    pub fn from_patch<P: VehiclePatch + ?Sized>(patch: &P) -> Self {
        let mut snapshot = Self::new(patch.target());
        patch.apply_to(&mut snapshot);
        snapshot
    }

    /// Fold `patch` into this snapshot, returning whether anything changed
    ///
    /// Patches for a different vehicle are ignored.
    pub fn merge<P: VehiclePatch + ?Sized>(&mut self, patch: &P) -> bool {
        if patch.target() != self.id {
            return false;
        }
        let before = self.clone();
        patch.apply_to(self);
        *self != before
    }

    /// `(latitude, longitude)` once both are known
    pub fn position(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    pub fn is_rentable(&self) -> bool {
        self.status.is_some_and(|status| status.is_rentable())
    }
}

/// A partial update to one vehicle's snapshot
pub trait VehiclePatch {
    /// Vehicle the patch applies to
    fn target(&self) -> VehicleId;

    /// Overwrite the fields this patch carries
    fn apply_to(&self, snapshot: &mut VehicleSnapshot);
}

fn set<T: Clone>(field: &mut Option<T>, value: &Option<T>) {
    if let Some(value) = value {
        *field = Some(value.clone());
    }
}

impl VehiclePatch for LocationUpdate {
    fn target(&self) -> VehicleId {
        self.vehicle_id
    }

    fn apply_to(&self, snapshot: &mut VehicleSnapshot) {
        set(&mut snapshot.latitude, &self.latitude);
        set(&mut snapshot.longitude, &self.longitude);
        set(&mut snapshot.speed, &self.speed);
        set(&mut snapshot.heading, &self.heading);
        set(&mut snapshot.address, &self.address);
        set(&mut snapshot.last_updated, &self.timestamp);
    }
}

// Same fields, same rule: the fleet channel and the per-vehicle channel
// must produce identical snapshots.
impl VehiclePatch for TrackingUpdate {
    fn target(&self) -> VehicleId {
        self.0.vehicle_id
    }

    fn apply_to(&self, snapshot: &mut VehicleSnapshot) {
        self.0.apply_to(snapshot);
    }
}

impl VehiclePatch for StatusUpdate {
    fn target(&self) -> VehicleId {
        self.vehicle_id
    }

    fn apply_to(&self, snapshot: &mut VehicleSnapshot) {
        snapshot.status = Some(self.new_status);
        set(&mut snapshot.last_updated, &self.timestamp);
    }
}

impl VehiclePatch for ServiceUpdate {
    fn target(&self) -> VehicleId {
        self.vehicle_id
    }

    fn apply_to(&self, snapshot: &mut VehicleSnapshot) {
        snapshot.service_status = Some(self.service_status.clone());
        set(&mut snapshot.last_service_date, &self.last_service_date);
        set(&mut snapshot.next_service_date, &self.next_service_date);
        set(&mut snapshot.mileage, &self.mileage);
        set(&mut snapshot.last_updated, &self.timestamp);
    }
}

impl VehiclePatch for VehicleRecord {
    fn target(&self) -> VehicleId {
        self.id
    }

    fn apply_to(&self, snapshot: &mut VehicleSnapshot) {
        set(&mut snapshot.license_plate, &self.license_plate);
        set(&mut snapshot.make, &self.make);
        set(&mut snapshot.model, &self.model);
        set(&mut snapshot.year, &self.year);
        set(&mut snapshot.status, &self.status);
        set(&mut snapshot.latitude, &self.latitude);
        set(&mut snapshot.longitude, &self.longitude);
        set(&mut snapshot.mileage, &self.mileage);
        set(&mut snapshot.last_updated, &self.last_location_update);
    }
}

impl VehiclePatch for VehicleCreated {
    fn target(&self) -> VehicleId {
        self.vehicle.id
    }

    fn apply_to(&self, snapshot: &mut VehicleSnapshot) {
        self.vehicle.apply_to(snapshot);
        set(&mut snapshot.last_updated, &self.timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn snapshot_1() -> VehicleSnapshot {
        let mut snapshot = VehicleSnapshot::new(VehicleId::new(1));
        snapshot.latitude = Some(10.0);
        snapshot.longitude = Some(20.0);
        snapshot.status = Some(VehicleStatus::Available);
        snapshot
    }

    #[test]
    fn test_partial_update_preserves_absent_fields() {
        let mut snapshot = snapshot_1();
        let mut update = LocationUpdate::new(VehicleId::new(1));
        update.latitude = Some(11.0);

        assert!(snapshot.merge(&update));

        let mut expected = snapshot_1();
        expected.latitude = Some(11.0);
        assert_eq!(snapshot, expected);
    }

    #[test]
    fn test_tracking_and_location_merge_identically() {
        let update = LocationUpdate::new(VehicleId::new(1))
            .with_position(48.1, 11.5)
            .with_timestamp(ts(5));

        let mut via_location = snapshot_1();
        let mut via_tracking = snapshot_1();
        via_location.merge(&update);
        via_tracking.merge(&TrackingUpdate(update));

        assert_eq!(via_location, via_tracking);
    }

    #[test]
    fn test_timestamp_taken_from_patch_only() {
        let mut snapshot = snapshot_1();
        snapshot.merge(&LocationUpdate::new(VehicleId::new(1)).with_timestamp(ts(10)));
        assert_eq!(snapshot.last_updated, Some(ts(10)));

        // older timestamp arriving later still wins
        snapshot.merge(&LocationUpdate::new(VehicleId::new(1)).with_timestamp(ts(1)));
        assert_eq!(snapshot.last_updated, Some(ts(1)));

        // no timestamp: nothing synthesized, previous kept
        let mut update = LocationUpdate::new(VehicleId::new(1));
        update.speed = Some(30.0);
        snapshot.merge(&update);
        assert_eq!(snapshot.last_updated, Some(ts(1)));
    }

    #[test]
    fn test_status_and_service_patches() {
        let mut snapshot = snapshot_1();

        snapshot.merge(&StatusUpdate::new(VehicleId::new(1), VehicleStatus::Maintenance));
        let mut service = ServiceUpdate::new(VehicleId::new(1), "in_service");
        service.mileage = Some(42_000);
        snapshot.merge(&service);

        assert_eq!(snapshot.status, Some(VehicleStatus::Maintenance));
        assert_eq!(snapshot.service_status.as_deref(), Some("in_service"));
        assert_eq!(snapshot.mileage, Some(42_000));
        assert_eq!(snapshot.position(), Some((10.0, 20.0)));
    }

    #[test]
    fn test_merge_ignores_other_vehicle() {
        let mut snapshot = snapshot_1();
        let update = LocationUpdate::new(VehicleId::new(2)).with_position(0.0, 0.0);
        assert!(!snapshot.merge(&update));
        assert_eq!(snapshot, snapshot_1());
    }

    #[test]
    fn test_identical_patch_reports_no_change() {
        let mut snapshot = snapshot_1();
        let update = LocationUpdate::new(VehicleId::new(1)).with_position(10.0, 20.0);
        assert!(!snapshot.merge(&update));
    }

    #[test]
    fn test_from_record() {
        let mut record = VehicleRecord::new(VehicleId::new(3));
        record.make = Some("Volvo".into());
        record.status = Some(VehicleStatus::Rented);

        let snapshot = VehicleSnapshot::from_patch(&record);
        assert_eq!(snapshot.make.as_deref(), Some("Volvo"));
        assert_eq!(snapshot.status, Some(VehicleStatus::Rented));
        assert!(!snapshot.is_rentable());
        assert_eq!(snapshot.position(), None);
    }
}
