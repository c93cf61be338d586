//! Payload records carried by inbound events
//!
//! Field names are camelCase on the wire. Optional fields are omitted by the
//! server when unknown, and the state layer treats an absent field as
//! "unchanged" rather than "cleared".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

use crate::event::{EventName, VehicleScoped, WireEvent};
use crate::id::VehicleId;
use crate::status::VehicleStatus;

// ============================================================================
// Connection-level payloads
// ============================================================================

/// Greeting sent by the server once the socket is accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    pub message: String,
    pub client_id: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl WireEvent for ConnectedPayload {
    const NAME: EventName = EventName::Connected;
}

/// Human-readable error, from the server or synthesized for transport faults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ErrorPayload {
    /// Create an error payload stamped with the current time
    pub fn now(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            timestamp: Some(Utc::now()),
        }
    }
}

impl WireEvent for ErrorPayload {
    const NAME: EventName = EventName::Error;
}

/// Reply to a `health` intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub connected_clients: u32,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Server uptime in seconds
    pub uptime: f64,
}

impl WireEvent for HealthResponse {
    const NAME: EventName = EventName::HealthResponse;
}

/// Reply to a `ping` intent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PongPayload {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl WireEvent for PongPayload {
    const NAME: EventName = EventName::Pong;
}

// ============================================================================
// Vehicle payloads
// ============================================================================

/// Partial position update for one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub vehicle_id: VehicleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// km/h
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Degrees clockwise from north
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl LocationUpdate {
    pub fn new(vehicle_id: VehicleId) -> Self {
        Self {
            vehicle_id,
            latitude: None,
            longitude: None,
            speed: None,
            heading: None,
            address: None,
            timestamp: None,
            event: None,
        }
    }

    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl WireEvent for LocationUpdate {
    const NAME: EventName = EventName::VehicleLocationUpdate;
}

impl VehicleScoped for LocationUpdate {
    fn vehicle_id(&self) -> VehicleId {
        self.vehicle_id
    }
}

/// Position update delivered on the fleet-wide tracking channel
///
/// Same shape as [`LocationUpdate`]; the distinct type keeps the
/// one-name-per-payload mapping of [`WireEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingUpdate(pub LocationUpdate);

impl TrackingUpdate {
    pub fn into_inner(self) -> LocationUpdate {
        self.0
    }
}

impl Deref for TrackingUpdate {
    type Target = LocationUpdate;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<LocationUpdate> for TrackingUpdate {
    fn from(update: LocationUpdate) -> Self {
        TrackingUpdate(update)
    }
}

impl WireEvent for TrackingUpdate {
    const NAME: EventName = EventName::VehicleTrackingUpdate;
}

impl VehicleScoped for TrackingUpdate {
    fn vehicle_id(&self) -> VehicleId {
        self.0.vehicle_id
    }
}

/// Lifecycle status transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub vehicle_id: VehicleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_status: Option<VehicleStatus>,
    pub new_status: VehicleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl StatusUpdate {
    pub fn new(vehicle_id: VehicleId, new_status: VehicleStatus) -> Self {
        Self {
            vehicle_id,
            old_status: None,
            new_status,
            timestamp: None,
            event: None,
        }
    }
}

impl WireEvent for StatusUpdate {
    const NAME: EventName = EventName::VehicleStatusUpdate;
}

impl VehicleScoped for StatusUpdate {
    fn vehicle_id(&self) -> VehicleId {
        self.vehicle_id
    }
}

/// Maintenance/service state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceUpdate {
    pub vehicle_id: VehicleId,
    pub service_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_service_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_service_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mileage: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl ServiceUpdate {
    pub fn new(vehicle_id: VehicleId, service_status: impl Into<String>) -> Self {
        Self {
            vehicle_id,
            service_status: service_status.into(),
            last_service_date: None,
            next_service_date: None,
            mileage: None,
            timestamp: None,
            event: None,
        }
    }
}

impl WireEvent for ServiceUpdate {
    const NAME: EventName = EventName::VehicleServiceUpdate;
}

impl VehicleScoped for ServiceUpdate {
    fn vehicle_id(&self) -> VehicleId {
        self.vehicle_id
    }
}

/// Vehicle as returned by the REST layer and embedded in `vehicle:created`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    pub id: VehicleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VehicleStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mileage: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_location_update: Option<DateTime<Utc>>,
}

impl VehicleRecord {
    pub fn new(id: VehicleId) -> Self {
        Self {
            id,
            license_plate: None,
            make: None,
            model: None,
            year: None,
            status: None,
            latitude: None,
            longitude: None,
            mileage: None,
            last_location_update: None,
        }
    }
}

/// A vehicle was added to the fleet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleCreated {
    #[serde(alias = "entity")]
    pub vehicle: VehicleRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl WireEvent for VehicleCreated {
    const NAME: EventName = EventName::VehicleCreated;
}

impl VehicleScoped for VehicleCreated {
    fn vehicle_id(&self) -> VehicleId {
        self.vehicle.id
    }
}

/// A vehicle was retired from the fleet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDeleted {
    pub vehicle_id: VehicleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl WireEvent for VehicleDeleted {
    const NAME: EventName = EventName::VehicleDeleted;
}

impl VehicleScoped for VehicleDeleted {
    fn vehicle_id(&self) -> VehicleId {
        self.vehicle_id
    }
}

/// Outcome of a server-side GPS resync for one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsSyncComplete {
    pub vehicle_id: VehicleId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl WireEvent for GpsSyncComplete {
    const NAME: EventName = EventName::VehicleGpsSyncComplete;
}

impl VehicleScoped for GpsSyncComplete {
    fn vehicle_id(&self) -> VehicleId {
        self.vehicle_id
    }
}
