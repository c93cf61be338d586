//! JSON frame codec and the inbound event union

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, Result};
use crate::event::{EventName, WireEvent};
use crate::payload::{
    ConnectedPayload, ErrorPayload, GpsSyncComplete, HealthResponse, LocationUpdate, PongPayload,
    ServiceUpdate, StatusUpdate, TrackingUpdate, VehicleCreated, VehicleDeleted,
};

/// One text message on the realtime socket
///
/// The transport forwards these verbatim; only [`ServerEvent::decode`] looks
/// inside `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl WireFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// A frame without payload (`"data": null`)
    pub fn bare(event: impl Into<String>) -> Self {
        Self::new(event, Value::Null)
    }

    /// Encode a typed payload under its bound event name
    pub fn from_event<E: WireEvent>(payload: &E) -> Result<Self> {
        let data = serde_json::to_value(payload).map_err(|source| ProtocolError::Encode {
            event: E::NAME.as_str(),
            source,
        })?;
        Ok(Self::new(E::NAME.as_str(), data))
    }

    /// Parse a frame from socket text
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(ProtocolError::MalformedFrame)
    }

    /// Serialize the frame to socket text
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|source| ProtocolError::Encode {
            event: "frame",
            source,
        })
    }

    /// The contract name of this frame, if it is one
    pub fn event_name(&self) -> Option<EventName> {
        EventName::from_wire(&self.event)
    }
}

/// Every inbound event, decoded to its typed payload
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Connected(ConnectedPayload),
    Error(ErrorPayload),
    HealthResponse(HealthResponse),
    Pong(PongPayload),
    LocationUpdate(LocationUpdate),
    StatusUpdate(StatusUpdate),
    ServiceUpdate(ServiceUpdate),
    TrackingUpdate(TrackingUpdate),
    VehicleCreated(VehicleCreated),
    VehicleDeleted(VehicleDeleted),
    GpsSyncComplete(GpsSyncComplete),
}

impl ServerEvent {
    /// Decode a frame by its event name
    ///
    /// A `null` payload is read as an empty object so that events whose
    /// fields are all optional (e.g. `pong`) decode without data.
    pub fn decode(frame: &WireFrame) -> Result<Self> {
        let name = frame
            .event_name()
            .ok_or_else(|| ProtocolError::UnknownEvent(frame.event.clone()))?;

        let empty = Value::Object(serde_json::Map::new());
        let data = if frame.data.is_null() { &empty } else { &frame.data };

        let event = match name {
            EventName::Connected => ServerEvent::Connected(payload(name, data)?),
            EventName::Error => ServerEvent::Error(payload(name, data)?),
            EventName::HealthResponse => ServerEvent::HealthResponse(payload(name, data)?),
            EventName::Pong => ServerEvent::Pong(payload(name, data)?),
            EventName::VehicleLocationUpdate => ServerEvent::LocationUpdate(payload(name, data)?),
            EventName::VehicleStatusUpdate => ServerEvent::StatusUpdate(payload(name, data)?),
            EventName::VehicleServiceUpdate => ServerEvent::ServiceUpdate(payload(name, data)?),
            EventName::VehicleTrackingUpdate => ServerEvent::TrackingUpdate(payload(name, data)?),
            EventName::VehicleCreated => ServerEvent::VehicleCreated(payload(name, data)?),
            EventName::VehicleDeleted => ServerEvent::VehicleDeleted(payload(name, data)?),
            EventName::VehicleGpsSyncComplete => {
                ServerEvent::GpsSyncComplete(payload(name, data)?)
            }
        };

        Ok(event)
    }

    pub fn name(&self) -> EventName {
        match self {
            ServerEvent::Connected(_) => EventName::Connected,
            ServerEvent::Error(_) => EventName::Error,
            ServerEvent::HealthResponse(_) => EventName::HealthResponse,
            ServerEvent::Pong(_) => EventName::Pong,
            ServerEvent::LocationUpdate(_) => EventName::VehicleLocationUpdate,
            ServerEvent::StatusUpdate(_) => EventName::VehicleStatusUpdate,
            ServerEvent::ServiceUpdate(_) => EventName::VehicleServiceUpdate,
            ServerEvent::TrackingUpdate(_) => EventName::VehicleTrackingUpdate,
            ServerEvent::VehicleCreated(_) => EventName::VehicleCreated,
            ServerEvent::VehicleDeleted(_) => EventName::VehicleDeleted,
            ServerEvent::GpsSyncComplete(_) => EventName::VehicleGpsSyncComplete,
        }
    }
}

fn payload<T: DeserializeOwned>(name: EventName, data: &Value) -> Result<T> {
    T::deserialize(data).map_err(|source| ProtocolError::InvalidPayload {
        event: name.as_str(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::VehicleId;
    use crate::status::VehicleStatus;
    use serde_json::json;

    #[test]
    fn test_parse_and_decode_location() {
        let frame = WireFrame::parse(
            r#"{"event":"vehicle:location:update","data":{"vehicleId":7,"latitude":52.1,"longitude":4.3}}"#,
        )
        .unwrap();
        match ServerEvent::decode(&frame).unwrap() {
            ServerEvent::LocationUpdate(update) => {
                assert_eq!(update.vehicle_id, VehicleId::new(7));
                assert_eq!(update.latitude, Some(52.1));
            }
            other => panic!("expected location update, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_pong_without_data() {
        let frame = WireFrame::bare("pong");
        let event = ServerEvent::decode(&frame).unwrap();
        assert_eq!(event, ServerEvent::Pong(PongPayload { timestamp: None }));
    }

    #[test]
    fn test_decode_unknown_event() {
        let frame = WireFrame::new("vehicle:teleported", json!({"vehicleId": 1}));
        let err = ServerEvent::decode(&frame).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownEvent(_)));
    }

    #[test]
    fn test_decode_invalid_payload_names_event() {
        let frame = WireFrame::new("vehicle:deleted", json!({"vehicleId": "seven"}));
        let err = ServerEvent::decode(&frame).unwrap_err();
        match err {
            ProtocolError::InvalidPayload { event, .. } => assert_eq!(event, "vehicle:deleted"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_from_event_uses_bound_name() {
        let update = StatusUpdate::new(VehicleId::new(4), VehicleStatus::Maintenance);
        let frame = WireFrame::from_event(&update).unwrap();
        assert_eq!(frame.event, "vehicle:status:update");
        assert_eq!(frame.data["vehicleId"], json!(4));
        assert_eq!(frame.data["newStatus"], json!("maintenance"));

        let decoded = ServerEvent::decode(&frame).unwrap();
        assert_eq!(decoded.name(), EventName::VehicleStatusUpdate);
    }

    #[test]
    fn test_malformed_text() {
        let err = WireFrame::parse("not json").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame(_)));
    }

    #[test]
    fn test_frame_missing_data_defaults_to_null() {
        let frame = WireFrame::parse(r#"{"event":"pong"}"#).unwrap();
        assert!(frame.data.is_null());
        assert_eq!(frame.event_name(), Some(EventName::Pong));
    }
}
