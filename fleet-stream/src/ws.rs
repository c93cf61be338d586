//! WebSocket connector
//!
//! Opens the realtime socket with tokio-tungstenite and splits it into a
//! writer task (outbound frames) and a reader task (inbound frames and the
//! final close). Both tasks run on the connection worker's runtime.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tracing::{debug, trace, warn};

use fleet_protocol::WireFrame;

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::transport::{CloseReason, Connector, TransportEvent, TransportLink};

/// [`Connector`] for `ws://` and `wss://` endpoints
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        config: &StreamConfig,
        credential: Option<&str>,
    ) -> Result<TransportLink> {
        let mut request = config
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| {
                StreamError::Configuration(format!("Failed to build WebSocket request: {}", e))
            })?;

        if let Some(token) = credential {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                StreamError::Configuration(format!(
                    "Credential is not a valid Authorization header: {}",
                    e
                ))
            })?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| match e {
                tokio_tungstenite::tungstenite::Error::Http(response) => match response.status().as_u16() {
                    401 => StreamError::Connect("Unauthorized: credential rejected".to_string()),
                    403 => StreamError::Connect("Forbidden: realtime access denied".to_string()),
                    code => StreamError::Connect(format!("WebSocket HTTP error: {}", code)),
                },
                other => StreamError::Connect(other.to_string()),
            })?;
        debug!(endpoint = %config.endpoint, status = %response.status(), "WebSocket handshake complete");

        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<WireFrame>(config.outbound_buffer);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<TransportEvent>();

        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let text = match frame.to_text() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(event = %frame.event, error = %e, "Failed to encode outbound frame");
                        continue;
                    }
                };
                trace!(event = %frame.event, "Sending frame");
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    debug!(error = %e, "WebSocket write failed, stopping writer");
                    return;
                }
            }
            // link dropped by the manager
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => match WireFrame::parse(text.as_str()) {
                        Ok(frame) => {
                            if inbound_tx.send(TransportEvent::Frame(frame)).is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!(error = %e, "Ignoring unparseable text frame"),
                    },
                    Some(Ok(Message::Close(frame))) => break close_reason(frame),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break CloseReason::Dropped(e.to_string()),
                    None => break CloseReason::Dropped("stream ended".to_string()),
                }
            };
            debug!(reason = %reason, "WebSocket reader finished");
            let _ = inbound_tx.send(TransportEvent::Closed(reason));
        });

        Ok(TransportLink::new(outbound_tx, inbound_rx))
    }
}

fn close_reason(frame: Option<CloseFrame>) -> CloseReason {
    match frame {
        Some(frame) => CloseReason::from_close_code(u16::from(frame.code), frame.reason.as_str()),
        None => CloseReason::Dropped("closed without status".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    #[test]
    fn test_close_reason_from_frame() {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        };
        assert!(close_reason(Some(frame)).is_server_requested());

        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: "".into(),
        };
        assert!(!close_reason(Some(frame)).is_server_requested());
        assert!(!close_reason(None).is_server_requested());
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_error() {
        let config = StreamConfig::for_endpoint("ws://127.0.0.1:1/realtime").unwrap();
        let err = WsConnector::new().connect(&config, Some("token")).await.unwrap_err();
        assert!(matches!(err, StreamError::Connect(_)));
    }
}
