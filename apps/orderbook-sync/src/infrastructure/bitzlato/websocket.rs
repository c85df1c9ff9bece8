//! WebSocket Transport
//!
//! `tokio-tungstenite` implementation of the stream connection ports.
//! Server pings are answered here and never reach the session.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::application::ports::{Frame, StreamConnection, StreamConnector};
use crate::domain::error::TransportError;

/// Default ranger endpoint.
pub const DEFAULT_STREAM_URL: &str = "wss://www.bitzlato.dev/api/v2/ranger/public";

/// Opens TLS or plain WebSocket connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl WsConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StreamConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamConnection>, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Box::new(WsConnection { stream }))
    }
}

/// An open WebSocket.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamConnection for WsConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(TransportError::WebSocket(e.to_string()))),
            };

            match message {
                Message::Text(text) => return Some(Ok(Frame::Text(text.to_string()))),
                Message::Binary(data) => return Some(Ok(Frame::Binary(data.to_vec()))),
                Message::Pong(_) => return Some(Ok(Frame::Pong)),
                Message::Close(_) => return Some(Ok(Frame::Close)),
                Message::Ping(data) => {
                    if let Err(e) = self.stream.send(Message::Pong(data)).await {
                        return Some(Err(TransportError::WebSocket(e.to_string())));
                    }
                }
                Message::Frame(_) => {}
            }
        }
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        self.stream
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "Error closing WebSocket");
        }
    }
}
