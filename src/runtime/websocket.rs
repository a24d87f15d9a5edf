//! WebSocket transport over `tokio-tungstenite`

use super::error::TransportError;
use super::traits::{Connection, Transport};
use crate::config::SessionConfig;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Connects to the backend chat socket
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
    cookie: Option<String>,
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            url: config.chat_url(),
            cookie: config.session_cookie.clone(),
            connect_timeout: config.connect_timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(TransportError::handshake)?;
        if let Some(cookie) = &self.cookie {
            let value = HeaderValue::from_str(cookie).map_err(TransportError::handshake)?;
            request.headers_mut().insert(COOKIE, value);
        }

        // A peer that accepts TCP but never answers the upgrade must still fail
        let (stream, response) =
            tokio::time::timeout(self.connect_timeout, connect_async(request))
                .await
                .map_err(|_| {
                    TransportError::Handshake(format!(
                        "no upgrade response within {}ms",
                        self.connect_timeout.as_millis()
                    ))
                })?
                .map_err(TransportError::handshake)?;
        tracing::debug!(url = %self.url, status = %response.status(), "WebSocket handshake complete");

        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(TransportError::send)
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(frame = ?frame, "Server closed chat socket");
                    return None;
                }
                Ok(Message::Binary(data)) => {
                    tracing::debug!(len = data.len(), "Ignoring binary frame");
                }
                // Pings are answered by tungstenite itself
                Ok(_) => {}
                Err(e) => return Some(Err(TransportError::receive(e))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::trace!(error = %e, "Close after connection already gone");
        }
    }
}
