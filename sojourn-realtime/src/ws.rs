//! WebSocket transport over tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::RealtimeError;
use crate::transport::{RealtimeTransport, TransportSession};

/// WebSocket connector for hub endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl RealtimeTransport for WsTransport {
    async fn connect(
        &self,
        endpoint: &str,
        authorization: &str,
    ) -> Result<Box<dyn TransportSession>, RealtimeError> {
        let mut request = endpoint
            .into_client_request()
            .map_err(|err| RealtimeError::Transport {
                reason: err.to_string(),
            })?;
        let value = HeaderValue::from_str(authorization).map_err(|err| {
            RealtimeError::Transport {
                reason: err.to_string(),
            }
        })?;
        request.headers_mut().insert(AUTHORIZATION, value);

        let (stream, _) =
            tokio_tungstenite::connect_async(request)
                .await
                .map_err(|err| RealtimeError::Transport {
                    reason: err.to_string(),
                })?;
        Ok(Box::new(WsSession { stream }))
    }
}

struct WsSession {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

#[async_trait]
impl TransportSession for WsSession {
    async fn send(&mut self, text: &str) -> Result<(), RealtimeError> {
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|err| RealtimeError::Transport {
                reason: err.to_string(),
            })
    }

    async fn recv(&mut self) -> Option<Result<String, RealtimeError>> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                // Binary frames and ping/pong are not part of the hub
                // protocol.
                Ok(_) => continue,
                Err(err) => {
                    return Some(Err(RealtimeError::Transport {
                        reason: err.to_string(),
                    }))
                }
            }
        }
        None
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
