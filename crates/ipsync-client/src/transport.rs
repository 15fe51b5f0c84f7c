//! Stream transport abstraction.
//!
//! A connector opens connections; a connection yields inbound text frames
//! until it closes. The session never sends application data upstream, so
//! the abstraction is receive-only.

use async_trait::async_trait;

use crate::error::Result;

/// Opens streaming connections to the gateway.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Open a new connection.
    async fn connect(&self) -> Result<Box<dyn StreamConnection>>;
}

/// One open streaming connection.
#[async_trait]
pub trait StreamConnection: Send {
    /// Receive the next text frame.
    ///
    /// Returns `None` once the connection has closed. A
    /// `SyncError::InvalidMessage` is a single bad frame and the stream stays
    /// usable; any other error is a transport fault and ends the stream.
    async fn recv(&mut self) -> Option<Result<String>>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<()>;
}

/// WebSocket transport built on tokio-tungstenite.
pub mod websocket {
    use super::*;
    use std::time::Duration;

    use futures::StreamExt;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    use crate::error::SyncError;

    /// How long `close` waits for the peer to acknowledge.
    pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Connects to a fixed WebSocket endpoint.
    #[derive(Debug, Clone)]
    pub struct WebSocketConnector {
        url: String,
        close_timeout: Duration,
    }

    impl WebSocketConnector {
        pub fn new(url: impl Into<String>) -> Self {
            Self {
                url: url.into(),
                close_timeout: DEFAULT_CLOSE_TIMEOUT,
            }
        }

        pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
            self.close_timeout = timeout;
            self
        }

        pub fn url(&self) -> &str {
            &self.url
        }
    }

    #[async_trait]
    impl StreamConnector for WebSocketConnector {
        async fn connect(&self) -> Result<Box<dyn StreamConnection>> {
            tracing::debug!(url = %self.url, "Opening WebSocket");
            let (stream, _response) = connect_async(self.url.as_str())
                .await
                .map_err(|e| SyncError::Transport(format!("connect {}: {}", self.url, e)))?;
            Ok(Box::new(WebSocketConnection {
                stream,
                close_timeout: self.close_timeout,
            }))
        }
    }

    /// An open WebSocket connection.
    pub struct WebSocketConnection {
        stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        close_timeout: Duration,
    }

    #[async_trait]
    impl StreamConnection for WebSocketConnection {
        async fn recv(&mut self) -> Option<Result<String>> {
            loop {
                match self.stream.next().await? {
                    Ok(Message::Text(text)) => return Some(Ok(text)),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => return Some(Ok(text)),
                        Err(e) => {
                            tracing::warn!("Skipping binary frame that is not UTF-8: {}", e);
                            continue;
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        tracing::debug!(?frame, "WebSocket closed by peer");
                        return None;
                    }
                    // Ping/pong are answered by tungstenite itself.
                    Ok(_) => continue,
                    Err(e) => return Some(Err(SyncError::Transport(e.to_string()))),
                }
            }
        }

        async fn close(&mut self) -> Result<()> {
            self.stream
                .close(None)
                .await
                .map_err(|e| SyncError::Transport(e.to_string()))?;
            // Drain until the peer acknowledges the close.
            let timeout = self.close_timeout;
            let stream = &mut self.stream;
            let drain = async move { while let Some(Ok(_)) = stream.next().await {} };
            tokio::time::timeout(timeout, drain)
                .await
                .map_err(|_| SyncError::Timeout("peer did not acknowledge close".into()))
        }
    }

    impl std::fmt::Debug for WebSocketConnection {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("WebSocketConnection").finish_non_exhaustive()
        }
    }
}
