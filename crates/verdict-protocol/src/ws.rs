// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! WebSocket transport for duplex channels.
//!
//! Each opened channel owns one spawned connection task. Outbound frames are
//! queued on an unbounded mpsc so `send` never blocks; the task forwards them
//! in order and reports incoming frames to the channel's handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::channel::{
    ChannelError, ChannelEvent, DuplexChannel, Endpoint, EventHandler, TokenProvider, Transport,
    deliver_text,
};
use crate::envelope::Envelope;

/// Configuration for the WebSocket transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL; endpoint paths are appended to it
    pub base_url: Url,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("ws://127.0.0.1:8080/ws").expect("default base url is valid"),
            connect_timeout_ms: 10_000,
        }
    }
}

impl TransportConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            ..Default::default()
        }
    }

    /// Full URL of an endpoint.
    pub fn endpoint_url(&self, endpoint: Endpoint) -> Result<Url, ChannelError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ChannelError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(endpoint.path());
        Ok(url)
    }
}

enum Outbound {
    Frame(String),
    Close,
}

/// WebSocket implementation of [`Transport`].
///
/// `open` spawns onto the current tokio runtime and must be called from
/// within one.
pub struct WsTransport {
    config: TransportConfig,
    tokens: Arc<dyn TokenProvider>,
}

impl WsTransport {
    pub fn new(config: TransportConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { config, tokens }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn build_request(&self, endpoint: Endpoint) -> Result<Request, ChannelError> {
        let url = self.config.endpoint_url(endpoint)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ChannelError::InvalidUrl(e.to_string()))?;

        if let Some(token) = self.tokens.token() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ChannelError::InvalidHeader(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        Ok(request)
    }
}

impl Transport for WsTransport {
    fn open(&self, endpoint: Endpoint, handler: EventHandler) -> Box<dyn DuplexChannel> {
        let (outbound, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let connect_timeout_ms = self.config.connect_timeout_ms;
        let request = self.build_request(endpoint);

        let task_closed = closed.clone();
        tokio::spawn(async move {
            match request {
                Ok(request) => {
                    run_connection(endpoint, request, rx, handler, connect_timeout_ms).await
                }
                Err(e) => {
                    warn!(%endpoint, error = %e, "cannot build channel request");
                    handler(ChannelEvent::Error(e.to_string()));
                    handler(ChannelEvent::Closed(None));
                }
            }
            task_closed.store(true, Ordering::SeqCst);
        });

        Box::new(WsChannel {
            endpoint,
            outbound,
            closed,
        })
    }
}

#[instrument(skip(request, outbound, handler))]
async fn run_connection(
    endpoint: Endpoint,
    request: Request,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    handler: EventHandler,
    connect_timeout_ms: u64,
) {
    let timeout = Duration::from_millis(connect_timeout_ms);
    let stream = match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request))
        .await
    {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            warn!(error = %e, "channel connect failed");
            handler(ChannelEvent::Error(
                ChannelError::Connect(e.to_string()).to_string(),
            ));
            handler(ChannelEvent::Closed(None));
            return;
        }
        Err(_) => {
            warn!(timeout_ms = connect_timeout_ms, "channel connect timed out");
            handler(ChannelEvent::Error(
                ChannelError::Timeout(connect_timeout_ms).to_string(),
            ));
            handler(ChannelEvent::Closed(None));
            return;
        }
    };

    info!("channel open");
    handler(ChannelEvent::Ready);

    let (mut sink, mut stream) = stream.split();

    let close_code = loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(Outbound::Frame(text)) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        warn!(error = %e, "channel send failed");
                        handler(ChannelEvent::Error(e.to_string()));
                        break None;
                    }
                }
                Some(Outbound::Close) | None => {
                    debug!("closing channel");
                    let _ = sink.send(Message::Close(None)).await;
                    break Some(1000);
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    deliver_text(&handler, text.as_str());
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame.map(|f| u16::from(f.code));
                }
                // binary, ping and pong frames carry nothing for us
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "channel receive failed");
                    handler(ChannelEvent::Error(e.to_string()));
                    break None;
                }
                None => break None,
            },
        }
    };

    info!(code = ?close_code, "channel closed");
    handler(ChannelEvent::Closed(close_code));
}

struct WsChannel {
    endpoint: Endpoint,
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: Arc<AtomicBool>,
}

impl DuplexChannel for WsChannel {
    fn send(&self, envelope: Envelope) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        let text = envelope.encode()?;
        debug!(endpoint = %self.endpoint, kind = %envelope.kind, "sending frame");
        self.outbound
            .send(Outbound::Frame(text))
            .map_err(|_| ChannelError::Closed)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.outbound.send(Outbound::Close);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::StaticToken;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.base_url.as_str(), "ws://127.0.0.1:8080/ws");
        assert_eq!(config.connect_timeout_ms, 10_000);
    }

    #[test]
    fn test_endpoint_url_appends_path() {
        let config = TransportConfig::default();
        assert_eq!(
            config.endpoint_url(Endpoint::Execution).unwrap().as_str(),
            "ws://127.0.0.1:8080/ws/execute"
        );

        let config = TransportConfig::new(Url::parse("wss://judge.example.com/ws/").unwrap());
        assert_eq!(
            config.endpoint_url(Endpoint::Submissions).unwrap().as_str(),
            "wss://judge.example.com/ws/submissions"
        );
    }

    #[test]
    fn test_endpoint_url_rejects_cannot_be_a_base() {
        let config = TransportConfig::new(Url::parse("data:text/plain,hello").unwrap());
        assert!(matches!(
            config.endpoint_url(Endpoint::Judge),
            Err(ChannelError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_request_carries_bearer_token() {
        let transport = WsTransport::new(
            TransportConfig::default(),
            Arc::new(StaticToken::new("secret")),
        );
        let request = transport.build_request(Endpoint::Judge).unwrap();
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer secret"
        );
        assert_eq!(request.uri().path(), "/ws/judge");
    }

    #[test]
    fn test_request_without_token() {
        let transport =
            WsTransport::new(TransportConfig::default(), Arc::new(StaticToken::anonymous()));
        let request = transport.build_request(Endpoint::Execution).unwrap();
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_request_rejects_invalid_token() {
        let transport = WsTransport::new(
            TransportConfig::default(),
            Arc::new(StaticToken::new("bad\ntoken")),
        );
        assert!(matches!(
            transport.build_request(Endpoint::Execution),
            Err(ChannelError::InvalidHeader(_))
        ));
    }
}
