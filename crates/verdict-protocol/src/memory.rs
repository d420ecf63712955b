// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process transport.
//!
//! [`MemoryTransport`] opens channels that go nowhere: every sent envelope is
//! recorded, and the server side of each channel is driven by hand through a
//! [`MemoryPeer`]. Handlers run synchronously on the caller's thread, so a
//! scripted exchange is fully deterministic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::channel::{
    ChannelError, ChannelEvent, DuplexChannel, Endpoint, EventHandler, Transport, deliver_text,
};
use crate::envelope::Envelope;

struct PeerState {
    endpoint: Endpoint,
    handler: EventHandler,
    sent: Mutex<Vec<Envelope>>,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transport whose channels are scripted by the caller.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    peers: Arc<Mutex<Vec<MemoryPeer>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every channel opened so far, oldest first.
    pub fn peers(&self) -> Vec<MemoryPeer> {
        lock(&self.peers).clone()
    }

    /// Channels opened to one endpoint, oldest first.
    pub fn peers_for(&self, endpoint: Endpoint) -> Vec<MemoryPeer> {
        lock(&self.peers)
            .iter()
            .filter(|peer| peer.endpoint() == endpoint)
            .cloned()
            .collect()
    }

    /// Most recently opened channel to `endpoint`.
    pub fn last(&self, endpoint: Endpoint) -> Option<MemoryPeer> {
        self.peers_for(endpoint).pop()
    }

    /// Channels to `endpoint` the client has not closed.
    pub fn open_count(&self, endpoint: Endpoint) -> usize {
        self.peers_for(endpoint)
            .iter()
            .filter(|peer| !peer.is_closed())
            .count()
    }
}

impl Transport for MemoryTransport {
    fn open(&self, endpoint: Endpoint, handler: EventHandler) -> Box<dyn DuplexChannel> {
        let state = Arc::new(PeerState {
            endpoint,
            handler,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        lock(&self.peers).push(MemoryPeer {
            state: state.clone(),
        });
        Box::new(MemoryChannel { state })
    }
}

struct MemoryChannel {
    state: Arc<PeerState>,
}

impl DuplexChannel for MemoryChannel {
    fn send(&self, envelope: Envelope) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        lock(&self.state.sent).push(envelope);
        Ok(())
    }

    fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Server side of a [`MemoryTransport`] channel.
#[derive(Clone)]
pub struct MemoryPeer {
    state: Arc<PeerState>,
}

impl MemoryPeer {
    pub fn endpoint(&self) -> Endpoint {
        self.state.endpoint
    }

    /// Signal that the connection is open.
    pub fn ready(&self) {
        (self.state.handler)(ChannelEvent::Ready);
    }

    /// Deliver a typed server message.
    pub fn push<M: Serialize>(&self, message: &M) -> Result<(), serde_json::Error> {
        self.push_envelope(Envelope::from_message(message)?);
        Ok(())
    }

    pub fn push_envelope(&self, envelope: Envelope) {
        (self.state.handler)(ChannelEvent::Message(envelope));
    }

    /// Deliver raw text through the same parse-or-drop path as a real transport.
    pub fn push_text(&self, text: &str) -> bool {
        deliver_text(&self.state.handler, text)
    }

    /// Report a transport failure followed by a close without code.
    pub fn fail(&self, message: &str) {
        self.state.closed.store(true, Ordering::SeqCst);
        (self.state.handler)(ChannelEvent::Error(message.to_string()));
        (self.state.handler)(ChannelEvent::Closed(None));
    }

    /// Close from the server side.
    pub fn close(&self, code: Option<u16>) {
        self.state.closed.store(true, Ordering::SeqCst);
        (self.state.handler)(ChannelEvent::Closed(code));
    }

    /// Envelopes the client sent, in order.
    pub fn sent(&self) -> Vec<Envelope> {
        lock(&self.state.sent).clone()
    }

    pub fn sent_kinds(&self) -> Vec<String> {
        lock(&self.state.sent)
            .iter()
            .map(|env| env.kind.clone())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}
