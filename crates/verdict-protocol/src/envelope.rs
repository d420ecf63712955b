// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Message envelope shared by every channel.
//!
//! Each frame on the wire is a single JSON object:
//!
//! ```text
//! { "type": "<MESSAGE_TYPE>", "data": <payload> }
//! ```
//!
//! Parsing is lenient. Text that is not an envelope yields `None` from
//! [`Envelope::try_parse`] and is dropped by the transport; an envelope whose
//! type is outside a channel's vocabulary yields `None` from
//! [`Envelope::decode`] and is dropped by the controller.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single protocol frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Channel-specific message type, e.g. `STDOUT` or `UPDATE`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Message payload; `null` when the frame carries none.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Create an envelope from a type and a raw payload.
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Parse a text frame, returning `None` for anything that is not an envelope.
    pub fn try_parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    /// Encode for wire transmission.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Build an envelope from a typed, adjacently tagged message.
    pub fn from_message<M: Serialize>(message: &M) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(message)?)
    }

    /// Decode into a typed message vocabulary.
    ///
    /// Returns `None` when the type is not part of `M` or the payload does not
    /// match its shape.
    pub fn decode<M: DeserializeOwned>(&self) -> Option<M> {
        let value = serde_json::to_value(self).ok()?;
        serde_json::from_value(value).ok()
    }

    /// Check the message type.
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}
