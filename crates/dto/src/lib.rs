// SPDX-License-Identifier: Apache-2.0

//! The message envelope published on every bus topic.
//!
//! Topics never carry bare payloads: each message is an [`EventDto`] with a
//! schema id, topic echo, source service name, correlation id and timestamp
//! around an opaque payload string (in this system, always a KV payload).
//! Subscribers drop messages whose schema id does not match the one they
//! bound to, and never fail on malformed bytes.

pub mod time;

mod error;

pub use error::Error;

use serde::{Deserialize, Serialize};

/// Envelope version emitted by this codebase.
pub const DTO_VERSION: i32 = 1;

/// Message envelope exchanged on the bus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDto {
    /// Envelope version, currently always [`DTO_VERSION`].
    pub version: i32,
    /// Payload schema identifier, e.g. `ws.arm_command.v1`.
    pub schema_id: String,
    /// Topic the message was published on.
    pub topic: String,
    /// Service that produced the message.
    pub source: String,
    /// Request correlation id; empty when the message is uncorrelated.
    pub event_id: String,
    /// Wall-clock milliseconds at publish time.
    pub timestamp_ms: u64,
    /// Opaque payload; a KV string everywhere in this system.
    pub payload: String,
}

impl EventDto {
    /// Creates an envelope for `topic` with the given schema id.
    #[must_use]
    pub fn new(schema_id: impl Into<String>, topic: impl Into<String>) -> Self {
        EventDto {
            version: DTO_VERSION,
            schema_id: schema_id.into(),
            topic: topic.into(),
            ..EventDto::default()
        }
    }

    /// Stamps the producing service and the current wall-clock time.
    pub fn fill_meta(&mut self, source: &str) {
        self.source = source.to_owned();
        self.timestamp_ms = time::now_epoch_ms();
    }

    /// Serializes the envelope, refusing payloads above `max_payload` bytes.
    pub fn encode(&self, max_payload: usize) -> Result<Vec<u8>, Error> {
        if self.payload.len() > max_payload {
            return Err(Error::PayloadTooLarge {
                size: self.payload.len(),
                max: max_payload,
            });
        }
        serde_json::to_vec(self).map_err(|e| Error::Encode {
            details: e.to_string(),
        })
    }

    /// Deserializes an envelope from raw bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::Decode {
            details: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let mut dto = EventDto::new("ws.arm_command.v1", "/arm/command");
        dto.fill_meta("workstation_bt_service");
        dto.event_id = "42".into();
        dto.payload = "op=demo_echo;id=42;msg=hi".into();

        let bytes = dto.encode(8192).expect("encode");
        let back = EventDto::decode(&bytes).expect("decode");
        assert_eq!(back, dto);
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let mut dto = EventDto::new("ws.arm_status.v1", "/arm/status");
        dto.payload = "x".repeat(64);
        match dto.encode(16) {
            Err(Error::PayloadTooLarge { size: 64, max: 16 }) => {}
            other => panic!("expected PayloadTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_garbage_is_an_error_not_a_panic() {
        assert!(EventDto::decode(b"\x00\x01not json").is_err());
    }
}
