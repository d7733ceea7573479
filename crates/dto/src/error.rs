// SPDX-License-Identifier: Apache-2.0

//! Errors for the envelope codec.

/// Errors that can occur encoding or decoding an envelope.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The payload exceeds the configured size cap.
    #[error("Payload of {size} bytes exceeds the configured cap of {max}")]
    PayloadTooLarge {
        /// Actual payload size in bytes.
        size: usize,
        /// Configured cap in bytes.
        max: usize,
    },

    /// The envelope could not be serialized.
    #[error("Envelope encode failed: {details}")]
    Encode {
        /// Serializer diagnostics.
        details: String,
    },

    /// The bytes do not form a valid envelope.
    #[error("Envelope decode failed: {details}")]
    Decode {
        /// Deserializer diagnostics.
        details: String,
    },
}
