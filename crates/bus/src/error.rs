// SPDX-License-Identifier: Apache-2.0

//! Errors for the bus.

/// Errors that can occur operating the bus.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The subscription listener thread could not be spawned.
    #[error("Failed to spawn listener thread for topic `{topic}`: {details}")]
    ListenerSpawn {
        /// Topic the subscription targeted.
        topic: String,
        /// OS-level diagnostics.
        details: String,
    },
}
