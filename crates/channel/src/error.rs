// SPDX-License-Identifier: Apache-2.0

//! Errors for the queues.

/// Errors that can occur pushing into a bounded queue.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SendError<T> {
    /// The queue is at capacity and the item was not enqueued.
    #[error("Queue is full and the item was not enqueued")]
    Full(T),

    /// The queue is closed and the item was not enqueued.
    #[error("Queue is closed and the item was not enqueued")]
    Closed(T),
}

impl<T> SendError<T> {
    /// Returns the item that could not be enqueued, whichever way it failed.
    pub fn inner(self) -> T {
        match self {
            Self::Full(t) => t,
            Self::Closed(t) => t,
        }
    }
}
