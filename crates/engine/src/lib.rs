// SPDX-License-Identifier: Apache-2.0

//! Cooperative task executor with serialized strands.
//!
//! The executor runs opaque tasks either on its own worker threads or, with
//! zero workers, driven externally by [`Executor::spin_once`] from a service
//! main loop. A [`Strand`] is a logical serial lane over the executor: at
//! most one task posted through a given strand runs at any time, in posting
//! order. Strands are how the services confine non-thread-safe resources
//! (the SDK session, the correlation cache) without dedicating a thread to
//! each.

mod executor;
mod strand;

pub use executor::Executor;
pub use strand::Strand;
