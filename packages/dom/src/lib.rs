//! # vango-dom
//!
//! The client half of the patch pipeline: a host capability interface, the
//! applier that replays patch streams against it, an in-memory host for
//! headless use and tests, and the hydration bridge that adopts
//! server-rendered documents without rebuilding them.

mod applier;
mod host;
pub mod hydrate;
pub mod memory;

pub use applier::{ApplyError, HostApplier};
pub use host::{Host, HostError};
pub use hydrate::{hydrate, HydrateConfig, HydrationDrift, HydrationError, HydrationReport};
pub use memory::{MemHandle, MemoryDom};
