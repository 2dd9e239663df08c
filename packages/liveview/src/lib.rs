//! # vango-liveview
//!
//! The binary live-patch protocol: patch batches and control frames encoded
//! with varuint framing, sequence-numbered per direction, over any reliable
//! in-order byte-message transport. A broken connection resumes with a
//! `Hello{resumable, last_seq}` handshake; the server replays retained
//! frames or orders a full resync.
//!
//! Server side: [`LiveSession`] numbers and retains outgoing frames,
//! [`LivePatchSink`] plugs it into the scheduler, [`serve`] pumps a socket.
//! Client side: [`LiveClient`] checks sequence continuity and produces
//! events the embedding applies through its host applier, pacing reconnects
//! with [`ReconnectBackoff`].

mod backoff;
mod client;
pub mod codec;
mod pipeline;
mod session;

pub use backoff::ReconnectBackoff;
pub use client::{ClientEvent, LiveClient};
pub use codec::{decode_frame, encode_frame, CodecError, Frame};
pub use pipeline::{serve, TransportError};
pub use session::{HelloOutcome, LiveConfig, LivePatchSink, LiveSession, SessionRegistry};
