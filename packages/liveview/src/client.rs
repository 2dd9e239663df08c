//! Client side of the live protocol: sequence checking and the reconnect
//! handshake.

use tracing::{debug, warn};
use vango_core::Patch;

use crate::codec::{decode_frame, encode_frame, CodecError, Frame};

/// What one incoming frame means for the embedding.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Apply these to the host applier.
    Patches(Vec<Patch>),
    /// Discard the node-id map and re-request the page.
    FullResync,
    /// Connection is alive; nothing to do.
    Heartbeat,
    /// A gap or replay in the stream. Reconnect and say Hello; the server
    /// decides between resume and full resync.
    OutOfSync { expected: u64, got: u64 },
}

/// Tracks how much of the stream has been applied.
pub struct LiveClient {
    resumable: bool,
    last_seq: u64,
}

impl Default for LiveClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveClient {
    pub fn new() -> LiveClient {
        LiveClient {
            resumable: true,
            last_seq: 0,
        }
    }

    /// A client that always reloads instead of resuming.
    pub fn non_resumable() -> LiveClient {
        LiveClient {
            resumable: false,
            last_seq: 0,
        }
    }

    /// Highest contiguously applied sequence number.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// The handshake to send on every (re)connect.
    pub fn hello(&self) -> Vec<u8> {
        encode_frame(&Frame::Hello {
            resumable: self.resumable,
            last_seq: self.last_seq,
        })
    }

    /// Interpret one incoming frame. Out-of-order patch frames are *not*
    /// applied; replay from `last_seq` keeps application idempotent.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<ClientEvent, CodecError> {
        match decode_frame(bytes)? {
            Frame::Patches { seq, patches } => {
                let expected = self.last_seq + 1;
                if seq != expected {
                    warn!(expected, got = seq, "patch frame out of sequence");
                    return Ok(ClientEvent::OutOfSync { expected, got: seq });
                }
                self.last_seq = seq;
                Ok(ClientEvent::Patches(patches))
            }
            Frame::FullResync => {
                debug!("server requested full resync");
                self.last_seq = 0;
                Ok(ClientEvent::FullResync)
            }
            Frame::Heartbeat => Ok(ClientEvent::Heartbeat),
            Frame::Hello { .. } => Err(CodecError::UnexpectedFrame("Hello")),
        }
    }
}
