//! Server side of the live protocol: sequence numbering, the replay outbox,
//! and the resume decision.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures_channel::mpsc::UnboundedSender;
use tracing::{debug, warn};
use vango_core::{FiberId, Patch, PatchSink};

use crate::codec::{encode_frame, Frame};

/// Tunables for one live connection.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Idle interval between heartbeat frames.
    pub heartbeat: std::time::Duration,
    /// How many unacknowledged Patches frames the outbox retains for
    /// resume. Older history forces a full resync.
    pub resume_window: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        LiveConfig {
            heartbeat: std::time::Duration::from_secs(15),
            resume_window: 256,
        }
    }
}

/// What to do with a `Hello`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelloOutcome {
    /// Re-send these frames (everything after the client's `last_seq`) and
    /// carry on.
    Resume(Vec<Vec<u8>>),
    /// History is gone or the client is ahead of us: tell it to reload.
    FullResync,
}

/// Per-connection sender state. One session serves one client; the
/// embedding's session store maps session ids to these.
pub struct LiveSession {
    seq: u64,
    outbox: VecDeque<(u64, Vec<u8>)>,
    resume_window: usize,
}

impl Default for LiveSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveSession {
    pub fn new() -> LiveSession {
        LiveSession::with_window(LiveConfig::default().resume_window)
    }

    pub fn with_window(resume_window: usize) -> LiveSession {
        LiveSession {
            seq: 0,
            outbox: VecDeque::new(),
            resume_window,
        }
    }

    /// Seq of the most recently produced Patches frame.
    pub fn last_seq(&self) -> u64 {
        self.seq
    }

    /// Wrap a patch batch in the next numbered frame and retain it for
    /// resume.
    pub fn push_patches(&mut self, patches: &[Patch]) -> Vec<u8> {
        self.seq += 1;
        let bytes = encode_frame(&Frame::Patches {
            seq: self.seq,
            patches: patches.to_vec(),
        });
        self.outbox.push_back((self.seq, bytes.clone()));
        while self.outbox.len() > self.resume_window {
            self.outbox.pop_front();
        }
        bytes
    }

    /// Drop retained frames the client has confirmed.
    pub fn ack(&mut self, last_seq: u64) {
        self.outbox.retain(|(seq, _)| *seq > last_seq);
    }

    /// Decide how to answer a `Hello`. Resume requires an intact outbox
    /// suffix covering everything after the client's `last_seq`.
    pub fn handle_hello(&mut self, resumable: bool, last_seq: u64) -> HelloOutcome {
        if !resumable || last_seq > self.seq {
            warn!(last_seq, server_seq = self.seq, "client not resumable");
            return HelloOutcome::FullResync;
        }
        if last_seq == self.seq {
            self.ack(last_seq);
            debug!(last_seq, "client fully caught up");
            return HelloOutcome::Resume(Vec::new());
        }
        let covered = self
            .outbox
            .front()
            .is_some_and(|(oldest, _)| *oldest <= last_seq + 1);
        if !covered {
            warn!(last_seq, "resume history evicted; full resync");
            return HelloOutcome::FullResync;
        }
        self.ack(last_seq);
        let replay: Vec<Vec<u8>> = self
            .outbox
            .iter()
            .map(|(_, bytes)| bytes.clone())
            .collect();
        debug!(last_seq, frames = replay.len(), "resuming client");
        HelloOutcome::Resume(replay)
    }

    /// Forget everything, ready for the fresh insert stream that follows a
    /// full resync.
    pub fn reset(&mut self) {
        self.seq = 0;
        self.outbox.clear();
    }
}

/// Live sessions keyed by the embedding's session id, so a reconnecting
/// client finds the sender state it left behind. The registry holds no
/// transport resources; dropping an entry abandons its resume history.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<rustc_hash::FxHashMap<String, Arc<Mutex<LiveSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> SessionRegistry {
        SessionRegistry::default()
    }

    pub fn get_or_create(&self, id: &str) -> Arc<Mutex<LiveSession>> {
        self.sessions
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Mutex<LiveSession>>> {
        self.sessions.lock().unwrap().remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A scheduler sink that encodes every batch through a shared session and
/// forwards the frames to the transport task.
pub struct LivePatchSink {
    session: Arc<Mutex<LiveSession>>,
    outgoing: UnboundedSender<Vec<u8>>,
}

impl LivePatchSink {
    pub fn new(session: Arc<Mutex<LiveSession>>, outgoing: UnboundedSender<Vec<u8>>) -> Self {
        LivePatchSink { session, outgoing }
    }
}

impl PatchSink for LivePatchSink {
    fn flush(&mut self, fiber: FiberId, patches: Vec<Patch>) {
        let bytes = self.session.lock().unwrap().push_patches(&patches);
        if self.outgoing.unbounded_send(bytes).is_err() {
            // Transport task is gone; frames stay in the outbox for resume.
            debug!(%fiber, "live transport closed; frame retained for resume");
        }
    }
}
