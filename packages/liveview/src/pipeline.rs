//! The server-side socket pump.
//!
//! The transport is anything that moves whole binary messages reliably and
//! in order - a websocket upgrade in any web framework does. The pump owns
//! one connection: it forwards encoded frames coming from the scheduler's
//! sink, answers Hello handshakes with a resume or a full resync, and keeps
//! the connection warm with heartbeats.

use std::sync::{Arc, Mutex};

use futures_channel::mpsc::UnboundedReceiver;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tracing::{debug, warn};

use crate::codec::{decode_frame, encode_frame, Frame};
use crate::session::{HelloOutcome, LiveConfig, LiveSession};

/// Connection-level failure. Recoverable by reconnecting and resuming.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("transport failed: {0}")]
    Failed(String),
}

/// Drive one connection until the socket or the update stream closes.
///
/// `updates` carries frames already encoded by a
/// [`LivePatchSink`](crate::LivePatchSink) sharing the same session.
pub async fn serve<S>(
    session: Arc<Mutex<LiveSession>>,
    mut socket: S,
    mut updates: UnboundedReceiver<Vec<u8>>,
    config: LiveConfig,
) -> Result<(), TransportError>
where
    S: Stream<Item = Result<Vec<u8>, TransportError>>
        + Sink<Vec<u8>, Error = TransportError>
        + Unpin,
{
    let start = tokio::time::Instant::now() + config.heartbeat;
    let mut heartbeat = tokio::time::interval_at(start, config.heartbeat);

    loop {
        tokio::select! {
            incoming = socket.next() => match incoming {
                None => {
                    debug!("peer closed the connection");
                    return Ok(());
                }
                Some(Err(err)) => return Err(err),
                Some(Ok(bytes)) => match decode_frame(&bytes) {
                    Ok(Frame::Hello { resumable, last_seq }) => {
                        let outcome = session
                            .lock()
                            .unwrap()
                            .handle_hello(resumable, last_seq);
                        match outcome {
                            HelloOutcome::Resume(frames) => {
                                for frame in frames {
                                    socket.send(frame).await?;
                                }
                            }
                            HelloOutcome::FullResync => {
                                session.lock().unwrap().reset();
                                socket.send(encode_frame(&Frame::FullResync)).await?;
                            }
                        }
                    }
                    Ok(Frame::Heartbeat) => {}
                    Ok(other) => {
                        warn!(?other, "client sent a server-only frame");
                        session.lock().unwrap().reset();
                        socket.send(encode_frame(&Frame::FullResync)).await?;
                    }
                    Err(err) => {
                        warn!(%err, "malformed frame from client");
                        session.lock().unwrap().reset();
                        socket.send(encode_frame(&Frame::FullResync)).await?;
                    }
                },
            },
            update = updates.next() => match update {
                Some(bytes) => socket.send(bytes).await?,
                None => {
                    debug!("scheduler side dropped; closing connection");
                    return Ok(());
                }
            },
            _ = heartbeat.tick() => {
                socket.send(encode_frame(&Frame::Heartbeat)).await?;
            }
        }
    }
}
