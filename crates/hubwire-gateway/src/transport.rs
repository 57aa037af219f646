//! Transport-neutral WebSocket frames and the per-connection writer.
//!
//! Every connection owns exactly one writer task. Everything that wants to
//! send a frame goes through the bounded queue feeding it, so frames from
//! timers and handlers never interleave on the socket.

use std::fmt::Display;

use futures::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default depth of a connection's outbound queue.
pub const OUTBOUND_QUEUE_DEPTH: usize = 64;

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;
pub const CLOSE_SERVICE_RESTART: u16 = 1012;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Binary(Vec<u8>),
    Text(String),
    Close { code: u16, reason: String },
}

impl WireFrame {
    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        Self::Close {
            code,
            reason: reason.into(),
        }
    }
}

/// Drain `outbound` into `sink` until the queue closes or a close frame
/// has been written.
pub fn spawn_writer<Si>(mut sink: Si, mut outbound: mpsc::Receiver<WireFrame>) -> JoinHandle<()>
where
    Si: Sink<WireFrame> + Send + Unpin + 'static,
    Si::Error: Display,
{
    tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let closing = matches!(frame, WireFrame::Close { .. });
            if let Err(e) = sink.send(frame).await {
                debug!(error = %e, "Socket write failed, stopping writer");
                return;
            }
            if closing {
                break;
            }
        }
        if let Err(e) = sink.close().await {
            warn!(error = %e, "Failed to close socket");
        }
    })
}
