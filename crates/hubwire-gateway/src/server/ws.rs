//! Adapters between axum WebSockets and [`WireFrame`]s.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt, future};

use crate::transport::WireFrame;

pub fn to_message(frame: WireFrame) -> Message {
    match frame {
        WireFrame::Binary(bytes) => Message::Binary(bytes.into()),
        WireFrame::Text(text) => Message::Text(text.into()),
        WireFrame::Close { code, reason } => Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })),
    }
}

/// `None` for control frames axum already answers (ping/pong).
pub fn from_message(message: Message) -> Option<WireFrame> {
    match message {
        Message::Binary(bytes) => Some(WireFrame::Binary(bytes.to_vec())),
        Message::Text(text) => Some(WireFrame::Text(text.as_str().to_owned())),
        Message::Close(frame) => Some(match frame {
            Some(f) => WireFrame::close(f.code, f.reason.as_str()),
            None => WireFrame::close(crate::transport::CLOSE_NORMAL, ""),
        }),
        Message::Ping(_) | Message::Pong(_) => None,
    }
}

/// Split a socket into a frame sink and a frame stream.
pub fn split(
    socket: WebSocket,
) -> (
    impl Sink<WireFrame, Error = axum::Error> + Send + Unpin + 'static,
    impl Stream<Item = Result<WireFrame, axum::Error>> + Send + Unpin + 'static,
) {
    let (sink, stream) = socket.split();
    let sink = sink.with(|frame: WireFrame| future::ready(Ok::<_, axum::Error>(to_message(frame))));
    let stream = stream.filter_map(|message| {
        future::ready(match message {
            Ok(message) => from_message(message).map(Ok),
            Err(e) => Some(Err(e)),
        })
    });
    (sink, stream)
}
