//! Transport framing for the two connection kinds.
//!
//! # Responsibilities
//! - Raw stream connections: the unit of data is whatever bytes arrive,
//!   bounded by the configured receive buffer; no framing is imposed
//! - Message connections: one decoded WebSocket frame per read; Ping/Pong are
//!   handled internally, a Close frame ends the stream
//! - Unify I/O, protocol, and timeout failures behind one error type
//!
//! # Design Decisions
//! - The upgrade handshake belongs to an external negotiation layer; this
//!   module receives an already-negotiated `WebSocketStream`
//! - Close frames are propagated on teardown so message peers see a clean
//!   shutdown instead of a dropped socket

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

/// How a connection's wire data is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// Raw byte stream; reads return whatever arrived.
    Stream,
    /// Upgraded full-duplex message connection; reads return whole frames.
    Message,
}

/// Failure on the read or write path of a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket failure: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Reading half of a connection's transport.
pub(crate) enum FrameReader {
    Stream {
        read: OwnedReadHalf,
        buf: Vec<u8>,
    },
    Message {
        stream: SplitStream<WebSocketStream<TcpStream>>,
    },
}

impl FrameReader {
    /// Read the next unit of data. `Ok(None)` means the peer closed cleanly
    /// (EOF on a raw stream, a Close frame on a message connection).
    pub(crate) async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self {
            FrameReader::Stream { read, buf } => {
                let n = read.read(buf.as_mut_slice()).await?;
                if n == 0 {
                    Ok(None)
                } else {
                    Ok(Some(buf[..n].to_vec()))
                }
            }
            FrameReader::Message { stream } => loop {
                match stream.next().await {
                    None => return Ok(None),
                    Some(Err(err)) => return Err(err.into()),
                    Some(Ok(Message::Binary(data))) => return Ok(Some(data.to_vec())),
                    Some(Ok(Message::Text(text))) => return Ok(Some(text.as_bytes().to_vec())),
                    Some(Ok(Message::Close(_))) => return Ok(None),
                    // Ping/Pong are answered by the protocol layer.
                    Some(Ok(_)) => continue,
                }
            },
        }
    }
}

/// Writing half of a connection's transport. Owned exclusively by the
/// connection's task, so writes are serialized by construction.
pub(crate) enum FrameWriter {
    Stream(OwnedWriteHalf),
    Message(SplitSink<WebSocketStream<TcpStream>, Message>),
}

impl FrameWriter {
    pub(crate) async fn write_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        match self {
            FrameWriter::Stream(write) => {
                write.write_all(payload).await?;
                Ok(())
            }
            FrameWriter::Message(sink) => {
                sink.send(Message::binary(payload.to_vec())).await?;
                Ok(())
            }
        }
    }

    /// Release the transport: shut down the raw write half, or complete the
    /// close handshake for a message connection.
    pub(crate) async fn finish(&mut self) -> Result<(), TransportError> {
        match self {
            FrameWriter::Stream(write) => {
                write.shutdown().await?;
                Ok(())
            }
            FrameWriter::Message(sink) => {
                sink.close().await?;
                Ok(())
            }
        }
    }
}

/// Split an accepted TCP stream into framing halves.
pub(crate) fn split_stream(stream: TcpStream, recv_buffer: usize) -> (FrameReader, FrameWriter) {
    let (read, write) = stream.into_split();
    (
        FrameReader::Stream {
            read,
            buf: vec![0; recv_buffer],
        },
        FrameWriter::Stream(write),
    )
}

/// Split an already-negotiated WebSocket stream into framing halves.
pub(crate) fn split_message(stream: WebSocketStream<TcpStream>) -> (FrameReader, FrameWriter) {
    let (sink, stream) = stream.split();
    (
        FrameReader::Message { stream },
        FrameWriter::Message(sink),
    )
}
