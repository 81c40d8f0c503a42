//! Replica stream codec
//!
//! Replica links carry a bare sequence of JSON objects. The writer ends each
//! object with a newline for readability, but the reader relies on JSON
//! structure alone, so any whitespace (or none) between objects is accepted.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use hermes_core::{HermesError, HermesResult, Message};

/// Upper bound on a single buffered JSON object
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Bytes reserved per socket read
const READ_CHUNK: usize = 4096;

/// Serialize a message as one newline-terminated JSON object
pub fn encode_message(msg: &Message) -> HermesResult<Vec<u8>> {
    let mut bytes = serde_json::to_vec(msg).map_err(|e| HermesError::Encode(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

fn is_json_whitespace(b: &u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Incremental JSON message decoder over an async byte stream
pub struct ReplicaDecoder<R> {
    reader: R,
    buf: BytesMut,
    /// Buffered bytes already known to hold no complete object
    scanned: usize,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> ReplicaDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_frame_size(reader, MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(reader: R, max_frame_size: usize) -> Self {
        ReplicaDecoder {
            reader,
            buf: BytesMut::with_capacity(READ_CHUNK),
            scanned: 0,
            max_frame_size,
        }
    }

    /// Read the next message
    ///
    /// Returns `Ok(None)` when the stream ends cleanly between objects.
    pub async fn next_message(&mut self) -> HermesResult<Option<Message>> {
        loop {
            if self.may_be_complete() {
                if let Some(msg) = self.try_decode()? {
                    return Ok(Some(msg));
                }
            }

            if self.buf.len() > self.max_frame_size {
                return Err(HermesError::FrameTooLarge {
                    size: self.buf.len(),
                    max: self.max_frame_size,
                });
            }

            self.buf.reserve(READ_CHUNK);
            if self.reader.read_buf(&mut self.buf).await? == 0 {
                return self.finish();
            }
        }
    }

    /// Whether a parse attempt can succeed where the last one ran out of input
    ///
    /// An incomplete object or array only completes with a closing bracket,
    /// so bytes read since the last attempt must contain one.
    fn may_be_complete(&self) -> bool {
        self.scanned == 0
            || self.buf[self.scanned..]
                .iter()
                .any(|b| matches!(b, b'}' | b']'))
    }

    /// Decode one object from the buffer if a complete one is present
    fn try_decode(&mut self) -> HermesResult<Option<Message>> {
        let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Message>();
        match stream.next() {
            Some(Ok(msg)) => {
                let consumed = stream.byte_offset();
                self.buf.advance(consumed);
                self.scanned = 0;
                Ok(Some(msg))
            }
            Some(Err(e)) if e.is_eof() => {
                self.scanned = self.buf.len();
                Ok(None)
            }
            Some(Err(e)) => Err(e.into()),
            None => {
                // only whitespace buffered
                self.buf.clear();
                self.scanned = 0;
                Ok(None)
            }
        }
    }

    /// Outcome at end of stream for whatever is still buffered
    fn finish(&mut self) -> HermesResult<Option<Message>> {
        if self.buf.iter().all(is_json_whitespace) {
            return Ok(None);
        }
        // a bare value can end without a closing bracket
        self.scanned = 0;
        match self.try_decode()? {
            Some(msg) => Ok(Some(msg)),
            None => Err(HermesError::UnexpectedEof),
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// JSON message writer for a replica link
pub struct ReplicaEncoder<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> ReplicaEncoder<W> {
    pub fn new(writer: W) -> Self {
        ReplicaEncoder { writer }
    }

    /// Write and flush one message
    pub async fn send(&mut self, msg: &Message) -> HermesResult<()> {
        let bytes = encode_message(msg)?;
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
