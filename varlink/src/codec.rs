//! NUL-terminated JSON framing.
//!
//! Every message is one JSON value immediately followed by a zero byte. There
//! is no length prefix and no size limit at this layer.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{FramingError, Result};

/// Serialize `value` and append the terminating zero byte.
pub fn encode_message<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = serde_json::to_vec(value).map_err(|e| FramingError::Encode(Arc::new(e)))?;
    buf.push(0);
    Ok(buf)
}

/// Reads one message per call from a buffered byte stream.
#[derive(Debug)]
pub struct MessageReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> MessageReader<R> {
    pub fn new(inner: R) -> Self {
        MessageReader {
            inner,
            buf: Vec::new(),
        }
    }

    /// Read up to and including the next zero byte and decode what precedes it.
    ///
    /// `Ok(None)` means the stream ended cleanly between two messages. Not
    /// cancellation safe: a partially read message is lost if the future is
    /// dropped.
    pub async fn read_message<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        self.buf.clear();
        let n = self.inner.read_until(0, &mut self.buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if self.buf.pop() != Some(0) {
            return Err(FramingError::Truncated { buffered: n }.into());
        }
        let value = serde_json::from_slice(&self.buf)
            .map_err(|e| FramingError::Decode(Arc::new(e)))?;
        Ok(Some(value))
    }
}

/// Writes whole messages. Each message goes out in a single `write_all`, so a
/// writer shared between tasks must be behind a lock.
#[derive(Debug)]
pub struct MessageWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(inner: W) -> Self {
        MessageWriter { inner }
    }

    pub async fn write_message<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let buf = encode_message(value)?;
        self.inner.write_all(&buf).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
