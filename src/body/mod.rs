//! Request body aggregation.
//!
//! The whole body is collected into one buffer before any middleware runs. Chunks are kept
//! as they arrive and concatenated once the stream ends.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::exception::{Error, HttpException};

const READ_CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BodyError> for Error {
    fn from(err: BodyError) -> Self {
        match err {
            BodyError::TooLarge { .. } => {
                HttpException::payload_too_large("Request entity too large").into()
            }
            BodyError::Io(e) => Error::unexpected(e),
        }
    }
}

/// Collects body chunks, enforcing an optional size limit.
#[derive(Debug, Default)]
pub struct BodyAggregator {
    chunks: Vec<Bytes>,
    received: usize,
    limit: Option<usize>,
}

impl BodyAggregator {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Appends a chunk.
    ///
    /// # Errors
    ///
    /// [`BodyError::TooLarge`] once the total passes the limit. The chunk is dropped.
    pub fn push(&mut self, chunk: impl Into<Bytes>) -> Result<(), BodyError> {
        let chunk = chunk.into();
        let received = self.received + chunk.len();
        if let Some(limit) = self.limit.filter(|&limit| received > limit) {
            return Err(BodyError::TooLarge { limit });
        }
        self.received = received;
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
        Ok(())
    }

    pub fn received(&self) -> usize {
        self.received
    }

    /// Concatenates every chunk into the final body.
    pub fn finish(mut self) -> Bytes {
        match self.chunks.len() {
            0 => Bytes::new(),
            1 => self.chunks.swap_remove(0),
            _ => {
                let mut body = BytesMut::with_capacity(self.received);
                for chunk in &self.chunks {
                    body.extend_from_slice(chunk);
                }
                body.freeze()
            }
        }
    }
}

/// Reads `reader` to EOF and returns the aggregated body.
pub async fn aggregate<R>(mut reader: R, limit: Option<usize>) -> Result<Bytes, BodyError>
where
    R: AsyncRead + Unpin,
{
    let mut aggregator = BodyAggregator::new(limit);
    loop {
        let mut chunk = BytesMut::with_capacity(READ_CHUNK_SIZE);
        if reader.read_buf(&mut chunk).await? == 0 {
            break;
        }
        aggregator.push(chunk.freeze())?;
    }
    Ok(aggregator.finish())
}

/// Rejects a declared `Content-Length` that is already over the limit.
pub fn check_declared_length(length: usize, limit: Option<usize>) -> Result<(), BodyError> {
    match limit {
        Some(limit) if length > limit => Err(BodyError::TooLarge { limit }),
        _ => Ok(()),
    }
}
