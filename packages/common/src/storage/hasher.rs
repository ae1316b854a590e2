//! Streaming SHA-256 over an async byte source.
//!
//! The source is consumed exactly once in bounded chunks. Every chunk can be
//! teed into a sink (a spool file, a blob writer) so callers never need the
//! whole payload in memory and never read the source twice.

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::hash::ContentHash;

/// Read buffer size used while hashing.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Digest and byte count of a fully consumed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDigest {
    pub hash: ContentHash,
    /// Bytes actually read from the source.
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum HashError {
    /// The source stream failed mid-read.
    #[error("source stream failed: {0}")]
    Read(#[source] std::io::Error),
    /// The tee sink rejected a chunk.
    #[error("failed to write chunk to sink: {0}")]
    Sink(#[source] std::io::Error),
    #[error("stream exceeds size limit ({actual} > {limit} bytes)")]
    SizeLimitExceeded { actual: u64, limit: u64 },
}

/// Hash `reader` to completion, copying every chunk into `sink`.
///
/// No digest is produced unless the source reaches EOF cleanly; on any error
/// the partially updated hasher is dropped.
pub async fn digest_stream<R, W>(
    reader: &mut R,
    sink: &mut W,
    max_size: u64,
) -> Result<StreamDigest, HashError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut hasher = Sha256::new();
    let mut total: u64 = 0;
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buf).await.map_err(HashError::Read)?;
        if n == 0 {
            break;
        }

        total += n as u64;
        if total > max_size {
            return Err(HashError::SizeLimitExceeded {
                actual: total,
                limit: max_size,
            });
        }

        hasher.update(&buf[..n]);
        sink.write_all(&buf[..n]).await.map_err(HashError::Sink)?;
    }

    sink.flush().await.map_err(HashError::Sink)?;

    Ok(StreamDigest {
        hash: ContentHash::from_bytes(hasher.finalize().into()),
        size: total,
    })
}
