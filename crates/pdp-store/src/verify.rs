//! Streaming, hash-checked `Put` via a verifying reader.
//!
//! Rather than implementing `AsyncRead` and smuggling a mismatch through a
//! `poll_read` error (which can't carry "here are the bytes anyway"), this
//! drives the copy itself: bytes are written to the destination as they
//! arrive and the digest is checked only once the source is exhausted. On
//! mismatch the caller gets back how many bytes were already written, since
//! those bytes are sitting in the destination and must be discarded by the
//! caller — we do not attempt to truncate concurrently-visible state here.

use crate::digest::{Digest, Hasher};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("hash mismatch: expected {expected}, got {actual} ({bytes_written} bytes already written)")]
    HashMismatch {
        expected: Digest,
        actual: Digest,
        bytes_written: u64,
    },
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One digest this copy must satisfy by the time the source is exhausted.
struct PendingCheck {
    expected: Digest,
    hasher: Hasher,
}

/// Copies `source` into `sink`, verifying one or more digests against the
/// bytes as they pass through, and optionally the total byte count.
///
/// Panics if `checks` is empty: constructing a verifying reader with no
/// hasher to check is a programmer error, not a runtime failure to surface
/// to a caller.
pub struct VerifyingCopy {
    checks: Vec<PendingCheck>,
    expected_size: Option<u64>,
}

impl VerifyingCopy {
    pub fn new(expected_digests: Vec<Digest>, expected_size: Option<u64>) -> Self {
        assert!(
            !expected_digests.is_empty(),
            "VerifyingCopy requires at least one expected digest"
        );
        let checks = expected_digests
            .into_iter()
            .map(|expected| {
                let code = expected.code;
                PendingCheck { expected, hasher: Hasher::new(code) }
            })
            .collect();
        Self { checks, expected_size }
    }

    /// Streams `source` into `sink`, updating every pending hasher on each
    /// chunk. Returns the total number of bytes copied on success.
    pub async fn run<R, W>(mut self, mut source: R, mut sink: W) -> Result<u64, VerifyError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total: u64 = 0;

        loop {
            let n = source.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let chunk = &buf[..n];
            sink.write_all(chunk).await?;
            total += n as u64;
            for check in &mut self.checks {
                check.hasher.update(chunk);
            }
        }
        sink.flush().await?;

        if let Some(expected_size) = self.expected_size {
            if expected_size != total {
                return Err(VerifyError::SizeMismatch { expected: expected_size, actual: total });
            }
        }

        for check in self.checks {
            let actual = check.hasher.finalize();
            if actual != check.expected {
                return Err(VerifyError::HashMismatch {
                    expected: check.expected,
                    actual,
                    bytes_written: total,
                });
            }
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::Digest;

    #[tokio::test]
    async fn matching_digest_and_size_succeeds() {
        let data = b"the quick brown fox".to_vec();
        let expected = Digest::sha256_of(&data);
        let copy = VerifyingCopy::new(vec![expected], Some(data.len() as u64));

        let mut out = Vec::new();
        let total = copy.run(&data[..], &mut out).await.unwrap();
        assert_eq!(total, data.len() as u64);
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn mismatched_digest_reports_bytes_already_written() {
        let data = b"the quick brown fox".to_vec();
        let wrong = Digest::sha256_of(b"something else entirely");
        let copy = VerifyingCopy::new(vec![wrong], None);

        let mut out = Vec::new();
        let err = copy.run(&data[..], &mut out).await.unwrap_err();
        match err {
            VerifyError::HashMismatch { bytes_written, .. } => {
                assert_eq!(bytes_written, data.len() as u64);
            }
            other => panic!("expected HashMismatch, got {other:?}"),
        }
        // bytes already landed in the sink; caller is responsible for discarding them.
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn size_mismatch_is_reported_before_hash_check() {
        let data = b"12345".to_vec();
        let expected = Digest::sha256_of(&data);
        let copy = VerifyingCopy::new(vec![expected], Some(10));

        let mut out = Vec::new();
        let err = copy.run(&data[..], &mut out).await.unwrap_err();
        assert!(matches!(err, VerifyError::SizeMismatch { expected: 10, actual: 5 }));
    }

    #[tokio::test]
    async fn two_chained_digests_both_checked() {
        let data = b"chained check".to_vec();
        let a = Digest::sha256_of(&data);
        let b = Digest::sha256_of(&data);
        let copy = VerifyingCopy::new(vec![a, b], None);
        let mut out = Vec::new();
        copy.run(&data[..], &mut out).await.unwrap();
    }
}
