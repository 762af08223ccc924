//! SHA-256 hashing utilities for dataset files

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const SHA256_HEX_LEN: usize = 64;

/// Read size used when hashing files (1 MiB).
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Hash a file's contents, reading it in bounded chunks.
///
/// Returns the lowercase hex digest.
pub fn sha256_of_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    sha256_of_reader(file, CHUNK_SIZE)
}

/// Hash everything `reader` yields, `chunk_size` bytes at a time.
pub fn sha256_of_reader<R: Read>(mut reader: R, chunk_size: usize) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hash raw bytes.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Whether `s` looks like a hex SHA-256 digest (either case).
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == SHA256_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Return the first 8 hex characters of a digest.
pub fn short_hash(hex: &str) -> &str {
    &hex[..hex.len().min(8)]
}

/// Writer that hashes every byte on its way to `inner`.
///
/// Lets a download be written and digested in a single pass. The first
/// error `inner` reports is remembered, so a caller that only sees the
/// error through another layer (an HTTP client, say) can tell a local
/// write failure apart from a transport failure.
pub struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
    error: Option<io::Error>,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
            error: None,
        }
    }

    /// First error the inner writer returned, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    fn record<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if let Err(e) = &result {
            if self.error.is_none() && e.kind() != io::ErrorKind::Interrupted {
                self.error = Some(io::Error::new(e.kind(), e.to_string()));
            }
        }
        result
    }

    /// Bytes accepted so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and return (inner writer, bytes written, lowercase hex digest).
    pub fn finish(mut self) -> io::Result<(W, u64, String)> {
        self.inner.flush()?;
        Ok((self.inner, self.written, hex::encode(self.hasher.finalize())))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(buf);
        let n = self.record(result)?;
        // Only what the inner writer accepted counts
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        self.record(result)
    }
}
