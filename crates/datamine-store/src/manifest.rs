//! Integrity manifest: gzip-compressed list of expected files and digests
//!
//! Decompressed, every non-blank line reads
//! ```text
//! <64 hex chars><2 spaces><relative path>
//! ```
//! e.g. `4140183108…37ec5e  RACE/train/middle/6645.txt`.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

use crate::error::{DatasetError, Result};
use crate::hash::{self, SHA256_HEX_LEN};

/// Width of the separator between digest and path.
const SEPARATOR: &str = "  ";

/// One file the dataset must contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Lowercase hex SHA-256
    pub digest: String,
    /// Path relative to the dataset directory
    pub relative_path: String,
}

impl ManifestEntry {
    pub fn new(digest: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
            relative_path: relative_path.into(),
        }
    }
}

/// Open `path` and stream its entries.
///
/// Each call re-opens the file; the returned reader is single-pass.
pub fn decode_manifest(path: &Path) -> Result<ManifestReader<BufReader<MultiGzDecoder<File>>>> {
    let file = File::open(path).map_err(|e| DatasetError::io(path, e))?;
    Ok(ManifestReader::new(
        BufReader::new(MultiGzDecoder::new(file)),
        path,
    ))
}

/// Forward-only iterator over manifest entries.
///
/// Yields `Err` once for a malformed line or read failure, then stops.
pub struct ManifestReader<R> {
    reader: R,
    source: PathBuf,
    line: String,
    line_number: usize,
    done: bool,
}

impl<R: BufRead> ManifestReader<R> {
    /// Decode already-decompressed manifest text from `reader`.
    pub fn new(reader: R, source: &Path) -> Self {
        Self {
            reader,
            source: source.to_path_buf(),
            line: String::new(),
            line_number: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for ManifestReader<R> {
    type Item = Result<ManifestEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line_number += 1;
                    let trimmed = self.line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let parsed = parse_line(trimmed, self.line_number);
                    self.done = parsed.is_err();
                    return Some(parsed);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(DatasetError::io(&self.source, e)));
                }
            }
        }
        None
    }
}

/// Parse one trimmed, non-empty line.
///
/// The digest must be 64 hex characters. A merely alphanumeric one such as
/// `zzz…` is rejected here as `InvalidDigest` rather than being loaded and
/// only failing to match later, during a deep check.
fn parse_line(line: &str, line_number: usize) -> Result<ManifestEntry> {
    let bytes = line.as_bytes();
    if bytes.len() <= SHA256_HEX_LEN + SEPARATOR.len()
        || &bytes[SHA256_HEX_LEN..SHA256_HEX_LEN + SEPARATOR.len()] != SEPARATOR.as_bytes()
    {
        return Err(DatasetError::ManifestFormat {
            line_number,
            line: line.to_string(),
        });
    }

    // Byte 64 is an ASCII space, so it is a char boundary
    let digest = &line[..SHA256_HEX_LEN];
    if !hash::is_sha256_hex(digest) {
        return Err(DatasetError::InvalidDigest {
            digest: digest.to_string(),
        });
    }
    let relative_path = line[SHA256_HEX_LEN + SEPARATOR.len()..].trim_end();

    Ok(ManifestEntry {
        digest: digest.to_ascii_lowercase(),
        relative_path: relative_path.to_string(),
    })
}

/// Write `entries` as a gzip (level 9) manifest at `path`.
pub fn write_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<()> {
    for entry in entries {
        if !hash::is_sha256_hex(&entry.digest) {
            return Err(DatasetError::InvalidDigest {
                digest: entry.digest.clone(),
            });
        }
        let p = &entry.relative_path;
        if p.trim().is_empty() || p.contains(['\n', '\r']) || p != p.trim_end() {
            return Err(DatasetError::ManifestFormat {
                line_number: 0,
                line: format!("{}{SEPARATOR}{p}", entry.digest),
            });
        }
    }

    let file = File::create(path).map_err(|e| DatasetError::io(path, e))?;
    let mut gz = GzEncoder::new(file, Compression::best());
    let write_all = |gz: &mut GzEncoder<File>| -> std::io::Result<()> {
        for entry in entries {
            writeln!(
                gz,
                "{}{SEPARATOR}{}",
                entry.digest.to_ascii_lowercase(),
                entry.relative_path
            )?;
        }
        Ok(())
    };
    write_all(&mut gz).map_err(|e| DatasetError::io(path, e))?;
    gz.finish()
        .and_then(|f| f.sync_all())
        .map_err(|e| DatasetError::io(path, e))?;
    Ok(())
}

/// Hash every regular file under `dir`, sorted by `/`-separated relative path.
pub fn build_manifest(dir: &Path) -> Result<Vec<ManifestEntry>> {
    let pattern = dir.join("**").join("*");
    let pattern_str = pattern.to_string_lossy();

    let mut paths: Vec<_> = glob::glob_with(
        &pattern_str,
        glob::MatchOptions {
            require_literal_leading_dot: false,
            ..Default::default()
        },
    )
    .map_err(|e| DatasetError::io(dir, std::io::Error::other(e)))?
    .filter_map(|e| e.ok())
    .filter(|p| p.is_file())
    .collect();

    // Sort for deterministic order
    paths.sort();

    let mut entries = Vec::with_capacity(paths.len());
    for path in &paths {
        let digest = hash::sha256_of_file(path).map_err(|e| DatasetError::io(path, e))?;
        let rel = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push(ManifestEntry::new(digest, rel));
    }
    entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(entries)
}
