//! Local copy validation against a dataset's manifest
//!
//! Two levels:
//! - shallow: every listed file exists
//! - deep: every listed file exists and its SHA-256 matches
//!
//! Files present on disk but absent from the manifest are ignored.

use std::path::{Path, PathBuf};

use crate::cache_root::CacheRootResolver;
use crate::collection::Collection;
use crate::error::{DatasetError, Result};
use crate::hash;
use crate::manifest::{self, ManifestEntry};
use crate::registry::Registry;

/// How hard to look before declaring a local copy valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrityLevel {
    Shallow,
    #[default]
    Deep,
}

/// Outcome for a single manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    pub path: String,
    pub expected: String,
    /// `None` when the file is missing
    pub actual: Option<String>,
    pub ok: bool,
}

pub struct IntegrityChecker<'a> {
    registry: &'a Registry,
    cache: &'a CacheRootResolver,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(registry: &'a Registry, cache: &'a CacheRootResolver) -> Self {
        Self { registry, cache }
    }

    /// Manifest path and dataset directory for `id`.
    fn locate(&self, id: Collection) -> Result<(&'a Path, PathBuf)> {
        let config = self.registry.get(id)?;
        Ok((config.expected_files.as_path(), self.cache.dataset_dir(id)?))
    }

    /// True iff every listed file exists as a regular file.
    pub fn shallow_check(&self, id: Collection) -> Result<bool> {
        let (manifest_path, dir) = self.locate(id)?;
        for entry in manifest::decode_manifest(manifest_path)? {
            let entry = entry?;
            if !dir.join(&entry.relative_path).is_file() {
                log::debug!("{id}: missing {}", entry.relative_path);
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// True iff every listed file exists and hashes to its listed digest.
    pub fn deep_check(&self, id: Collection) -> Result<bool> {
        let (manifest_path, dir) = self.locate(id)?;
        for entry in manifest::decode_manifest(manifest_path)? {
            let entry = entry?;
            match actual_digest(&dir, &entry)? {
                Some(actual) if actual == entry.digest => {}
                Some(actual) => {
                    log::debug!(
                        "{id}: {} hashes to {}, expected {}",
                        entry.relative_path,
                        hash::short_hash(&actual),
                        hash::short_hash(&entry.digest)
                    );
                    return Ok(false);
                }
                None => {
                    log::debug!("{id}: missing {}", entry.relative_path);
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    pub fn check(&self, id: Collection, level: IntegrityLevel) -> Result<bool> {
        match level {
            IntegrityLevel::Shallow => self.shallow_check(id),
            IntegrityLevel::Deep => self.deep_check(id),
        }
    }

    /// Deep check of every entry without stopping at the first failure.
    pub fn verify(&self, id: Collection) -> Result<Vec<VerifyResult>> {
        let (manifest_path, dir) = self.locate(id)?;
        let mut results = Vec::new();
        for entry in manifest::decode_manifest(manifest_path)? {
            let entry = entry?;
            let actual = actual_digest(&dir, &entry)?;
            let ok = actual.as_deref() == Some(entry.digest.as_str());
            results.push(VerifyResult {
                path: entry.relative_path,
                expected: entry.digest,
                actual,
                ok,
            });
        }
        Ok(results)
    }
}

/// Digest of the entry's file, `None` when it isn't a regular file.
fn actual_digest(dir: &Path, entry: &ManifestEntry) -> Result<Option<String>> {
    let path = dir.join(&entry.relative_path);
    if !path.is_file() {
        return Ok(None);
    }
    hash::sha256_of_file(&path)
        .map(Some)
        .map_err(|e| DatasetError::io(path, e))
}
