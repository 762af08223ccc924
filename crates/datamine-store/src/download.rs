//! Download orchestration: make a dataset locally available
//!
//! ```text
//! predicate(id)? ── yes ──▶ AlreadyPresent
//!      │ no
//!      ▼
//! for each requirement:
//!   target valid? ── yes ──▶ skip
//!      │ no
//!      ▼
//!   fetch → {target}.part (hashed while written) → rename → compare digest
//!      ▼
//!   archive? ── yes ──▶ extract into dataset dir
//! ```

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use datamine_core::{Fetch, ProgressContext, SharedProgress};
use percent_encoding::percent_decode_str;

use crate::archive::ArchiveHandler;
use crate::cache_root::CacheRootResolver;
use crate::collection::Collection;
use crate::error::{DatasetError, Result};
use crate::hash::{self, HashingWriter};
use crate::integrity::{IntegrityChecker, IntegrityLevel};
use crate::registry::{Registry, Requirement};

/// Suffix of the staging file a download is written to before the rename.
const PART_SUFFIX: &str = ".part";

/// How `ensure_available` satisfied the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Local copy was already valid; nothing touched
    AlreadyPresent,
    /// Requirements were (re)fetched or confirmed on disk
    Fetched,
}

/// Local file name for a requirement URL.
///
/// Takes the URL path, turns `+` into spaces, percent-decodes it and keeps
/// the last segment. Query strings and fragments never contribute.
pub fn url_to_filename(url: &str) -> Result<String> {
    let no_name = || DatasetError::NoFileName {
        url: url.to_string(),
    };
    let parsed = url::Url::parse(url).map_err(|_| no_name())?;
    let path = parsed.path().replace('+', " ");
    let decoded = percent_decode_str(&path).decode_utf8_lossy();
    let name = decoded.rsplit('/').next().unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        return Err(no_name());
    }
    Ok(name.to_string())
}

/// Fetches, verifies and unpacks the requirements of a dataset.
pub struct DownloadCenter<'a, F, A> {
    registry: &'a Registry,
    cache: &'a CacheRootResolver,
    fetcher: F,
    archives: A,
    progress: SharedProgress,
}

impl<'a, F: Fetch, A: ArchiveHandler> DownloadCenter<'a, F, A> {
    pub fn new(registry: &'a Registry, cache: &'a CacheRootResolver, fetcher: F, archives: A) -> Self {
        Self {
            registry,
            cache,
            fetcher,
            archives,
            progress: Arc::new(ProgressContext::hidden()),
        }
    }

    /// Draw download bars on `progress`.
    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Ensure `id` is present, using the integrity checker at `level` to
    /// decide whether anything needs fetching.
    pub fn ensure(&self, id: Collection, level: IntegrityLevel) -> Result<Availability> {
        let checker = IntegrityChecker::new(self.registry, self.cache);
        self.ensure_available(id, |id| checker.check(id, level))
    }

    /// Make `id` available under the cache root.
    ///
    /// `predicate` decides whether the current local copy is good enough.
    /// When it says no, every requirement is fetched unless its file is
    /// already on disk with the expected digest. The first error aborts;
    /// calling again resumes with whatever is still missing.
    pub fn ensure_available<P>(&self, id: Collection, predicate: P) -> Result<Availability>
    where
        P: FnOnce(Collection) -> Result<bool>,
    {
        if predicate(id)? {
            log::debug!("{id}: local copy is valid");
            return Ok(Availability::AlreadyPresent);
        }

        let config = self.registry.get(id)?;
        let dir = self.cache.dataset_dir(id)?;
        fs::create_dir_all(&dir).map_err(|e| DatasetError::io(&dir, e))?;

        log::info!(
            "{id}: provisioning {} requirement(s) into {}",
            config.requirements.len(),
            dir.display()
        );
        for requirement in &config.requirements {
            self.provide(requirement, &dir)?;
        }
        Ok(Availability::Fetched)
    }

    /// Satisfy one requirement inside `dir`.
    fn provide(&self, requirement: &Requirement, dir: &Path) -> Result<()> {
        let name = url_to_filename(requirement.url())?;
        let target = dir.join(&name);

        if is_satisfied(&target, requirement.sha256())? {
            log::info!("{name}: already downloaded, skipping");
        } else {
            log::info!("fetching {}", requirement.url());
            let actual = self.fetch_to(requirement.url(), &target, &name)?;
            if let Some(expected) = requirement.sha256() {
                if actual != expected {
                    return Err(DatasetError::Corrupt {
                        path: target,
                        expected: expected.to_string(),
                        actual,
                    });
                }
            }
        }

        if self.archives.is_archive(&target)? {
            let pb = self.progress.step_line(&name, "extracting");
            let result = self.archives.extract(&target, dir);
            pb.finish_and_clear();
            result?;
        }
        Ok(())
    }

    /// Stream `url` into `target` via a `.part` file; return the digest.
    fn fetch_to(&self, url: &str, target: &Path, name: &str) -> Result<String> {
        let part = part_path(target);
        let file = File::create(&part).map_err(|e| DatasetError::io(&part, e))?;
        let mut writer = HashingWriter::new(BufWriter::new(file));

        let pb = self.progress.download_bar(name);
        let fetched = self.fetcher.fetch(url, &mut writer, &pb);
        pb.finish_and_clear();
        if let Err(source) = fetched {
            // A failed write to the part file is local, whatever the fetcher wrapped it in
            let local = writer.take_error();
            drop(writer);
            let _ = fs::remove_file(&part);
            return Err(match local {
                Some(e) => DatasetError::io(&part, e),
                None => DatasetError::Fetch {
                    url: url.to_string(),
                    source,
                },
            });
        }

        let (buffered, bytes, digest) = writer.finish().map_err(|e| DatasetError::io(&part, e))?;
        let file = buffered
            .into_inner()
            .map_err(|e| DatasetError::io(&part, e.into_error()))?;
        file.sync_all().map_err(|e| DatasetError::io(&part, e))?;
        drop(file);

        fs::rename(&part, target).map_err(|e| DatasetError::io(target, e))?;
        log::debug!(
            "{name}: {} bytes, sha256 {}",
            bytes,
            hash::short_hash(&digest)
        );
        Ok(digest)
    }
}

/// Whether `target` already holds the wanted bytes.
fn is_satisfied(target: &Path, expected: Option<&str>) -> Result<bool> {
    if !target.is_file() {
        return Ok(false);
    }
    let Some(expected) = expected else {
        return Ok(true);
    };
    let actual = hash::sha256_of_file(target).map_err(|e| DatasetError::io(target, e))?;
    if actual != expected {
        log::debug!(
            "{}: stale copy ({} != {})",
            target.display(),
            hash::short_hash(&actual),
            hash::short_hash(expected)
        );
    }
    Ok(actual == expected)
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}
