//! Archive detection and extraction for downloaded requirements
//!
//! tar, gzip-compressed tar and zip are recognized by their leading bytes.
//! Anything else is left as a plain file next to the archives it was
//! downloaded with. Entries that would land outside the destination are
//! rejected for every format.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::error::{DatasetError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_LOCAL_MAGIC: [u8; 4] = *b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: [u8; 4] = *b"PK\x05\x06";
const USTAR_OFFSET: usize = 257;
const USTAR_MAGIC: &[u8; 5] = b"ustar";
const TAR_HEADER_LEN: usize = 512;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Decides whether a downloaded file is an archive and unpacks it.
pub trait ArchiveHandler {
    fn is_archive(&self, path: &Path) -> Result<bool>;

    /// Unpack `archive` into `dest`, creating `dest` if needed.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<()>;
}

/// Handler that treats every file as opaque.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArchives;

impl ArchiveHandler for NoArchives {
    fn is_archive(&self, _path: &Path) -> Result<bool> {
        Ok(false)
    }

    fn extract(&self, archive: &Path, _dest: &Path) -> Result<()> {
        Err(archive_err(archive, "archive extraction is disabled"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    Tar,
    TarGz,
    Zip,
}

/// tar, tar.gz and zip handler, detected by content rather than extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinArchives;

impl BuiltinArchives {
    fn sniff(&self, path: &Path) -> Result<Option<ArchiveKind>> {
        let mut head = Vec::with_capacity(TAR_HEADER_LEN);
        File::open(path)
            .and_then(|f| f.take(TAR_HEADER_LEN as u64).read_to_end(&mut head))
            .map_err(|e| DatasetError::io(path, e))?;

        if head.starts_with(&ZIP_LOCAL_MAGIC) || head.starts_with(&ZIP_EMPTY_MAGIC) {
            return Ok(Some(ArchiveKind::Zip));
        }
        if has_ustar_magic(&head) {
            return Ok(Some(ArchiveKind::Tar));
        }
        if !head.starts_with(&GZIP_MAGIC) {
            return Ok(None);
        }

        // Compressed: peek at the first decompressed header, which may
        // straddle gzip members
        let file = File::open(path).map_err(|e| DatasetError::io(path, e))?;
        let mut inner = Vec::with_capacity(TAR_HEADER_LEN);
        match MultiGzDecoder::new(file)
            .take(TAR_HEADER_LEN as u64)
            .read_to_end(&mut inner)
        {
            Ok(_) => {}
            // A truncated or non-deflate gzip is simply not a tarball
            Err(e) if e.kind() == io::ErrorKind::InvalidInput
                || e.kind() == io::ErrorKind::InvalidData
                || e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(DatasetError::io(path, e)),
        }
        Ok(has_ustar_magic(&inner).then_some(ArchiveKind::TarGz))
    }
}

fn has_ustar_magic(header: &[u8]) -> bool {
    header
        .get(USTAR_OFFSET..USTAR_OFFSET + USTAR_MAGIC.len())
        .is_some_and(|m| m == USTAR_MAGIC)
}

impl ArchiveHandler for BuiltinArchives {
    fn is_archive(&self, path: &Path) -> Result<bool> {
        Ok(self.sniff(path)?.is_some())
    }

    fn extract(&self, archive: &Path, dest: &Path) -> Result<()> {
        let kind = self
            .sniff(archive)?
            .ok_or_else(|| archive_err(archive, "not a tar or zip archive"))?;
        let file = File::open(archive).map_err(|e| DatasetError::io(archive, e))?;
        log::info!("extracting {}", archive.display());
        match kind {
            ArchiveKind::Tar => unpack_tar(BufReader::new(file), archive, dest),
            ArchiveKind::TarGz => unpack_tar(MultiGzDecoder::new(BufReader::new(file)), archive, dest),
            ArchiveKind::Zip => unpack_zip(BufReader::new(file), archive, dest),
        }
    }
}

fn archive_err(path: &Path, reason: impl Into<String>) -> DatasetError {
    DatasetError::Archive {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Stream every entry of a tar stream into `dest`.
fn unpack_tar<R: Read>(reader: R, archive: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| DatasetError::io(dest, e))?;

    let mut tar = tar::Archive::new(reader);
    let entries = tar
        .entries()
        .map_err(|e| archive_err(archive, e.to_string()))?;

    let mut files = 0usize;
    for entry in entries {
        let mut entry = entry.map_err(|e| archive_err(archive, e.to_string()))?;
        let entry_path = entry
            .path()
            .map_err(|e| archive_err(archive, e.to_string()))?
            .into_owned();
        let target = safe_join(dest, &entry_path)
            .ok_or_else(|| archive_err(archive, format!("unsafe entry path {}", entry_path.display())))?;
        if target == dest {
            continue;
        }

        match entry.header().entry_type() {
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                write_entry(&mut entry, &target)?;
                files += 1;
            }
            tar::EntryType::Directory => {
                fs::create_dir_all(&target).map_err(|e| DatasetError::io(&target, e))?;
            }
            other => {
                log::debug!("skipping {:?} entry {}", other, entry_path.display());
            }
        }
    }
    log::debug!("unpacked {files} file(s) into {}", dest.display());
    Ok(())
}

/// Unpack a zip archive into `dest`. Symlink entries are skipped.
fn unpack_zip<R: Read + io::Seek>(reader: R, archive: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| DatasetError::io(dest, e))?;

    let mut zip = zip::ZipArchive::new(reader).map_err(|e| archive_err(archive, e.to_string()))?;
    let mut files = 0usize;
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| archive_err(archive, e.to_string()))?;
        let entry_path = PathBuf::from(entry.name());
        let target = safe_join(dest, &entry_path)
            .ok_or_else(|| archive_err(archive, format!("unsafe entry path {}", entry_path.display())))?;
        if target == dest {
            continue;
        }

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| DatasetError::io(&target, e))?;
        } else if entry.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            log::debug!("skipping symlink entry {}", entry_path.display());
        } else {
            write_entry(&mut entry, &target)?;
            files += 1;
        }
    }
    log::debug!("unpacked {files} file(s) into {}", dest.display());
    Ok(())
}

fn write_entry(entry: &mut impl Read, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| DatasetError::io(parent, e))?;
    }
    let mut out = File::create(target).map_err(|e| DatasetError::io(target, e))?;
    io::copy(entry, &mut out).map_err(|e| DatasetError::io(target, e))?;
    Ok(())
}

/// `dest/entry` if `entry` is relative and never climbs out.
fn safe_join(dest: &Path, entry: &Path) -> Option<PathBuf> {
    let mut out = dest.to_path_buf();
    for component in entry.components() {
        match component {
            Component::Normal(name) => out.push(name),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}
