//! datamine-store: local dataset cache with integrity checking
//!
//! Datasets live under a single cache root, one directory per dataset.
//! Each dataset has a gzip manifest of expected files and SHA-256 digests;
//! a local copy is valid when every listed file is present (shallow) or
//! present and byte-identical (deep). Missing datasets are fetched from the
//! URLs in the registry, verified, and unpacked in place.

pub mod archive;
pub mod cache_root;
pub mod collection;
pub mod download;
pub mod error;
pub mod hash;
pub mod integrity;
pub mod manifest;
pub mod registry;

pub use archive::{ArchiveHandler, BuiltinArchives, NoArchives};
pub use cache_root::{CACHE_DIR_ENV_VAR, CacheRootResolver, EXIT_CACHE_ROOT_NOT_DIRECTORY};
pub use collection::Collection;
pub use download::{Availability, DownloadCenter, url_to_filename};
pub use error::{DatasetError, Result};
pub use hash::{hash_bytes, sha256_of_file, short_hash};
pub use integrity::{IntegrityChecker, IntegrityLevel, VerifyResult};
pub use manifest::{ManifestEntry, build_manifest, decode_manifest, write_manifest};
pub use registry::{DatasetConfig, Registry, Requirement};
