//! End-to-end provisioning against a local mock server.
//!
//! Datasets made of an archive (tar.gz or zip) and a loose JSON file are
//! served over HTTP, fetched into a scratch cache root, unpacked and
//! deep-checked.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use datamine_core::{HttpConfig, HttpFetcher};
use datamine_store::{
    Availability, BuiltinArchives, CacheRootResolver, Collection, DatasetConfig, DatasetError,
    DownloadCenter, IntegrityChecker, IntegrityLevel, ManifestEntry, Registry, Requirement,
    hash_bytes, write_manifest,
};
use flate2::Compression;
use flate2::write::GzEncoder;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TRAIN: &str = "Thank you God!\n";
const INNER: &str = "Within some inner directory.";
const DEV_JSON: &str = r#"{"version": "1.0", "data": []}"#;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, body) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, name, body.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn zip_file(files: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, body) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Serve `routes` (path, status, body) and keep the server alive.
fn serve(rt: &tokio::runtime::Runtime, routes: Vec<(&str, u16, Vec<u8>)>) -> MockServer {
    rt.block_on(async {
        let server = MockServer::start().await;
        for (route, status, body) in routes {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(status).set_body_bytes(body))
                .mount(&server)
                .await;
        }
        server
    })
}

struct Setup {
    _tmp: tempfile::TempDir,
    registry: Registry,
    cache: CacheRootResolver,
}

impl Setup {
    fn new(requirements: Vec<Requirement>) -> Self {
        Self::with_files(
            requirements,
            &[
                ("hotpot/train.txt", TRAIN),
                ("hotpot/inner/file3.txt", INNER),
                ("dev v1.json", DEV_JSON),
            ],
        )
    }

    /// Registry whose manifest expects `files` (path, content).
    fn with_files(requirements: Vec<Requirement>, files: &[(&str, &str)]) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let manifest = tmp.path().join("HOTPOT_QA.txt.gz");
        let entries: Vec<ManifestEntry> = files
            .iter()
            .map(|(name, body)| ManifestEntry::new(hash_bytes(body.as_bytes()), *name))
            .collect();
        write_manifest(&manifest, &entries).unwrap();

        let mut registry = Registry::default();
        registry.insert(
            Collection::HotpotQa,
            DatasetConfig {
                requirements,
                expected_files: manifest,
            },
        );
        let cache = CacheRootResolver::new()
            .with_env_var("DATAMINE_IT_CACHE_UNSET")
            .with_default_dir(tmp.path().join("cache"));
        Self {
            _tmp: tmp,
            registry,
            cache,
        }
    }

    fn dataset_dir(&self) -> std::path::PathBuf {
        self.cache.dataset_dir(Collection::HotpotQa).unwrap()
    }

    fn center(&self) -> DownloadCenter<'_, HttpFetcher, BuiltinArchives> {
        let fetcher = HttpFetcher::new(HttpConfig::default()).unwrap();
        DownloadCenter::new(&self.registry, &self.cache, fetcher, BuiltinArchives)
    }
}

fn archive_bytes() -> Vec<u8> {
    tar_gz(&[("hotpot/train.txt", TRAIN), ("hotpot/inner/file3.txt", INNER)])
}

#[test]
fn fetch_verify_and_unpack() {
    let rt = runtime();
    let archive = archive_bytes();
    let server = serve(
        &rt,
        vec![
            ("/hotpot.tar.gz", 200, archive.clone()),
            ("/dev+v1.json", 200, DEV_JSON.as_bytes().to_vec()),
        ],
    );
    let setup = Setup::new(vec![
        Requirement::new(format!("{}/hotpot.tar.gz", server.uri()), Some(hash_bytes(&archive).as_str())),
        Requirement::new(format!("{}/dev+v1.json", server.uri()), None),
    ]);

    let checker = IntegrityChecker::new(&setup.registry, &setup.cache);
    assert!(!checker.deep_check(Collection::HotpotQa).unwrap());

    let got = setup.center().ensure(Collection::HotpotQa, IntegrityLevel::Deep).unwrap();
    assert_eq!(got, Availability::Fetched);

    let dir = setup.dataset_dir();
    assert_eq!(fs::read_to_string(dir.join("hotpot/train.txt")).unwrap(), TRAIN);
    assert_eq!(fs::read_to_string(dir.join("dev v1.json")).unwrap(), DEV_JSON);
    assert!(dir.join("hotpot.tar.gz").is_file());
    assert!(checker.deep_check(Collection::HotpotQa).unwrap());

    // Second run never touches the network
    drop(server);
    let again = setup.center().ensure(Collection::HotpotQa, IntegrityLevel::Deep).unwrap();
    assert_eq!(again, Availability::AlreadyPresent);
}

#[test]
fn damaged_copy_is_repaired_without_refetching_archive() {
    let rt = runtime();
    let archive = archive_bytes();
    let server = serve(
        &rt,
        vec![
            ("/hotpot.tar.gz", 200, archive.clone()),
            ("/dev%20v1.json", 200, DEV_JSON.as_bytes().to_vec()),
        ],
    );
    let setup = Setup::new(vec![
        Requirement::new(format!("{}/hotpot.tar.gz", server.uri()), Some(hash_bytes(&archive).as_str())),
        Requirement::new(format!("{}/dev%20v1.json", server.uri()), None),
    ]);
    setup.center().ensure(Collection::HotpotQa, IntegrityLevel::Deep).unwrap();

    let dir = setup.dataset_dir();
    let mut f = fs::OpenOptions::new()
        .append(true)
        .open(dir.join("hotpot/inner/file3.txt"))
        .unwrap();
    f.write_all(b"!").unwrap();
    drop(f);

    // Shallow check can't see the damage
    let shallow = setup.center().ensure(Collection::HotpotQa, IntegrityLevel::Shallow).unwrap();
    assert_eq!(shallow, Availability::AlreadyPresent);

    // Deep check can; the archive on disk is reused and re-extracted
    let deep = setup.center().ensure(Collection::HotpotQa, IntegrityLevel::Deep).unwrap();
    assert_eq!(deep, Availability::Fetched);
    assert_eq!(fs::read_to_string(dir.join("hotpot/inner/file3.txt")).unwrap(), INNER);

    let archive_hits = rt
        .block_on(server.received_requests())
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/hotpot.tar.gz")
        .count();
    assert_eq!(archive_hits, 1);
}

#[test]
fn missing_remote_file_surfaces_status() {
    let rt = runtime();
    let server = serve(&rt, vec![]);
    let url = format!("{}/gone.tar.gz", server.uri());
    let setup = Setup::new(vec![Requirement::new(url.clone(), None)]);

    let err = setup.center().ensure(Collection::HotpotQa, IntegrityLevel::Shallow).unwrap_err();
    assert!(err.is_network());
    let msg = err.to_string();
    assert!(msg.contains("404"), "{msg}");
    assert!(msg.contains(&url), "{msg}");
    assert!(!setup.dataset_dir().join("gone.tar.gz").exists());
}

#[test]
fn wrong_digest_is_reported_as_corrupt() {
    let rt = runtime();
    let server = serve(&rt, vec![("/hotpot.tar.gz", 200, archive_bytes())]);
    let declared = hash_bytes(b"something else");
    let setup = Setup::new(vec![Requirement::new(
        format!("{}/hotpot.tar.gz", server.uri()),
        Some(declared.as_str()),
    )]);

    let err = setup.center().ensure(Collection::HotpotQa, IntegrityLevel::Deep).unwrap_err();
    match err {
        DatasetError::Corrupt { path, expected, actual } => {
            assert_eq!(expected, declared);
            assert_eq!(actual, hash_bytes(&archive_bytes()));
            assert!(path.is_file());
            // Nothing extracted from a corrupt download
            assert!(!Path::new(&setup.dataset_dir()).join("hotpot").exists());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unreachable_host_is_network_error() {
    let setup = Setup::new(vec![Requirement::new("http://127.0.0.1:1/data.json", None)]);
    let err = setup.center().ensure(Collection::HotpotQa, IntegrityLevel::Shallow).unwrap_err();
    assert!(err.is_network());
}

#[test]
fn zip_and_loose_file_are_provisioned() {
    const JSON: &str = "This is a JSON file.";
    let files = [
        ("1.txt", "First question"),
        ("2.txt", "Second question"),
        ("dir/3.txt", "Third question"),
    ];
    let rt = runtime();
    let zip = zip_file(&files);
    let server = serve(
        &rt,
        vec![
            ("/files.zip", 200, zip.clone()),
            ("/file.json", 200, JSON.as_bytes().to_vec()),
        ],
    );
    let mut expected = files.to_vec();
    expected.push(("file.json", JSON));
    let setup = Setup::with_files(
        vec![
            Requirement::new(format!("{}/files.zip", server.uri()), Some(hash_bytes(&zip).as_str())),
            Requirement::new(
                format!("{}/file.json", server.uri()),
                Some(hash_bytes(JSON.as_bytes()).as_str()),
            ),
        ],
        &expected,
    );

    let got = setup.center().ensure(Collection::HotpotQa, IntegrityLevel::Deep).unwrap();
    assert_eq!(got, Availability::Fetched);

    let dir = setup.dataset_dir();
    for (name, body) in expected {
        assert_eq!(fs::read_to_string(dir.join(name)).unwrap(), body, "{name}");
    }
    let checker = IntegrityChecker::new(&setup.registry, &setup.cache);
    assert!(checker.deep_check(Collection::HotpotQa).unwrap());
}

#[test]
fn corrupt_requirement_stops_before_the_next_one() {
    let rt = runtime();
    let server = serve(
        &rt,
        vec![
            ("/hotpot.tar.gz", 200, archive_bytes()),
            ("/dev.json", 200, DEV_JSON.as_bytes().to_vec()),
        ],
    );
    let setup = Setup::new(vec![
        Requirement::new(
            format!("{}/hotpot.tar.gz", server.uri()),
            Some(hash_bytes(b"something else").as_str()),
        ),
        Requirement::new(format!("{}/dev.json", server.uri()), None),
    ]);

    let err = setup.center().ensure(Collection::HotpotQa, IntegrityLevel::Deep).unwrap_err();
    assert!(err.is_corruption(), "{err}");

    let requests = rt.block_on(server.received_requests()).unwrap();
    assert_eq!(requests.iter().filter(|r| r.url.path() == "/hotpot.tar.gz").count(), 1);
    assert_eq!(requests.iter().filter(|r| r.url.path() == "/dev.json").count(), 0);
    assert!(!setup.dataset_dir().join("dev.json").exists());
}

#[cfg(target_os = "linux")]
#[test]
fn full_disk_is_not_a_network_error() {
    let rt = runtime();
    let server = serve(&rt, vec![("/big.bin", 200, vec![0u8; 2 * 1024 * 1024])]);
    let setup = Setup::new(vec![Requirement::new(format!("{}/big.bin", server.uri()), None)]);

    let dir = setup.dataset_dir();
    fs::create_dir_all(&dir).unwrap();
    let part = dir.join("big.bin.part");
    std::os::unix::fs::symlink("/dev/full", &part).unwrap();

    let err = setup.center().ensure(Collection::HotpotQa, IntegrityLevel::Shallow).unwrap_err();
    assert!(!err.is_network(), "{err}");
    match err {
        DatasetError::Io { path, .. } => assert_eq!(path, part),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dir.join("big.bin").exists());
}
