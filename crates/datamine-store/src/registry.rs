//! Dataset registry: what to download for each dataset
//!
//! Two on-disk layouts are accepted. TOML, keyed by dataset:
//! ```toml
//! [datasets.RACE]
//! expected_files = "manifests/RACE.txt.gz"
//!
//! [[datasets.RACE.requirements]]
//! url = "https://example.org/RACE.tar.gz"
//! sha256 = "4140…5e"
//! ```
//! and the older JSON list:
//! ```json
//! [{"dataset": "RACE",
//!   "config": {"requirements": [{"URL": "…", "SHA256": "…"}],
//!              "expectedFiles": "RACE.txt.gz"}}]
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::collection::Collection;
use crate::error::{DatasetError, Result};
use crate::hash;

/// One artifact to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    url: String,
    sha256: Option<String>,
}

impl Requirement {
    /// Build a requirement; an empty digest counts as absent.
    pub fn new(url: impl Into<String>, sha256: Option<&str>) -> Self {
        Self {
            url: url.into(),
            sha256: sha256
                .filter(|s| !s.is_empty())
                .map(|s| s.to_ascii_lowercase()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Expected lowercase SHA-256, if declared.
    pub fn sha256(&self) -> Option<&str> {
        self.sha256.as_deref()
    }
}

/// Everything needed to provision one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
    pub requirements: Vec<Requirement>,
    /// Gzip manifest listing the files a valid copy contains
    pub expected_files: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    datasets: BTreeMap<Collection, DatasetConfig>,
}

// ----- TOML layout -----

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlRegistry {
    #[serde(default)]
    datasets: BTreeMap<String, TomlDataset>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlDataset {
    expected_files: String,
    #[serde(default)]
    requirements: Vec<TomlRequirement>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlRequirement {
    url: String,
    #[serde(default)]
    sha256: String,
}

// ----- legacy JSON layout -----

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonEntry {
    dataset: String,
    config: JsonConfig,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonConfig {
    requirements: Vec<JsonRequirement>,
    #[serde(rename = "expectedFiles")]
    expected_files: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonRequirement {
    #[serde(rename = "URL")]
    url: String,
    #[serde(rename = "SHA256", default)]
    sha256: String,
}

impl Registry {
    /// Load a registry file; the format follows the extension (`.json` or TOML).
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
        let base = path.parent().unwrap_or(Path::new(""));
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text, base, path)
        } else {
            Self::from_toml_str(&text, base, path)
        }
    }

    /// Parse the TOML layout. Relative manifest paths resolve against `base`;
    /// `source` only labels errors.
    pub fn from_toml_str(text: &str, base: &Path, source: &Path) -> Result<Self> {
        let raw: TomlRegistry = toml::from_str(text).map_err(|e| invalid(source, e))?;
        let mut registry = Self::default();
        for (name, dataset) in raw.datasets {
            let reqs = dataset
                .requirements
                .iter()
                .map(|r| (r.url.as_str(), r.sha256.as_str()));
            let config = build_config(&name, reqs, &dataset.expected_files, base, source)?;
            registry.insert(parse_id(&name, source)?, config);
        }
        log::debug!("loaded {} dataset(s) from {}", registry.datasets.len(), source.display());
        Ok(registry)
    }

    /// Parse the legacy JSON layout.
    pub fn from_json_str(text: &str, base: &Path, source: &Path) -> Result<Self> {
        let raw: Vec<JsonEntry> = serde_json::from_str(text).map_err(|e| invalid(source, e))?;
        let mut registry = Self::default();
        let mut seen = HashSet::new();
        for entry in raw {
            let id = parse_id(&entry.dataset, source)?;
            if !seen.insert(id) {
                return Err(invalid(source, format!("dataset {id} is listed twice")));
            }
            let reqs = entry
                .config
                .requirements
                .iter()
                .map(|r| (r.url.as_str(), r.sha256.as_str()));
            let config = build_config(&entry.dataset, reqs, &entry.config.expected_files, base, source)?;
            registry.insert(id, config);
        }
        Ok(registry)
    }

    /// Add or replace a dataset.
    pub fn insert(&mut self, id: Collection, config: DatasetConfig) {
        self.datasets.insert(id, config);
    }

    pub fn get(&self, id: Collection) -> Result<&DatasetConfig> {
        self.datasets.get(&id).ok_or(DatasetError::NotConfigured(id))
    }

    /// Configured datasets, in `Collection::ALL` order.
    pub fn configured(&self) -> Vec<Collection> {
        Collection::ALL
            .into_iter()
            .filter(|c| self.datasets.contains_key(c))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

fn invalid(path: &Path, reason: impl ToString) -> DatasetError {
    DatasetError::InvalidRegistry {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn parse_id(name: &str, source: &Path) -> Result<Collection> {
    name.parse::<Collection>().map_err(|e| invalid(source, e))
}

fn build_config<'a>(
    name: &str,
    requirements: impl Iterator<Item = (&'a str, &'a str)>,
    expected_files: &str,
    base: &Path,
    source: &Path,
) -> Result<DatasetConfig> {
    if expected_files.trim().is_empty() {
        return Err(invalid(source, format!("{name}: expected_files is empty")));
    }

    let mut out = Vec::new();
    for (url, sha256) in requirements {
        let parsed = url::Url::parse(url)
            .map_err(|e| invalid(source, format!("{name}: bad URL `{url}`: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid(source, format!("{name}: `{url}` is not a download URL")));
        }
        if !sha256.is_empty() && !hash::is_sha256_hex(sha256) {
            return Err(invalid(
                source,
                format!("{name}: `{sha256}` is not a hex SHA256"),
            ));
        }
        out.push(Requirement::new(url, Some(sha256)));
    }

    let manifest = Path::new(expected_files);
    let expected_files = if manifest.is_absolute() {
        manifest.to_path_buf()
    } else {
        base.join(manifest)
    };

    Ok(DatasetConfig {
        requirements: out,
        expected_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "4140183108b7e8e3e4ea7b4ccc6d8b10e4fd27bc85dec6ef7d5e0d20ab37ec5e";

    fn toml(text: &str) -> Result<Registry> {
        Registry::from_toml_str(text, Path::new("/reg"), Path::new("/reg/datasets.toml"))
    }

    #[test]
    fn toml_layout() {
        let reg = toml(&format!(
            r#"
            [datasets.RACE]
            expected_files = "manifests/RACE.txt.gz"

            [[datasets.RACE.requirements]]
            url = "https://example.org/RACE.tar.gz"
            sha256 = "{}"

            [[datasets.RACE.requirements]]
            url = "https://example.org/extra.json"
            "#,
            SHA.to_ascii_uppercase()
        ))
        .unwrap();

        let race = reg.get(Collection::Race).unwrap();
        assert_eq!(race.expected_files, PathBuf::from("/reg/manifests/RACE.txt.gz"));
        assert_eq!(race.requirements.len(), 2);
        assert_eq!(race.requirements[0].sha256(), Some(SHA));
        assert_eq!(race.requirements[1].sha256(), None);
        assert_eq!(reg.configured(), vec![Collection::Race]);
    }

    #[test]
    fn absolute_manifest_path_is_kept() {
        let reg = toml(
            r#"
            [datasets.CSQA]
            expected_files = "/data/CSQA.txt.gz"
            "#,
        )
        .unwrap();
        assert_eq!(
            reg.get(Collection::Csqa).unwrap().expected_files,
            PathBuf::from("/data/CSQA.txt.gz")
        );
    }

    #[test]
    fn missing_dataset_is_not_configured() {
        let reg = toml("").unwrap();
        assert!(reg.is_empty());
        assert!(matches!(
            reg.get(Collection::HotpotQa),
            Err(DatasetError::NotConfigured(Collection::HotpotQa))
        ));
    }

    #[test]
    fn unknown_dataset_is_rejected() {
        let err = toml(
            r#"
            [datasets.IMAGENET]
            expected_files = "x.gz"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::InvalidRegistry { .. }));
        assert!(err.to_string().contains("IMAGENET"));
    }

    #[test]
    fn bad_url_is_rejected() {
        let err = toml(
            r#"
            [datasets.RACE]
            expected_files = "x.gz"
            [[datasets.RACE.requirements]]
            url = "not a url"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("bad URL"));
    }

    #[test]
    fn bad_digest_is_rejected() {
        let err = toml(
            r#"
            [datasets.RACE]
            expected_files = "x.gz"
            [[datasets.RACE.requirements]]
            url = "https://example.org/a.zip"
            sha256 = "abc"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not a hex SHA256"));
    }

    #[test]
    fn empty_manifest_path_is_rejected() {
        let err = toml(
            r#"
            [datasets.RACE]
            expected_files = "  "
            "#,
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(toml(
            r#"
            [datasets.RACE]
            expected_files = "x.gz"
            mirror = "elsewhere"
            "#,
        )
        .is_err());
    }

    #[test]
    fn json_layout() {
        let text = format!(
            r#"[
              {{"dataset": "ALLEN_AI_DROP",
                "config": {{
                  "requirements": [{{"URL": "https://example.org/drop.zip", "SHA256": "{SHA}"}}],
                  "expectedFiles": "ALLEN_AI_DROP.txt.gz"}}}},
              {{"dataset": "TRIVIA_QA",
                "config": {{
                  "requirements": [{{"URL": "https://example.org/tqa.tar.gz", "SHA256": ""}}],
                  "expectedFiles": "TRIVIA_QA.txt.gz"}}}}
            ]"#
        );
        let reg = Registry::from_json_str(&text, Path::new("/cfg"), Path::new("/cfg/r.json")).unwrap();
        assert_eq!(reg.configured(), vec![Collection::AllenAiDrop, Collection::TriviaQa]);
        let tqa = reg.get(Collection::TriviaQa).unwrap();
        assert_eq!(tqa.requirements[0].sha256(), None);
        assert_eq!(tqa.expected_files, PathBuf::from("/cfg/TRIVIA_QA.txt.gz"));
    }

    #[test]
    fn json_duplicate_is_rejected() {
        let entry = r#"{"dataset": "CSQA", "config": {"requirements": [], "expectedFiles": "c.gz"}}"#;
        let text = format!("[{entry}, {entry}]");
        let err = Registry::from_json_str(&text, Path::new("/"), Path::new("/r.json")).unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn from_file_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("datasets.json");
        std::fs::write(
            &json,
            r#"[{"dataset": "RACE", "config": {"requirements": [], "expectedFiles": "RACE.txt.gz"}}]"#,
        )
        .unwrap();
        let reg = Registry::from_file(&json).unwrap();
        assert_eq!(
            reg.get(Collection::Race).unwrap().expected_files,
            dir.path().join("RACE.txt.gz")
        );

        let toml_path = dir.path().join("datasets.toml");
        std::fs::write(&toml_path, "[datasets.COSMOS_QA]\nexpected_files = \"c.gz\"\n").unwrap();
        let reg = Registry::from_file(&toml_path).unwrap();
        assert_eq!(reg.configured(), vec![Collection::CosmosQa]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Registry::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }
}
