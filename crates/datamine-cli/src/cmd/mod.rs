//! Subcommands

pub mod check;
pub mod download;
pub mod list;
pub mod manifest;
pub mod path;

use anyhow::{Context as _, Result};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use datamine_core::{HttpConfig, SharedProgress};
use datamine_store::{CACHE_DIR_ENV_VAR, CacheRootResolver, Collection, Registry};

use crate::config::Config;

/// Settings shared by every subcommand, after CLI overrides.
pub struct Context {
    pub config: Config,
    pub http: HttpConfig,
    pub progress: SharedProgress,
}

impl Context {
    pub fn resolver(&self) -> CacheRootResolver {
        let resolver = CacheRootResolver::new();
        match &self.config.cache.dir {
            Some(dir) => resolver.with_default_dir(dir),
            None => resolver,
        }
    }

    pub fn registry(&self) -> Result<Registry> {
        let path = &self.config.registry;
        Registry::from_file(path)
            .with_context(|| format!("Failed to load dataset registry {}", path.display()))
    }
}

/// clap value parser for dataset names.
pub fn parse_dataset(s: &str) -> Result<Collection, String> {
    s.parse().map_err(|e: datamine_store::DatasetError| e.to_string())
}

pub fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

pub fn show_config(ctx: &Context) -> Result<()> {
    let mut table = table(&["Setting", "Value"]);

    let cache_dir = match std::env::var(CACHE_DIR_ENV_VAR) {
        Ok(dir) if !dir.is_empty() => format!("{dir} (from {CACHE_DIR_ENV_VAR})"),
        _ => ctx
            .config
            .cache
            .dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "~/.datamine_cache_dir".to_string()),
    };

    table.add_row(vec!["Registry", &ctx.config.registry.display().to_string()]);
    table.add_row(vec!["Cache directory", &cache_dir]);
    table.add_row(vec![
        "Connect timeout",
        &format!("{}s", ctx.http.connect_timeout.as_secs()),
    ]);
    table.add_row(vec![
        "Read timeout",
        &format!("{}s", ctx.http.read_timeout.as_secs()),
    ]);

    eprintln!("\n{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_names_parse() {
        assert_eq!(parse_dataset("TRIVIA_QA").unwrap(), Collection::TriviaQa);
        let err = parse_dataset("trivia").unwrap_err();
        assert!(err.contains("Available datasets"));
        assert!(err.contains("TRIVIA_QA"));
    }
}
