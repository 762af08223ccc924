//! `datamine manifest` - write an integrity manifest for a directory

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;

use datamine_store::{build_manifest, write_manifest};

#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Directory whose files the manifest should list
    pub dir: PathBuf,

    /// Output file (gzip), e.g. RACE.txt.gz
    #[arg(short, long)]
    pub output: PathBuf,
}

pub fn run(args: ManifestArgs) -> Result<()> {
    anyhow::ensure!(args.dir.is_dir(), "{} is not a directory", args.dir.display());

    let entries = build_manifest(&args.dir)
        .with_context(|| format!("Failed to hash files under {}", args.dir.display()))?;
    write_manifest(&args.output, &entries)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    log::info!(
        "wrote {} entries to {}",
        datamine_core::fmt_num(entries.len()),
        args.output.display()
    );
    Ok(())
}
