//! `datamine download` - make a dataset available locally

use anyhow::{Context as _, Result};
use clap::Args;

use datamine_core::HttpFetcher;
use datamine_store::{Availability, Collection, DownloadCenter, IntegrityLevel, BuiltinArchives};

use super::{Context, parse_dataset};

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Dataset name, e.g. RACE
    #[arg(value_parser = parse_dataset)]
    pub dataset: Collection,

    /// Trust a local copy whose files merely exist (skip re-hashing)
    #[arg(long)]
    pub shallow: bool,
}

pub fn run(args: DownloadArgs, ctx: &Context) -> Result<()> {
    let resolver = ctx.resolver();
    resolver.resolve_or_exit()?;
    let registry = ctx.registry()?;

    let fetcher = HttpFetcher::new(ctx.http).context("Failed to build HTTP client")?;
    let center = DownloadCenter::new(&registry, &resolver, fetcher, BuiltinArchives)
        .with_progress(ctx.progress.clone());

    let level = if args.shallow {
        IntegrityLevel::Shallow
    } else {
        IntegrityLevel::Deep
    };
    let availability = center
        .ensure(args.dataset, level)
        .with_context(|| format!("Failed to provision {}", args.dataset))?;

    let dir = resolver.dataset_dir(args.dataset)?;
    match availability {
        Availability::AlreadyPresent => ctx.progress.println(format!(
            "`{}` already available at `{}`",
            args.dataset,
            dir.display()
        )),
        Availability::Fetched => ctx.progress.println(format!(
            "`{}` downloaded to `{}`",
            args.dataset,
            dir.display()
        )),
    }
    Ok(())
}
