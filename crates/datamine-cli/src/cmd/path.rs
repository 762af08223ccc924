//! `datamine path` - where things live

use anyhow::Result;
use clap::Args;

use datamine_store::Collection;

use super::{Context, parse_dataset};

#[derive(Args, Debug)]
pub struct PathArgs {
    /// Print this dataset's directory instead of the cache root
    #[arg(value_parser = parse_dataset)]
    pub dataset: Option<Collection>,
}

pub fn run(args: PathArgs, ctx: &Context) -> Result<()> {
    let root = ctx.resolver().resolve_or_exit()?;
    let path = match args.dataset {
        Some(id) => root.join(id.name()),
        None => root,
    };
    // stdout, so it composes with `cd $(datamine path RACE)`
    println!("{}", path.display());
    Ok(())
}
