//! `datamine check` - validate a local copy

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color};

use datamine_store::{Collection, IntegrityChecker, IntegrityLevel, VerifyResult, short_hash};

use super::{Context, parse_dataset, table};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Dataset name, e.g. RACE
    #[arg(value_parser = parse_dataset)]
    pub dataset: Collection,

    /// Re-hash every file instead of only checking it exists
    #[arg(long)]
    pub deep: bool,

    /// List every file that is missing or differs
    #[arg(long)]
    pub report: bool,
}

pub fn run(args: CheckArgs, ctx: &Context) -> Result<()> {
    let resolver = ctx.resolver();
    resolver.resolve_or_exit()?;
    let registry = ctx.registry()?;
    let checker = IntegrityChecker::new(&registry, &resolver);

    let valid = if args.report {
        let results = checker.verify(args.dataset)?;
        print_mismatches(&results);
        results.iter().all(|r| r.ok)
    } else {
        let level = if args.deep {
            IntegrityLevel::Deep
        } else {
            IntegrityLevel::Shallow
        };
        checker.check(args.dataset, level)?
    };

    let status = if valid { "VALID" } else { "INVALID" };
    eprintln!("[{status}] {} at {}", args.dataset, resolver.dataset_dir(args.dataset)?.display());

    if !valid {
        std::process::exit(1);
    }
    Ok(())
}

fn print_mismatches(results: &[VerifyResult]) {
    let bad: Vec<_> = results.iter().filter(|r| !r.ok).collect();
    if bad.is_empty() {
        eprintln!("All {} files verified OK.", results.len());
        return;
    }

    let mut table = table(&["File", "Expected", "Actual"]);
    for r in &bad {
        let actual = match &r.actual {
            Some(actual) => Cell::new(short_hash(actual)).fg(Color::Red),
            None => Cell::new("missing").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(&r.path),
            Cell::new(short_hash(&r.expected)),
            actual,
        ]);
    }
    eprintln!("\n{table}");
    eprintln!("{} of {} files have integrity issues", bad.len(), results.len());
}
