//! `datamine list` - known datasets and their local state

use anyhow::Result;
use comfy_table::{Cell, Color};

use datamine_store::{Collection, IntegrityChecker};

use super::{Context, table};

pub fn run(ctx: &Context) -> Result<()> {
    let resolver = ctx.resolver();
    let root = resolver.resolve_or_exit()?;
    let registry = ctx.registry()?;
    let checker = IntegrityChecker::new(&registry, &resolver);

    let mut table = table(&["Dataset", "Configured", "Requirements", "Local copy"]);
    for id in Collection::ALL {
        let Ok(config) = registry.get(id) else {
            table.add_row(vec![
                Cell::new(id),
                Cell::new("no").fg(Color::DarkGrey),
                Cell::new("-"),
                Cell::new("-"),
            ]);
            continue;
        };

        let state = match checker.shallow_check(id) {
            Ok(true) => Cell::new("present").fg(Color::Green),
            Ok(false) => Cell::new("missing").fg(Color::Yellow),
            Err(e) => {
                log::warn!("{id}: {e}");
                Cell::new("error").fg(Color::Red)
            }
        };
        table.add_row(vec![
            Cell::new(id),
            Cell::new("yes").fg(Color::Green),
            Cell::new(config.requirements.len()),
            state,
        ]);
    }

    eprintln!("\n{table}");
    eprintln!("Cache root: {}", root.display());
    Ok(())
}
