//! The `prism effects` command: list registered effects.

use prism_core::effect::{EffectFactory, EffectRegistry};
use prism_core::{backend, Config};
use serde::Serialize;

/// One row of the effect listing.
#[derive(Debug, Serialize)]
struct EffectRow<'a> {
    id: &'a str,
    name: &'a str,
    handler: bool,
}

/// Print every effect id a batch may use, in application order.
pub fn execute(config: &Config) -> anyhow::Result<()> {
    let registry = EffectRegistry::builtin();
    let factory = EffectFactory::builtin();
    let rows = rows(&registry, &factory);

    if !console_output() {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("  {:<10} {:<10} HANDLER", "ID", "NAME");
    for row in &rows {
        println!(
            "  {:<10} {:<10} {}",
            row.id,
            row.name,
            if row.handler { "yes" } else { "missing" }
        );
    }

    let backend = backend::from_config(config);
    println!();
    println!(
        "  Backend: {} ({})",
        backend.name(),
        if backend.is_available() { "available" } else { "unavailable" }
    );
    Ok(())
}

fn rows<'a>(registry: &'a EffectRegistry, factory: &EffectFactory) -> Vec<EffectRow<'a>> {
    registry
        .descriptors()
        .iter()
        .map(|d| EffectRow {
            id: &d.id,
            name: &d.name,
            handler: factory.contains(&d.name),
        })
        .collect()
}

/// Tables for terminals, JSON when stdout is piped.
fn console_output() -> bool {
    use std::io::IsTerminal;
    std::io::stdout().is_terminal()
}
