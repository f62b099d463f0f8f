use std::path::Path;

use colored::*;
use rampart_common::config::Config;
use rampart_core::compiler::Compiler;
use rampart_core::unit::Unit;

use crate::commands::load_definition;
use crate::mprint;
use crate::terminal::{colors, print};

pub fn plan(path: &Path, cfg: &Config) -> anyhow::Result<bool> {
    let definition = load_definition(path)?;
    let compilation = Compiler::with_defaults()
        .only(cfg.machines.iter().cloned())
        .compile(&definition)?;

    if compilation.plans.is_empty() {
        print::nothing_to_do(cfg.quiet);
        return Ok(true);
    }

    print::header("execution plan", cfg.quiet);
    for (idx, plan) in compilation.plans.iter().enumerate() {
        print::tree_head(idx, plan.machine());
        if cfg.quiet > 1 {
            continue;
        }
        let steps = plan
            .units()
            .iter()
            .enumerate()
            .map(|(step, planned)| {
                let value = format!(
                    "{} {}",
                    planned.phase.to_string().color(colors::SEPARATOR),
                    planned.unit.name().color(colors::PRIMARY)
                );
                (format!("{:>3}", step + 1), value.normal())
            })
            .collect();
        print::as_tree_one_level(steps);
        if idx + 1 != compilation.plans.len() {
            mprint!();
        }
    }
    Ok(true)
}
