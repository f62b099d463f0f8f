use std::path::Path;

use colored::*;
use rampart_common::config::Config;
use rampart_core::compiler::Compiler;
use rampart_core::firewall::Table;

use crate::commands::load_definition;
use crate::mprint;
use crate::terminal::{colors, print};

pub fn check(path: &Path, cfg: &Config) -> anyhow::Result<bool> {
    let definition = load_definition(path)?;
    let compilation = Compiler::with_defaults().compile(&definition)?;

    print::header("definition is valid", cfg.quiet);
    let labels: Vec<&str> = compilation.plans.iter().map(|p| p.machine()).collect();
    print::set_key_width(labels.iter().copied());

    for plan in &compilation.plans {
        let rules: usize = compilation
            .model
            .machine(plan.machine())
            .map(|m| Table::ALL.iter().map(|t| m.firewall().rules(*t).count()).sum())
            .unwrap_or(0);
        let summary = format!(
            "{} units, {} firewall rules",
            plan.len().to_string().color(colors::ACCENT),
            rules.to_string().color(colors::ACCENT)
        );
        print::aligned_line(plan.machine(), summary);
    }

    if cfg.quiet == 0 {
        mprint!();
    }
    print::centerln(&format!(
        "{} managed machines, {} addresses allocated",
        compilation.plans.len(),
        compilation.model.addresses().len()
    ));
    Ok(true)
}
