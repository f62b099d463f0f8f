use std::path::Path;

use anyhow::bail;
use rampart_common::config::Config;
use rampart_core::compiler::Compiler;

use crate::commands::load_definition;
use crate::terminal::print;

pub fn firewall(path: &Path, machine: &str, cfg: &Config) -> anyhow::Result<bool> {
    let definition = load_definition(path)?;
    let compilation = Compiler::with_defaults().compile(&definition)?;

    let Some(ruleset) = compilation.model.ruleset(machine) else {
        bail!("'{machine}' is not a machine with a firewall");
    };

    print::header(&format!("{machine} ruleset"), cfg.quiet);
    print::block(&ruleset);
    Ok(true)
}
