use std::path::Path;

use colored::*;
use rampart_common::config::Config;
use rampart_common::network::allocator;

use crate::commands::load_definition;
use crate::mprint;
use crate::terminal::{colors, format, print};

pub fn addresses(path: &Path, cfg: &Config) -> anyhow::Result<bool> {
    let definition = load_definition(path)?;
    let plan = allocator::allocate(&definition)?;

    print::header("address plan", cfg.quiet);
    for (idx, alloc) in plan.iter().enumerate() {
        if cfg.quiet > 1 {
            continue;
        }
        print::tree_head(idx, &format!("{} {}", alloc.label, alloc.interface.color(colors::SEPARATOR)));
        let mut details = format::block_to_details(&alloc.block);
        details.push(format::mac_to_detail(alloc.mac));
        print::as_tree_one_level(details);
        if idx + 1 != plan.len() {
            mprint!();
        }
    }

    print::fat_separator();
    print::centerln(&format!(
        "{} blocks from {} and {}",
        plan.len().to_string().bold().green(),
        definition.network.server_pool,
        definition.network.device_pool
    ));
    Ok(true)
}
