use colored::*;
use pnet::util::MacAddr;
use rampart_common::network::block::AddressBlock;
use rampart_common::network::mac;
use rampart_core::engine::{Counts, UnitOutcome, UnitStatus};

use crate::terminal::colors;

type Detail = (String, ColoredString);

pub fn status(status: UnitStatus) -> ColoredString {
    let text = format!("{:<7}", status.to_string());
    match status {
        UnitStatus::Pass => text.color(colors::PASS).bold(),
        UnitStatus::Warn => text.color(colors::WARN).bold(),
        UnitStatus::Fail => text.color(colors::FAIL).bold(),
        UnitStatus::Skipped | UnitStatus::Pending | UnitStatus::Running => text.color(colors::SKIPPED),
    }
}

/// One line per outcome: status, unit name and, when it changed something, a marker.
pub fn outcome_line(outcome: &UnitOutcome) -> String {
    let changed = if outcome.changed {
        " (changed)".color(colors::ACCENT).to_string()
    } else {
        String::new()
    };
    format!(
        "{} {} {}{}",
        status(outcome.status),
        outcome.phase.to_string().color(colors::SEPARATOR),
        outcome.unit.color(colors::PRIMARY),
        changed
    )
}

/// Why a unit did not pass and what to do about it.
pub fn outcome_details(outcome: &UnitOutcome) -> Vec<Detail> {
    let mut details: Vec<Detail> = Vec::new();
    match &outcome.error {
        Some(error) => details.push(("Error".to_string(), error.to_string().normal())),
        None if !outcome.output.is_empty() => {
            details.push(("Reason".to_string(), outcome.output.clone().normal()))
        }
        None => {}
    }
    if let Some(remediation) = &outcome.remediation {
        details.push(("Fix".to_string(), remediation.clone().color(colors::ACCENT)));
    }
    details
}

pub fn counts(counts: &Counts) -> String {
    format!(
        "{} pass, {} warn, {} fail, {} skipped, {} changed",
        counts.pass.to_string().color(colors::PASS).bold(),
        counts.warn.to_string().color(colors::WARN).bold(),
        counts.fail.to_string().color(colors::FAIL).bold(),
        counts.skipped.to_string().color(colors::SKIPPED),
        counts.changed.to_string().color(colors::ACCENT),
    )
}

pub fn block_to_details(block: &AddressBlock) -> Vec<Detail> {
    vec![
        ("Subnet".to_string(), subnet(block)),
        ("Gateway".to_string(), block.gateway.to_string().color(colors::IPV4_ADDR)),
        ("Host".to_string(), block.host.to_string().color(colors::IPV4_ADDR)),
        ("Bcast".to_string(), block.broadcast.to_string().color(colors::IPV4_ADDR)),
    ]
}

fn subnet(block: &AddressBlock) -> ColoredString {
    let subnet = block.subnet();
    format!(
        "{}{}",
        subnet.network().to_string().color(colors::IPV4_ADDR),
        format!("/{}", subnet.prefix()).color(colors::IPV4_PREFIX)
    )
    .normal()
}

pub fn mac_to_detail(mac_addr: MacAddr) -> Detail {
    let mut value = mac_addr.to_string().color(colors::MAC_ADDR).to_string();
    if let Some(vendor) = mac::vendor(mac_addr) {
        value.push_str(&format!(" {}", format!("({vendor})").color(colors::SECONDARY)));
    } else if mac::is_locally_administered(mac_addr) {
        value.push_str(&format!(" {}", "(local)".color(colors::SEPARATOR)));
    }
    ("MAC".to_string(), value.normal())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
