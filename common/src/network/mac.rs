//! Vendor lookups for the MACs declared in a network definition.

use std::sync::OnceLock;

use mac_oui::Oui;
use pnet::util::MacAddr;

static VENDORS: OnceLock<Option<Oui>> = OnceLock::new();

/// The bundled OUI database, loaded on first use. A load failure is kept as `None`.
fn vendors() -> Option<&'static Oui> {
    VENDORS.get_or_init(|| Oui::default().ok()).as_ref()
}

pub fn vendor(mac: MacAddr) -> Option<String> {
    vendors()?
        .lookup_by_mac(&mac.to_string())
        .ok()
        .flatten()
        .map(|entry| entry.company_name.clone())
}

/// Locally administered addresses are typical for virtual machines.
pub fn is_locally_administered(mac: MacAddr) -> bool {
    mac.0 & 0b10 != 0
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locally_administered_bit() {
        assert!(is_locally_administered(MacAddr::new(0x02, 0, 0, 0, 0, 1)));
        assert!(is_locally_administered(MacAddr::new(0x52, 0x54, 0, 0, 0, 1)));
        assert!(!is_locally_administered(MacAddr::new(0xa8, 0xa1, 0x59, 0x13, 0x41, 0x46)));
    }
}
