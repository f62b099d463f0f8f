use std::fmt;
use std::net::Ipv4Addr;

use pnet::ipnetwork::Ipv4Network;

/// Number of addresses in one block (a /30).
pub const BLOCK_SIZE: u32 = 4;
pub const BLOCK_PREFIX: u8 = 30;

/// A /30 handed to a single interface: the router owns the gateway, the machine owns the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressBlock {
    pub network: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub host: Ipv4Addr,
    pub broadcast: Ipv4Addr,
}

impl AddressBlock {
    /// Builds the block starting at `network`. The caller guarantees alignment.
    pub fn at(network: Ipv4Addr) -> Self {
        let base: u32 = network.into();
        Self {
            network,
            gateway: Ipv4Addr::from(base + 1),
            host: Ipv4Addr::from(base + 2),
            broadcast: Ipv4Addr::from(base + 3),
        }
    }

    pub fn subnet(&self) -> Ipv4Network {
        // A /30 prefix is always valid, so construction cannot fail.
        Ipv4Network::new(self.network, BLOCK_PREFIX)
            .unwrap_or_else(|_| unreachable!("/30 is a valid prefix"))
    }

    pub fn netmask(&self) -> Ipv4Addr {
        self.subnet().mask()
    }

    pub fn addresses(&self) -> [Ipv4Addr; 4] {
        [self.network, self.gateway, self.host, self.broadcast]
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.subnet().contains(addr)
    }
}

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, BLOCK_PREFIX)
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
