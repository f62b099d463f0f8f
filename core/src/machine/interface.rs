use std::net::Ipv4Addr;

use pnet::util::MacAddr;
use rampart_common::network::block::AddressBlock;

/// A network interface owned by exactly one machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    name: String,
    mac: Option<MacAddr>,
    block: Option<AddressBlock>,
    address: Option<Ipv4Addr>,
}

impl Interface {
    /// An interface addressed from an allocated block.
    pub fn allocated(name: impl Into<String>, mac: MacAddr, block: AddressBlock) -> Self {
        Self {
            name: name.into(),
            mac: Some(mac),
            block: Some(block),
            address: Some(block.host),
        }
    }

    /// An interface outside the allocation, such as the router's uplink.
    pub fn unallocated(name: impl Into<String>, address: Option<Ipv4Addr>) -> Self {
        Self {
            name: name.into(),
            mac: None,
            block: None,
            address,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mac(&self) -> Option<MacAddr> {
        self.mac
    }

    pub fn block(&self) -> Option<AddressBlock> {
        self.block
    }

    pub fn address(&self) -> Option<Ipv4Addr> {
        self.address
    }
}
