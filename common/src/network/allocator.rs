//! # Address Allocator
//!
//! Hands every server and device interface its own /30 without a central table.
//!
//! Entity `i` owns the /24 starting `i * 256` addresses into its pool, and its
//! interface `j` owns the four addresses starting at offset `j * 4` of that /24.
//! Running the allocator twice over the same definition therefore yields the
//! same blocks, and no two (entity, interface) pairs can share an address.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use pnet::ipnetwork::Ipv4Network;
use pnet::util::MacAddr;
use tracing::debug;

use crate::error::{CompileError, Result};
use crate::network::block::{AddressBlock, BLOCK_SIZE};
use crate::network::definition::{InterfaceDefinition, NetworkDefinition};

/// Addresses reserved for one entity.
const ENTITY_SPAN: u32 = 256;
/// Blocks that fit in one entity span.
pub const MAX_INTERFACES: usize = (ENTITY_SPAN / BLOCK_SIZE) as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressAllocator {
    pool: Ipv4Network,
}

impl AddressAllocator {
    pub fn new(pool: Ipv4Network) -> Result<Self> {
        if pool.prefix() > 24 {
            return Err(CompileError::invalid(format!(
                "address pool {pool} is smaller than a /24"
            )));
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> Ipv4Network {
        self.pool
    }

    /// How many entities this pool can hold.
    pub fn capacity(&self) -> usize {
        1usize << (24 - self.pool.prefix())
    }

    /// Returns the block for interface `interface` of entity `entity`.
    pub fn block(&self, label: &str, entity: usize, interface: usize) -> Result<AddressBlock> {
        if entity >= self.capacity() {
            return Err(self.exhausted(label, entity));
        }
        if interface >= MAX_INTERFACES {
            return Err(self.exhausted(label, interface));
        }

        let base: u32 = u32::from(self.pool.network()) + entity as u32 * ENTITY_SPAN;
        let network = Ipv4Addr::from(base + interface as u32 * BLOCK_SIZE);
        Ok(AddressBlock::at(network))
    }

    fn exhausted(&self, label: &str, index: usize) -> CompileError {
        CompileError::AddressExhaustion {
            pool: self.pool.to_string(),
            entity: label.to_string(),
            index,
        }
    }
}

/// One interface's assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub label: String,
    pub interface: String,
    pub mac: MacAddr,
    pub block: AddressBlock,
}

/// Every assignment of a compile, in definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressPlan {
    allocations: Vec<Allocation>,
}

impl AddressPlan {
    pub fn iter(&self) -> impl Iterator<Item = &Allocation> {
        self.allocations.iter()
    }

    pub fn for_machine<'a>(&'a self, label: &'a str) -> impl Iterator<Item = &'a Allocation> {
        self.allocations.iter().filter(move |a| a.label == label)
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Fails if any address is claimed by two allocations.
    pub fn ensure_disjoint(&self) -> Result<()> {
        let mut owners: BTreeMap<Ipv4Addr, String> = BTreeMap::new();
        for alloc in &self.allocations {
            let owner = format!("{}:{}", alloc.label, alloc.interface);
            for addr in alloc.block.addresses() {
                if let Some(first) = owners.insert(addr, owner.clone()) {
                    return Err(CompileError::OverlappingSubnet {
                        address: addr,
                        first,
                        second: owner,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Allocates blocks for every server and device of `definition`.
pub fn allocate(definition: &NetworkDefinition) -> Result<AddressPlan> {
    let servers = AddressAllocator::new(definition.network.server_pool)?;
    let devices = AddressAllocator::new(definition.network.device_pool)?;
    ensure_pools_disjoint(servers.pool(), devices.pool())?;

    let mut plan = AddressPlan::default();

    for (idx, server) in definition.servers.iter().enumerate() {
        assign(&mut plan, &servers, &server.label, idx, &server.interfaces)?;
    }
    for (idx, device) in definition.devices.iter().enumerate() {
        assign(&mut plan, &devices, &device.label, idx, &device.interfaces)?;
    }

    plan.ensure_disjoint()?;
    debug!(blocks = plan.len(), "address allocation complete");
    Ok(plan)
}

fn assign(
    plan: &mut AddressPlan,
    allocator: &AddressAllocator,
    label: &str,
    entity: usize,
    interfaces: &[InterfaceDefinition],
) -> Result<()> {
    if interfaces.is_empty() {
        return Err(CompileError::NoLanInterface {
            label: label.to_string(),
        });
    }
    for (j, iface) in interfaces.iter().enumerate() {
        let block = allocator.block(label, entity, j)?;
        plan.allocations.push(Allocation {
            label: label.to_string(),
            interface: iface.name.clone(),
            mac: iface.mac,
            block,
        });
    }
    Ok(())
}

fn ensure_pools_disjoint(a: Ipv4Network, b: Ipv4Network) -> Result<()> {
    if a.contains(b.network()) || b.contains(a.network()) {
        let address = if a.contains(b.network()) { b.network() } else { a.network() };
        return Err(CompileError::OverlappingSubnet {
            address,
            first: format!("pool {a}"),
            second: format!("pool {b}"),
        });
    }
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
