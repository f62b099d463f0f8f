//! # Network Model
//!
//! The graph of every machine in a definition, shared by reference between the
//! profiles that extend it.
//!
//! A profile configuring one machine routinely changes another one, most often the
//! router, where NAT and perimeter rules for a service physically live. Callers
//! therefore always resolve the machine they mutate by label through
//! [`NetworkModel::machine_mut`] or [`NetworkModel::firewall_mut`].
//!
//! Once every profile has run the model is [frozen](NetworkModel::freeze): peer
//! rules are authored from the final facts, and the resulting [`FrozenModel`] only
//! hands out shared references, so nothing can change it while rulesets are
//! rendered and machines are converged.

use std::net::Ipv4Addr;
use std::ops::Deref;

use rampart_common::error::{CompileError, Result};
use rampart_common::network::allocator::{self, AddressPlan};
use rampart_common::network::definition::NetworkDefinition;
use rayon::prelude::*;
use tracing::debug;

use crate::firewall::FirewallModel;
use crate::machine::interface::Interface;
use crate::machine::{MachineKind, MachineModel};
use crate::policy;

#[derive(Debug, Clone)]
pub struct NetworkModel {
    definition: NetworkDefinition,
    addresses: AddressPlan,
    machines: Vec<MachineModel>,
}

impl NetworkModel {
    /// Allocates addresses, builds every machine and authors the default policy.
    pub fn from_definition(definition: &NetworkDefinition) -> Result<Self> {
        let addresses = allocator::allocate(definition)?;
        let mut machines = Vec::with_capacity(1 + definition.servers.len() + definition.devices.len());

        let router_def = &definition.router;
        let mut router = MachineModel::new(&router_def.label, MachineKind::Router)
            .with_ssh_port(router_def.ssh_port)
            .with_internet(true);
        router.add_interface(Interface::unallocated(
            &router_def.wan_interface,
            router_def.external_address,
        ));
        router.add_interface(Interface::unallocated(&router_def.lan_interface, None));
        machines.push(router);

        for server in &definition.servers {
            let kind = MachineKind::Server {
                superuser: server.superuser,
            };
            let mut machine = MachineModel::new(&server.label, kind)
                .with_ssh_port(server.ssh_port)
                .with_internet(server.internet);
            for alloc in addresses.for_machine(&server.label) {
                machine.add_interface(Interface::allocated(&alloc.interface, alloc.mac, alloc.block));
            }
            for port in &server.ports {
                machine.facts_mut().add_listening_port(*port);
            }
            machines.push(machine);
        }

        for device in &definition.devices {
            let kind = MachineKind::Device {
                category: device.category.into(),
                admin: device.admin,
            };
            let mut machine = MachineModel::new(&device.label, kind).with_internet(device.internet);
            for alloc in addresses.for_machine(&device.label) {
                machine.add_interface(Interface::allocated(&alloc.interface, alloc.mac, alloc.block));
            }
            machines.push(machine);
        }

        let mut model = Self {
            definition: definition.clone(),
            addresses,
            machines,
        };
        policy::apply_defaults(&mut model)?;

        debug!(machines = model.machines.len(), "network model built");
        Ok(model)
    }

    pub fn definition(&self) -> &NetworkDefinition {
        &self.definition
    }

    pub fn addresses(&self) -> &AddressPlan {
        &self.addresses
    }

    pub fn machines(&self) -> impl Iterator<Item = &MachineModel> {
        self.machines.iter()
    }

    pub fn machine(&self, label: &str) -> Option<&MachineModel> {
        self.machines.iter().find(|m| m.label() == label)
    }

    pub fn machine_mut(&mut self, label: &str) -> Result<&mut MachineModel> {
        self.machines
            .iter_mut()
            .find(|m| m.label() == label)
            .ok_or_else(|| CompileError::UnknownMachine {
                label: label.to_string(),
            })
    }

    /// The firewall of `label`, which need not be the machine being configured.
    pub fn firewall_mut(&mut self, label: &str) -> Result<&mut FirewallModel> {
        Ok(self.machine_mut(label)?.firewall_mut())
    }

    pub fn router(&self) -> Option<&MachineModel> {
        self.machines.iter().find(|m| m.is_router())
    }

    pub fn router_label(&self) -> &str {
        &self.definition.router.label
    }

    pub fn servers(&self) -> impl Iterator<Item = &MachineModel> {
        self.machines.iter().filter(|m| m.is_server())
    }

    pub fn devices(&self) -> impl Iterator<Item = &MachineModel> {
        self.machines
            .iter()
            .filter(|m| matches!(m.kind(), MachineKind::Device { .. }))
    }

    /// Machines the engine converges: the router and the servers.
    pub fn managed(&self) -> impl Iterator<Item = &MachineModel> {
        self.machines.iter().filter(|m| m.has_firewall())
    }

    /// Router-side addresses of every allocated block.
    pub fn gateways(&self) -> Vec<Ipv4Addr> {
        self.addresses.iter().map(|a| a.block.gateway).collect()
    }

    pub fn freeze(mut self) -> Result<FrozenModel> {
        policy::apply_peer_rules(&mut self)?;
        Ok(FrozenModel(self))
    }
}

/// A model no profile can change any more.
#[derive(Debug, Clone)]
pub struct FrozenModel(NetworkModel);

impl Deref for FrozenModel {
    type Target = NetworkModel;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FrozenModel {
    /// The `iptables-restore` ruleset of every managed machine, in definition order.
    pub fn render_rulesets(&self) -> Vec<(String, String)> {
        self.0
            .machines
            .par_iter()
            .filter(|m| m.has_firewall())
            .map(|m| (m.label().to_string(), m.firewall().render()))
            .collect()
    }

    pub fn ruleset(&self, label: &str) -> Option<String> {
        self.machine(label)
            .filter(|m| m.has_firewall())
            .map(|m| m.firewall().render())
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
