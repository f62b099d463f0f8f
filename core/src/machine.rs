//! # Machine Model
//!
//! One node of the network graph: its identity, interfaces, firewall and the facts
//! profiles register about it.
//!
//! Devices are not managed directly: they receive addresses and appear in other
//! machines' policies, but carry no firewall of their own.

pub mod facts;
pub mod interface;

use std::net::Ipv4Addr;

use pnet::ipnetwork::Ipv4Network;
use rampart_common::network::definition::TrafficCategory;

use crate::firewall::FirewallModel;
use facts::Facts;
use interface::Interface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineKind {
    Router,
    Server { superuser: bool },
    Device { category: TrafficCategory, admin: bool },
}

#[derive(Debug, Clone)]
pub struct MachineModel {
    label: String,
    kind: MachineKind,
    interfaces: Vec<Interface>,
    firewall: FirewallModel,
    facts: Facts,
    ssh_port: Option<u16>,
    internet: bool,
}

impl MachineModel {
    pub fn new(label: impl Into<String>, kind: MachineKind) -> Self {
        let label = label.into();
        Self {
            firewall: FirewallModel::new(&label),
            label,
            kind,
            interfaces: Vec::new(),
            facts: Facts::default(),
            ssh_port: None,
            internet: false,
        }
    }

    pub fn with_ssh_port(mut self, port: u16) -> Self {
        self.ssh_port = Some(port);
        self
    }

    pub fn with_internet(mut self, internet: bool) -> Self {
        self.internet = internet;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> MachineKind {
        self.kind
    }

    pub fn is_router(&self) -> bool {
        matches!(self.kind, MachineKind::Router)
    }

    pub fn is_server(&self) -> bool {
        matches!(self.kind, MachineKind::Server { .. })
    }

    /// Servers with the superuser flag and administrator devices.
    pub fn is_superuser(&self) -> bool {
        matches!(
            self.kind,
            MachineKind::Server { superuser: true } | MachineKind::Device { admin: true, .. }
        )
    }

    pub fn has_interfaces(&self) -> bool {
        !self.interfaces.is_empty()
    }

    /// Routers and servers are configured by the engine and own a ruleset.
    pub fn has_firewall(&self) -> bool {
        !matches!(self.kind, MachineKind::Device { .. })
    }

    pub fn category(&self) -> TrafficCategory {
        match self.kind {
            MachineKind::Device { category, .. } => category,
            MachineKind::Router | MachineKind::Server { .. } => TrafficCategory::Server,
        }
    }

    pub fn ssh_port(&self) -> Option<u16> {
        self.ssh_port
    }

    pub fn internet(&self) -> bool {
        self.internet
    }

    pub fn add_interface(&mut self, interface: Interface) {
        self.interfaces.push(interface);
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    /// The first interface with an allocated block.
    fn primary(&self) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.block().is_some())
    }

    pub fn ip(&self) -> Option<Ipv4Addr> {
        self.primary().and_then(Interface::address)
    }

    /// Every host address of this machine.
    pub fn ips(&self) -> Vec<Ipv4Addr> {
        self.interfaces.iter().filter_map(Interface::address).collect()
    }

    pub fn gateway(&self) -> Option<Ipv4Addr> {
        self.primary().and_then(|i| i.block()).map(|b| b.gateway)
    }

    pub fn broadcast(&self) -> Option<Ipv4Addr> {
        self.primary().and_then(|i| i.block()).map(|b| b.broadcast)
    }

    pub fn subnet(&self) -> Option<Ipv4Network> {
        self.primary().and_then(|i| i.block()).map(|b| b.subnet())
    }

    pub fn netmask(&self) -> Option<Ipv4Addr> {
        self.primary().and_then(|i| i.block()).map(|b| b.netmask())
    }

    pub fn firewall(&self) -> &FirewallModel {
        &self.firewall
    }

    pub fn firewall_mut(&mut self) -> &mut FirewallModel {
        &mut self.firewall
    }

    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    pub fn facts_mut(&mut self) -> &mut Facts {
        &mut self.facts
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
