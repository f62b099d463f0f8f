//! # Network Definition
//!
//! The declarative input of a compile: the router, the dedicated servers, the
//! user devices and the global settings every machine shares.
//!
//! A definition is read once from TOML, validated, and never changed afterwards.
//! Everything the compile mutates lives in the machine model built from it.

use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;

use pnet::ipnetwork::Ipv4Network;
use pnet::util::MacAddr;
use serde::{Deserialize, Deserializer};

use crate::error::{CompileError, Result};

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkDefinition {
    pub network: NetworkSettings,
    pub router: RouterDefinition,
    #[serde(default)]
    pub servers: Vec<ServerDefinition>,
    #[serde(default)]
    pub devices: Vec<DeviceDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSettings {
    pub domain: String,

    #[serde(default = "default_netmask")]
    pub netmask: Ipv4Addr,

    /// Upstream resolvers the router may query.
    #[serde(default)]
    pub dns: Vec<Ipv4Addr>,

    #[serde(default = "default_server_pool", deserialize_with = "from_str")]
    pub server_pool: Ipv4Network,

    #[serde(default = "default_device_pool", deserialize_with = "from_str")]
    pub device_pool: Ipv4Network,

    #[serde(default)]
    pub bandwidth: BandwidthSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterDefinition {
    pub label: String,

    #[serde(default = "default_wan")]
    pub wan_interface: String,

    #[serde(default = "default_lan")]
    pub lan_interface: String,

    /// Public address used by internal clients to reach exposed services.
    pub external_address: Option<Ipv4Addr>,

    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerDefinition {
    pub label: String,

    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    #[serde(default)]
    pub interfaces: Vec<InterfaceDefinition>,

    /// Ports this server listens on. Peers may reach these ports only.
    #[serde(default)]
    pub ports: Vec<u16>,

    /// Labels of machines allowed to reach this server's ports.
    #[serde(default)]
    pub peers: Vec<String>,

    /// May open SSH sessions to every other server.
    #[serde(default)]
    pub superuser: bool,

    /// May open outbound web connections through the router.
    #[serde(default)]
    pub internet: bool,

    #[serde(default)]
    pub expose: Vec<ExposedService>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceDefinition {
    pub label: String,

    #[serde(default)]
    pub category: DeviceCategory,

    /// Administrators may SSH into every server.
    #[serde(default)]
    pub admin: bool,

    #[serde(default)]
    pub internet: bool,

    #[serde(default)]
    pub interfaces: Vec<InterfaceDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterfaceDefinition {
    pub name: String,
    #[serde(deserialize_with = "from_str")]
    pub mac: MacAddr,
}

/// A service published through the router with DNAT.
#[derive(Debug, Clone, Deserialize)]
pub struct ExposedService {
    pub port: u16,
    /// Defaults to `port`.
    pub external_port: Option<u16>,
    /// Also reachable by internal clients through the external address.
    #[serde(default)]
    pub internal: bool,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

impl ExposedService {
    pub fn external_port(&self) -> u16 {
        self.external_port.unwrap_or(self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCategory {
    #[default]
    User,
    Device,
}

/// Traffic category used by the bandwidth policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrafficCategory {
    User,
    Device,
    Server,
}

impl fmt::Display for TrafficCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "user",
            Self::Device => "device",
            Self::Server => "server",
        };
        f.write_str(name)
    }
}

impl From<DeviceCategory> for TrafficCategory {
    fn from(category: DeviceCategory) -> Self {
        match category {
            DeviceCategory::User => Self::User,
            DeviceCategory::Device => Self::Device,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BandwidthSettings {
    #[serde(default = "default_user_bandwidth")]
    pub user: BandwidthCategory,
    #[serde(default = "default_device_bandwidth")]
    pub device: BandwidthCategory,
    #[serde(default = "default_server_bandwidth")]
    pub server: BandwidthCategory,
}

impl Default for BandwidthSettings {
    fn default() -> Self {
        Self {
            user: default_user_bandwidth(),
            device: default_device_bandwidth(),
            server: default_server_bandwidth(),
        }
    }
}

impl BandwidthSettings {
    pub fn category(&self, category: TrafficCategory) -> &BandwidthCategory {
        match category {
            TrafficCategory::User => &self.user,
            TrafficCategory::Device => &self.device,
            TrafficCategory::Server => &self.server,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BandwidthCategory {
    #[serde(default = "default_threshold_mib")]
    pub threshold_mib: u64,
    pub mark: u32,
    /// Who gets alerted when a connection crosses the threshold.
    pub notify: Option<String>,
}

impl BandwidthCategory {
    pub fn threshold_bytes(&self) -> u64 {
        self.threshold_mib * MIB
    }
}

impl FromStr for NetworkDefinition {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self> {
        let definition: NetworkDefinition = toml::from_str(s)?;
        definition.validate()?;
        Ok(definition)
    }
}

impl NetworkDefinition {
    /// Loads and validates a definition from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(CompileError::DefinitionNotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        contents.parse()
    }

    /// Checks the invariants the allocator and the policy builder rely on.
    pub fn validate(&self) -> Result<()> {
        if self.network.domain.is_empty() {
            return Err(CompileError::invalid("domain cannot be empty"));
        }

        if self.network.netmask != Ipv4Addr::new(255, 255, 255, 252) {
            return Err(CompileError::invalid(format!(
                "netmask {} does not match the /30 allocation policy",
                self.network.netmask
            )));
        }

        let mut labels: BTreeSet<&str> = BTreeSet::new();
        for label in self.labels() {
            if label.is_empty() {
                return Err(CompileError::invalid("machine labels cannot be empty"));
            }
            if !labels.insert(label) {
                return Err(CompileError::DuplicateLabel {
                    label: label.to_string(),
                });
            }
        }

        for server in &self.servers {
            if server.interfaces.is_empty() {
                return Err(CompileError::NoLanInterface {
                    label: server.label.clone(),
                });
            }
            for peer in &server.peers {
                if !labels.contains(peer.as_str()) || *peer == self.router.label {
                    return Err(CompileError::UnknownMachine {
                        label: peer.clone(),
                    });
                }
            }
            if server.expose.iter().any(|svc| svc.internal) && self.router.external_address.is_none() {
                return Err(CompileError::invalid(format!(
                    "'{}' exposes an internal service but the router has no external_address",
                    server.label
                )));
            }
        }

        for device in &self.devices {
            if device.interfaces.is_empty() {
                return Err(CompileError::NoLanInterface {
                    label: device.label.clone(),
                });
            }
        }

        Ok(())
    }

    /// Every machine label in definition order, router first.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.router.label.as_str())
            .chain(self.servers.iter().map(|s| s.label.as_str()))
            .chain(self.devices.iter().map(|d| d.label.as_str()))
    }

    pub fn server(&self, label: &str) -> Option<&ServerDefinition> {
        self.servers.iter().find(|s| s.label == label)
    }
}

fn from_str<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse::<T>().map_err(serde::de::Error::custom)
}

// Default value functions

fn default_netmask() -> Ipv4Addr {
    Ipv4Addr::new(255, 255, 255, 252)
}

fn default_server_pool() -> Ipv4Network {
    Ipv4Network::new(Ipv4Addr::new(10, 10, 0, 0), 16).unwrap_or_else(|_| unreachable!())
}

fn default_device_pool() -> Ipv4Network {
    Ipv4Network::new(Ipv4Addr::new(10, 50, 0, 0), 16).unwrap_or_else(|_| unreachable!())
}

fn default_wan() -> String {
    "eth0".to_string()
}

fn default_lan() -> String {
    "eth1".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

fn default_protocol() -> String {
    "tcp".to_string()
}

fn default_threshold_mib() -> u64 {
    20
}

fn default_user_bandwidth() -> BandwidthCategory {
    BandwidthCategory {
        threshold_mib: default_threshold_mib(),
        mark: 1,
        notify: None,
    }
}

fn default_device_bandwidth() -> BandwidthCategory {
    BandwidthCategory {
        threshold_mib: default_threshold_mib(),
        mark: 2,
        notify: None,
    }
}

fn default_server_bandwidth() -> BandwidthCategory {
    BandwidthCategory {
        threshold_mib: default_threshold_mib(),
        mark: 3,
        notify: None,
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
