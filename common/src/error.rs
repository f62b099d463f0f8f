//! Error taxonomy.
//!
//! Structural errors ([`CompileError`]) abort the whole compile before any machine is
//! touched. Convergence errors ([`ConvergenceError`]) are scoped to a single unit and
//! end up inside its outcome.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("unit '{unit}' on '{machine}' depends on unknown unit '{precondition}'")]
    UnknownPrecondition {
        machine: String,
        unit: String,
        precondition: String,
    },

    #[error("dependency cycle on '{machine}' between units: {}", units.join(" -> "))]
    CycleDetected { machine: String, units: Vec<String> },

    #[error("unit name '{name}' declared twice on '{machine}'")]
    DuplicateUnitName { machine: String, name: String },

    #[error("address pool {pool} exhausted: {entity} needs index {index}")]
    AddressExhaustion {
        pool: String,
        entity: String,
        index: usize,
    },

    #[error("address {address} is claimed by both {first} and {second}")]
    OverlappingSubnet {
        address: Ipv4Addr,
        first: String,
        second: String,
    },

    #[error("'{label}' declares no LAN interface")]
    NoLanInterface { label: String },

    #[error("no machine labelled '{label}'")]
    UnknownMachine { label: String },

    #[error("'{machine}' has no {table} chain named '{chain}'")]
    UnknownChain {
        machine: String,
        table: String,
        chain: String,
    },

    #[error("label '{label}' is used by more than one machine")]
    DuplicateLabel { label: String },

    #[error("invalid network definition: {message}")]
    InvalidDefinition { message: String },

    #[error("definition file not found: {}", path.display())]
    DefinitionNotFound { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl CompileError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            message: message.into(),
        }
    }
}

/// Runtime failure of a single unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceError {
    #[error("'{unit}' diverges: expected {expected}, found '{actual}'")]
    Divergence {
        unit: String,
        expected: String,
        actual: String,
    },

    /// The change ran on the machine but exited non-zero.
    #[error("'{unit}' failed to apply: `{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        unit: String,
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("'{unit}' could not reach its target: {message}")]
    Transport { unit: String, message: String },
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
