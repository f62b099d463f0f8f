//! # Profiles
//!
//! A profile is a feature module: it reads and extends the [`NetworkModel`] and
//! contributes units to the machine it is applied to. Profiles are asked for their
//! units once per [`Phase`], in phase order, through a [`ProfileContext`].
//!
//! Profiles compose by [including](ProfileContext::include) each other. Whatever
//! the nesting depth, every unit lands in the same flat list of the machine.

pub mod hosts;
pub mod ssh;

use rampart_common::error::Result;

use crate::engine::Phase;
use crate::machine::MachineModel;
use crate::model::NetworkModel;
use crate::unit::{ChecksumUnit, DownloadUnit, Unit, UnitHandle};

pub use hosts::HostsProfile;
pub use ssh::SshProfile;

pub trait Profile: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the compiler applies this profile to `machine` on its own.
    fn applies_to(&self, _machine: &MachineModel) -> bool {
        true
    }

    fn installed(&self, _ctx: &mut ProfileContext<'_>) -> Result<()> {
        Ok(())
    }

    fn persistent(&self, _ctx: &mut ProfileContext<'_>) -> Result<()> {
        Ok(())
    }

    fn live(&self, _ctx: &mut ProfileContext<'_>) -> Result<()> {
        Ok(())
    }

    fn firewall(&self, _ctx: &mut ProfileContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// What a profile sees while configuring one machine.
pub struct ProfileContext<'a> {
    machine: String,
    phase: Phase,
    model: &'a mut NetworkModel,
    units: Vec<(Phase, Box<dyn Unit>)>,
}

impl<'a> ProfileContext<'a> {
    pub fn new(machine: impl Into<String>, model: &'a mut NetworkModel) -> Self {
        Self {
            machine: machine.into(),
            phase: Phase::Installed,
            model,
            units: Vec::new(),
        }
    }

    /// Label of the machine being configured.
    pub fn machine(&self) -> &str {
        &self.machine
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn model(&self) -> &NetworkModel {
        self.model
    }

    /// The whole graph. Other machines are reached by label.
    pub fn model_mut(&mut self) -> &mut NetworkModel {
        self.model
    }

    /// The machine being configured.
    pub fn this(&self) -> Result<&MachineModel> {
        self.model.machine(&self.machine).ok_or_else(|| {
            rampart_common::error::CompileError::UnknownMachine {
                label: self.machine.clone(),
            }
        })
    }

    /// Adds `unit` to the current phase and returns the handle dependents use.
    pub fn add(&mut self, unit: impl Unit + 'static) -> UnitHandle {
        let handle = UnitHandle::new(&self.machine, unit.name());
        self.units.push((self.phase, Box::new(unit)));
        handle
    }

    /// Handle of a unit this machine adds in some phase, possibly a later one.
    pub fn handle(&self, name: &str) -> UnitHandle {
        UnitHandle::new(&self.machine, name)
    }

    /// Adds a download followed by the check of its sha256.
    ///
    /// Returns the handle of the check, so dependents only ever run on a verified
    /// artifact.
    pub fn add_verified_download(&mut self, download: DownloadUnit, sha256: &str) -> UnitHandle {
        let name = format!("{}_checksum", download.name());
        let path = download.destination().to_string();
        let fetched = self.add(download);
        self.add(ChecksumUnit::for_download(name, &fetched, path, sha256))
    }

    /// Collects `profile`'s units for the current phase into this machine's list.
    pub fn include(&mut self, profile: &dyn Profile) -> Result<()> {
        match self.phase {
            Phase::Installed => profile.installed(self),
            Phase::PersistentConfig => profile.persistent(self),
            Phase::LiveConfig => profile.live(self),
            Phase::Firewall => profile.firewall(self),
        }
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn into_units(self) -> Vec<(Phase, Box<dyn Unit>)> {
        self.units
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
