//! # Compiler
//!
//! Turns a network definition into one validated [`MachinePlan`] per managed
//! machine:
//!
//! 1. build the [`NetworkModel`] with addresses and the default policy;
//! 2. run every profile on every machine it applies to, phase by phase;
//! 3. freeze the model, authoring peer rules from the ports profiles registered,
//!    and append each machine's firewall units, which carry the ruleset rendered
//!    from the final model;
//! 4. validate and order every plan.
//!
//! Nothing here touches a machine. Any error aborts the compile as a whole.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rampart_common::error::{CompileError, Result};
use rampart_common::network::definition::NetworkDefinition;
use tracing::{debug, info};

use crate::engine::{MachinePlan, Phase};
use crate::model::{FrozenModel, NetworkModel};
use crate::profile::{HostsProfile, Profile, ProfileContext, SshProfile};
use crate::unit::{DirectoryUnit, Expectation, FileUnit, PackageUnit, ShellUnit, Unit, UnitHandle};

pub const RULES_DIR: &str = "/etc/iptables";
pub const RULES_PATH: &str = "/etc/iptables/rules.v4";
/// Where copies of what was last loaded into a running service are kept.
pub const STATE_DIR: &str = "/var/lib/rampart";
/// Copy of the last ruleset `iptables-restore` loaded successfully.
pub const APPLIED_PATH: &str = "/var/lib/rampart/rules.applied";

#[derive(Default)]
pub struct Compiler {
    profiles: Vec<Box<dyn Profile>>,
    assigned: BTreeMap<String, Vec<Box<dyn Profile>>>,
    only: BTreeSet<String>,
}

/// The frozen model and the plans the engine executes.
pub struct Compilation {
    pub model: Arc<FrozenModel>,
    pub plans: Vec<MachinePlan>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A compiler with the built-in [`SshProfile`] and [`HostsProfile`].
    pub fn with_defaults() -> Self {
        Self::new()
            .with_profile(SshProfile)
            .with_profile(HostsProfile::default())
    }

    /// Applies `profile` to every managed machine it [applies to](Profile::applies_to).
    pub fn with_profile(mut self, profile: impl Profile + 'static) -> Self {
        self.profiles.push(Box::new(profile));
        self
    }

    /// Applies `profile` to `machine` only.
    pub fn assign(mut self, machine: impl Into<String>, profile: impl Profile + 'static) -> Self {
        self.assigned
            .entry(machine.into())
            .or_default()
            .push(Box::new(profile));
        self
    }

    /// Only return plans for these machines. Profiles still run everywhere, since
    /// they may change the policy of machines outside the selection.
    pub fn only(mut self, machines: impl IntoIterator<Item = String>) -> Self {
        self.only = machines.into_iter().collect();
        self
    }

    pub fn compile(&self, definition: &NetworkDefinition) -> Result<Compilation> {
        let mut model = NetworkModel::from_definition(definition)?;
        let managed: Vec<String> = model.managed().map(|m| m.label().to_string()).collect();

        for label in self.only.iter().chain(self.assigned.keys()) {
            if !managed.contains(label) {
                return Err(CompileError::UnknownMachine {
                    label: label.clone(),
                });
            }
        }

        let mut collected = Vec::with_capacity(managed.len());
        for label in &managed {
            let units = self.collect(&mut model, label)?;
            debug!(machine = %label, units = units.len(), "profiles collected");
            collected.push((label.clone(), units));
        }

        let model = Arc::new(model.freeze()?);
        let mut plans = Vec::with_capacity(collected.len());
        for (label, mut units) in collected {
            let ruleset = model.ruleset(&label).unwrap_or_default();
            units.extend(firewall_units(&label, ruleset));

            let plan = MachinePlan::build(&label, units)?;
            if self.only.is_empty() || self.only.contains(&label) {
                plans.push(plan);
            }
        }

        info!(
            machines = plans.len(),
            units = plans.iter().map(MachinePlan::len).sum::<usize>(),
            "compile finished"
        );
        Ok(Compilation { model, plans })
    }

    fn collect(&self, model: &mut NetworkModel, label: &str) -> Result<Vec<(Phase, Box<dyn Unit>)>> {
        let machine = model.machine(label).ok_or_else(|| CompileError::UnknownMachine {
            label: label.to_string(),
        })?;
        let profiles: Vec<&dyn Profile> = self
            .profiles
            .iter()
            .filter(|p| p.applies_to(machine))
            .chain(self.assigned.get(label).into_iter().flatten())
            .map(|p| p.as_ref())
            .collect();

        let mut ctx = ProfileContext::new(label, model);
        for phase in Phase::ALL {
            ctx.enter(phase);
            if phase == Phase::Installed {
                ctx.add(PackageUnit::new("iptables_installed", "iptables"));
            }
            for profile in &profiles {
                debug!(machine = %label, profile = profile.name(), %phase, "collecting");
                ctx.include(*profile)?;
            }
        }
        Ok(ctx.into_units())
    }
}

/// Writes the ruleset and loads it.
///
/// Loading is gated on a copy of the last loaded ruleset, so an unchanged ruleset
/// is never restored twice.
fn firewall_units(label: &str, ruleset: String) -> Vec<(Phase, Box<dyn Unit>)> {
    let package = UnitHandle::new(label, "iptables_installed");
    let dir = DirectoryUnit::new("iptables_dir", RULES_DIR).with_mode(0o755).after(&package);
    let dir_handle = UnitHandle::new(label, dir.name());
    let rules = FileUnit::new("iptables_rules", RULES_PATH, ruleset).after(&dir_handle);
    let rules_handle = UnitHandle::new(label, rules.name());

    let probe = format!("cmp -s {RULES_PATH} {APPLIED_PATH} && echo applied");
    let command = format!(
        "iptables-restore < {RULES_PATH} && mkdir -p {STATE_DIR} && cp -f {RULES_PATH} {APPLIED_PATH}"
    );
    let load = ShellUnit::new("iptables_loaded", probe, command, Expectation::equals("applied"))
        .after(&rules_handle)
        .with_remediation(format!("run `iptables-restore --test < {RULES_PATH}` on {label}"));

    vec![
        (Phase::Firewall, Box::new(dir) as Box<dyn Unit>),
        (Phase::Firewall, Box::new(rules)),
        (Phase::Firewall, Box::new(load)),
    ]
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
