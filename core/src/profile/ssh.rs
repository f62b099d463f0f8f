use rampart_common::error::Result;

use super::{Profile, ProfileContext};
use crate::compiler::STATE_DIR;
use crate::machine::MachineModel;
use crate::unit::{Expectation, PackageUnit, RegexEditUnit, ServiceUnit, ShellUnit};

const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";
const PACKAGE: &str = "openssh-server";
const SERVICE: &str = "ssh";
/// Copy of the configuration the running sshd last loaded.
pub const SSHD_APPLIED: &str = "/var/lib/rampart/sshd_config.applied";

/// Keeps `sshd` installed, listening on the machine's declared port and closed to
/// root password logins.
///
/// A running sshd only picks up a new port on reload, so the configuration it last
/// loaded is kept next to the firewall's and compared on every run.
///
/// The firewall side of SSH is part of the default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshProfile;

impl Profile for SshProfile {
    fn name(&self) -> &str {
        "ssh"
    }

    fn applies_to(&self, machine: &MachineModel) -> bool {
        machine.ssh_port().is_some()
    }

    fn installed(&self, ctx: &mut ProfileContext<'_>) -> Result<()> {
        ctx.add(PackageUnit::named(PACKAGE));
        Ok(())
    }

    fn persistent(&self, ctx: &mut ProfileContext<'_>) -> Result<()> {
        let port = ctx.this()?.ssh_port().unwrap_or(22);
        let package = ctx.handle(&format!("package_{PACKAGE}"));

        ctx.add(
            RegexEditUnit::new("sshd_port", SSHD_CONFIG, "^#?Port .*", format!("Port {port}"))
                .after(&package),
        );
        ctx.add(
            RegexEditUnit::new(
                "sshd_root_login",
                SSHD_CONFIG,
                "^#?PermitRootLogin .*",
                "PermitRootLogin prohibit-password",
            )
            .after(&package),
        );
        Ok(())
    }

    fn live(&self, ctx: &mut ProfileContext<'_>) -> Result<()> {
        let configured = ctx.handle("sshd_port");
        let remediation = format!("run `sshd -t` on {} and fix the reported line", ctx.machine());
        let running = ctx.add(
            ServiceUnit::new("sshd_running", SERVICE)
                .after(&configured)
                .with_remediation(remediation.clone()),
        );

        let probe = format!("cmp -s {SSHD_CONFIG} {SSHD_APPLIED} && echo applied");
        let command = format!(
            "systemctl reload {SERVICE} && mkdir -p {STATE_DIR} && cp -f {SSHD_CONFIG} {SSHD_APPLIED}"
        );
        ctx.add(
            ShellUnit::new("sshd_reloaded", probe, command, Expectation::equals("applied"))
                .after(&running)
                .with_remediation(remediation),
        );
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MachinePlan, Phase};
    use crate::profile::tests::model;

    #[test]
    fn units_plan_in_dependency_order() {
        let mut model = model();
        let mut ctx = ProfileContext::new("db", &mut model);
        for phase in Phase::ALL {
            ctx.enter(phase);
            ctx.include(&SshProfile).unwrap();
        }
        let plan = MachinePlan::build("db", ctx.into_units()).unwrap();
        assert_eq!(
            plan.order(),
            vec![
                "package_openssh-server",
                "sshd_port",
                "sshd_root_login",
                "sshd_running",
                "sshd_reloaded"
            ]
        );
    }

    #[test]
    fn persistent_phase_holds_both_edits() {
        let mut model = model();
        let mut ctx = ProfileContext::new("db", &mut model);
        ctx.enter(Phase::PersistentConfig);
        ctx.include(&SshProfile).unwrap();
        let units = ctx.into_units();
        assert_eq!(units[0].1.name(), "sshd_port");
        assert_eq!(units.len(), 2);
    }

    #[test]
    fn reload_follows_the_running_service() {
        let mut model = model();
        let mut ctx = ProfileContext::new("db", &mut model);
        ctx.enter(Phase::LiveConfig);
        ctx.include(&SshProfile).unwrap();
        let units = ctx.into_units();
        let reload = &units[1].1;
        assert_eq!(reload.name(), "sshd_reloaded");
        assert_eq!(
            reload.precondition(),
            &crate::unit::Precondition::After(crate::unit::UnitHandle::declare("db", "sshd_running"))
        );
    }

    #[test]
    fn router_and_servers_are_targeted() {
        let model = model();
        assert!(SshProfile.applies_to(model.machine("web").unwrap()));
        assert!(SshProfile.applies_to(model.machine("gw").unwrap()));
    }
}
