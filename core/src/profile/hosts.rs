use rampart_common::error::Result;

use super::{Profile, ProfileContext};
use crate::machine::MachineModel;
use crate::unit::AppendUnit;

/// Makes every server resolvable by name from every other server through `/etc/hosts`.
#[derive(Debug, Clone)]
pub struct HostsProfile {
    path: String,
}

impl Default for HostsProfile {
    fn default() -> Self {
        Self {
            path: "/etc/hosts".to_string(),
        }
    }
}

impl HostsProfile {
    pub fn at(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Profile for HostsProfile {
    fn name(&self) -> &str {
        "hosts"
    }

    fn applies_to(&self, machine: &MachineModel) -> bool {
        machine.is_server()
    }

    fn persistent(&self, ctx: &mut ProfileContext<'_>) -> Result<()> {
        let domain = ctx.model().definition().network.domain.clone();
        let entries: Vec<(String, String)> = ctx
            .model()
            .servers()
            .filter(|s| s.label() != ctx.machine())
            .filter_map(|s| {
                let ip = s.ip()?;
                let label = s.label();
                Some((label.to_string(), format!("{ip} {label}.{domain} {label}")))
            })
            .collect();

        for (label, line) in entries {
            ctx.add(AppendUnit::new(format!("hosts_{label}"), &self.path, line));
        }
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
