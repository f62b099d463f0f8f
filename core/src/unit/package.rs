use async_trait::async_trait;

use super::{Expectation, Probe, Unit, UnitHeader, quote, run_checked};
use crate::transport::Session;

const INSTALLED: &str = "install ok installed";

/// A Debian package that must be installed.
#[derive(Debug, Clone)]
pub struct PackageUnit {
    pub(crate) header: UnitHeader,
    package: String,
}

impl PackageUnit {
    pub fn new(name: impl Into<String>, package: impl Into<String>) -> Self {
        let package = package.into();
        let mut header = UnitHeader::new(name);
        header.remediation = format!("install '{package}' by hand and check the apt sources");
        Self { header, package }
    }

    /// A unit named after the package itself.
    pub fn named(package: &str) -> Self {
        Self::new(format!("package_{package}"), package)
    }

    pub fn package(&self) -> &str {
        &self.package
    }
}

#[async_trait]
impl Unit for PackageUnit {
    fn header(&self) -> &UnitHeader {
        &self.header
    }

    fn expectation(&self) -> Expectation {
        Expectation::equals(INSTALLED)
    }

    async fn audit(&self, session: &Session) -> anyhow::Result<Probe> {
        let probe = format!("dpkg-query -W -f='${{Status}}' {} 2>/dev/null", quote(&self.package));
        Ok(session.run(&probe).await?.into())
    }

    async fn config(&self, session: &Session) -> anyhow::Result<()> {
        let command = format!(
            "DEBIAN_FRONTEND=noninteractive apt-get install -y -q {}",
            quote(&self.package)
        );
        run_checked(session, &command).await
    }
}

/// A systemd service that must be enabled and running.
#[derive(Debug, Clone)]
pub struct ServiceUnit {
    pub(crate) header: UnitHeader,
    service: String,
}

impl ServiceUnit {
    pub fn new(name: impl Into<String>, service: impl Into<String>) -> Self {
        let service = service.into();
        let mut header = UnitHeader::new(name);
        header.remediation = format!("check `journalctl -u {service}` for why it does not start");
        Self { header, service }
    }
}

#[async_trait]
impl Unit for ServiceUnit {
    fn header(&self) -> &UnitHeader {
        &self.header
    }

    fn expectation(&self) -> Expectation {
        Expectation::equals("active")
    }

    async fn audit(&self, session: &Session) -> anyhow::Result<Probe> {
        let probe = format!("systemctl is-active {}", quote(&self.service));
        Ok(session.run(&probe).await?.into())
    }

    async fn config(&self, session: &Session) -> anyhow::Result<()> {
        let command = format!("systemctl enable --now {}", quote(&self.service));
        run_checked(session, &command).await
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
    use crate::transport::CommandOutput;
    use crate::unit::tests::{ScriptedTransport, session};

    #[tokio::test]
    async fn installed_package_is_converged() {
        let transport = ScriptedTransport::answering(vec![CommandOutput::new(0, INSTALLED, "")]);
        let unit = PackageUnit::named("iptables");
        let probe = unit.audit(&session(transport.clone())).await.unwrap();
        assert!(!unit.needs_convergence(&probe));
        assert_eq!(unit.name(), "package_iptables");
        assert!(transport.commands()[0].starts_with("dpkg-query -W -f='${Status}' iptables"));
    }

    #[tokio::test]
    async fn inactive_service_is_started() {
        let transport = ScriptedTransport::answering(vec![
            CommandOutput::new(3, "inactive\n", ""),
            CommandOutput::new(0, "", ""),
        ]);
        let unit = ServiceUnit::new("nginx_running", "nginx");
        let session = session(transport.clone());
        let probe = unit.audit(&session).await.unwrap();
        assert!(unit.needs_convergence(&probe));
        unit.config(&session).await.unwrap();
        assert_eq!(transport.commands()[1], "systemctl enable --now nginx");
    }
}
