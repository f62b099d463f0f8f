use async_trait::async_trait;

use super::{Expectation, Probe, Unit, UnitHeader, run_checked};
use crate::transport::Session;

/// A unit made of a caller-supplied probe and command.
///
/// The probe must be read-only. The command must be safe to run again, since
/// it runs whenever the probe disagrees with the expectation.
#[derive(Debug, Clone)]
pub struct ShellUnit {
    pub(crate) header: UnitHeader,
    probe: String,
    command: String,
    expectation: Expectation,
}

impl ShellUnit {
    pub fn new(
        name: impl Into<String>,
        probe: impl Into<String>,
        command: impl Into<String>,
        expectation: Expectation,
    ) -> Self {
        Self {
            header: UnitHeader::new(name),
            probe: probe.into(),
            command: command.into(),
            expectation,
        }
    }

    pub fn probe(&self) -> &str {
        &self.probe
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl Unit for ShellUnit {
    fn header(&self) -> &UnitHeader {
        &self.header
    }

    fn expectation(&self) -> Expectation {
        self.expectation.clone()
    }

    async fn audit(&self, session: &Session) -> anyhow::Result<Probe> {
        Ok(session.run(&self.probe).await?.into())
    }

    async fn config(&self, session: &Session) -> anyhow::Result<()> {
        run_checked(session, &self.command).await
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
