use std::collections::BTreeMap;
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{CommandOutput, Transport};

/// `ssh` exits with 255 when the connection itself failed.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Where to reach one machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
}

/// Runs commands through the system `ssh` client.
///
/// Host keys and credentials come from the operator's own SSH configuration.
/// Sessions run in batch mode, so a prompt for a password fails the command
/// instead of hanging the run.
#[derive(Debug, Clone, Default)]
pub struct SshTransport {
    user: Option<String>,
    targets: BTreeMap<String, SshTarget>,
}

impl SshTransport {
    pub fn new(user: Option<String>) -> Self {
        Self {
            user,
            targets: BTreeMap::new(),
        }
    }

    /// Machines without a target are reached by their label.
    pub fn with_target(mut self, machine: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        self.targets.insert(
            machine.into(),
            SshTarget {
                host: host.into(),
                port,
            },
        );
        self
    }

    pub fn target(&self, machine: &str) -> SshTarget {
        self.targets.get(machine).cloned().unwrap_or_else(|| SshTarget {
            host: machine.to_string(),
            port: 22,
        })
    }

    fn arguments(&self, machine: &str, command: &str) -> Vec<String> {
        let target = self.target(machine);
        let destination = match &self.user {
            Some(user) => format!("{user}@{}", target.host),
            None => target.host,
        };
        vec![
            "-o".into(),
            "BatchMode=yes".into(),
            "-p".into(),
            target.port.to_string(),
            destination,
            "--".into(),
            command.to_string(),
        ]
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn execute(&self, machine: &str, command: &str) -> anyhow::Result<CommandOutput> {
        let args = self.arguments(machine, command);
        let output = Command::new("ssh")
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .context("failed to spawn ssh")?;

        let status = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if status == SSH_CONNECTION_FAILURE {
            debug!(%machine, "ssh connection failed");
            anyhow::bail!("ssh to '{machine}' failed: {}", stderr.trim());
        }

        Ok(CommandOutput {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
        })
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

    #[test]
    fn arguments_use_target_and_user() {
        let ssh = SshTransport::new(Some("ops".into())).with_target("web", "10.10.0.2", 2222);
        assert_eq!(
            ssh.arguments("web", "uptime"),
            vec!["-o", "BatchMode=yes", "-p", "2222", "ops@10.10.0.2", "--", "uptime"]
        );
    }

    #[test]
    fn unknown_machines_fall_back_to_their_label() {
        let ssh = SshTransport::new(None);
        let target = ssh.target("gw");
        assert_eq!(target.host, "gw");
        assert_eq!(target.port, 22);
        assert_eq!(ssh.arguments("gw", "true")[4], "gw");
    }
}
