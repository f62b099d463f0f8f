//! # Transport
//!
//! The boundary between the engine and the machines it converges. The engine
//! only ever asks a [`Transport`] to run a shell command on a machine and hand
//! back what it printed; how the command gets there is up to the implementation.
//!
//! * [`local`]: runs everything through `sh -c` on this host.
//! * [`ssh`]: wraps the system `ssh` client in batch mode.

pub mod local;
pub mod ssh;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

pub use local::LocalTransport;
pub use ssh::SshTransport;

/// What a command left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Runs `command` on `machine` and waits for it to finish, however long it takes.
    ///
    /// A non-zero exit status is not an error. Errors mean the command could not be
    /// run at all.
    async fn execute(&self, machine: &str, command: &str) -> anyhow::Result<CommandOutput>;
}

/// A transport bound to one machine, handed to units while they run.
#[derive(Clone)]
pub struct Session {
    machine: String,
    transport: Arc<dyn Transport>,
}

impl Session {
    pub fn new(machine: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            machine: machine.into(),
            transport,
        }
    }

    pub fn machine(&self) -> &str {
        &self.machine
    }

    pub async fn run(&self, command: &str) -> anyhow::Result<CommandOutput> {
        trace!(machine = %self.machine, %command, "executing");
        let output = self.transport.execute(&self.machine, command).await?;
        trace!(machine = %self.machine, status = output.status, "finished");
        Ok(output)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("machine", &self.machine).finish()
    }
}
