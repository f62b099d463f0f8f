//! # Units
//!
//! A unit is one named, idempotent configuration action. The engine drives every
//! unit through the same steps:
//!
//! 1. [`audit`](Unit::audit) probes the live machine without changing it;
//! 2. [`needs_convergence`](Unit::needs_convergence) compares the probe with the
//!    unit's [`Expectation`];
//! 3. only on drift, [`config`](Unit::config) changes the machine and
//!    [`verify`](Unit::verify) probes again.
//!
//! The expectation is always a post-condition: it describes the probe of a
//! converged machine. Running a converged unit again therefore changes nothing.
//!
//! ## Kinds
//! * [`shell`]: caller-supplied probe and command.
//! * [`file`]: file content, directories, ownership and permissions.
//! * [`package`]: installed packages and running services.
//! * [`fetch`]: git clones, downloads and their checksums.
//! * [`edit`]: appending lines and regex substitutions.

pub mod edit;
pub mod fetch;
pub mod file;
pub mod package;
pub mod shell;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::transport::{CommandOutput, Session};

pub use edit::{AppendUnit, RegexEditUnit};
pub use fetch::{ChecksumUnit, DownloadUnit, GitCloneUnit};
pub use file::{DirectoryUnit, FileUnit, OwnershipUnit, PermissionsUnit};
pub use package::{PackageUnit, ServiceUnit};
pub use shell::ShellUnit;

/// A reference to a unit of one machine's plan.
///
/// Handles are returned when a unit is added to a profile context. A handle may
/// also be [declared](UnitHandle::declare) ahead of the unit it names; the engine
/// rejects any handle that does not resolve when the plan is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitHandle {
    machine: String,
    name: String,
}

impl UnitHandle {
    pub(crate) fn new(machine: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            machine: machine.into(),
            name: name.into(),
        }
    }

    /// A forward reference to a unit that will be added later.
    pub fn declare(machine: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(machine, name)
    }

    pub fn machine(&self) -> &str {
        &self.machine
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for UnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.machine, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Precondition {
    /// A root of the plan.
    #[default]
    Proceed,
    /// Runs only once the referenced unit has passed.
    After(UnitHandle),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Severity {
    /// A unit that does not pass makes the whole run unsuccessful.
    #[default]
    Fail,
    /// Reported, but the run can still succeed.
    Warn,
}

/// How a probe is compared with the desired state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// The trimmed output equals the value.
    Equals(String),
    /// The output contains the value.
    Contains(String),
    /// The probe exits with a non-zero status.
    Fails,
}

impl Expectation {
    pub fn equals(value: impl Into<String>) -> Self {
        Self::Equals(value.into())
    }

    pub fn contains(value: impl Into<String>) -> Self {
        Self::Contains(value.into())
    }

    pub fn satisfied_by(&self, probe: &Probe) -> bool {
        match self {
            Self::Equals(value) => probe.output == *value,
            Self::Contains(value) => probe.output.contains(value.as_str()),
            Self::Fails => !probe.success,
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(value) => write!(f, "'{value}'"),
            Self::Contains(value) => write!(f, "output containing '{value}'"),
            Self::Fails => f.write_str("a failing probe"),
        }
    }
}

/// The raw result of an audit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Probe {
    /// Trimmed standard output.
    pub output: String,
    pub success: bool,
}

impl Probe {
    pub fn new(output: impl Into<String>, success: bool) -> Self {
        Self {
            output: output.into().trim().to_string(),
            success,
        }
    }
}

impl From<CommandOutput> for Probe {
    fn from(output: CommandOutput) -> Self {
        let success = output.success();
        Self::new(output.stdout, success)
    }
}

/// The fields every unit kind shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHeader {
    pub name: String,
    pub precondition: Precondition,
    pub severity: Severity,
    pub remediation: String,
}

impl UnitHeader {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            remediation: format!("inspect '{name}' on the machine and rerun"),
            name,
            precondition: Precondition::Proceed,
            severity: Severity::Fail,
        }
    }
}

#[async_trait]
pub trait Unit: Send + Sync {
    fn header(&self) -> &UnitHeader;

    fn expectation(&self) -> Expectation;

    /// Read-only probe of the live machine.
    async fn audit(&self, session: &Session) -> anyhow::Result<Probe>;

    /// The idempotent change. Only called when the audit showed drift.
    async fn config(&self, session: &Session) -> anyhow::Result<()>;

    /// Probe after [`config`](Unit::config).
    async fn verify(&self, session: &Session) -> anyhow::Result<Probe> {
        self.audit(session).await
    }

    fn needs_convergence(&self, probe: &Probe) -> bool {
        !self.expectation().satisfied_by(probe)
    }

    fn name(&self) -> &str {
        &self.header().name
    }

    fn precondition(&self) -> &Precondition {
        &self.header().precondition
    }

    fn severity(&self) -> Severity {
        self.header().severity
    }

    fn remediation(&self) -> &str {
        &self.header().remediation
    }
}

/// A change command that reached the machine and exited non-zero.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`{command}` exited with status {status}: {stderr}")]
pub struct CommandFailed {
    pub command: String,
    pub status: i32,
    pub stderr: String,
}

/// Runs `command` and fails with [`CommandFailed`] unless it exits cleanly.
pub(crate) async fn run_checked(session: &Session, command: &str) -> anyhow::Result<()> {
    let output = session.run(command).await?;
    if !output.success() {
        return Err(CommandFailed {
            command: command.to_string(),
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        }
        .into());
    }
    Ok(())
}

pub(crate) fn quote(value: &str) -> String {
    shell_words::quote(value).into_owned()
}

/// Builder methods shared by every unit kind.
macro_rules! unit_builders {
    ($($kind:ty),+ $(,)?) => {
        $(
            impl $kind {
                /// Runs this unit only once `handle` has passed.
                pub fn after(mut self, handle: &$crate::unit::UnitHandle) -> Self {
                    self.header.precondition = $crate::unit::Precondition::After(handle.clone());
                    self
                }

                pub fn with_severity(mut self, severity: $crate::unit::Severity) -> Self {
                    self.header.severity = severity;
                    self
                }

                pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
                    self.header.remediation = remediation.into();
                    self
                }
            }
        )+
    };
}

unit_builders!(
    ShellUnit,
    FileUnit,
    DirectoryUnit,
    OwnershipUnit,
    PermissionsUnit,
    PackageUnit,
    ServiceUnit,
    GitCloneUnit,
    DownloadUnit,
    ChecksumUnit,
    AppendUnit,
    RegexEditUnit,
);

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use crate::transport::Transport;

    /// Answers commands from a script and records what it was asked to run.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        answers: Mutex<VecDeque<CommandOutput>>,
        pub(crate) commands: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub(crate) fn answering(answers: Vec<CommandOutput>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                commands: Mutex::default(),
            })
        }

        pub(crate) fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, _machine: &str, command: &str) -> anyhow::Result<CommandOutput> {
            self.commands.lock().unwrap().push(command.to_string());
            Ok(self.answers.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    pub(crate) fn session(transport: Arc<ScriptedTransport>) -> Session {
        Session::new("web", transport)
    }

    #[test]
    fn expectations_compare_trimmed_output() {
        let probe = Probe::new("  active\n", true);
        assert!(Expectation::equals("active").satisfied_by(&probe));
        assert!(Expectation::contains("act").satisfied_by(&probe));
        assert!(!Expectation::Fails.satisfied_by(&probe));
        assert!(Expectation::Fails.satisfied_by(&Probe::new("", false)));
    }

    #[test]
    fn conversion_keeps_the_exit_status() {
        let probe = Probe::from(CommandOutput::new(1, "inactive\n", ""));
        assert_eq!(probe.output, "inactive");
        assert!(!probe.success);
        assert!(Probe::from(CommandOutput::new(0, "", "")).success);
    }

    #[test]
    fn builders_set_header_fields() {
        let root = UnitHandle::declare("web", "root");
        let unit = ShellUnit::new("child", "true", "true", Expectation::Fails)
            .after(&root)
            .with_severity(Severity::Warn)
            .with_remediation("check the thing");
        assert_eq!(unit.precondition(), &Precondition::After(root));
        assert_eq!(unit.severity(), Severity::Warn);
        assert_eq!(unit.remediation(), "check the thing");
    }

    #[tokio::test]
    async fn run_checked_reports_failing_commands() {
        let transport = ScriptedTransport::answering(vec![CommandOutput::new(2, "", "denied")]);
        let err = run_checked(&session(transport), "touch /x").await.unwrap_err();
        assert!(err.to_string().contains("denied"));
        let failed = err.downcast_ref::<CommandFailed>().unwrap();
        assert_eq!(failed.status, 2);
        assert_eq!(failed.command, "touch /x");
    }
}
