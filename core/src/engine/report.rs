use std::fmt;

use rampart_common::error::ConvergenceError;

use super::Phase;
use crate::unit::Severity;

/// Where a unit is in its lifecycle.
///
/// `Pending -> (Skipped | Running) -> (Pass | Warn | Fail)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitStatus {
    Pending,
    Running,
    Pass,
    Warn,
    Fail,
    Skipped,
}

impl UnitStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// The status a unit that did not converge ends in.
    pub fn diverged(severity: Severity) -> Self {
        match severity {
            Severity::Fail => Self::Fail,
            Severity::Warn => Self::Warn,
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Fail => "FAIL",
            Self::Skipped => "SKIPPED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    pub machine: String,
    pub unit: String,
    pub phase: Phase,
    pub status: UnitStatus,
    pub severity: Severity,
    /// Raw text of the last probe, or why the unit did not run.
    pub output: String,
    pub error: Option<ConvergenceError>,
    /// Shown for every outcome that is not a pass.
    pub remediation: Option<String>,
    /// Set when `config` ran.
    pub changed: bool,
}

impl UnitOutcome {
    /// Whether this outcome alone makes the run unsuccessful.
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fail && self.status != UnitStatus::Pass
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub pass: usize,
    pub warn: usize,
    pub fail: usize,
    pub skipped: usize,
    pub changed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineReport {
    pub machine: String,
    /// In execution order.
    pub outcomes: Vec<UnitOutcome>,
    /// The operator aborted the run before every unit was scheduled.
    pub aborted: bool,
    /// The machine's worker died before finishing.
    pub crashed: Option<String>,
}

impl MachineReport {
    pub fn new(machine: impl Into<String>) -> Self {
        Self {
            machine: machine.into(),
            outcomes: Vec::new(),
            aborted: false,
            crashed: None,
        }
    }

    pub fn counts(&self) -> Counts {
        self.outcomes.iter().fold(Counts::default(), |mut acc, o| {
            match o.status {
                UnitStatus::Pass => acc.pass += 1,
                UnitStatus::Warn => acc.warn += 1,
                UnitStatus::Fail => acc.fail += 1,
                UnitStatus::Skipped => acc.skipped += 1,
                UnitStatus::Pending | UnitStatus::Running => {}
            }
            if o.changed {
                acc.changed += 1;
            }
            acc
        })
    }

    pub fn outcome(&self, unit: &str) -> Option<&UnitOutcome> {
        self.outcomes.iter().find(|o| o.unit == unit)
    }

    pub fn success(&self) -> bool {
        !self.aborted && self.crashed.is_none() && !self.outcomes.iter().any(UnitOutcome::is_fatal)
    }
}

/// Every machine's report, in the order the plans were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileReport {
    pub machines: Vec<MachineReport>,
}

impl CompileReport {
    /// False if any severity-FAIL unit did not pass, or the run was cut short.
    /// WARN outcomes never change this.
    pub fn success(&self) -> bool {
        self.machines.iter().all(MachineReport::success)
    }

    pub fn aborted(&self) -> bool {
        self.machines.iter().any(|m| m.aborted)
    }

    pub fn machine(&self, label: &str) -> Option<&MachineReport> {
        self.machines.iter().find(|m| m.machine == label)
    }

    pub fn totals(&self) -> Counts {
        self.machines.iter().map(MachineReport::counts).fold(Counts::default(), |a, b| Counts {
            pass: a.pass + b.pass,
            warn: a.warn + b.warn,
            fail: a.fail + b.fail,
            skipped: a.skipped + b.skipped,
            changed: a.changed + b.changed,
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
