//! # Convergence engine
//!
//! Runs validated [`MachinePlan`]s against live machines. Every machine gets its
//! own task; within a machine the units run one at a time, in plan order. A unit
//! whose precondition did not pass is skipped without ever being audited.

mod executor;
pub mod plan;
pub mod report;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rampart_common::config::Mode;
use tracing::{Instrument, error, info, info_span};

use crate::transport::{Session, Transport};

pub use plan::{MachinePlan, PlannedUnit};
pub use report::{CompileReport, Counts, MachineReport, UnitOutcome, UnitStatus};

/// When a unit is collected. Among units that are ready together, earlier phases run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Installed,
    PersistentConfig,
    LiveConfig,
    Firewall,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Installed,
        Phase::PersistentConfig,
        Phase::LiveConfig,
        Phase::Firewall,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Installed => "installed",
            Self::PersistentConfig => "persistent",
            Self::LiveConfig => "live",
            Self::Firewall => "firewall",
        };
        f.write_str(name)
    }
}

/// Operator abort. Units already running finish; nothing new is started.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Called once for every unit that reaches a terminal status.
pub type ProgressFn = Arc<dyn Fn(&UnitOutcome) + Send + Sync>;

pub struct Engine {
    transport: Arc<dyn Transport>,
    mode: Mode,
    cancel: CancelFlag,
    progress: Option<ProgressFn>,
}

impl Engine {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            mode: Mode::Apply,
            cancel: CancelFlag::new(),
            progress: None,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn on_outcome(mut self, progress: impl Fn(&UnitOutcome) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Converges every plan concurrently and collects one report per machine,
    /// in the order the plans were given.
    pub async fn run(&self, plans: Vec<MachinePlan>) -> CompileReport {
        info!(machines = plans.len(), mode = ?self.mode, "convergence started");

        let mut workers = Vec::with_capacity(plans.len());
        for plan in plans {
            let label = plan.machine().to_string();
            let session = Session::new(label.clone(), self.transport.clone());
            let mode = self.mode;
            let cancel = self.cancel.clone();
            let progress = self.progress.clone();
            let span = info_span!("machine", machine = %label);
            let handle = tokio::spawn(
                async move { executor::converge(plan, session, mode, cancel, progress).await }
                    .instrument(span),
            );
            workers.push((label, handle));
        }

        let mut machines = Vec::with_capacity(workers.len());
        for (label, handle) in workers {
            match handle.await {
                Ok(report) => machines.push(report),
                Err(e) => {
                    error!(machine = %label, "worker died: {e}");
                    let mut report = MachineReport::new(label);
                    report.crashed = Some(e.to_string());
                    machines.push(report);
                }
            }
        }

        let report = CompileReport { machines };
        let totals = report.totals();
        info!(
            pass = totals.pass,
            warn = totals.warn,
            fail = totals.fail,
            skipped = totals.skipped,
            "convergence finished"
        );
        report
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
