use std::collections::HashMap;

use rampart_common::config::Mode;
use rampart_common::error::ConvergenceError;
use tracing::{debug, info, warn};

use super::plan::{MachinePlan, PlannedUnit};
use super::report::{MachineReport, UnitOutcome, UnitStatus};
use super::{CancelFlag, ProgressFn};
use crate::transport::Session;
use crate::unit::{CommandFailed, Precondition, Probe, Unit};

/// Runs one machine's plan to the end, one unit at a time.
pub(super) async fn converge(
    plan: MachinePlan,
    session: Session,
    mode: Mode,
    cancel: CancelFlag,
    progress: Option<ProgressFn>,
) -> MachineReport {
    let mut report = MachineReport::new(plan.machine());
    let units = plan.into_units();
    let mut status: HashMap<String, UnitStatus> = units
        .iter()
        .map(|p| (p.unit.name().to_string(), UnitStatus::Pending))
        .collect();

    for planned in &units {
        let name = planned.unit.name().to_string();

        let outcome = if cancel.is_cancelled() {
            report.aborted = true;
            skipped(&session, planned, "aborted".to_string())
        } else if let Some(blocker) = blocked_by(planned.unit.as_ref(), &status) {
            skipped(&session, planned, format!("precondition '{blocker}' did not pass"))
        } else {
            status.insert(name.clone(), UnitStatus::Running);
            run_unit(&session, planned, mode).await
        };

        match outcome.status {
            UnitStatus::Pass => debug!(unit = %name, changed = outcome.changed, "passed"),
            UnitStatus::Skipped => debug!(unit = %name, reason = %outcome.output, "skipped"),
            _ => warn!(unit = %name, status = %outcome.status, "{}", describe(&outcome)),
        }

        status.insert(name, outcome.status);
        if let Some(progress) = &progress {
            progress(&outcome);
        }
        report.outcomes.push(outcome);
    }

    let counts = report.counts();
    info!(
        pass = counts.pass,
        changed = counts.changed,
        fail = counts.fail,
        "machine done"
    );
    report
}

/// The precondition of `unit` if it has not passed.
fn blocked_by<'a>(unit: &'a dyn Unit, status: &HashMap<String, UnitStatus>) -> Option<&'a str> {
    match unit.precondition() {
        Precondition::Proceed => None,
        Precondition::After(handle) => {
            let passed = status.get(handle.name()) == Some(&UnitStatus::Pass);
            (!passed).then_some(handle.name())
        }
    }
}

async fn run_unit(session: &Session, planned: &PlannedUnit, mode: Mode) -> UnitOutcome {
    let unit = planned.unit.as_ref();
    let mut outcome = blank(session, planned);

    let probe = match unit.audit(session).await {
        Ok(probe) => probe,
        Err(e) => return unreachable(outcome, unit, e),
    };

    if !unit.needs_convergence(&probe) {
        outcome.status = UnitStatus::Pass;
        outcome.output = probe.output;
        return outcome;
    }

    if mode == Mode::Audit {
        return diverged(outcome, unit, probe);
    }

    debug!(unit = unit.name(), found = %probe.output, "drift, applying");
    if let Err(e) = unit.config(session).await {
        return match e.downcast::<CommandFailed>() {
            Ok(failed) => rejected(outcome, unit, failed),
            Err(e) => unreachable(outcome, unit, e),
        };
    }
    outcome.changed = true;

    match unit.verify(session).await {
        Ok(probe) if !unit.needs_convergence(&probe) => {
            outcome.status = UnitStatus::Pass;
            outcome.output = probe.output;
            outcome
        }
        Ok(probe) => diverged(outcome, unit, probe),
        Err(e) => unreachable(outcome, unit, e),
    }
}

fn blank(session: &Session, planned: &PlannedUnit) -> UnitOutcome {
    UnitOutcome {
        machine: session.machine().to_string(),
        unit: planned.unit.name().to_string(),
        phase: planned.phase,
        status: UnitStatus::Pending,
        severity: planned.unit.severity(),
        output: String::new(),
        error: None,
        remediation: None,
        changed: false,
    }
}

fn skipped(session: &Session, planned: &PlannedUnit, reason: String) -> UnitOutcome {
    let mut outcome = blank(session, planned);
    outcome.status = UnitStatus::Skipped;
    outcome.output = reason;
    outcome.remediation = Some(planned.unit.remediation().to_string());
    outcome
}

fn diverged(mut outcome: UnitOutcome, unit: &dyn Unit, probe: Probe) -> UnitOutcome {
    outcome.status = UnitStatus::diverged(unit.severity());
    outcome.error = Some(ConvergenceError::Divergence {
        unit: unit.name().to_string(),
        expected: unit.expectation().to_string(),
        actual: probe.output.clone(),
    });
    outcome.output = probe.output;
    outcome.remediation = Some(unit.remediation().to_string());
    outcome
}

fn rejected(mut outcome: UnitOutcome, unit: &dyn Unit, failed: CommandFailed) -> UnitOutcome {
    outcome.status = UnitStatus::diverged(unit.severity());
    outcome.output = failed.stderr.clone();
    outcome.error = Some(ConvergenceError::CommandFailed {
        unit: unit.name().to_string(),
        command: failed.command,
        status: failed.status,
        stderr: failed.stderr,
    });
    outcome.remediation = Some(unit.remediation().to_string());
    outcome
}

fn unreachable(mut outcome: UnitOutcome, unit: &dyn Unit, e: anyhow::Error) -> UnitOutcome {
    outcome.status = UnitStatus::diverged(unit.severity());
    outcome.output = format!("{e:#}");
    outcome.error = Some(ConvergenceError::Transport {
        unit: unit.name().to_string(),
        message: format!("{e:#}"),
    });
    outcome.remediation = Some(unit.remediation().to_string());
    outcome
}

fn describe(outcome: &UnitOutcome) -> String {
    match &outcome.error {
        Some(e) => e.to_string(),
        None => outcome.output.clone(),
    }
}
