use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::*;
use rampart_common::config::{Config, Mode, TransportKind};
use rampart_core::compiler::Compiler;
use rampart_core::engine::{CancelFlag, CompileReport, Engine, MachineReport, UnitStatus};
use rampart_core::model::FrozenModel;
use rampart_core::transport::{LocalTransport, SshTransport, Transport};
use tracing::{Instrument, info, info_span, warn};

use crate::commands::load_definition;
use crate::input::InputHandle;
use crate::mprint;
use crate::terminal::spinner::Progress;
use crate::terminal::{colors, format, print};

pub async fn apply(path: &Path, cfg: &Config) -> anyhow::Result<bool> {
    let definition = load_definition(path)?;
    let compilation = Compiler::with_defaults()
        .only(cfg.machines.iter().cloned())
        .compile(&definition)?;

    if compilation.plans.is_empty() {
        print::nothing_to_do(cfg.quiet);
        return Ok(true);
    }

    if cfg.transport == TransportKind::Local && cfg.mode == Mode::Apply && !is_root::is_root() {
        warn!("not running as root, package and firewall units will fail locally");
    }

    let total: usize = compilation.plans.iter().map(|p| p.len()).sum();
    info!(machines = compilation.plans.len(), units = total, "plans ready");

    print::header(
        match cfg.mode {
            Mode::Apply => "converging",
            Mode::Audit => "auditing",
        },
        cfg.quiet,
    );

    let span = info_span!("apply", mode = ?cfg.mode, indicatif.pb_show = true);
    let progress = Progress::start(span.clone(), total);
    let reporter = progress.reporter();

    let cancel = CancelFlag::new();
    let engine = Engine::new(transport(cfg, &compilation.model))
        .with_mode(cfg.mode)
        .with_cancel(cancel.clone())
        .on_outcome(move |outcome| reporter.unit_done(&outcome.machine, &outcome.unit));

    let mut input = InputHandle::new(cancel.clone());
    if !cfg.disable_input {
        input.start();
    }
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, finishing units in flight");
                cancel.cancel();
            }
        })
    };

    let start_time = Instant::now();
    let report = engine.run(compilation.plans).instrument(span).await;

    interrupt.abort();
    input.stop();
    drop(engine);
    progress.finish();

    print_report(&report, start_time.elapsed(), cfg);
    Ok(report.success())
}

fn transport(cfg: &Config, model: &FrozenModel) -> Arc<dyn Transport> {
    match cfg.transport {
        TransportKind::Local => Arc::new(LocalTransport),
        TransportKind::Ssh => {
            let mut ssh = SshTransport::new(cfg.ssh_user.clone());
            for machine in model.servers() {
                if let (Some(ip), Some(port)) = (machine.ip(), machine.ssh_port()) {
                    ssh = ssh.with_target(machine.label(), ip.to_string(), port);
                }
            }
            if let Some(router) = model.router() {
                ssh = ssh.with_target(router.label(), router.label(), router.ssh_port().unwrap_or(22));
            }
            Arc::new(ssh)
        }
    }
}

fn print_report(report: &CompileReport, elapsed: Duration, cfg: &Config) {
    for (idx, machine) in report.machines.iter().enumerate() {
        print_machine(idx, machine, cfg);
        if cfg.quiet < 2 && idx + 1 != report.machines.len() {
            mprint!();
        }
    }

    print::fat_separator();
    print::set_key_width(report.machines.iter().map(|m| m.machine.as_str()));
    for machine in &report.machines {
        print::aligned_line(&machine.machine, format::counts(&machine.counts()));
    }

    let verdict = if report.aborted() {
        "Run aborted".bold().yellow()
    } else if report.success() {
        "Converged".bold().green()
    } else {
        "Not converged".bold().red()
    };
    let total_time = format!("{:.2}s", elapsed.as_secs_f64()).bold().yellow();
    mprint!();
    print::centerln(&format!("{verdict}: {} in {total_time}", format::counts(&report.totals())));
}

fn print_machine(idx: usize, machine: &MachineReport, cfg: &Config) {
    if cfg.quiet > 1 {
        return;
    }
    print::tree_head(idx, &machine.machine);

    if let Some(reason) = &machine.crashed {
        print::print_status(format!("{} {}", "worker died:".color(colors::FAIL), reason));
    }

    for outcome in &machine.outcomes {
        let passed = outcome.status == UnitStatus::Pass;
        if passed && cfg.quiet > 0 {
            continue;
        }
        print::print_status(format::outcome_line(outcome));
        if !passed {
            print::as_tree_one_level(format::outcome_details(outcome));
        }
    }
}
