#![cfg(test)]
use std::sync::Arc;

use rampart_common::config::Mode;
use rampart_common::error::ConvergenceError;
use rampart_common::network::definition::NetworkDefinition;
use rampart_core::compiler::{Compilation, Compiler, APPLIED_PATH, RULES_PATH};
use rampart_core::engine::{CompileReport, Engine, UnitStatus};
use rampart_core::profile::ssh::SSHD_APPLIED;

use crate::fake::FakeFleet;

const NET: &str = r#"
    [network]
    domain = "example.org"
    [router]
    label = "gw"
    [[servers]]
    label = "web"
    interfaces = [{ name = "lan0", mac = "52:54:00:00:00:01" }]
    [[servers]]
    label = "db"
    ssh_port = 2222
    interfaces = [{ name = "lan0", mac = "52:54:00:00:00:02" }]
"#;

fn compile() -> Compilation {
    compile_only(&[])
}

fn compile_only(machines: &[&str]) -> Compilation {
    let definition: NetworkDefinition = NET.parse().unwrap();
    Compiler::with_defaults()
        .only(machines.iter().map(|m| m.to_string()))
        .compile(&definition)
        .unwrap()
}

async fn run(fleet: &Arc<FakeFleet>, mode: Mode) -> CompileReport {
    Engine::new(fleet.clone()).with_mode(mode).run(compile().plans).await
}

fn status(report: &CompileReport, machine: &str, unit: &str) -> UnitStatus {
    report.machine(machine).unwrap().outcome(unit).unwrap().status
}

/*************************************************************
                    Converging a fresh fleet
**************************************************************/

#[tokio::test]
async fn first_apply_converges_every_machine() {
    let fleet = FakeFleet::new().shared();
    let report = run(&fleet, Mode::Apply).await;

    assert!(report.success(), "{report:#?}");
    assert!(report.totals().changed > 0);
    assert_eq!(report.machines.len(), 3);

    let compilation = compile();
    for label in ["gw", "web", "db"] {
        let state = fleet.state(label);
        assert!(state.packages.contains("iptables"), "{label}");
        assert!(state.packages.contains("openssh-server"), "{label}");
        assert!(state.services.contains("ssh"), "{label}");
        assert_eq!(state.loaded_rules, compilation.model.ruleset(label), "{label}");
        assert_eq!(state.file(RULES_PATH), state.file(APPLIED_PATH));
    }
}

#[tokio::test]
async fn servers_learn_each_other_through_hosts() {
    let fleet = FakeFleet::new().shared();
    run(&fleet, Mode::Apply).await;

    let compilation = compile();
    let db = compilation.model.machine("db").unwrap().ip().unwrap();
    let hosts = fleet.state("web").file("/etc/hosts").unwrap();
    assert!(hosts.starts_with("127.0.0.1 localhost\n"));
    assert!(hosts.lines().any(|l| l == format!("{db} db.example.org db")));
    assert!(!hosts.contains("web.example.org"));
}

#[tokio::test]
async fn second_apply_changes_nothing() {
    let fleet = FakeFleet::new().shared();
    run(&fleet, Mode::Apply).await;
    fleet.forget_commands();

    let report = run(&fleet, Mode::Apply).await;

    assert!(report.success());
    assert_eq!(report.totals().changed, 0);
    assert!(fleet.mutations().is_empty(), "{:?}", fleet.mutations());
    assert_eq!(fleet.state("web").restores, 1);
}

#[tokio::test]
async fn drifted_ruleset_is_rewritten_and_reloaded() {
    let fleet = FakeFleet::new().shared();
    run(&fleet, Mode::Apply).await;
    fleet.tamper("web", |state| {
        state.files.insert(RULES_PATH.to_string(), b"*filter\nCOMMIT\n".to_vec());
        state.files.remove(APPLIED_PATH);
    });

    let report = run(&fleet, Mode::Apply).await;

    assert!(report.success());
    let web = report.machine("web").unwrap();
    assert!(web.outcome("iptables_rules").unwrap().changed);
    assert!(web.outcome("iptables_loaded").unwrap().changed);
    assert_eq!(web.counts().changed, 2);
    assert_eq!(report.machine("db").unwrap().counts().changed, 0);
    assert_eq!(fleet.state("web").restores, 2);
}

#[tokio::test]
async fn rewritten_ruleset_matching_the_loaded_one_is_not_reloaded() {
    let fleet = FakeFleet::new().shared();
    run(&fleet, Mode::Apply).await;
    fleet.tamper("web", |state| {
        state.files.insert(RULES_PATH.to_string(), b"*filter\nCOMMIT\n".to_vec());
    });

    let report = run(&fleet, Mode::Apply).await;

    let web = report.machine("web").unwrap();
    assert!(web.outcome("iptables_rules").unwrap().changed);
    assert!(!web.outcome("iptables_loaded").unwrap().changed);
    assert_eq!(fleet.state("web").restores, 1);
}

#[tokio::test]
async fn missing_port_line_is_added_and_sshd_reloaded() {
    let fleet = FakeFleet::new().shared();
    run(&fleet, Mode::Apply).await;
    fleet.tamper("db", |state| {
        state
            .files
            .insert("/etc/ssh/sshd_config".to_string(), b"UsePAM yes\nPermitRootLogin prohibit-password\n".to_vec());
    });

    let report = run(&fleet, Mode::Apply).await;

    assert!(report.success(), "{report:#?}");
    let db = report.machine("db").unwrap();
    assert!(db.outcome("sshd_port").unwrap().changed);
    assert!(!db.outcome("sshd_root_login").unwrap().changed);
    assert!(db.outcome("sshd_reloaded").unwrap().changed);

    let state = fleet.state("db");
    let config = state.file("/etc/ssh/sshd_config").unwrap();
    assert!(config.lines().any(|l| l == "Port 2222"), "{config}");
    assert_eq!(state.file(SSHD_APPLIED), Some(config));
    assert_eq!(state.reloads, 2);
}

#[tokio::test]
async fn hosts_without_a_final_newline_keep_their_last_line() {
    let fleet = FakeFleet::new().shared();
    fleet.tamper("web", |state| {
        state.files.insert("/etc/hosts".to_string(), b"127.0.0.1 localhost".to_vec());
    });

    run(&fleet, Mode::Apply).await;
    fleet.forget_commands();
    let again = run(&fleet, Mode::Apply).await;

    let hosts = fleet.state("web").file("/etc/hosts").unwrap();
    assert!(hosts.starts_with("127.0.0.1 localhost\n"), "{hosts}");
    assert_eq!(hosts.lines().count(), 2);
    assert_eq!(again.totals().changed, 0);
}

/*************************************************************
                         Audit mode
**************************************************************/

#[tokio::test]
async fn audit_reports_drift_without_touching_anything() {
    let fleet = FakeFleet::new().shared();
    let report = run(&fleet, Mode::Audit).await;

    assert!(!report.success());
    assert!(fleet.mutations().is_empty(), "{:?}", fleet.mutations());
    assert_eq!(status(&report, "web", "iptables_installed"), UnitStatus::Fail);
    assert_eq!(status(&report, "web", "iptables_dir"), UnitStatus::Skipped);
    assert_eq!(report.totals().changed, 0);

    let outcome = report.machine("web").unwrap().outcome("iptables_installed").unwrap();
    assert!(matches!(outcome.error, Some(ConvergenceError::Divergence { .. })));
    assert!(outcome.remediation.is_some());
}

#[tokio::test]
async fn audit_passes_once_converged() {
    let fleet = FakeFleet::new().shared();
    run(&fleet, Mode::Apply).await;
    fleet.forget_commands();

    let report = run(&fleet, Mode::Audit).await;

    assert!(report.success());
    assert!(fleet.mutations().is_empty());
}

/*************************************************************
                     Failures and skips
**************************************************************/

#[tokio::test]
async fn failed_install_skips_what_depends_on_it() {
    let fleet = FakeFleet::new().with_broken_package("openssh-server").shared();
    let report = run(&fleet, Mode::Apply).await;

    assert!(!report.success());
    assert_eq!(status(&report, "web", "package_openssh-server"), UnitStatus::Fail);
    let install = report.machine("web").unwrap().outcome("package_openssh-server").unwrap();
    assert!(matches!(
        install.error,
        Some(ConvergenceError::CommandFailed { status: 100, .. })
    ));
    for unit in ["sshd_port", "sshd_root_login", "sshd_running", "sshd_reloaded"] {
        assert_eq!(status(&report, "web", unit), UnitStatus::Skipped, "{unit}");
    }
    assert_eq!(status(&report, "web", "iptables_loaded"), UnitStatus::Pass);

    let commands = fleet.commands("web");
    assert!(!commands.iter().any(|c| c.contains("sshd_config")), "{commands:?}");
    assert!(!commands.iter().any(|c| c.starts_with("systemctl")), "{commands:?}");
}

#[tokio::test]
async fn unreachable_machine_fails_alone() {
    let fleet = FakeFleet::new().with_unreachable("db").shared();
    let report = run(&fleet, Mode::Apply).await;

    assert!(!report.success());
    assert!(report.machine("web").unwrap().success());
    assert!(report.machine("gw").unwrap().success());

    let db = report.machine("db").unwrap();
    assert!(!db.success());
    assert_eq!(db.counts().pass, 0);
    let install = db.outcome("iptables_installed").unwrap();
    assert!(matches!(install.error, Some(ConvergenceError::Transport { .. })));
    assert!(install.output.contains("No route to host"));
}

#[tokio::test]
async fn filtered_run_touches_only_selected_machines() {
    let fleet = FakeFleet::new().shared();
    let report = Engine::new(fleet.clone())
        .run(compile_only(&["web"]).plans)
        .await;

    assert_eq!(report.machines.len(), 1);
    assert!(report.success());
    assert!(fleet.commands("db").is_empty());
    assert!(fleet.commands("gw").is_empty());
    assert!(!fleet.commands("web").is_empty());
}
