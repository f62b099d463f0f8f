use std::collections::BTreeSet;

/// How the engine treats a unit whose audit shows drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Audit, apply the unit's configuration, then verify.
    #[default]
    Apply,
    /// Audit only. Drift is reported according to the unit's severity.
    Audit,
}

/// How commands reach a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Run every command on this host. Useful for single-machine setups and tests.
    Local,
    #[default]
    Ssh,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub mode: Mode,
    /// Only execute plans for these machines. Empty means every machine.
    pub machines: BTreeSet<String>,
    /// Output verbosity, 0 prints everything.
    pub quiet: u8,
    /// Disables the keyboard listener used to abort a run.
    pub disable_input: bool,
    pub transport: TransportKind,
    /// Remote user for SSH sessions, defaults to the local user.
    pub ssh_user: Option<String>,
}

impl Config {
    pub fn selects(&self, label: &str) -> bool {
        self.machines.is_empty() || self.machines.contains(label)
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
