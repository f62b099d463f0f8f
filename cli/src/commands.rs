pub mod addresses;
pub mod apply;
pub mod check;
pub mod firewall;
pub mod plan;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rampart_common::config::{Config, Mode, TransportKind};
use rampart_common::network::definition::NetworkDefinition;

#[derive(Parser)]
#[command(name = "rampart")]
#[command(about = "Compiles a network definition and converges its machines.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Print less; repeat to only print the summary
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Log more; repeat for trace output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a definition without touching any machine
    #[command(alias = "c")]
    Check { definition: PathBuf },
    /// Show the address block of every interface
    #[command(alias = "a")]
    Addresses { definition: PathBuf },
    /// Print the iptables-restore ruleset of one machine
    #[command(alias = "f")]
    Firewall { definition: PathBuf, machine: String },
    /// Show the order units would run in
    #[command(alias = "p")]
    Plan {
        definition: PathBuf,
        /// Only show these machines
        #[arg(short, long)]
        machine: Vec<String>,
    },
    /// Converge machines onto the definition
    #[command(alias = "run")]
    Apply {
        definition: PathBuf,
        /// Only audit, never change a machine
        #[arg(long)]
        audit: bool,
        /// Only converge these machines
        #[arg(short, long)]
        machine: Vec<String>,
        #[arg(long, value_enum, default_value_t = TransportArg::Ssh)]
        transport: TransportArg,
        /// Remote user for SSH sessions
        #[arg(long)]
        ssh_user: Option<String>,
        /// Do not listen for 'q' on the terminal
        #[arg(long)]
        no_input: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    Local,
    Ssh,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Local => TransportKind::Local,
            TransportArg::Ssh => TransportKind::Ssh,
        }
    }
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Run settings from the flags of the chosen command.
    pub fn config(&self) -> Config {
        let mut cfg = Config {
            quiet: self.quiet,
            ..Config::default()
        };
        match &self.command {
            Commands::Plan { machine, .. } => {
                cfg.machines = machine.iter().cloned().collect::<BTreeSet<_>>();
            }
            Commands::Apply {
                audit,
                machine,
                transport,
                ssh_user,
                no_input,
                ..
            } => {
                cfg.mode = if *audit { Mode::Audit } else { Mode::Apply };
                cfg.machines = machine.iter().cloned().collect();
                cfg.transport = (*transport).into();
                cfg.ssh_user = ssh_user.clone();
                cfg.disable_input = *no_input;
            }
            Commands::Check { .. } | Commands::Addresses { .. } | Commands::Firewall { .. } => {}
        }
        cfg
    }
}

pub fn load_definition(path: &Path) -> anyhow::Result<NetworkDefinition> {
    NetworkDefinition::from_file(path)
        .with_context(|| format!("loading network definition {}", path.display()))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
