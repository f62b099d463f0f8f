//! # Firewall Model
//!
//! Every managed machine owns one [`FirewallModel`]: the built-in chains of the
//! `filter`, `nat` and `mangle` tables plus its user chains.
//!
//! ## Ordering
//! Rules are **prepended**. The first rule authored on a chain is evaluated last,
//! so callers layer specific rules above whatever the chain was created with.
//! User chains are created with a default DROP already in place, which makes every
//! user chain default-deny no matter what is authored on it afterwards.
//!
//! ## Chains
//! The filter built-ins jump to three user chains named after the machine:
//! `<label>_ingress` (INPUT), `<label>_egress` (OUTPUT) and `<label>_fwd` (FORWARD).

pub mod chain;
pub mod render;
pub mod rule;

use std::fmt;

use rampart_common::error::{CompileError, Result};

pub use chain::FirewallChain;
pub use rule::{FirewallRule, RuleHandle, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Filter,
    Nat,
    Mangle,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Filter, Table::Nat, Table::Mangle];

    pub fn builtin_chains(self) -> &'static [&'static str] {
        match self {
            Self::Filter => &["INPUT", "FORWARD", "OUTPUT"],
            Self::Nat => &["PREROUTING", "INPUT", "OUTPUT", "POSTROUTING"],
            Self::Mangle => &["PREROUTING", "INPUT", "FORWARD", "OUTPUT", "POSTROUTING"],
        }
    }

    /// Policy of the built-in chains when the ruleset is rendered.
    pub fn builtin_policy(self) -> &'static str {
        match self {
            Self::Filter => "DROP",
            Self::Nat | Self::Mangle => "ACCEPT",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Filter => "filter",
            Self::Nat => "nat",
            Self::Mangle => "mangle",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallModel {
    label: String,
    chains: Vec<FirewallChain>,
}

impl FirewallModel {
    pub fn new(label: &str) -> Self {
        let mut model = Self {
            label: label.to_string(),
            chains: Vec::new(),
        };

        for table in Table::ALL {
            for name in table.builtin_chains() {
                model.chains.push(FirewallChain::builtin(table, *name));
            }
        }

        let hooks = [
            ("INPUT", model.ingress_chain(), "-i lo"),
            ("OUTPUT", model.egress_chain(), "-o lo"),
            ("FORWARD", model.forward_chain(), ""),
        ];
        for (builtin, user, loopback) in hooks {
            let policy = format!("{user}_default");
            model.create_chain(Table::Filter, &user, &policy);
            model.push(
                Table::Filter,
                builtin,
                FirewallRule::new(format!("{builtin}_to_{user}"), "", Target::Jump(user.clone())),
            );
            if !loopback.is_empty() {
                model.push(
                    Table::Filter,
                    builtin,
                    FirewallRule::new(format!("{builtin}_loopback"), loopback, Target::Accept),
                );
            }
        }

        model
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn ingress_chain(&self) -> String {
        format!("{}_ingress", self.label)
    }

    pub fn egress_chain(&self) -> String {
        format!("{}_egress", self.label)
    }

    pub fn forward_chain(&self) -> String {
        format!("{}_fwd", self.label)
    }

    pub fn add_filter_input(&mut self, name: &str, matches: &str, target: Target) -> RuleHandle {
        let chain = self.ingress_chain();
        self.push(Table::Filter, &chain, FirewallRule::new(name, matches, target))
    }

    pub fn add_filter_output(&mut self, name: &str, matches: &str, target: Target) -> RuleHandle {
        let chain = self.egress_chain();
        self.push(Table::Filter, &chain, FirewallRule::new(name, matches, target))
    }

    pub fn add_filter_forward(&mut self, name: &str, matches: &str, target: Target) -> RuleHandle {
        let chain = self.forward_chain();
        self.push(Table::Filter, &chain, FirewallRule::new(name, matches, target))
    }

    pub fn add_nat_prerouting(&mut self, name: &str, matches: &str, target: Target) -> RuleHandle {
        self.push(Table::Nat, "PREROUTING", FirewallRule::new(name, matches, target))
    }

    pub fn add_nat_postrouting(&mut self, name: &str, matches: &str, target: Target) -> RuleHandle {
        self.push(Table::Nat, "POSTROUTING", FirewallRule::new(name, matches, target))
    }

    pub fn add_mangle_forward(&mut self, name: &str, matches: &str, target: Target) -> RuleHandle {
        self.push(Table::Mangle, "FORWARD", FirewallRule::new(name, matches, target))
    }

    /// Creates the user chain `chain` in `table`, authoring its default DROP as `name`.
    ///
    /// Creating a chain that already exists returns the handle of its default rule.
    pub fn add_chain(&mut self, name: &str, table: Table, chain: &str) -> RuleHandle {
        self.create_chain(table, chain, name)
    }

    /// Authors a rule on any existing chain.
    pub fn add_rule(
        &mut self,
        table: Table,
        chain: &str,
        name: &str,
        matches: &str,
        target: Target,
    ) -> Result<RuleHandle> {
        if self.chain(table, chain).is_none() {
            return Err(CompileError::UnknownChain {
                machine: self.label.clone(),
                table: table.to_string(),
                chain: chain.to_string(),
            });
        }
        Ok(self.push(table, chain, FirewallRule::new(name, matches, target)))
    }

    pub fn chain(&self, table: Table, name: &str) -> Option<&FirewallChain> {
        self.chains
            .iter()
            .find(|c| c.table() == table && c.name() == name)
    }

    pub fn chains(&self) -> impl Iterator<Item = &FirewallChain> {
        self.chains.iter()
    }

    pub fn user_chains(&self) -> impl Iterator<Item = &FirewallChain> {
        self.chains.iter().filter(|c| !c.is_builtin())
    }

    /// Every rule in `table`, paired with its chain name.
    pub fn rules(&self, table: Table) -> impl Iterator<Item = (&str, &FirewallRule)> {
        self.chains
            .iter()
            .filter(move |c| c.table() == table)
            .flat_map(|c| c.rules().iter().map(move |r| (c.name(), r)))
    }

    fn create_chain(&mut self, table: Table, chain: &str, policy: &str) -> RuleHandle {
        let handle = |name: &str| RuleHandle {
            machine: self.label.clone(),
            table,
            chain: chain.to_string(),
            name: name.to_string(),
        };

        if let Some(existing) = self.chain(table, chain) {
            let name = existing
                .rules()
                .iter()
                .find(|r| r.is_policy())
                .map_or(policy, FirewallRule::name);
            return handle(name);
        }

        let created = handle(policy);
        self.chains.push(FirewallChain::user(table, chain, policy));
        created
    }

    fn push(&mut self, table: Table, chain: &str, rule: FirewallRule) -> RuleHandle {
        let handle = RuleHandle {
            machine: self.label.clone(),
            table,
            chain: chain.to_string(),
            name: rule.name().to_string(),
        };

        let position = self
            .chains
            .iter()
            .position(|c| c.table() == table && c.name() == chain);
        match position {
            Some(idx) => {
                self.chains[idx].author(rule);
            }
            None => {
                let mut created = FirewallChain::user(table, chain, format!("{chain}_default"));
                created.author(rule);
                self.chains.push(created);
            }
        }
        handle
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
