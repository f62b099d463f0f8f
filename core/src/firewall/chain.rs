use super::Table;
use super::rule::FirewallRule;

/// An ordered list of rules, stored in evaluation order.
///
/// Rules are prepended as they are authored, so the first rule ever authored is
/// evaluated last. A user chain is created with its default DROP already
/// authored, which pins it to the bottom for the chain's whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallChain {
    name: String,
    table: Table,
    builtin: bool,
    rules: Vec<FirewallRule>,
}

impl FirewallChain {
    pub(crate) fn builtin(table: Table, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table,
            builtin: true,
            rules: Vec::new(),
        }
    }

    pub(crate) fn user(table: Table, name: impl Into<String>, policy_name: impl Into<String>) -> Self {
        let mut chain = Self {
            name: name.into(),
            table,
            builtin: false,
            rules: Vec::new(),
        };
        chain.author(FirewallRule::default_drop(policy_name));
        chain
    }

    /// Prepends `rule`. An identical rule authored twice is kept once.
    pub(crate) fn author(&mut self, rule: FirewallRule) -> bool {
        if self.rules.contains(&rule) {
            return false;
        }
        self.rules.insert(0, rule);
        true
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    /// Rules in the order the kernel evaluates them.
    pub fn rules(&self) -> &[FirewallRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rule evaluated last.
    pub fn last_evaluated(&self) -> Option<&FirewallRule> {
        self.rules.last()
    }

    /// True when exactly one default rule exists and it is evaluated last.
    pub fn is_default_deny(&self) -> bool {
        let policies = self.rules.iter().filter(|r| r.is_policy()).count();
        policies == 1 && self.last_evaluated().is_some_and(FirewallRule::is_policy)
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
