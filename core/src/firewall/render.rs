//! Renders a [`FirewallModel`] as `iptables-restore` input.

use std::fmt::Write;

use super::{FirewallModel, Table};

impl FirewallModel {
    /// The complete ruleset, one `*table ... COMMIT` section per table.
    ///
    /// Rules are written in evaluation order, which is what `-A` expects.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# rampart ruleset for {}", self.label());

        for table in Table::ALL {
            let _ = writeln!(out, "*{table}");
            for chain in self.chains().filter(|c| c.table() == table) {
                let policy = if chain.is_builtin() { table.builtin_policy() } else { "-" };
                let _ = writeln!(out, ":{} {policy} [0:0]", chain.name());
            }
            for chain in self.chains().filter(|c| c.table() == table) {
                for rule in chain.rules() {
                    let _ = writeln!(out, "{}", rule.render(chain.name()));
                }
            }
            let _ = writeln!(out, "COMMIT");
        }
        out
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
