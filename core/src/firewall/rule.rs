use std::fmt;
use std::net::SocketAddrV4;

use super::Table;

/// What happens to a packet once a rule matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Accept,
    Drop,
    Reject,
    Return,
    Log { prefix: String },
    Dnat { to: SocketAddrV4 },
    Mark(u32),
    Masquerade,
    Jump(String),
}

impl Target {
    pub fn log(prefix: impl Into<String>) -> Self {
        Self::Log {
            prefix: prefix.into(),
        }
    }

    pub fn is_terminal_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => f.write_str("-j ACCEPT"),
            Self::Drop => f.write_str("-j DROP"),
            Self::Reject => f.write_str("-j REJECT"),
            Self::Return => f.write_str("-j RETURN"),
            Self::Log { prefix } => write!(f, "-j LOG --log-prefix \"{prefix}\""),
            Self::Dnat { to } => write!(f, "-j DNAT --to-destination {to}"),
            Self::Mark(mark) => write!(f, "-j MARK --set-mark {mark}"),
            Self::Masquerade => f.write_str("-j MASQUERADE"),
            Self::Jump(chain) => write!(f, "-j {chain}"),
        }
    }
}

/// A raw iptables match plus its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FirewallRule {
    name: String,
    matches: String,
    target: Target,
    /// Set only on the default DROP a user chain is created with.
    policy: bool,
}

impl FirewallRule {
    pub fn new(name: impl Into<String>, matches: impl Into<String>, target: Target) -> Self {
        Self {
            name: name.into(),
            matches: matches.into().trim().to_string(),
            target,
            policy: false,
        }
    }

    pub(crate) fn default_drop(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            matches: String::new(),
            target: Target::Drop,
            policy: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self) -> &str {
        &self.matches
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn is_policy(&self) -> bool {
        self.policy
    }

    /// The rule as an `iptables-restore` line appended to `chain`.
    pub fn render(&self, chain: &str) -> String {
        if self.matches.is_empty() {
            format!("-A {chain} {}", self.target)
        } else {
            format!("-A {chain} {} {}", self.matches, self.target)
        }
    }
}

/// Where a rule was recorded, returned to the profile that authored it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleHandle {
    pub machine: String,
    pub table: Table,
    pub chain: String,
    pub name: String,
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn render_rule_with_and_without_match() {
        let rule = FirewallRule::new("web_in", " -p tcp --dport 443 ", Target::Accept);
        assert_eq!(rule.render("web_ingress"), "-A web_ingress -p tcp --dport 443 -j ACCEPT");

        let drop = FirewallRule::default_drop("web_ingress_default");
        assert_eq!(drop.render("web_ingress"), "-A web_ingress -j DROP");
        assert!(drop.is_policy());
    }

    #[test]
    fn render_targets() {
        let to = SocketAddrV4::new(Ipv4Addr::new(10, 10, 0, 2), 443);
        assert_eq!(Target::Dnat { to }.to_string(), "-j DNAT --to-destination 10.10.0.2:443");
        assert_eq!(Target::Mark(3).to_string(), "-j MARK --set-mark 3");
        assert_eq!(Target::log("gw_fwd: ").to_string(), "-j LOG --log-prefix \"gw_fwd: \"");
    }
}
