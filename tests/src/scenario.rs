#![cfg(test)]
use std::net::SocketAddrV4;

use rampart_common::network::definition::NetworkDefinition;
use rampart_core::compiler::{Compilation, Compiler};
use rampart_core::engine::Phase;
use rampart_core::firewall::{FirewallRule, Table, Target};
use rampart_core::unit::Unit;

const ESTABLISHED: &str = "-m conntrack --ctstate ESTABLISHED,RELATED";

/*************************************************************
                 A router and a single server
**************************************************************/

const SINGLE: &str = r#"
    [network]
    domain = "example.org"
    [router]
    label = "gw"
    external_address = "203.0.113.10"
    [[servers]]
    label = "web"
    ssh_port = 22
    interfaces = [{ name = "lan0", mac = "52:54:00:00:00:01" }]
    expose = [{ port = 443, internal = true }]
"#;

#[test]
fn every_user_chain_is_default_deny() {
    let compilation = compile(SINGLE);
    for machine in compilation.model.managed() {
        for chain in machine.firewall().user_chains() {
            assert!(
                chain.is_default_deny(),
                "{} on {} does not end in a single DROP",
                chain.name(),
                machine.label()
            );
        }
    }
}

#[test]
fn return_traffic_is_accepted_once_per_direction() {
    let compilation = compile(SINGLE);
    let firewall = compilation.model.machine("web").unwrap().firewall();

    for chain in [firewall.ingress_chain(), firewall.egress_chain()] {
        let rules = firewall.chain(Table::Filter, &chain).unwrap().rules();
        let established = rules
            .iter()
            .filter(|r| r.matches() == ESTABLISHED && *r.target() == Target::Accept)
            .count();
        assert_eq!(established, 1, "{chain}");
    }
}

#[test]
fn rendered_ruleset_drops_last() {
    let compilation = compile(SINGLE);
    let text = compilation.model.ruleset("web").unwrap();

    let ingress: Vec<&str> = text.lines().filter(|l| l.starts_with("-A web_ingress ")).collect();
    assert_eq!(ingress.last(), Some(&"-A web_ingress -j DROP"));
    assert!(text.contains(":INPUT DROP [0:0]"));
}

#[test]
fn internal_clients_reach_exposed_service_without_a_loop() {
    let compilation = compile(SINGLE);
    let web = compilation.model.machine("web").unwrap().ip().unwrap();
    let router = compilation.model.machine("gw").unwrap().firewall();

    let (chain, rule) = router
        .rules(Table::Nat)
        .find(|(_, r)| r.name() == "dnat_internal_web_443")
        .expect("internal dnat rule");
    assert_eq!(chain, "PREROUTING");
    assert!(rule.matches().starts_with(&format!("! -s {web} -d 203.0.113.10")));
    assert_eq!(*rule.target(), Target::Dnat { to: SocketAddrV4::new(web, 443) });

    let served = compilation.model.machine("web").unwrap().firewall();
    assert!(
        served
            .rules(Table::Filter)
            .any(|(_, r)| r.name() == "exposed_443" && *r.target() == Target::Accept)
    );
}

#[test]
fn firewall_units_run_last_and_in_order() {
    let compilation = compile(SINGLE);
    let plan = compilation.plans.iter().find(|p| p.machine() == "web").unwrap();
    let units = plan.units();

    assert!(units.windows(2).all(|w| w[0].phase <= w[1].phase));
    let tail: Vec<&str> = units[units.len() - 3..].iter().map(|p| p.unit.name()).collect();
    assert_eq!(tail, ["iptables_dir", "iptables_rules", "iptables_loaded"]);
    assert!(units.iter().rev().take(3).all(|p| p.phase == Phase::Firewall));
}

/*************************************************************
             SSH between servers and from admins
**************************************************************/

const FLEET: &str = r#"
    [network]
    domain = "example.org"
    [router]
    label = "gw"
    [[servers]]
    label = "web"
    interfaces = [{ name = "lan0", mac = "52:54:00:00:00:01" }]
    [[servers]]
    label = "app"
    peers = ["web"]
    interfaces = [{ name = "lan0", mac = "52:54:00:00:00:02" }]
    [[servers]]
    label = "jump"
    superuser = true
    ssh_port = 2222
    interfaces = [{ name = "lan0", mac = "52:54:00:00:00:03" }]
    [[devices]]
    label = "laptop"
    admin = true
    interfaces = [{ name = "wlan0", mac = "52:54:00:00:01:01" }]
"#;

#[test]
fn ordinary_servers_never_accept_ssh_from_each_other() {
    let compilation = compile(FLEET);
    let model = &compilation.model;
    let app = model.machine("app").unwrap().ip().unwrap();

    let web = model.machine("web").unwrap().firewall();
    for (_, rule) in web.rules(Table::Filter) {
        if accepts_port(rule, 22) {
            assert!(!rule.matches().contains(&format!("-s {app} ")), "{rule:?}");
        }
    }

    let app_egress = model.machine("app").unwrap().firewall();
    assert!(app_egress.rules(Table::Filter).any(|(_, r)| r.name() == "deny_ssh_web"));
    assert!(!app_egress.rules(Table::Filter).any(|(_, r)| r.name() == "allow_ssh_web"));

    let router = model.machine("gw").unwrap().firewall();
    for (_, rule) in router.rules(Table::Filter) {
        if accepts_port(rule, 22) {
            assert!(!rule.matches().contains(&format!("-s {app} ")), "{rule:?}");
        }
    }
}

#[test]
fn superusers_and_admins_are_let_through_before_the_ssh_drop() {
    let compilation = compile(FLEET);
    let model = &compilation.model;
    let firewall = model.machine("web").unwrap().firewall();
    let ingress = firewall.chain(Table::Filter, &firewall.ingress_chain()).unwrap();

    let position = |name: &str| ingress.rules().iter().position(|r| r.name() == name).unwrap();
    let deny = position("deny_ssh");
    assert!(position("allow_ssh_jump") < deny);
    assert!(position("allow_ssh_laptop") < deny);

    let jump = model.machine("jump").unwrap().firewall();
    assert!(jump.rules(Table::Filter).any(|(_, r)| r.name() == "allow_ssh_web"));
}

#[test]
fn peers_reach_only_the_served_ports() {
    let compilation = compile(FLEET);
    let model = &compilation.model;
    let web = model.machine("web").unwrap().ip().unwrap();

    let app = model.machine("app").unwrap().firewall();
    let (_, rule) = app
        .rules(Table::Filter)
        .find(|(_, r)| r.name() == "from_peer_web")
        .unwrap();
    assert_eq!(rule.matches(), format!("-s {web} -p tcp -m multiport --dports 80,443"));
}

fn compile(text: &str) -> Compilation {
    let definition: NetworkDefinition = text.parse().unwrap();
    Compiler::with_defaults().compile(&definition).unwrap()
}

fn accepts_port(rule: &FirewallRule, port: u16) -> bool {
    *rule.target() == Target::Accept && rule.matches().contains(&format!("--dport {port}"))
}
