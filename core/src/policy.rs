//! # Default Policy
//!
//! Authors the baseline ruleset of every managed machine from the network graph.
//! Chains start with their default DROP in place (see [`crate::firewall`]); the
//! steps below layer rules on top, each later step taking priority over the ones
//! before it:
//!
//! 1. log unmatched traffic with a prefix naming the chain;
//! 2. allow the gateway and return traffic;
//! 3. servers: drop SSH towards every other server, with exceptions for superusers;
//! 4. router: DNAT for exposed services, guarded against loops for internal clients;
//! 5. router: bandwidth marking per traffic category, plus egress masquerading.
//!
//! Peer rules depend on the ports profiles register as listening, so they are
//! authored by [`apply_peer_rules`] once every profile has run. They never open a
//! server's SSH port, which keeps the SSH drops above authoritative.

use std::net::{Ipv4Addr, SocketAddrV4};

use rampart_common::error::Result;
use rampart_common::network::definition::{ExposedService, TrafficCategory};
use tracing::debug;

use crate::firewall::{FirewallModel, Target};
use crate::model::NetworkModel;

/// Ports peers may reach on a server that declares none.
pub const DEFAULT_SERVICE_PORTS: [u16; 2] = [80, 443];

pub const ESTABLISHED: &str = "-m conntrack --ctstate ESTABLISHED,RELATED";
const LOG_LIMIT: &str = "-m limit --limit 5/min";
const ALERT_LIMIT: &str = "-m limit --limit 1/min";

/// What the policy needs to know about one addressed machine.
#[derive(Debug, Clone)]
struct Host {
    label: String,
    ip: Ipv4Addr,
    gateway: Ipv4Addr,
    ssh_port: Option<u16>,
    server: bool,
    superuser: bool,
    internet: bool,
    category: TrafficCategory,
    ports: Vec<u16>,
}

/// Authors the default ruleset of every machine in `model`.
pub fn apply_defaults(model: &mut NetworkModel) -> Result<()> {
    let hosts = hosts(model);

    for host in hosts.iter().filter(|h| h.server) {
        let firewall = model.firewall_mut(&host.label)?;
        server_baseline(firewall, host);
        server_ssh(firewall, host, &hosts);
    }

    router_baseline(model)?;
    router_ssh(model, &hosts)?;
    router_dnat(model, &hosts)?;
    router_bandwidth(model, &hosts)?;
    router_masquerade(model, &hosts)?;

    debug!(hosts = hosts.len(), "default policy authored");
    Ok(())
}

/// Lets declared peers reach the ports their servers listen on, as registered by
/// the definition and by profiles.
pub fn apply_peer_rules(model: &mut NetworkModel) -> Result<()> {
    let hosts = hosts(model);
    let router = model.router_label().to_string();
    let mut authored = 0;

    for server in hosts.iter().filter(|h| h.server) {
        let Some(served) = served_ports(server) else { continue };
        for peer in peers_of(model, &server.label, &hosts) {
            model.firewall_mut(&server.label)?.add_filter_input(
                &format!("from_peer_{}", peer.label),
                &format!("-s {} {served}", peer.ip),
                Target::Accept,
            );
            if peer.server {
                model.firewall_mut(&peer.label)?.add_filter_output(
                    &format!("to_peer_{}", server.label),
                    &format!("-d {} {served}", server.ip),
                    Target::Accept,
                );
            }
            model.firewall_mut(&router)?.add_filter_forward(
                &format!("{}_to_{}", peer.label, server.label),
                &format!("-s {} -d {} {served}", peer.ip, server.ip),
                Target::Accept,
            );
            authored += 1;
        }
    }

    debug!(peerings = authored, "peer rules authored");
    Ok(())
}

/// The port match of what `host` serves, without its SSH port.
fn served_ports(host: &Host) -> Option<String> {
    let ports: Vec<u16> = host
        .ports
        .iter()
        .copied()
        .filter(|p| Some(*p) != host.ssh_port)
        .collect();
    (!ports.is_empty()).then(|| ports_match(&ports))
}

fn hosts(model: &NetworkModel) -> Vec<Host> {
    model
        .machines()
        .filter(|m| !m.is_router())
        .filter_map(|m| {
            let ports = if m.facts().listening_ports().is_empty() {
                DEFAULT_SERVICE_PORTS.to_vec()
            } else {
                m.facts().listening_ports().iter().copied().collect()
            };
            Some(Host {
                label: m.label().to_string(),
                ip: m.ip()?,
                gateway: m.gateway()?,
                ssh_port: m.ssh_port(),
                server: m.is_server(),
                superuser: m.is_superuser(),
                internet: m.internet(),
                category: m.category(),
                ports,
            })
        })
        .collect()
}

/// Hosts allowed to reach `label`'s ports.
fn peers_of<'a>(model: &NetworkModel, label: &str, hosts: &'a [Host]) -> Vec<&'a Host> {
    model
        .definition()
        .server(label)
        .map(|def| {
            def.peers
                .iter()
                .filter_map(|p| hosts.iter().find(|h| h.label == *p))
                .collect()
        })
        .unwrap_or_default()
}

fn ports_match(ports: &[u16]) -> String {
    match ports {
        [single] => format!("-p tcp --dport {single}"),
        many => {
            let list: Vec<String> = many.iter().map(u16::to_string).collect();
            format!("-p tcp -m multiport --dports {}", list.join(","))
        }
    }
}

fn log_unmatched(firewall: &mut FirewallModel) {
    let ingress = firewall.ingress_chain();
    let egress = firewall.egress_chain();
    let forward = firewall.forward_chain();
    firewall.add_filter_input(&format!("{ingress}_log"), LOG_LIMIT, Target::log(format!("{ingress}: ")));
    firewall.add_filter_output(&format!("{egress}_log"), LOG_LIMIT, Target::log(format!("{egress}: ")));
    firewall.add_filter_forward(&format!("{forward}_log"), LOG_LIMIT, Target::log(format!("{forward}: ")));
}

fn server_baseline(firewall: &mut FirewallModel, host: &Host) {
    log_unmatched(firewall);

    firewall.add_filter_input("from_gateway", &format!("-s {}", host.gateway), Target::Accept);
    firewall.add_filter_output("to_gateway", &format!("-d {}", host.gateway), Target::Accept);

    if host.internet {
        firewall.add_filter_output("internet", &ports_match(&DEFAULT_SERVICE_PORTS), Target::Accept);
    }

    firewall.add_filter_input("established", ESTABLISHED, Target::Accept);
    firewall.add_filter_output("established", ESTABLISHED, Target::Accept);
}

fn server_ssh(firewall: &mut FirewallModel, host: &Host, hosts: &[Host]) {
    for other in hosts.iter().filter(|h| h.server && h.label != host.label) {
        let Some(port) = other.ssh_port else { continue };
        let matches = format!("-d {} -p tcp --dport {port}", other.ip);
        firewall.add_filter_output(&format!("deny_ssh_{}", other.label), &matches, Target::Drop);
        if host.superuser {
            firewall.add_filter_output(&format!("allow_ssh_{}", other.label), &matches, Target::Accept);
        }
    }

    let Some(own) = host.ssh_port else { return };
    firewall.add_filter_input("deny_ssh", &format!("-p tcp --dport {own}"), Target::Drop);
    for admin in hosts.iter().filter(|h| h.superuser && h.label != host.label) {
        firewall.add_filter_input(
            &format!("allow_ssh_{}", admin.label),
            &format!("-s {} -p tcp --dport {own}", admin.ip),
            Target::Accept,
        );
    }
}

fn router_baseline(model: &mut NetworkModel) -> Result<()> {
    let router = model.definition().router.clone();
    let firewall = model.firewall_mut(&router.label)?;
    log_unmatched(firewall);

    let lan = &router.lan_interface;
    let wan = &router.wan_interface;
    firewall.add_filter_input("dns_udp", &format!("-i {lan} -p udp --dport 53"), Target::Accept);
    firewall.add_filter_input("dns_tcp", &format!("-i {lan} -p tcp --dport 53"), Target::Accept);
    firewall.add_filter_output("to_lan", &format!("-o {lan}"), Target::Accept);
    firewall.add_filter_output("to_wan", &format!("-o {wan}"), Target::Accept);

    firewall.add_filter_input("established", ESTABLISHED, Target::Accept);
    firewall.add_filter_forward("established", ESTABLISHED, Target::Accept);
    Ok(())
}

fn router_ssh(model: &mut NetworkModel, hosts: &[Host]) -> Result<()> {
    let router = model.definition().router.clone();
    let firewall = model.firewall_mut(&router.label)?;

    for server in hosts.iter().filter(|h| h.server) {
        let Some(port) = server.ssh_port else { continue };
        let matches = format!("-d {} -p tcp --dport {port}", server.ip);
        firewall.add_filter_forward(&format!("deny_ssh_{}", server.label), &matches, Target::Drop);
        for admin in hosts.iter().filter(|h| h.superuser && h.label != server.label) {
            firewall.add_filter_forward(
                &format!("allow_ssh_{}_{}", admin.label, server.label),
                &format!("-s {} {matches}", admin.ip),
                Target::Accept,
            );
        }
    }

    firewall.add_filter_input("deny_ssh", &format!("-p tcp --dport {}", router.ssh_port), Target::Drop);
    for admin in hosts.iter().filter(|h| h.superuser) {
        firewall.add_filter_input(
            &format!("allow_ssh_{}", admin.label),
            &format!("-s {} -p tcp --dport {}", admin.ip, router.ssh_port),
            Target::Accept,
        );
    }
    Ok(())
}

fn router_dnat(model: &mut NetworkModel, hosts: &[Host]) -> Result<()> {
    let router = model.definition().router.clone();
    let exposed: Vec<(Host, ExposedService)> = model
        .definition()
        .servers
        .iter()
        .flat_map(|s| s.expose.iter().map(move |svc| (s.label.as_str(), svc)))
        .filter_map(|(label, svc)| {
            let host = hosts.iter().find(|h| h.label == label)?;
            Some((host.clone(), svc.clone()))
        })
        .collect();

    for (host, service) in &exposed {
        let to = SocketAddrV4::new(host.ip, service.port);
        let proto = &service.protocol;
        let external = service.external_port();
        let name = format!("{}_{}", host.label, external);

        let router_fw = model.firewall_mut(&router.label)?;
        router_fw.add_nat_prerouting(
            &format!("dnat_{name}"),
            &format!("-i {} -p {proto} --dport {external}", router.wan_interface),
            Target::Dnat { to },
        );
        if let (true, Some(public)) = (service.internal, router.external_address) {
            // The service itself must not be rewritten back onto itself.
            router_fw.add_nat_prerouting(
                &format!("dnat_internal_{name}"),
                &format!("! -s {} -d {public} -p {proto} --dport {external}", host.ip),
                Target::Dnat { to },
            );
        }
        router_fw.add_filter_forward(
            &format!("exposed_{name}"),
            &format!("-d {} -p {proto} --dport {}", host.ip, service.port),
            Target::Accept,
        );

        model.firewall_mut(&host.label)?.add_filter_input(
            &format!("exposed_{}", service.port),
            &format!("-p {proto} --dport {}", service.port),
            Target::Accept,
        );
    }
    Ok(())
}

fn router_bandwidth(model: &mut NetworkModel, hosts: &[Host]) -> Result<()> {
    let router = model.definition().router.label.clone();
    let bandwidth = model.definition().network.bandwidth.clone();
    let firewall = model.firewall_mut(&router)?;

    for host in hosts {
        let category = bandwidth.category(host.category);
        let over = format!(
            "-s {} -m connbytes --connbytes {}: --connbytes-dir both --connbytes-mode bytes",
            host.ip,
            category.threshold_bytes()
        );
        firewall.add_mangle_forward(
            &format!("mark_{}", host.label),
            &over,
            Target::Mark(category.mark),
        );

        let comment = match &category.notify {
            Some(recipient) => format!(" -m comment --comment \"notify {recipient}\""),
            None => String::new(),
        };
        firewall.add_mangle_forward(
            &format!("alert_{}", host.label),
            &format!("{over} {ALERT_LIMIT}{comment}"),
            Target::log(format!("bandwidth {}: ", host.category)),
        );
    }
    Ok(())
}

fn router_masquerade(model: &mut NetworkModel, hosts: &[Host]) -> Result<()> {
    let router = model.definition().router.clone();
    let online: Vec<&Host> = hosts.iter().filter(|h| h.internet).collect();
    if online.is_empty() {
        return Ok(());
    }

    let firewall = model.firewall_mut(&router.label)?;
    firewall.add_nat_postrouting(
        "masquerade",
        &format!("-o {}", router.wan_interface),
        Target::Masquerade,
    );
    for host in online {
        firewall.add_filter_forward(
            &format!("internet_{}", host.label),
            &format!("-s {} -o {}", host.ip, router.wan_interface),
            Target::Accept,
        );
    }
    Ok(())
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
    use crate::firewall::{FirewallChain, FirewallRule, Table};
    use crate::model::FrozenModel;
    use rampart_common::network::definition::NetworkDefinition;

    const NET: &str = r#"
        [network]
        domain = "example.org"
        [network.bandwidth.device]
        threshold_mib = 50
        mark = 7
        notify = "noc@example.org"
        [router]
        label = "gw"
        external_address = "203.0.113.10"
        [[servers]]
        label = "web"
        ports = [443]
        peers = ["app", "tv"]
        internet = true
        interfaces = [{ name = "lan0", mac = "52:54:00:00:00:01" }]
        expose = [{ port = 443, internal = true }]
        [[servers]]
        label = "app"
        interfaces = [{ name = "lan0", mac = "52:54:00:00:00:02" }]
        [[servers]]
        label = "jump"
        superuser = true
        ssh_port = 2222
        interfaces = [{ name = "lan0", mac = "52:54:00:00:00:03" }]
        [[devices]]
        label = "tv"
        category = "device"
        interfaces = [{ name = "eth0", mac = "52:54:00:00:01:01" }]
    "#;

    fn built() -> NetworkModel {
        NetworkModel::from_definition(&NET.parse::<NetworkDefinition>().unwrap()).unwrap()
    }

    fn model() -> FrozenModel {
        built().freeze().unwrap()
    }

    fn rule<'a>(model: &'a NetworkModel, label: &str, name: &str) -> Option<&'a FirewallRule> {
        rules(model, label, Table::Filter)
            .into_iter()
            .find(|(_, r)| r.name() == name)
            .map(|(_, r)| r)
    }

    fn rules<'a>(model: &'a NetworkModel, label: &str, table: Table) -> Vec<(&'a str, &'a FirewallRule)> {
        model.machine(label).unwrap().firewall().rules(table).collect()
    }

    #[test]
    fn every_user_chain_ends_in_drop() {
        let model = model();
        for machine in model.managed() {
            for chain in machine.firewall().user_chains() {
                assert!(chain.is_default_deny(), "{} is not default-deny", chain.name());
                assert_eq!(chain.last_evaluated().unwrap().target(), &Target::Drop);
            }
        }
    }

    #[test]
    fn log_rule_sits_just_above_the_default_drop() {
        let model = model();
        let web = model.machine("web").unwrap();
        let ingress: &FirewallChain = web.firewall().chain(Table::Filter, "web_ingress").unwrap();
        let n = ingress.len();
        assert_eq!(
            ingress.rules()[n - 2].target(),
            &Target::log("web_ingress: ")
        );
    }

    #[test]
    fn peers_reach_only_declared_ports() {
        let model = model();
        let app_ip = model.machine("app").unwrap().ip().unwrap();
        let web = rules(&model, "web", Table::Filter);
        let from_app = web
            .iter()
            .find(|(_, r)| r.name() == "from_peer_app")
            .unwrap();
        assert_eq!(from_app.1.matches(), format!("-s {app_ip} -p tcp --dport 443"));

        let app = rules(&model, "app", Table::Filter);
        assert!(app.iter().any(|(c, r)| *c == "app_egress" && r.name() == "to_peer_web"));
    }

    #[test]
    fn ports_registered_before_freezing_reach_peers() {
        let mut model = built();
        assert!(rule(&model, "web", "from_peer_app").is_none());
        model.machine_mut("web").unwrap().facts_mut().add_listening_port(5432);
        let model = model.freeze().unwrap();

        let app_ip = model.machine("app").unwrap().ip().unwrap();
        let web_ip = model.machine("web").unwrap().ip().unwrap();
        let served = "-p tcp -m multiport --dports 443,5432";
        assert_eq!(
            rule(&model, "web", "from_peer_app").unwrap().matches(),
            format!("-s {app_ip} {served}")
        );
        assert_eq!(
            rule(&model, "app", "to_peer_web").unwrap().matches(),
            format!("-d {web_ip} {served}")
        );
        assert_eq!(
            rule(&model, "gw", "app_to_web").unwrap().matches(),
            format!("-s {app_ip} -d {web_ip} {served}")
        );
    }

    #[test]
    fn peers_never_get_the_ssh_port() {
        let mut model = built();
        let web = model.machine_mut("web").unwrap();
        web.facts_mut().add_listening_port(22);
        let model = model.freeze().unwrap();

        let from_app = rule(&model, "web", "from_peer_app").unwrap();
        assert_eq!(from_app.matches().split(' ').last(), Some("443"));

        let ingress = model.machine("web").unwrap().firewall().chain(Table::Filter, "web_ingress").unwrap();
        let deny = ingress.rules().iter().position(|r| r.name() == "deny_ssh").unwrap();
        let peer = ingress.rules().iter().position(|r| r.name() == "from_peer_app").unwrap();
        assert!(peer < deny);
        assert!(!ingress.rules()[peer].matches().contains("22"));
    }

    #[test]
    fn server_without_ports_defaults_to_web_ports() {
        let model = model();
        let hosts = hosts(&model);
        let app = hosts.iter().find(|h| h.label == "app").unwrap();
        assert_eq!(app.ports, DEFAULT_SERVICE_PORTS.to_vec());
        assert_eq!(ports_match(&app.ports), "-p tcp -m multiport --dports 80,443");
    }

    #[test]
    fn ssh_to_other_servers_is_denied_unless_superuser() {
        let model = model();
        let jump_ip = model.machine("jump").unwrap().ip().unwrap();
        let app_ip = model.machine("app").unwrap().ip().unwrap();

        let web_egress: Vec<&FirewallRule> = rules(&model, "web", Table::Filter)
            .into_iter()
            .filter(|(c, _)| *c == "web_egress")
            .map(|(_, r)| r)
            .collect();
        let to_jump = format!("-d {jump_ip} -p tcp --dport 2222");
        assert!(web_egress.iter().any(|r| r.matches() == to_jump && r.target() == &Target::Drop));
        assert!(!web_egress.iter().any(|r| r.matches() == to_jump && r.target() == &Target::Accept));

        let jump_egress: Vec<&FirewallRule> = rules(&model, "jump", Table::Filter)
            .into_iter()
            .filter(|(c, _)| *c == "jump_egress")
            .map(|(_, r)| r)
            .collect();
        let to_app = format!("-d {app_ip} -p tcp --dport 22");
        let accept = jump_egress.iter().position(|r| r.matches() == to_app && r.target() == &Target::Accept);
        let drop = jump_egress.iter().position(|r| r.matches() == to_app && r.target() == &Target::Drop);
        assert!(accept.unwrap() < drop.unwrap());
    }

    #[test]
    fn internal_dnat_excludes_the_service_itself() {
        let model = model();
        let web_ip = model.machine("web").unwrap().ip().unwrap();
        let nat = rules(&model, "gw", Table::Nat);
        let internal = nat
            .iter()
            .find(|(_, r)| r.name() == "dnat_internal_web_443")
            .unwrap();
        assert!(internal.1.matches().starts_with(&format!("! -s {web_ip} -d 203.0.113.10")));
        assert_eq!(
            internal.1.target(),
            &Target::Dnat { to: SocketAddrV4::new(web_ip, 443) }
        );
        assert!(nat.iter().any(|(_, r)| r.name() == "dnat_web_443" && r.matches().starts_with("-i eth0")));
    }

    #[test]
    fn bandwidth_marks_use_category_settings() {
        let model = model();
        let mangle = rules(&model, "gw", Table::Mangle);
        let mark = mangle.iter().find(|(_, r)| r.name() == "mark_tv").unwrap();
        assert_eq!(mark.1.target(), &Target::Mark(7));
        assert!(mark.1.matches().contains(&format!("--connbytes {}:", 50 * 1024 * 1024)));
        assert!(mark.1.matches().contains("--connbytes-dir both"));

        let alert = mangle.iter().find(|(_, r)| r.name() == "alert_tv").unwrap();
        assert!(alert.1.matches().contains("-m limit"));
        assert!(alert.1.matches().contains("notify noc@example.org"));
        assert_eq!(alert.1.target(), &Target::log("bandwidth device: "));

        let web_mark = mangle.iter().find(|(_, r)| r.name() == "mark_web").unwrap();
        assert_eq!(web_mark.1.target(), &Target::Mark(3));
    }

    #[test]
    fn masquerade_only_when_something_is_online() {
        let model = model();
        let nat = rules(&model, "gw", Table::Nat);
        assert!(nat.iter().any(|(c, r)| *c == "POSTROUTING" && r.target() == &Target::Masquerade));

        let offline = NET.replace("internet = true", "");
        let model = NetworkModel::from_definition(&offline.parse::<NetworkDefinition>().unwrap()).unwrap();
        let nat = rules(&model, "gw", Table::Nat);
        assert!(!nat.iter().any(|(_, r)| r.target() == &Target::Masquerade));
    }
}
