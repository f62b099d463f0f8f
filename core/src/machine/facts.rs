use std::collections::BTreeSet;

/// Free-form facts profiles register about a machine.
///
/// Other profiles read them back, for example to open the listening ports of a
/// service in a peer's firewall.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facts {
    usernames: BTreeSet<String>,
    processes: BTreeSet<String>,
    listening_ports: BTreeSet<u16>,
}

impl Facts {
    /// Returns `false` if the fact was already known.
    pub fn add_username(&mut self, name: impl Into<String>) -> bool {
        self.usernames.insert(name.into())
    }

    pub fn add_process(&mut self, process: impl Into<String>) -> bool {
        self.processes.insert(process.into())
    }

    pub fn add_listening_port(&mut self, port: u16) -> bool {
        self.listening_ports.insert(port)
    }

    pub fn usernames(&self) -> &BTreeSet<String> {
        &self.usernames
    }

    pub fn processes(&self) -> &BTreeSet<String> {
        &self.processes
    }

    pub fn listening_ports(&self) -> &BTreeSet<u16> {
        &self.listening_ports
    }
}
