#![cfg(test)]
//! An in-memory fleet that understands the shell commands units emit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rampart_core::transport::{CommandOutput, Transport};
use sha2::{Digest, Sha256};

const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";

/// What one fake machine looks like from the inside.
#[derive(Debug, Clone)]
pub struct MachineState {
    pub files: BTreeMap<String, Vec<u8>>,
    pub dirs: BTreeSet<String>,
    pub packages: BTreeSet<String>,
    pub services: BTreeSet<String>,
    /// Ruleset text handed to `iptables-restore`, if any.
    pub loaded_rules: Option<String>,
    pub restores: usize,
    pub reloads: usize,
}

impl Default for MachineState {
    fn default() -> Self {
        let dirs = ["/", "/etc", "/var", "/var/lib", "/tmp"]
            .into_iter()
            .map(String::from)
            .collect();
        let mut files = BTreeMap::new();
        files.insert("/etc/hosts".to_string(), b"127.0.0.1 localhost\n".to_vec());
        Self {
            files,
            dirs,
            packages: BTreeSet::new(),
            services: BTreeSet::new(),
            loaded_rules: None,
            restores: 0,
            reloads: 0,
        }
    }
}

impl MachineState {
    pub fn file(&self, path: &str) -> Option<String> {
        self.files.get(path).map(|c| String::from_utf8_lossy(c).into_owned())
    }

    fn mkdirs(&mut self, path: &str) {
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            self.dirs.insert(current.clone());
        }
    }

    fn parent_exists(&self, path: &str) -> bool {
        match path.rsplit_once('/') {
            Some(("", _)) => true,
            Some((parent, _)) => self.dirs.contains(parent),
            None => false,
        }
    }

    fn install(&mut self, package: &str) {
        self.packages.insert(package.to_string());
        if package == "openssh-server" {
            self.mkdirs("/etc/ssh");
            self.files
                .insert(SSHD_CONFIG.to_string(), b"#Port 22\nPermitRootLogin yes\n".to_vec());
        }
    }

    fn run(&mut self, command: &str, broken: &BTreeSet<String>) -> CommandOutput {
        let Ok(words) = shell_words::split(command) else {
            return failed(2, "sh: syntax error");
        };
        let words: Vec<&str> = words.iter().map(String::as_str).collect();

        match words.as_slice() {
            ["sha256sum", "--", path, ..] => match self.files.get(*path) {
                Some(content) => ok(hex::encode(Sha256::digest(content))),
                None => ok(""),
            },
            ["printf", "%s", chunk, redirect @ (">" | ">>"), path] => {
                if !self.parent_exists(path) {
                    return failed(1, "No such file or directory");
                }
                let file = self.files.entry(path.to_string()).or_default();
                if *redirect == ">" {
                    file.clear();
                }
                file.extend_from_slice(chunk.as_bytes());
                ok("")
            }
            ["base64", "-d", encoded, ">", _, "&&", "mv", "-f", _, path, "&&", "rm", "-f", _] => {
                if !self.parent_exists(path) {
                    return failed(1, "No such file or directory");
                }
                let Some(encoded) = self.files.remove(*encoded) else {
                    return failed(1, "base64: No such file or directory");
                };
                match STANDARD.decode(encoded) {
                    Ok(content) => {
                        self.files.insert(path.to_string(), content);
                        ok("")
                    }
                    Err(_) => failed(1, "base64: invalid input"),
                }
            }
            ["test", "!", "-s", path, "||", "test", "-z", _, "||", "echo", ">>", _, "&&", "printf", r"%s\n", line, ">>", _] => {
                if !self.parent_exists(path) {
                    return failed(1, "No such file or directory");
                }
                let file = self.files.entry(path.to_string()).or_default();
                if file.last().is_some_and(|b| *b != b'\n') {
                    file.push(b'\n');
                }
                file.extend_from_slice(line.as_bytes());
                file.push(b'\n');
                ok("")
            }
            ["test", "-d", path, "&&", "echo", word] => present(self.dirs.contains(*path), word),
            ["test", "-s", path, "&&", "echo", word] => {
                present(self.files.get(*path).is_some_and(|c| !c.is_empty()), word)
            }
            ["test", "-f", path, "&&", "grep", "-qxF", "--", line, _, "&&", "sed", "-E", expression, ..] => {
                let applied = self.file(path).is_some_and(|content| {
                    content.lines().any(|l| l == *line)
                        && substitute(&content, expression).as_deref() == Some(content.as_str())
                });
                present(applied, "applied")
            }
            ["mkdir", "-p", "-m", _, path] | ["mkdir", "-p", path] => {
                self.mkdirs(path);
                ok("")
            }
            ["rm", "-f", "--", path] => {
                self.files.remove(*path);
                ok("")
            }
            ["dpkg-query", "-W", _, package, ..] => {
                if self.packages.contains(*package) {
                    ok("install ok installed")
                } else {
                    failed(1, "dpkg-query: no packages found matching")
                }
            }
            ["DEBIAN_FRONTEND=noninteractive", "apt-get", "install", "-y", "-q", package] => {
                if broken.contains(*package) {
                    return failed(100, "E: Unable to locate package");
                }
                self.install(package);
                ok("")
            }
            ["systemctl", "is-active", service] => {
                if self.services.contains(*service) {
                    ok("active")
                } else {
                    CommandOutput::new(3, "inactive\n", "")
                }
            }
            ["systemctl", "enable", "--now", service] => {
                if *service == "ssh" && !self.packages.contains("openssh-server") {
                    return failed(5, "Unit ssh.service not found.");
                }
                self.services.insert(service.to_string());
                ok("")
            }
            ["grep", "-qxF", "--", line, path, "&&", "echo", word] => {
                let found = self
                    .file(path)
                    .is_some_and(|content| content.lines().any(|l| l == *line));
                present(found, word)
            }
            ["sed", "-E", "-i", expression, path] => {
                let Some(content) = self.file(path) else {
                    return failed(2, "sed: can't read file");
                };
                let Some(edited) = substitute(&content, expression) else {
                    return failed(1, "sed: unsupported expression");
                };
                self.files.insert(path.to_string(), edited.into_bytes());
                ok("")
            }
            ["cmp", "-s", left, right, "&&", "echo", word] => {
                let same = match (self.files.get(*left), self.files.get(*right)) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                };
                present(same, word)
            }
            ["iptables-restore", "<", rules, "&&", "mkdir", "-p", dir, "&&", "cp", "-f", _, copy] => {
                let Some(content) = self.files.get(*rules).cloned() else {
                    return failed(1, "No such file or directory");
                };
                self.loaded_rules = Some(String::from_utf8_lossy(&content).into_owned());
                self.restores += 1;
                self.mkdirs(dir);
                self.files.insert(copy.to_string(), content);
                ok("")
            }
            ["systemctl", "reload", service, "&&", "mkdir", "-p", dir, "&&", "cp", "-f", source, copy] => {
                if !self.services.contains(*service) {
                    return failed(1, "Job for service failed: not active");
                }
                let Some(content) = self.files.get(*source).cloned() else {
                    return failed(1, "No such file or directory");
                };
                self.reloads += 1;
                self.mkdirs(dir);
                self.files.insert(copy.to_string(), content);
                ok("")
            }
            _ => failed(127, "command not found"),
        }
    }
}

/// Applies the `s/^#?Key .*/line/` expressions configuration edits use.
fn substitute(content: &str, expression: &str) -> Option<String> {
    let body = expression.strip_prefix("s/")?.strip_suffix('/')?;
    let (pattern, line) = body.split_once('/')?;
    let prefix = pattern.strip_prefix('^')?.strip_suffix(".*")?;
    let (commented, prefix) = match prefix.strip_prefix("#?") {
        Some(rest) => (true, rest),
        None => (false, prefix),
    };

    let mut out = String::new();
    for current in content.lines() {
        let bare = if commented { current.strip_prefix('#').unwrap_or(current) } else { current };
        out.push_str(if bare.starts_with(prefix) { line } else { current });
        out.push('\n');
    }
    Some(out)
}

fn ok(stdout: impl Into<String>) -> CommandOutput {
    CommandOutput::new(0, stdout, "")
}

fn failed(status: i32, stderr: &str) -> CommandOutput {
    CommandOutput::new(status, "", stderr)
}

fn present(condition: bool, word: &str) -> CommandOutput {
    if condition { ok(format!("{word}\n")) } else { CommandOutput::new(1, "", "") }
}

/// True for commands that only look at a machine.
pub fn is_probe(command: &str) -> bool {
    let first = command.split_whitespace().next().unwrap_or_default();
    let looks = matches!(first, "sha256sum" | "test" | "dpkg-query" | "grep" | "cmp" | "stat")
        || command.starts_with("systemctl is-active");
    looks && !command.contains(" >")
}

#[derive(Default)]
pub struct FakeFleet {
    machines: Mutex<BTreeMap<String, MachineState>>,
    broken_packages: BTreeSet<String>,
    unreachable: BTreeSet<String>,
    log: Mutex<Vec<(String, String)>>,
}

impl FakeFleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installing `package` fails on every machine.
    pub fn with_broken_package(mut self, package: &str) -> Self {
        self.broken_packages.insert(package.to_string());
        self
    }

    pub fn with_unreachable(mut self, machine: &str) -> Self {
        self.unreachable.insert(machine.to_string());
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn state(&self, machine: &str) -> MachineState {
        self.machines.lock().unwrap().get(machine).cloned().unwrap_or_default()
    }

    /// Changes `machine` behind the engine's back.
    pub fn tamper(&self, machine: &str, change: impl FnOnce(&mut MachineState)) {
        let mut machines = self.machines.lock().unwrap();
        change(machines.entry(machine.to_string()).or_default());
    }

    pub fn commands(&self, machine: &str) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == machine)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn mutations(&self) -> Vec<(String, String)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| !is_probe(c))
            .cloned()
            .collect()
    }

    pub fn forget_commands(&self) {
        self.log.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for FakeFleet {
    async fn execute(&self, machine: &str, command: &str) -> anyhow::Result<CommandOutput> {
        self.log.lock().unwrap().push((machine.to_string(), command.to_string()));
        if self.unreachable.contains(machine) {
            anyhow::bail!("ssh: connect to host {machine} port 22: No route to host");
        }
        let mut machines = self.machines.lock().unwrap();
        let state = machines.entry(machine.to_string()).or_default();
        Ok(state.run(command, &self.broken_packages))
    }
}
