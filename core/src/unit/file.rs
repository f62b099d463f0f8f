//! Units that converge the file system: file content, directories, ownership and modes.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use super::{Expectation, Probe, Unit, UnitHeader, quote, run_checked};
use crate::transport::Session;

/// Prints the sha256 of a file, or nothing if it does not exist.
pub(crate) fn sha256_probe(path: &str) -> String {
    format!("sha256sum -- {} 2>/dev/null | cut -d' ' -f1", quote(path))
}

pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Base64 characters sent per command, well under the kernel's 128 KiB limit on a
/// single argument.
const CHUNK_LEN: usize = 64 * 1024;

/// Materializes a file with exactly the given content.
///
/// Content travels base64 encoded in chunks appended to a transfer file, is
/// decoded next to the target and replaces it with a rename, so a reader never
/// sees a half-written file.
#[derive(Debug, Clone)]
pub struct FileUnit {
    pub(crate) header: UnitHeader,
    path: String,
    content: Vec<u8>,
    digest: String,
}

impl FileUnit {
    pub fn new(name: impl Into<String>, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        Self {
            header: UnitHeader::new(name),
            path: path.into(),
            digest: sha256_hex(&content),
            content,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    fn write_commands(&self) -> Vec<String> {
        let encoded = STANDARD.encode(&self.content);
        let staging = format!("{}.rampart", self.path);
        let transfer = quote(&format!("{staging}.b64"));

        // base64 is ascii, so every offset is a char boundary
        let mut commands: Vec<String> = (0..encoded.len().max(1))
            .step_by(CHUNK_LEN)
            .map(|start| {
                let chunk = &encoded[start..encoded.len().min(start + CHUNK_LEN)];
                let redirect = if start == 0 { ">" } else { ">>" };
                format!("printf '%s' {} {redirect} {transfer}", quote(chunk))
            })
            .collect();
        commands.push(format!(
            "base64 -d {transfer} > {staging} && mv -f {staging} {} && rm -f {transfer}",
            quote(&self.path),
            staging = quote(&staging),
        ));
        commands
    }
}

#[async_trait]
impl Unit for FileUnit {
    fn header(&self) -> &UnitHeader {
        &self.header
    }

    fn expectation(&self) -> Expectation {
        Expectation::equals(self.digest.clone())
    }

    async fn audit(&self, session: &Session) -> anyhow::Result<Probe> {
        Ok(session.run(&sha256_probe(&self.path)).await?.into())
    }

    async fn config(&self, session: &Session) -> anyhow::Result<()> {
        for command in self.write_commands() {
            run_checked(session, &command).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryUnit {
    pub(crate) header: UnitHeader,
    path: String,
    mode: Option<u32>,
}

impl DirectoryUnit {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            header: UnitHeader::new(name),
            path: path.into(),
            mode: None,
        }
    }

    /// Mode given to directories this unit creates. Existing ones are left alone.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }
}

#[async_trait]
impl Unit for DirectoryUnit {
    fn header(&self) -> &UnitHeader {
        &self.header
    }

    fn expectation(&self) -> Expectation {
        Expectation::equals("present")
    }

    async fn audit(&self, session: &Session) -> anyhow::Result<Probe> {
        let probe = format!("test -d {} && echo present", quote(&self.path));
        Ok(session.run(&probe).await?.into())
    }

    async fn config(&self, session: &Session) -> anyhow::Result<()> {
        let command = match self.mode {
            Some(mode) => format!("mkdir -p -m {mode:o} {}", quote(&self.path)),
            None => format!("mkdir -p {}", quote(&self.path)),
        };
        run_checked(session, &command).await
    }
}

/// Owner and group of a path, as `user:group`.
#[derive(Debug, Clone)]
pub struct OwnershipUnit {
    pub(crate) header: UnitHeader,
    path: String,
    owner: String,
}

impl OwnershipUnit {
    pub fn new(name: impl Into<String>, path: impl Into<String>, user: &str, group: &str) -> Self {
        Self {
            header: UnitHeader::new(name),
            path: path.into(),
            owner: format!("{user}:{group}"),
        }
    }
}

#[async_trait]
impl Unit for OwnershipUnit {
    fn header(&self) -> &UnitHeader {
        &self.header
    }

    fn expectation(&self) -> Expectation {
        Expectation::equals(self.owner.clone())
    }

    async fn audit(&self, session: &Session) -> anyhow::Result<Probe> {
        let probe = format!("stat -c %U:%G -- {}", quote(&self.path));
        Ok(session.run(&probe).await?.into())
    }

    async fn config(&self, session: &Session) -> anyhow::Result<()> {
        let command = format!("chown {} -- {}", quote(&self.owner), quote(&self.path));
        run_checked(session, &command).await
    }
}

#[derive(Debug, Clone)]
pub struct PermissionsUnit {
    pub(crate) header: UnitHeader,
    path: String,
    mode: u32,
}

impl PermissionsUnit {
    pub fn new(name: impl Into<String>, path: impl Into<String>, mode: u32) -> Self {
        Self {
            header: UnitHeader::new(name),
            path: path.into(),
            mode,
        }
    }
}

#[async_trait]
impl Unit for PermissionsUnit {
    fn header(&self) -> &UnitHeader {
        &self.header
    }

    fn expectation(&self) -> Expectation {
        // stat prints modes without leading zeros
        Expectation::equals(format!("{:o}", self.mode))
    }

    async fn audit(&self, session: &Session) -> anyhow::Result<Probe> {
        let probe = format!("stat -c %a -- {}", quote(&self.path));
        Ok(session.run(&probe).await?.into())
    }

    async fn config(&self, session: &Session) -> anyhow::Result<()> {
        let command = format!("chmod {:o} -- {}", self.mode, quote(&self.path));
        run_checked(session, &command).await
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
