//! Units that bring content in from the network.
//!
//! A download and the check of its checksum are always two units, the checksum
//! running after the download. [`ChecksumUnit::for_download`] only accepts the
//! handle of the download it verifies, so the pair cannot be merged or reordered.

use async_trait::async_trait;

use super::file::sha256_probe;
use super::{Expectation, Probe, ShellUnit, Unit, UnitHandle, UnitHeader, quote, run_checked};
use crate::transport::Session;

/// Clones a repository once. Existing clones are never touched again.
#[derive(Debug, Clone)]
pub struct GitCloneUnit {
    pub(crate) header: UnitHeader,
    url: String,
    destination: String,
}

impl GitCloneUnit {
    /// `reachable` is the unit proving the remote can be reached, see [`GitCloneUnit::reachability`].
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        destination: impl Into<String>,
        reachable: &UnitHandle,
    ) -> Self {
        Self {
            header: UnitHeader::new(name),
            url: url.into(),
            destination: destination.into(),
        }
        .after(reachable)
    }

    /// A probe-only unit that passes while `url` answers.
    pub fn reachability(name: impl Into<String>, url: &str) -> ShellUnit {
        let probe = format!("git ls-remote --exit-code {} HEAD >/dev/null 2>&1 && echo reachable", quote(url));
        ShellUnit::new(name, probe, "true", Expectation::equals("reachable"))
            .with_remediation(format!("check that {url} is reachable from the machine"))
    }
}

#[async_trait]
impl Unit for GitCloneUnit {
    fn header(&self) -> &UnitHeader {
        &self.header
    }

    fn expectation(&self) -> Expectation {
        Expectation::equals("cloned")
    }

    async fn audit(&self, session: &Session) -> anyhow::Result<Probe> {
        let marker = format!("{}/.git", self.destination);
        let probe = format!("test -d {} && echo cloned", quote(&marker));
        Ok(session.run(&probe).await?.into())
    }

    async fn config(&self, session: &Session) -> anyhow::Result<()> {
        let command = format!("git clone -q -- {} {}", quote(&self.url), quote(&self.destination));
        run_checked(session, &command).await
    }
}

/// Fetches a file if it is not there yet.
#[derive(Debug, Clone)]
pub struct DownloadUnit {
    pub(crate) header: UnitHeader,
    url: String,
    destination: String,
}

impl DownloadUnit {
    pub fn new(name: impl Into<String>, url: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            header: UnitHeader::new(name),
            url: url.into(),
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }
}

#[async_trait]
impl Unit for DownloadUnit {
    fn header(&self) -> &UnitHeader {
        &self.header
    }

    fn expectation(&self) -> Expectation {
        Expectation::equals("present")
    }

    async fn audit(&self, session: &Session) -> anyhow::Result<Probe> {
        let probe = format!("test -s {} && echo present", quote(&self.destination));
        Ok(session.run(&probe).await?.into())
    }

    async fn config(&self, session: &Session) -> anyhow::Result<()> {
        let partial = format!("{}.part", self.destination);
        let command = format!(
            "curl -fsSL -o {partial} -- {} && mv -f {partial} {}",
            quote(&self.url),
            quote(&self.destination),
            partial = quote(&partial),
        );
        run_checked(session, &command).await
    }
}

/// Checks a downloaded file against a known sha256.
///
/// A mismatching artifact is deleted, so the next run downloads it again, and
/// the unit fails.
#[derive(Debug, Clone)]
pub struct ChecksumUnit {
    pub(crate) header: UnitHeader,
    path: String,
    sha256: String,
}

impl ChecksumUnit {
    pub fn for_download(
        name: impl Into<String>,
        download: &UnitHandle,
        path: impl Into<String>,
        sha256: impl Into<String>,
    ) -> Self {
        let path = path.into();
        let mut header = UnitHeader::new(name);
        header.remediation = format!("the artifact at {path} does not match its checksum; check the source");
        Self {
            header,
            path,
            sha256: sha256.into().to_ascii_lowercase(),
        }
        .after(download)
    }
}

#[async_trait]
impl Unit for ChecksumUnit {
    fn header(&self) -> &UnitHeader {
        &self.header
    }

    fn expectation(&self) -> Expectation {
        Expectation::equals(self.sha256.clone())
    }

    async fn audit(&self, session: &Session) -> anyhow::Result<Probe> {
        Ok(session.run(&sha256_probe(&self.path)).await?.into())
    }

    async fn config(&self, session: &Session) -> anyhow::Result<()> {
        run_checked(session, &format!("rm -f -- {}", quote(&self.path))).await
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
