use async_trait::async_trait;

use super::{Expectation, Probe, Unit, UnitHeader, quote, run_checked};
use crate::transport::Session;

/// Prints `present` when `line` is one of the lines of `path`.
fn line_probe(path: &str, line: &str) -> String {
    format!("grep -qxF -- {} {} && echo present", quote(line), quote(path))
}

/// Appends `line`, first closing a last line that lacks its newline.
fn append_command(path: &str, line: &str) -> String {
    let path = quote(path);
    format!(
        "test ! -s {path} || test -z \"$(tail -c1 {path})\" || echo >> {path} && printf '%s\\n' {} >> {path}",
        quote(line)
    )
}

/// Appends a line to a file unless the exact line is already there.
#[derive(Debug, Clone)]
pub struct AppendUnit {
    pub(crate) header: UnitHeader,
    path: String,
    line: String,
}

impl AppendUnit {
    pub fn new(name: impl Into<String>, path: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            header: UnitHeader::new(name),
            path: path.into(),
            line: line.into(),
        }
    }
}

#[async_trait]
impl Unit for AppendUnit {
    fn header(&self) -> &UnitHeader {
        &self.header
    }

    fn expectation(&self) -> Expectation {
        Expectation::equals("present")
    }

    async fn audit(&self, session: &Session) -> anyhow::Result<Probe> {
        Ok(session.run(&line_probe(&self.path, &self.line)).await?.into())
    }

    async fn config(&self, session: &Session) -> anyhow::Result<()> {
        run_checked(session, &append_command(&self.path, &self.line)).await
    }
}

/// Escapes the `/` delimiter where the pattern does not already.
fn escape_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut escaped = false;
    for c in pattern.chars() {
        if c == '/' && !escaped {
            out.push('\\');
        }
        escaped = c == '\\' && !escaped;
        out.push(c);
    }
    out
}

/// A literal sed replacement.
fn escape_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
        if matches!(c, '\\' | '/' | '&') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Sets a configuration line: every line matching a `sed -E` pattern is replaced
/// with `line`, and `line` is appended when nothing matched.
///
/// The file is converged once `line` is present and the substitution no longer
/// changes anything, so `line` must itself match the pattern.
#[derive(Debug, Clone)]
pub struct RegexEditUnit {
    pub(crate) header: UnitHeader,
    path: String,
    line: String,
    expression: String,
}

impl RegexEditUnit {
    pub fn new(name: impl Into<String>, path: impl Into<String>, pattern: &str, line: impl Into<String>) -> Self {
        let line = line.into();
        Self {
            header: UnitHeader::new(name),
            path: path.into(),
            expression: format!("s/{}/{}/", escape_pattern(pattern), escape_line(&line)),
            line,
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn line(&self) -> &str {
        &self.line
    }
}

#[async_trait]
impl Unit for RegexEditUnit {
    fn header(&self) -> &UnitHeader {
        &self.header
    }

    fn expectation(&self) -> Expectation {
        Expectation::equals("applied")
    }

    async fn audit(&self, session: &Session) -> anyhow::Result<Probe> {
        let path = quote(&self.path);
        let probe = format!(
            "test -f {path} && grep -qxF -- {} {path} && sed -E {} {path} | cmp -s - {path} && echo applied",
            quote(&self.line),
            quote(&self.expression)
        );
        Ok(session.run(&probe).await?.into())
    }

    async fn config(&self, session: &Session) -> anyhow::Result<()> {
        let command = format!("sed -E -i {} {}", quote(&self.expression), quote(&self.path));
        run_checked(session, &command).await?;

        let present = session.run(&line_probe(&self.path, &self.line)).await?;
        if !present.success() {
            run_checked(session, &append_command(&self.path, &self.line)).await?;
        }
        Ok(())
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
