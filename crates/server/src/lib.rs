//! Starting a browser with remote debugging enabled.
//!
//! The browser is killed when the [`Browser`] handle is dropped unless it
//! was detached. Readiness is not checked here: wait on the discovery
//! endpoint afterwards.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use eyre::WrapErr;

/// Port browsers conventionally use for remote debugging.
pub const DEFAULT_DEBUGGING_PORT: u16 = 9222;

/// Binary names tried, in order, when no command line is given.
const CHROME_BINARIES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Split a shell-style command line into program and arguments.
pub fn split_command_line(command: &str) -> eyre::Result<Vec<String>> {
    let parts = shlex::split(command)
        .ok_or_else(|| eyre::eyre!("unbalanced quoting in command line: {command}"))?;
    if parts.is_empty() {
        eyre::bail!("empty command line");
    }
    Ok(parts)
}

/// Arguments for a headless browser listening on `port`.
pub fn default_args(port: u16) -> Vec<String> {
    vec![
        format!("--remote-debugging-port={port}"),
        "--headless".to_string(),
        "--disable-extensions".to_string(),
        "about:blank".to_string(),
    ]
}

/// First Chrome or Chromium binary found on `PATH`.
pub fn find_chrome() -> eyre::Result<PathBuf> {
    CHROME_BINARIES
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| {
            eyre::eyre!(
                "no Chrome or Chromium found in PATH (tried {}). Pass the command line explicitly",
                CHROME_BINARIES.join(", ")
            )
        })
}

/// A running browser process.
pub struct Browser {
    child: Option<Child>,
}

impl Browser {
    /// Start `program` with `args`.
    pub fn spawn<I, S>(program: impl AsRef<OsStr>, args: I) -> eyre::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        tracing::debug!(program = ?program, "starting browser process");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .wrap_err_with(|| format!("spawning {}", program.to_string_lossy()))?;

        tracing::debug!(pid = child.id(), "browser started");
        Ok(Self { child: Some(child) })
    }

    /// Start a browser from a shell-style command line.
    pub fn from_command_line(command: &str) -> eyre::Result<Self> {
        let parts = split_command_line(command).context("parsing browser command line")?;
        let (program, args) = parts
            .split_first()
            .ok_or_else(|| eyre::eyre!("empty command line"))?;
        Self::spawn(program, args)
    }

    /// Start the first Chrome found on `PATH`, headless, debugging on `port`.
    pub fn chrome_on_port(port: u16) -> eyre::Result<Self> {
        let chrome = find_chrome()?;
        Self::spawn(chrome, default_args(port))
    }

    /// Process id, unless detached.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Whether the process has already exited.
    pub fn has_exited(&mut self) -> eyre::Result<bool> {
        match self.child.as_mut() {
            Some(child) => Ok(child
                .try_wait()
                .context("checking browser process status")?
                .is_some()),
            None => Ok(false),
        }
    }

    /// Leave the browser running after this handle goes away.
    pub fn detach(mut self) -> Option<Child> {
        self.child.take()
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        tracing::debug!("terminating browser");
        match child.kill() {
            Ok(_) => {
                tracing::debug!("browser terminated");
                let _ = child.wait();
            }
            Err(e) => tracing::warn!(error = %e, "could not terminate browser process"),
        }
    }
}
