//! Host identity facts, computed once at startup.

use std::env;
use std::path::Path;

use anyhow::{Context, Result};

/// Immutable per-process identity reported to the controller.
///
/// The `paw` token is the executable's file stem, so it is deterministic
/// for a given deployment and stable across every contact the process
/// makes — the controller uses it to correlate beacons from the same
/// logical agent.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Stable correlation token.
    pub paw: String,
    /// Machine hostname.
    pub host: String,
    /// Name of the user the process runs as.
    pub username: String,
    /// OS tag: `windows`, `linux`, or `darwin`.
    pub platform: &'static str,
    /// CPU architecture tag: `x64`, `x86`, `arm64`, or the raw value.
    pub architecture: &'static str,
    /// `Elevated` or `User`.
    pub privilege: &'static str,
    /// Full path of the running executable.
    pub location: String,
    /// File name of the running executable.
    pub exe_name: String,
    /// Process id.
    pub pid: u32,
    /// Parent process id; 0 when the platform cannot report it.
    pub ppid: u32,
    /// Ordered interpreter tags this host can service.
    pub executors: Vec<String>,
}

impl Identity {
    /// Gather identity facts from the running process and host.
    ///
    /// # Errors
    ///
    /// Returns an error if the executable path cannot be resolved, since
    /// the paw token is derived from it.
    pub fn detect() -> Result<Self> {
        let exe = env::current_exe().context("resolving executable path")?;
        let exe_name = file_name(&exe);
        let paw = exe
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .context("executable path has no file name")?;

        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(Self {
            paw,
            host,
            username: current_username(),
            platform: platform_tag(),
            architecture: architecture_tag(),
            privilege: privilege_tag(),
            location: exe.to_string_lossy().into_owned(),
            exe_name,
            pid: std::process::id(),
            ppid: parent_pid(),
            executors: supported_executors(),
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn current_username() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn platform_tag() -> &'static str {
    // Controllers in this family expect "darwin", not "macos".
    match env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn architecture_tag() -> &'static str {
    match env::consts::ARCH {
        "x86_64" => "x64",
        "x86" => "x86",
        "aarch64" => "arm64",
        other => other,
    }
}

#[cfg(unix)]
fn privilege_tag() -> &'static str {
    // SAFETY: geteuid has no preconditions and cannot fail.
    if unsafe { libc::geteuid() } == 0 {
        "Elevated"
    } else {
        "User"
    }
}

#[cfg(windows)]
fn privilege_tag() -> &'static str {
    // Opening the SAM hive succeeds only for administrators.
    if std::fs::File::open(r"C:\Windows\System32\config\SAM").is_ok() {
        "Elevated"
    } else {
        "User"
    }
}

#[cfg(unix)]
fn parent_pid() -> u32 {
    // SAFETY: getppid has no preconditions and cannot fail.
    let ppid = unsafe { libc::getppid() };
    u32::try_from(ppid).unwrap_or(0)
}

#[cfg(windows)]
fn parent_pid() -> u32 {
    0
}

#[cfg(windows)]
fn supported_executors() -> Vec<String> {
    ["cmd", "psh", "pwsh"].map(String::from).to_vec()
}

#[cfg(not(windows))]
fn supported_executors() -> Vec<String> {
    ["sh", "pwsh"].map(String::from).to_vec()
}
