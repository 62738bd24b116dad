//! Local interpreter invocation with merged output capture.

use std::process::Stdio;

use tracing::warn;

/// Runs one controller-supplied command through a local interpreter —
/// enables test doubles for the beacon loop.
///
/// The command text is executed verbatim; no injection mitigation is
/// performed. That is an accepted property of this system: the
/// controller is the operator.
#[allow(async_fn_in_trait)]
pub trait CommandExecutor {
    /// Run `command` under the interpreter selected by `executor_tag`,
    /// blocking until the child exits, and return stdout followed by
    /// stderr as one text blob. Never fails: a spawn error yields empty
    /// text.
    async fn run(&self, executor_tag: &str, command: &str) -> String;
}

/// Production executor backed by the host's shells.
pub struct ShellExecutor;

/// Map an executor tag to an interpreter invocation.
///
/// `psh` and `pwsh` are aliases for the PowerShell family, invoked
/// non-interactively with profile loading and execution policy bypassed.
/// Every other tag falls through to the platform's default interpreter
/// with the command passed as a single inline argument.
fn interpreter(executor_tag: &str) -> (&'static str, &'static [&'static str]) {
    match executor_tag {
        "psh" | "pwsh" => {
            #[cfg(windows)]
            {
                ("powershell.exe", &["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command"])
            }
            #[cfg(not(windows))]
            {
                ("pwsh", &["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command"])
            }
        }
        _ => {
            #[cfg(windows)]
            {
                ("cmd.exe", &["/C"])
            }
            #[cfg(not(windows))]
            {
                ("/bin/sh", &["-c"])
            }
        }
    }
}

impl CommandExecutor for ShellExecutor {
    async fn run(&self, executor_tag: &str, command: &str) -> String {
        let (program, flags) = interpreter(executor_tag);
        let output = tokio::process::Command::new(program)
            .args(flags)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(out) => {
                let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&out.stderr));
                text
            }
            Err(e) => {
                warn!(program, error = %e, "interpreter failed to spawn");
                String::new()
            }
        }
    }
}
