//! Detached process spawning.
//!
//! Launchers, exec keybindings, and the autostart script all go through
//! here. Children are put in their own session so they survive the
//! window manager exiting.

use std::path::Path;
use std::process::Command;

/// Spawn a command string in a detached child.
///
/// The string is tilde-expanded and split on whitespace; quoting is not
/// interpreted, launchers needing shell syntax should go through a script.
pub fn spawn(command: &str) {
    let expanded = shellexpand::tilde(command);
    let parts: Vec<&str> = expanded.split_whitespace().collect();

    let Some((program, args)) = parts.split_first() else {
        log::warn!("Empty spawn command");
        return;
    };

    log::info!("Spawning '{}'", command);
    let mut cmd = Command::new(program);
    cmd.args(args);
    detach(&mut cmd);

    if let Err(e) = cmd.spawn() {
        log::error!("Failed to spawn '{}': {}", command, e);
    }
}

/// Run the autostart script through `sh` if it exists
pub fn run_autostart(path: &Path) {
    if !path.exists() {
        log::info!("No autostart script at {:?}", path);
        return;
    }
    log::info!("Running autostart script {:?}", path);
    let mut cmd = Command::new("sh");
    cmd.arg(path);
    detach(&mut cmd);
    if let Err(e) = cmd.spawn() {
        log::error!("Failed to run autostart script: {}", e);
    }
}

/// Detach a child from our process group so it survives us
fn detach(cmd: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
    }
}

/// Let the runtime reap children so spawned launchers never zombify
pub fn ignore_sigchld() {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGCHLD, libc::SIG_IGN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_tolerates_empty_and_missing_commands() {
        // Both paths log and return without panicking
        spawn("");
        spawn("   ");
        spawn("definitely-not-a-real-binary-name --flag");
    }

    #[test]
    fn autostart_skips_missing_script() {
        run_autostart(Path::new("/nonexistent/autostart"));
    }
}
