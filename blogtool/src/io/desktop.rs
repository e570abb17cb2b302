//! Open URLs and folders with the desktop's handlers.
//!
//! Linux desktops disagree on which opener works, so each request walks a
//! platform-ordered candidate list and stops at the first launcher that works.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::io::process::OutputCapture;

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(10);
const STDERR_LIMIT: usize = 16 * 1024;

/// Stderr fragments printed by `xdg-open` when it exits "successfully" on a
/// broken desktop integration.
const XDG_OPEN_BROKEN: &[&str] = &[
    "kfmclient: command not found",
    "integer expression expected",
    "No such file or directory",
];

/// Every candidate failed; `attempts` holds `(program, reason)` in order.
#[derive(Debug, Error)]
#[error("could not open {target}: {}", summarize(.attempts))]
pub struct LaunchError {
    pub target: String,
    pub attempts: Vec<(String, String)>,
}

fn summarize(attempts: &[(String, String)]) -> String {
    if attempts.is_empty() {
        return "no launcher available on this platform".to_string();
    }
    attempts
        .iter()
        .map(|(program, reason)| format!("{program}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Open `url` in a web browser. Returns the program that handled it.
pub fn open_url(url: &str) -> Result<String, LaunchError> {
    launch_first(url, &url_launchers(), LAUNCH_TIMEOUT)
}

/// Open `path` in a file manager. Returns the program that handled it.
pub fn open_folder(path: &Path) -> Result<String, LaunchError> {
    let target = path.display().to_string();
    launch_first(&target, &folder_launchers(), LAUNCH_TIMEOUT)
}

fn url_launchers() -> Vec<&'static str> {
    if cfg!(target_os = "macos") {
        vec!["open"]
    } else if cfg!(windows) {
        vec!["explorer"]
    } else {
        vec![
            "xdg-open",
            "sensible-browser",
            "firefox",
            "chromium",
            "google-chrome",
            "vivaldi",
        ]
    }
}

fn folder_launchers() -> Vec<&'static str> {
    if cfg!(target_os = "macos") {
        vec!["open"]
    } else if cfg!(windows) {
        vec!["explorer"]
    } else {
        vec!["xdg-open", "dolphin", "nautilus", "thunar", "pcmanfm"]
    }
}

/// Try `programs` in order with `target` as the only argument.
///
/// A launcher still running at `timeout` counts as launched and is left alone:
/// browsers often keep the process that opened them.
#[instrument(skip_all, fields(open = %target))]
pub fn launch_first(
    target: &str,
    programs: &[&str],
    timeout: Duration,
) -> Result<String, LaunchError> {
    let mut attempts = Vec::new();
    for program in programs {
        match launch(program, target, timeout) {
            Ok(()) => {
                info!(program, "opened");
                return Ok(program.to_string());
            }
            Err(reason) => {
                debug!(program, %reason, "launcher failed, trying next");
                attempts.push((program.to_string(), reason));
            }
        }
    }
    warn!(attempts = attempts.len(), "no launcher worked");
    Err(LaunchError {
        target: target.to_string(),
        attempts,
    })
}

fn launch(program: &str, target: &str, timeout: Duration) -> Result<(), String> {
    let mut child = Command::new(program)
        .arg(target)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => "not installed".to_string(),
            _ => format!("spawn failed: {e}"),
        })?;

    let stderr = OutputCapture::default();
    let reader = child
        .stderr
        .take()
        .map(|pipe| stderr.drain(pipe, STDERR_LIMIT));

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => return Ok(()),
        Err(e) => return Err(format!("wait failed: {e}")),
    };
    if let Some(reader) = reader {
        let deadline = Instant::now() + Duration::from_millis(500);
        while !reader.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    let stderr = stderr.snapshot();
    if is_broken_xdg_open(program, &stderr) {
        return Err(format!("broken desktop integration: {}", stderr.trim()));
    }
    if !status.success() {
        let detail = stderr.trim();
        return Err(if detail.is_empty() {
            format!("exited with {status}")
        } else {
            format!("exited with {status}: {detail}")
        });
    }
    Ok(())
}

fn is_broken_xdg_open(program: &str, stderr: &str) -> bool {
    program == "xdg-open" && XDG_OPEN_BROKEN.iter().any(|sig| stderr.contains(sig))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broken_signatures_apply_only_to_xdg_open() {
        let stderr = "/usr/bin/xdg-open: line 881: kfmclient: command not found";
        assert!(is_broken_xdg_open("xdg-open", stderr));
        assert!(!is_broken_xdg_open("firefox", stderr));
        assert!(!is_broken_xdg_open("xdg-open", "Opening in existing browser session."));
    }

    #[test]
    fn reports_every_attempt() {
        let err = launch_first(
            "http://localhost:1313/",
            &["blogtool-no-such-opener", "blogtool-no-such-browser"],
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert_eq!(err.attempts.len(), 2);
        assert!(err.to_string().contains("blogtool-no-such-opener: not installed"));
    }

    #[cfg(unix)]
    #[test]
    fn falls_through_to_working_launcher() {
        let used = launch_first("/tmp", &["blogtool-no-such-opener", "true"], Duration::from_secs(5))
            .expect("launch");
        assert_eq!(used, "true");
    }

    #[cfg(unix)]
    #[test]
    fn still_running_counts_as_launched() {
        let used = launch_first("5", &["sleep"], Duration::from_millis(200)).expect("launch");
        assert_eq!(used, "sleep");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_a_failure() {
        let err = launch_first("/tmp", &["false"], Duration::from_secs(5)).unwrap_err();
        assert!(err.attempts[0].1.contains("exited with"));
    }
}
