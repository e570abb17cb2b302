//! Locating external executables and the Hugo site root.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, warn};

use super::config::{BlogConfig, ToolsConfig};

/// Directories where package managers commonly install hugo and go but which a
/// GUI-launched process may not have on `PATH`.
pub const COMMON_BIN_DIRS: &[&str] = &[
    "/opt/homebrew/bin",
    "/usr/local/bin",
    "/usr/local/go/bin",
    "/usr/bin",
];

const SITE_CONFIG_FILES: &[&str] = &[
    "hugo.toml",
    "hugo.yaml",
    "hugo.yml",
    "config.toml",
    "config.yaml",
    "config.yml",
];

/// Resolved executables plus the limits every invocation runs under.
#[derive(Debug, Clone)]
pub struct Tools {
    pub hugo: PathBuf,
    pub git: PathBuf,
    pub go: Option<PathBuf>,
    pub timeout: Duration,
    pub push_timeout: Duration,
    pub output_limit_bytes: usize,
    path_env: Option<OsString>,
}

impl Tools {
    /// Resolve executables from config, then `PATH`, then [`COMMON_BIN_DIRS`].
    ///
    /// An unresolved tool keeps its bare name so that invoking it reports
    /// `ToolNotFound` at the call site rather than here.
    pub fn resolve(cfg: &ToolsConfig) -> Self {
        let hugo = resolve_executable(cfg.hugo.as_deref(), "hugo")
            .unwrap_or_else(|| PathBuf::from("hugo"));
        let git =
            resolve_executable(cfg.git.as_deref(), "git").unwrap_or_else(|| PathBuf::from("git"));
        let go = resolve_executable(cfg.go.as_deref(), "go");
        let path_env = augmented_path(&[Some(&hugo), go.as_ref()]);
        debug!(hugo = %hugo.display(), git = %git.display(), "resolved tools");
        Self {
            hugo,
            git,
            go,
            timeout: cfg.timeout(),
            push_timeout: cfg.push_timeout(),
            output_limit_bytes: cfg.output_limit_bytes,
            path_env,
        }
    }

    /// Command for `program` with the augmented `PATH` applied.
    ///
    /// Hugo modules shell out to `go`, so the child needs to find it even when
    /// this process was started without a login shell.
    pub fn command(&self, program: &Path) -> Command {
        let mut cmd = Command::new(program);
        if let Some(path) = &self.path_env {
            cmd.env("PATH", path);
        }
        cmd
    }
}

/// Find an executable: an existing configured path wins, then `which`, then the
/// common install locations.
pub fn resolve_executable(configured: Option<&Path>, name: &str) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        if let Ok(found) = which::which(path) {
            return Some(found);
        }
        warn!(path = %path.display(), "configured {name} not found, falling back to auto-detection");
    }
    if let Ok(found) = which::which(name) {
        return Some(found);
    }
    COMMON_BIN_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(name))
        .find(|candidate| candidate.is_file())
}

fn augmented_path(tools: &[Option<&PathBuf>]) -> Option<OsString> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for tool in tools.iter().flatten() {
        if let Some(parent) = tool.parent()
            && !parent.as_os_str().is_empty()
            && !dirs.iter().any(|d| d == parent)
        {
            dirs.push(parent.to_path_buf());
        }
    }
    for dir in COMMON_BIN_DIRS {
        let dir = PathBuf::from(dir);
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    if let Some(existing) = env::var_os("PATH") {
        dirs.extend(env::split_paths(&existing));
    }
    match env::join_paths(dirs) {
        Ok(joined) => Some(joined),
        Err(e) => {
            warn!(err = %e, "cannot build PATH for child processes, inheriting");
            None
        }
    }
}

/// True when `path` has a Hugo config file and a `content/` directory.
pub fn is_hugo_site(path: &Path) -> bool {
    let has_config = SITE_CONFIG_FILES
        .iter()
        .any(|name| path.join(name).is_file());
    has_config && path.join("content").is_dir()
}

/// Site root: the configured path, else `./playground`, else the current directory.
///
/// Returns the first candidate even when it is not a Hugo site; the content
/// lister reports that precisely.
pub fn resolve_site_root(cfg: &BlogConfig, cwd: &Path) -> PathBuf {
    if let Some(path) = &cfg.site.path {
        return if path.is_absolute() {
            path.clone()
        } else {
            cwd.join(path)
        };
    }
    let playground = cwd.join("playground");
    if is_hugo_site(&playground) {
        return playground;
    }
    cwd.to_path_buf()
}
