//! Test-only helpers: throwaway Hugo sites, git repositories, and fake tools.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tempfile::TempDir;

use crate::io::config::{BlogConfig, ToolsConfig};
use crate::io::server::{ReadinessProbe, ServerSettings};
use crate::io::tools::Tools;

/// Minimal Hugo site: `hugo.toml` plus an empty `content/microposts/`.
pub struct TestSite {
    temp: TempDir,
}

impl TestSite {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        scaffold_site(temp.path())?;
        Ok(Self { temp })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Write `contents` to `rel` under the site root, creating parents.
    pub fn write(&self, rel: &str, contents: &str) -> Result<PathBuf> {
        write_file(self.path(), rel, contents)
    }

    /// Config pointing at this site with drafting disabled.
    pub fn config(&self) -> BlogConfig {
        config_for(self.path())
    }
}

/// Git repository holding a Hugo site.
///
/// [`TestRepo::new`] has no remote. [`TestRepo::cloned`] is a fresh clone of a
/// bare remote that already has the initial commit.
pub struct TestRepo {
    _temp: TempDir,
    work: PathBuf,
    remote: Option<PathBuf>,
}

impl TestRepo {
    /// Initialized repository on `main` with one commit containing the site scaffold.
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let work = temp.path().join("work");
        fs::create_dir_all(&work).context("create work dir")?;
        init_repo(&work)?;
        scaffold_site(&work)?;
        git(&work, &["add", "-A"])?;
        git(&work, &["commit", "-m", "Initial site"])?;
        Ok(Self {
            _temp: temp,
            work,
            remote: None,
        })
    }

    /// Clone of a bare remote whose `main` already has the site scaffold.
    pub fn cloned() -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let remote = temp.path().join("remote.git");
        let seed = temp.path().join("seed");
        let work = temp.path().join("work");

        git(temp.path(), &["init", "--bare", "remote.git"])?;
        git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"])?;

        fs::create_dir_all(&seed).context("create seed dir")?;
        init_repo(&seed)?;
        scaffold_site(&seed)?;
        git(&seed, &["add", "-A"])?;
        git(&seed, &["commit", "-m", "Initial site"])?;
        git(&seed, &["remote", "add", "origin", &path_str(&remote)?])?;
        git(&seed, &["push", "-u", "origin", "main"])?;

        git(temp.path(), &["clone", "remote.git", "work"])?;
        configure_identity(&work)?;
        Ok(Self {
            _temp: temp,
            work,
            remote: Some(remote),
        })
    }

    pub fn path(&self) -> &Path {
        &self.work
    }

    pub fn write(&self, rel: &str, contents: &str) -> Result<PathBuf> {
        write_file(&self.work, rel, contents)
    }

    /// Run git in the work tree and return stdout.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        git(&self.work, args)
    }

    pub fn commit_count(&self) -> Result<usize> {
        let out = self.git(&["rev-list", "--count", "HEAD"])?;
        out.trim().parse().context("parse commit count")
    }

    /// Make pushes fail by removing the remote repository.
    pub fn break_remote(&self) -> Result<()> {
        let Some(remote) = &self.remote else {
            bail!("repository has no remote");
        };
        fs::remove_dir_all(remote).with_context(|| format!("remove {}", remote.display()))
    }

    pub fn config(&self) -> BlogConfig {
        config_for(&self.work)
    }
}

/// Readiness probe that answers `true` from the `ready_after`-th call on.
#[derive(Clone)]
pub struct ScriptedProbe {
    ready_after: Option<usize>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn ready() -> Self {
        Self::ready_after(1)
    }

    pub fn ready_after(calls: usize) -> Self {
        Self {
            ready_after: Some(calls),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn never() -> Self {
        Self {
            ready_after: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of probes so far, shared between clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReadinessProbe for ScriptedProbe {
    fn is_ready(&self, _url: &str) -> bool {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.ready_after.is_some_and(|after| n >= after)
    }
}

/// Server settings with short timeouts for a fake `hugo` at `hugo`.
pub fn server_settings(hugo: &Path, site_root: &Path) -> ServerSettings {
    let tools = Tools::resolve(&ToolsConfig {
        hugo: Some(hugo.to_path_buf()),
        ..ToolsConfig::default()
    });
    ServerSettings {
        tools,
        site_root: site_root.to_path_buf(),
        host: "127.0.0.1".to_string(),
        port: 1313,
        startup_timeout: Duration::from_secs(2),
        stop_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(20),
    }
}

/// Write an executable `/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("chmod {}", path.display()))?;
    Ok(path)
}

/// Line a fake `hugo server` prints once it is "listening".
pub const SERVE_BANNER: &str = "Web Server is available at http://127.0.0.1:1313/ (bind address 127.0.0.1)";

/// Body of a fake `hugo server` that announces itself and then idles.
pub fn serving_script() -> String {
    format!("echo '{SERVE_BANNER}'\nexec sleep 60")
}

/// Whether `pid` names a live (or not yet reaped) process.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Fake `hugo` whose `new content <path>` writes a YAML archetype to `<path>`.
#[cfg(unix)]
pub fn fake_hugo_new(dir: &Path) -> Result<PathBuf> {
    fake_tool(
        dir,
        "hugo",
        r#"if [ "$1" = "new" ] && [ "$2" = "content" ]; then
  mkdir -p "$(dirname "$3")"
  cat > "$3" <<'ARCHETYPE'
---
title: ''
date: 2025-06-28T10:00:00Z
draft: true
tags: []
---

ARCHETYPE
  echo "Content \"$3\" created"
  exit 0
fi
echo "unsupported: $*" >&2
exit 1"#,
    )
}

fn scaffold_site(root: &Path) -> Result<()> {
    write_file(root, "hugo.toml", "title = 'Test blog'\n")?;
    write_file(root, "content/microposts/_index.md", "---\ntitle: Microposts\n---\n")?;
    Ok(())
}

fn write_file(root: &Path, rel: &str, contents: &str) -> Result<PathBuf> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

fn config_for(root: &Path) -> BlogConfig {
    let mut cfg = BlogConfig::default();
    cfg.site.path = Some(root.to_path_buf());
    cfg.commit.drafter.clear();
    cfg
}

fn init_repo(dir: &Path) -> Result<()> {
    git(dir, &["init", "--quiet"])?;
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
    configure_identity(dir)
}

fn configure_identity(dir: &Path) -> Result<()> {
    git(dir, &["config", "user.name", "Blog Tester"])?;
    git(dir, &["config", "user.email", "tester@example.com"])?;
    git(dir, &["config", "commit.gpgsign", "false"])?;
    Ok(())
}

fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .with_context(|| format!("non-UTF-8 path {}", path.display()))
}
