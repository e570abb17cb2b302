//! Version-control façade.
//!
//! A small, explicit wrapper around `git` subprocess calls: repository status
//! for the status bar and commit+push as one user action.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::core::porcelain::{PorcelainStatus, parse_status};
use crate::core::types::RepoStatus;
use crate::error::{BlogError, CommitError, CommitStep, Result};
use crate::io::process::{ToolOutput, run_tool};
use crate::io::tools::Tools;

/// Outcome of a successful commit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing was staged after `git add -A`; no commit was created.
    NothingToCommit,
    /// Committed locally; push was not requested.
    Committed,
    Pushed,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    tools: Tools,
}

impl Git {
    /// Open the repository that contains `workdir`.
    #[instrument(skip_all, fields(workdir = %workdir.display()))]
    pub fn open(workdir: &Path, tools: &Tools) -> Result<Self> {
        if !workdir.is_dir() {
            return Err(BlogError::NotARepository {
                path: workdir.to_path_buf(),
            });
        }
        let git = Self {
            workdir: workdir.to_path_buf(),
            tools: tools.clone(),
        };
        git.run_capture(&["rev-parse", "--git-dir"])?;
        debug!("opened repository");
        Ok(git)
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Branch, changed-file count and unpushed-commit count.
    #[instrument(skip_all)]
    pub fn status(&self) -> Result<RepoStatus> {
        let out = self.run_capture(&["status", "--porcelain=v2", "--branch"])?;
        let parsed = parse_status(&out).map_err(|reason| BlogError::parse("git status", reason))?;
        let unpushed_commits = match parsed.ahead {
            Some(ahead) => ahead,
            None => self.count_unpushed_without_upstream(&parsed)?,
        };
        let status = RepoStatus {
            branch: parsed.head.clone().unwrap_or_else(|| "HEAD".to_string()),
            upstream: parsed.upstream.clone(),
            changed_files: parsed.entries.len(),
            staged: parsed.staged(),
            modified: parsed.modified(),
            untracked: parsed.untracked(),
            unpushed_commits,
        };
        debug!(
            branch = %status.branch,
            changed = status.changed_files,
            unpushed = status.unpushed_commits,
            "repository status"
        );
        Ok(status)
    }

    /// Commits on HEAD that are not on `origin/<branch>`, or every commit on
    /// HEAD when that ref does not exist.
    fn count_unpushed_without_upstream(&self, parsed: &PorcelainStatus) -> Result<usize> {
        if parsed.oid.is_none() {
            return Ok(0);
        }
        let range = match &parsed.head {
            Some(branch) if self.ref_exists(&format!("refs/remotes/origin/{branch}"))? => {
                format!("origin/{branch}..HEAD")
            }
            _ => "HEAD".to_string(),
        };
        let out = self.run_capture(&["rev-list", "--count", &range])?;
        out.trim()
            .parse()
            .map_err(|_| BlogError::parse("git rev-list --count", format!("not a number: '{}'", out.trim())))
    }

    fn ref_exists(&self, name: &str) -> Result<bool> {
        let out = self.run(&["rev-parse", "--verify", "--quiet", name], self.tools.timeout)?;
        if out.timed_out {
            return Err(self.timeout_error(&["rev-parse"], self.tools.timeout));
        }
        Ok(out.exit_code == 0)
    }

    /// Stage everything, commit, then push.
    ///
    /// Nothing to commit is a success that skips the push. A failing push
    /// leaves the local commit in place.
    #[instrument(skip_all)]
    pub fn commit_and_push(&self, message: &str) -> std::result::Result<CommitOutcome, CommitError> {
        match self.commit_only(message)? {
            CommitOutcome::Committed => {}
            other => return Ok(other),
        }
        self.push()?;
        Ok(CommitOutcome::Pushed)
    }

    /// Stage everything and commit without pushing.
    #[instrument(skip_all)]
    pub fn commit_only(&self, message: &str) -> std::result::Result<CommitOutcome, CommitError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(CommitError::new(
                CommitStep::Commit,
                BlogError::InvalidInput("commit message is empty".to_string()),
            ));
        }
        let staged = self
            .add_all()
            .and_then(|()| self.has_staged_changes())
            .map_err(|e| CommitError::new(CommitStep::Stage, e))?;
        if !staged {
            info!("nothing to commit");
            return Ok(CommitOutcome::NothingToCommit);
        }
        debug!("committing staged changes");
        self.run_capture(&["commit", "-m", message])
            .map_err(|e| CommitError::new(CommitStep::Commit, e))?;
        info!("committed");
        Ok(CommitOutcome::Committed)
    }

    /// Push the current branch to its upstream.
    #[instrument(skip_all)]
    pub fn push(&self) -> std::result::Result<(), CommitError> {
        let args = ["push"];
        let result = self
            .run(&args, self.tools.push_timeout)
            .and_then(|out| self.check(&args, out, self.tools.push_timeout));
        match result {
            Ok(_) => {
                info!("pushed");
                Ok(())
            }
            Err(e) => {
                let err = CommitError::new(CommitStep::Push, e);
                if err.is_auth_failure() {
                    warn!("push rejected: authentication failed");
                } else {
                    warn!(err = %err, "push failed");
                }
                Err(err)
            }
        }
    }

    /// Diff to summarize in a commit message: staged changes, else the working tree.
    #[instrument(skip_all)]
    pub fn diff_for_drafting(&self) -> Result<String> {
        let staged = self.run_capture(&["diff", "--cached"])?;
        if !staged.trim().is_empty() {
            return Ok(staged);
        }
        self.run_capture(&["diff"])
    }

    /// Stage all changes (respects .gitignore).
    pub fn add_all(&self) -> Result<()> {
        self.run_capture(&["add", "-A"])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run_capture(&["diff", "--cached", "--name-only"])?;
        Ok(!out.trim().is_empty())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let out = self.run(args, self.tools.timeout)?;
        Ok(self.check(args, out, self.tools.timeout)?.stdout)
    }

    fn check(&self, args: &[&str], out: ToolOutput, timeout: Duration) -> Result<ToolOutput> {
        if !out.timed_out
            && out.exit_code != 0
            && out.stderr.to_lowercase().contains("not a git repository")
        {
            return Err(BlogError::NotARepository {
                path: self.workdir.clone(),
            });
        }
        out.check(&format!("git {}", args.join(" ")), timeout)
    }

    fn timeout_error(&self, args: &[&str], timeout: Duration) -> BlogError {
        BlogError::Timeout {
            command: format!("git {}", args.join(" ")),
            timeout,
        }
    }

    fn run(&self, args: &[&str], timeout: Duration) -> Result<ToolOutput> {
        let mut cmd = self.tools.command(&self.tools.git);
        cmd.args(args)
            .current_dir(&self.workdir)
            // Never block on a credential prompt; fail and report instead.
            .env("GIT_TERMINAL_PROMPT", "0");
        run_tool(cmd, None, timeout, self.tools.output_limit_bytes)
    }
}
