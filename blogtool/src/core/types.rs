//! Plain data handed from the façades to the shell.
//!
//! Values here are snapshots recomputed from external ground truth on every
//! call; nothing in this module caches or performs I/O.

use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Kind of content item, which fixes its location convention under `content/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Flat file under `content/microposts/`.
    Micropost,
    /// Page bundle under `content/<language>/posts/<slug>/index.md`.
    Post,
    /// Page bundle under `content/<language>/conversations/<slug>/index.md`.
    Conversation,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [
        ContentKind::Micropost,
        ContentKind::Post,
        ContentKind::Conversation,
    ];

    /// Directory name of the section holding this kind.
    pub fn section_dir(self) -> &'static str {
        match self {
            ContentKind::Micropost => "microposts",
            ContentKind::Post => "posts",
            ContentKind::Conversation => "conversations",
        }
    }

    /// Hugo archetype passed as `--kind`, if the kind needs a non-default one.
    pub fn archetype(self) -> Option<&'static str> {
        match self {
            ContentKind::Micropost => Some("micropost"),
            ContentKind::Post => None,
            ContentKind::Conversation => Some("conversations"),
        }
    }

    /// Page bundles are language-scoped directories with an `index.md`.
    pub fn is_bundle(self) -> bool {
        !matches!(self, ContentKind::Micropost)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Micropost => "micropost",
            ContentKind::Post => "post",
            ContentKind::Conversation => "conversation",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "micropost" | "microposts" => Ok(ContentKind::Micropost),
            "post" | "posts" => Ok(ContentKind::Post),
            "conversation" | "conversations" => Ok(ContentKind::Conversation),
            other => Err(format!(
                "unknown content kind '{other}' (expected micropost, post or conversation)"
            )),
        }
    }
}

/// Snapshot of one content file. Identity is `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentDescriptor {
    pub path: PathBuf,
    pub kind: ContentKind,
    /// Language code (`en`, `ru`, ...). Microposts are reported as the default language.
    pub language: String,
    /// File stem for microposts, bundle directory name for bundles.
    pub slug: String,
    pub title: String,
    pub date: DateTime<FixedOffset>,
    pub draft: bool,
    pub preview: String,
    pub description: String,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
}

impl ContentDescriptor {
    /// Name used for tie-breaking: the filename, or the bundle directory for bundles.
    pub fn sort_name(&self) -> &str {
        if self.kind.is_bundle() {
            return &self.slug;
        }
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.slug)
    }
}

/// Newest first; equal dates fall back to name, descending.
pub fn newest_first(a: &ContentDescriptor, b: &ContentDescriptor) -> Ordering {
    b.date
        .cmp(&a.date)
        .then_with(|| b.sort_name().cmp(a.sort_name()))
}

/// Repository state derived from one `git status` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoStatus {
    /// Current branch, or `HEAD` when detached.
    pub branch: String,
    pub upstream: Option<String>,
    /// Distinct paths with any staged, unstaged or untracked change.
    pub changed_files: usize,
    pub staged: usize,
    pub modified: usize,
    pub untracked: usize,
    pub unpushed_commits: usize,
}

impl RepoStatus {
    pub fn is_clean(&self) -> bool {
        self.changed_files == 0
    }
}

/// Lifecycle of the preview server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum ServerState {
    Stopped,
    Starting,
    Running { url: String },
    /// Carries the diagnostic text captured from the server verbatim.
    Failed { reason: String },
}

impl ServerState {
    pub fn is_active(&self) -> bool {
        matches!(self, ServerState::Starting | ServerState::Running { .. })
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            ServerState::Running { url } => Some(url),
            _ => None,
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Stopped => f.write_str("stopped"),
            ServerState::Starting => f.write_str("starting"),
            ServerState::Running { url } => write!(f, "running at {url}"),
            ServerState::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}
