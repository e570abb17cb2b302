//! User configuration stored under `<config dir>/blogtool/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Blogtool configuration (TOML).
///
/// Every section is optional; missing fields default to values that work for a
/// Hugo site checked out next to the binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BlogConfig {
    pub site: SiteConfig,
    pub tools: ToolsConfig,
    pub server: ServerConfig,
    pub commit: CommitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SiteConfig {
    /// Hugo site root. Auto-detected when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Language code to content directory name, e.g. `en = "english"`.
    pub languages: BTreeMap<String, String>,

    /// Language used for new posts when none is given.
    pub default_language: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let languages = [("en", "english"), ("ru", "russian"), ("pl", "polish")]
            .into_iter()
            .map(|(code, dir)| (code.to_string(), dir.to_string()))
            .collect();
        Self {
            path: None,
            languages,
            default_language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hugo: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go: Option<PathBuf>,

    /// Timeout for ordinary tool invocations.
    pub timeout_secs: u64,

    /// Timeout for `git push`, which talks to the network.
    pub push_timeout_secs: u64,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            hugo: None,
            git: None,
            go: None,
            timeout_secs: 30,
            push_timeout_secs: 120,
            output_limit_bytes: 100_000,
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub startup_timeout_secs: u64,
    pub stop_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1313,
            startup_timeout_secs: 30,
            stop_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommitConfig {
    /// Extra commit templates, name to `minijinja` source.
    pub templates: BTreeMap<String, String>,

    /// Summarizer command that reads a prompt on stdin (e.g. `["llm"]`).
    /// An empty array disables drafting.
    pub drafter: Vec<String>,

    pub drafter_timeout_secs: u64,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            templates: BTreeMap::new(),
            drafter: vec!["llm".to_string()],
            drafter_timeout_secs: 30,
        }
    }
}

impl BlogConfig {
    pub fn validate(&self) -> Result<()> {
        if self.site.languages.is_empty() {
            return Err(anyhow!("site.languages must not be empty"));
        }
        if !self.site.languages.contains_key(&self.site.default_language) {
            return Err(anyhow!(
                "site.default_language '{}' is not listed in site.languages",
                self.site.default_language
            ));
        }
        if self
            .site
            .languages
            .values()
            .any(|dir| dir.trim().is_empty() || dir.contains(['/', '\\']))
        {
            return Err(anyhow!("site.languages values must be plain directory names"));
        }
        if self.tools.timeout_secs == 0 {
            return Err(anyhow!("tools.timeout_secs must be > 0"));
        }
        if self.tools.push_timeout_secs == 0 {
            return Err(anyhow!("tools.push_timeout_secs must be > 0"));
        }
        if self.tools.output_limit_bytes == 0 {
            return Err(anyhow!("tools.output_limit_bytes must be > 0"));
        }
        if self.server.host.trim().is_empty() {
            return Err(anyhow!("server.host must not be empty"));
        }
        if self.server.port == 0 {
            return Err(anyhow!("server.port must be > 0"));
        }
        if self.server.startup_timeout_secs == 0 {
            return Err(anyhow!("server.startup_timeout_secs must be > 0"));
        }
        if self.commit.drafter.first().is_some_and(|cmd| cmd.trim().is_empty()) {
            return Err(anyhow!("commit.drafter must start with a program name"));
        }
        if !self.commit.drafter.is_empty() && self.commit.drafter_timeout_secs == 0 {
            return Err(anyhow!("commit.drafter_timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Default config location for this user, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "blogtool").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `BlogConfig::default()`.
pub fn load_config(path: &Path) -> Result<BlogConfig> {
    if !path.exists() {
        let cfg = BlogConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BlogConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &BlogConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, BlogConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("config.toml");
        let mut cfg = BlogConfig::default();
        cfg.site.path = Some(PathBuf::from("/srv/blog"));
        cfg.commit
            .templates
            .insert("Typo".to_string(), "Fix typo in {{ title }}".to_string());
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[server]\nport = 8080\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.host, "localhost");
        assert_eq!(cfg.site.languages.get("ru").map(String::as_str), Some("russian"));
    }

    #[test]
    fn rejects_unknown_default_language() {
        let mut cfg = BlogConfig::default();
        cfg.site.default_language = "de".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("default_language"));
    }

    #[test]
    fn empty_drafter_disables_drafting() {
        let mut cfg = BlogConfig::default();
        cfg.commit.drafter.clear();
        cfg.commit.drafter_timeout_secs = 0;
        cfg.validate().expect("valid");
    }
}
