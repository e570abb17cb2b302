//! Application session: configuration plus every façade, built once at startup.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::core::templates::CommitTemplates;
use crate::core::types::ServerState;
use crate::error::Result;
use crate::io::config::BlogConfig;
use crate::io::content::ContentLister;
use crate::io::desktop::{self, LaunchError};
use crate::io::drafter::LlmDrafter;
use crate::io::git::Git;
use crate::io::hugo::Hugo;
use crate::io::server::{DevServer, HttpProbe, ReadinessProbe, ServerSettings};
use crate::io::tools::{Tools, resolve_site_root};

const SERVER_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Result of [`Session::preview`].
#[derive(Debug)]
pub enum PreviewOutcome {
    Opened { url: String, launcher: String },
    /// The server was not running and the caller declined to start it.
    Declined,
    /// The server could not be started; carries the resulting state.
    ServerUnavailable(ServerState),
    /// The server runs but no browser could be launched.
    LaunchFailed { url: String, error: LaunchError },
}

pub struct Session {
    config: BlogConfig,
    tools: Tools,
    content: ContentLister,
    hugo: Hugo,
    server: Arc<DevServer>,
    templates: CommitTemplates,
}

impl Session {
    /// Resolve the site root and tools relative to `cwd` and build the façades.
    pub fn start(config: BlogConfig, cwd: &Path) -> Result<Self> {
        Self::start_with_probe(config, cwd, Box::new(HttpProbe::default()))
    }

    #[instrument(skip_all)]
    pub fn start_with_probe(
        config: BlogConfig,
        cwd: &Path,
        probe: Box<dyn ReadinessProbe>,
    ) -> Result<Self> {
        let site_root = resolve_site_root(&config, cwd);
        let tools = Tools::resolve(&config.tools);
        let content = ContentLister::open(
            &site_root,
            &config.site.languages,
            &config.site.default_language,
        )?;
        let hugo = Hugo::new(&tools, &site_root, &config.site.languages);
        let settings = ServerSettings {
            tools: tools.clone(),
            site_root: site_root.clone(),
            host: config.server.host.clone(),
            port: config.server.port,
            startup_timeout: Duration::from_secs(config.server.startup_timeout_secs),
            stop_timeout: Duration::from_secs(config.server.stop_timeout_secs),
            poll_interval: SERVER_POLL_INTERVAL,
        };
        let server = Arc::new(DevServer::with_probe(settings, probe));
        let templates = CommitTemplates::new(&config.commit.templates)?;
        info!(site = %site_root.display(), "session started");
        Ok(Self {
            config,
            tools,
            content,
            hugo,
            server,
            templates,
        })
    }

    pub fn config(&self) -> &BlogConfig {
        &self.config
    }

    pub fn site_root(&self) -> &Path {
        self.content.site_root()
    }

    pub fn tools(&self) -> &Tools {
        &self.tools
    }

    pub fn content(&self) -> &ContentLister {
        &self.content
    }

    /// Open the repository at the site root.
    ///
    /// Opened per call so that a site without git still lists and serves.
    pub fn git(&self) -> Result<Git> {
        Git::open(self.site_root(), &self.tools)
    }

    pub fn hugo(&self) -> &Hugo {
        &self.hugo
    }

    pub fn server(&self) -> &Arc<DevServer> {
        &self.server
    }

    pub fn templates(&self) -> &CommitTemplates {
        &self.templates
    }

    /// Commit message drafter, unless disabled in the config.
    pub fn drafter(&self) -> Option<LlmDrafter> {
        let commit = &self.config.commit;
        LlmDrafter::new(
            &commit.drafter,
            self.site_root(),
            &self.tools,
            Duration::from_secs(commit.drafter_timeout_secs),
            &self.config.site.languages,
        )
    }

    /// Open the running site in a browser, starting the server first when
    /// `confirm_start` agrees.
    #[instrument(skip_all)]
    pub fn preview(&self, confirm_start: impl FnOnce() -> bool) -> PreviewOutcome {
        self.preview_with(confirm_start, desktop::open_url)
    }

    /// [`Session::preview`] with the browser launcher supplied by the caller.
    ///
    /// `open` is only called once the server is `Running`.
    pub fn preview_with(
        &self,
        confirm_start: impl FnOnce() -> bool,
        open: impl FnOnce(&str) -> std::result::Result<String, LaunchError>,
    ) -> PreviewOutcome {
        let state = match self.server.state() {
            ServerState::Running { url } => ServerState::Running { url },
            _ => {
                if !confirm_start() {
                    debug!("preview declined");
                    return PreviewOutcome::Declined;
                }
                self.server.start()
            }
        };
        let ServerState::Running { url } = state else {
            return PreviewOutcome::ServerUnavailable(state);
        };
        match open(&url) {
            Ok(launcher) => PreviewOutcome::Opened { url, launcher },
            Err(error) => PreviewOutcome::LaunchFailed { url, error },
        }
    }

    /// Stop the preview server. Safe to call more than once.
    pub fn shutdown(&self) {
        self.server.stop();
        debug!("session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
