//! Dev-Server Supervisor for `hugo server`.
//!
//! At most one child is tracked. A lifecycle mutex serializes
//! start/stop/restart; the state slot is a separate, briefly held mutex so that
//! `state()` can observe `Starting` while a start is in flight.

use std::path::PathBuf;
use std::process::{Child, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::types::ServerState;
use crate::io::process::{OutputCapture, command_line, spawn_error};
use crate::io::tools::Tools;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const OUTPUT_SETTLE: Duration = Duration::from_millis(500);
/// Printed by `hugo server` on stdout once it listens.
const READY_BANNER: &str = "Web Server is available at";

/// Decides whether the server at `url` is serving pages.
pub trait ReadinessProbe: Send + Sync {
    fn is_ready(&self, url: &str) -> bool;
}

/// HTTP GET that counts a 2xx answer as ready.
pub struct HttpProbe {
    agent: ureq::Agent,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(PROBE_TIMEOUT)
    }
}

impl ReadinessProbe for HttpProbe {
    fn is_ready(&self, url: &str) -> bool {
        match self.agent.get(url).call() {
            Ok(resp) => (200..300).contains(&resp.status()),
            Err(ureq::Error::Status(code, _)) => {
                debug!(code, "server answered with an error status");
                false
            }
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub tools: Tools,
    pub site_root: PathBuf,
    pub host: String,
    pub port: u16,
    pub startup_timeout: Duration,
    pub stop_timeout: Duration,
    pub poll_interval: Duration,
}

impl ServerSettings {
    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

struct RunningChild {
    child: Child,
    stdout: OutputCapture,
    stderr: OutputCapture,
    readers: Vec<JoinHandle<()>>,
}

impl RunningChild {
    /// `headline` followed by whatever the server printed, stderr first.
    fn diagnostic(&mut self, headline: &str) -> String {
        settle(&mut self.readers, OUTPUT_SETTLE);
        let mut text = headline.to_string();
        for captured in [self.stderr.snapshot(), self.stdout.snapshot()] {
            if !captured.trim().is_empty() {
                text.push('\n');
                text.push_str(captured.trim_end());
            }
        }
        text
    }
}

pub struct DevServer {
    settings: ServerSettings,
    probe: Box<dyn ReadinessProbe>,
    lifecycle: Mutex<Option<RunningChild>>,
    state: Mutex<ServerState>,
}

impl DevServer {
    pub fn new(settings: ServerSettings) -> Self {
        Self::with_probe(settings, Box::new(HttpProbe::default()))
    }

    pub fn with_probe(settings: ServerSettings, probe: Box<dyn ReadinessProbe>) -> Self {
        Self {
            settings,
            probe,
            lifecycle: Mutex::new(None),
            state: Mutex::new(ServerState::Stopped),
        }
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Current state. A running child that exited on its own becomes `Failed`.
    pub fn state(&self) -> ServerState {
        match self.lifecycle.try_lock() {
            Ok(mut slot) => self.reap_exited(&mut slot),
            Err(TryLockError::Poisoned(poisoned)) => self.reap_exited(&mut poisoned.into_inner()),
            // A start/stop is in flight and owns the child; report the slot as is.
            Err(TryLockError::WouldBlock) => {}
        }
        self.current()
    }

    /// Process id of the tracked child, if any.
    pub fn child_id(&self) -> Option<u32> {
        lock(&self.lifecycle).as_ref().map(|running| running.child.id())
    }

    /// Start the server and wait until it answers or fails.
    ///
    /// Returns the current state without spawning when already running.
    #[instrument(skip_all, fields(url = %self.settings.url()))]
    pub fn start(&self) -> ServerState {
        let mut slot = lock(&self.lifecycle);
        self.reap_exited(&mut slot);
        self.start_locked(&mut slot)
    }

    /// Stop the server. Calling this on a stopped server does nothing.
    #[instrument(skip_all)]
    pub fn stop(&self) -> ServerState {
        let mut slot = lock(&self.lifecycle);
        self.stop_locked(&mut slot);
        self.current()
    }

    #[instrument(skip_all)]
    pub fn restart(&self) -> ServerState {
        let mut slot = lock(&self.lifecycle);
        self.stop_locked(&mut slot);
        self.start_locked(&mut slot)
    }

    fn start_locked(&self, slot: &mut Option<RunningChild>) -> ServerState {
        if slot.is_some() {
            let current = self.current();
            if current.is_active() {
                debug!("server already running");
                return current;
            }
        }
        self.set_state(ServerState::Starting);

        let tools = &self.settings.tools;
        let mut cmd = tools.command(&tools.hugo);
        cmd.args(["server", "--bind", &self.settings.host, "--port"])
            .arg(self.settings.port.to_string())
            .args(["--buildDrafts", "--buildFuture", "--disableFastRender"])
            .current_dir(&self.settings.site_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!(cmd = %command_line(&cmd), "spawning hugo server");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let reason = spawn_error(&cmd, e).to_string();
                return self.fail(reason);
            }
        };
        let stdout = OutputCapture::default();
        let stderr = OutputCapture::default();
        let mut readers = Vec::new();
        let limit = tools.output_limit_bytes;
        if let Some(pipe) = child.stdout.take() {
            readers.push(stdout.drain(pipe, limit));
        }
        if let Some(pipe) = child.stderr.take() {
            readers.push(stderr.drain(pipe, limit));
        }
        let mut running = RunningChild {
            child,
            stdout,
            stderr,
            readers,
        };

        let url = self.settings.url();
        let deadline = Instant::now() + self.settings.startup_timeout;
        let mut announced = false;
        loop {
            match running.child.try_wait() {
                Ok(Some(status)) => {
                    let reason = running.diagnostic(&format!("hugo server exited during startup ({status})"));
                    return self.fail(reason);
                }
                Ok(None) => {}
                Err(e) => {
                    terminate(&mut running.child, self.settings.stop_timeout);
                    return self.fail(format!("cannot check hugo server process: {e}"));
                }
            }
            // Probing before our child announced itself could reach another
            // server holding the port.
            announced = announced || running.stdout.snapshot().contains(READY_BANNER);
            if announced && self.probe.is_ready(&url) {
                info!(%url, "server running");
                *slot = Some(running);
                let state = ServerState::Running { url };
                self.set_state(state.clone());
                return state;
            }
            if Instant::now() >= deadline {
                terminate(&mut running.child, self.settings.stop_timeout);
                let reason = running.diagnostic(&format!(
                    "hugo server did not answer at {url} within {}s",
                    self.settings.startup_timeout.as_secs()
                ));
                return self.fail(reason);
            }
            thread::sleep(self.settings.poll_interval);
        }
    }

    fn stop_locked(&self, slot: &mut Option<RunningChild>) {
        if let Some(mut running) = slot.take() {
            terminate(&mut running.child, self.settings.stop_timeout);
            info!("server stopped");
        }
        self.set_state(ServerState::Stopped);
    }

    fn reap_exited(&self, slot: &mut Option<RunningChild>) {
        let Some(running) = slot.as_mut() else {
            return;
        };
        match running.child.try_wait() {
            Ok(Some(status)) => {
                let reason = running.diagnostic(&format!("hugo server exited unexpectedly ({status})"));
                *slot = None;
                self.fail(reason);
            }
            Ok(None) => {}
            Err(e) => warn!(err = %e, "cannot check hugo server process"),
        }
    }

    fn fail(&self, reason: String) -> ServerState {
        warn!(%reason, "server failed");
        let state = ServerState::Failed { reason };
        self.set_state(state.clone());
        state
    }

    fn current(&self) -> ServerState {
        lock(&self.state).clone()
    }

    fn set_state(&self, state: ServerState) {
        *lock(&self.state) = state;
    }
}

impl Drop for DevServer {
    fn drop(&mut self) {
        let slot = self
            .lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(mut running) = slot.take() {
            debug!("stopping server on drop");
            terminate(&mut running.child, self.settings.stop_timeout);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ask the child to exit, force-kill after `grace`, and reap it.
fn terminate(child: &mut Child, grace: Duration) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }
    if request_exit(child) {
        match child.wait_timeout(grace) {
            Ok(Some(_)) => return,
            Ok(None) => warn!(grace_secs = grace.as_secs(), "server ignored SIGTERM, killing"),
            Err(e) => warn!(err = %e, "wait for server exit failed"),
        }
    }
    if let Err(e) = child.kill() {
        debug!(err = %e, "kill failed (already exited?)");
    }
    if let Err(e) = child.wait() {
        warn!(err = %e, "reap server process failed");
    }
}

/// Send SIGTERM so hugo can shut down cleanly. Returns false when no signal was sent.
#[cfg(unix)]
fn request_exit(child: &Child) -> bool {
    let status = std::process::Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) => status.success(),
        Err(e) => {
            warn!(err = %e, "cannot run kill");
            false
        }
    }
}

#[cfg(not(unix))]
fn request_exit(_child: &Child) -> bool {
    false
}

/// Give reader threads up to `max` to reach EOF after the child exited.
fn settle(readers: &mut Vec<JoinHandle<()>>, max: Duration) {
    let deadline = Instant::now() + max;
    while readers.iter().any(|r| !r.is_finished()) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    readers.retain(|r| !r.is_finished());
}
