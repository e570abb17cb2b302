//! Preview server lifecycle against fake `hugo` scripts.
#![cfg(unix)]

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use blogtool::core::types::ServerState;
use blogtool::io::server::DevServer;
use blogtool::test_support::{
    SERVE_BANNER, ScriptedProbe, TestSite, fake_tool, process_alive, server_settings,
    serving_script,
};

fn server_with(site: &TestSite, script: &str, probe: ScriptedProbe) -> DevServer {
    let hugo = fake_tool(site.path(), "hugo", script).expect("fake hugo");
    DevServer::with_probe(server_settings(&hugo, site.path()), Box::new(probe))
}

#[test]
fn start_is_idempotent_while_running() {
    let site = TestSite::new().expect("site");
    let server = server_with(&site, &serving_script(), ScriptedProbe::ready());

    let first = server.start();
    assert_eq!(
        first,
        ServerState::Running {
            url: "http://127.0.0.1:1313/".to_string()
        }
    );
    let pid = server.child_id().expect("child");

    let second = server.start();
    assert_eq!(second, first);
    assert_eq!(server.child_id(), Some(pid));

    assert_eq!(server.stop(), ServerState::Stopped);
    assert_eq!(server.child_id(), None);
}

#[test]
fn stop_twice_is_harmless() {
    let site = TestSite::new().expect("site");
    let server = server_with(&site, &serving_script(), ScriptedProbe::ready());
    assert!(server.start().is_active());

    assert_eq!(server.stop(), ServerState::Stopped);
    assert_eq!(server.stop(), ServerState::Stopped);
    assert_eq!(server.state(), ServerState::Stopped);
}

#[test]
fn waits_for_readiness_before_running() {
    let site = TestSite::new().expect("site");
    let probe = ScriptedProbe::ready_after(3);
    let server = server_with(&site, &serving_script(), probe.clone());

    assert!(matches!(server.start(), ServerState::Running { .. }));
    assert_eq!(probe.calls(), 3);
    server.stop();
}

#[test]
fn early_exit_fails_with_captured_output() {
    let site = TestSite::new().expect("site");
    let server = server_with(
        &site,
        "echo 'Error: port 1313 already in use' >&2\nexit 1",
        ScriptedProbe::never(),
    );

    let state = server.start();

    let ServerState::Failed { reason } = &state else {
        panic!("expected failure, got {state:?}");
    };
    assert!(reason.contains("port 1313 already in use"), "reason: {reason}");
    assert_eq!(server.child_id(), None);
    assert_eq!(server.state(), state);
}

#[test]
fn readiness_timeout_fails_and_kills_child() {
    let site = TestSite::new().expect("site");
    let server = server_with(&site, "exec sleep 60", ScriptedProbe::never());

    let state = server.start();

    let ServerState::Failed { reason } = &state else {
        panic!("expected failure, got {state:?}");
    };
    assert!(reason.contains("did not answer"), "reason: {reason}");
    assert_eq!(server.child_id(), None);
}

#[test]
fn restart_replaces_the_process() {
    let site = TestSite::new().expect("site");
    let server = server_with(&site, &serving_script(), ScriptedProbe::ready());
    assert!(server.start().is_active());
    let before = server.child_id().expect("child");

    assert!(matches!(server.restart(), ServerState::Running { .. }));
    let after = server.child_id().expect("child");
    assert_ne!(before, after);
    server.stop();
}

#[test]
fn unexpected_exit_is_reported_by_state() {
    let site = TestSite::new().expect("site");
    let server = server_with(
        &site,
        &format!("echo '{SERVE_BANNER}'\nsleep 0.3\necho 'Error: site build crashed' >&2\nexit 2"),
        ScriptedProbe::ready(),
    );
    assert!(server.start().is_active());

    thread::sleep(Duration::from_millis(1000));

    let state = server.state();
    let ServerState::Failed { reason } = &state else {
        panic!("expected failure, got {state:?}");
    };
    assert!(reason.contains("exited unexpectedly"), "reason: {reason}");
    assert!(reason.contains("site build crashed"), "reason: {reason}");
    assert_eq!(server.child_id(), None);
}

#[test]
fn unannounced_child_never_becomes_running() {
    let site = TestSite::new().expect("site");
    let probe = ScriptedProbe::ready();
    let server = server_with(&site, "exec sleep 60", probe.clone());

    let state = server.start();

    let ServerState::Failed { reason } = &state else {
        panic!("expected failure, got {state:?}");
    };
    assert!(reason.contains("did not answer"), "reason: {reason}");
    assert_eq!(probe.calls(), 0);
    assert_eq!(server.child_id(), None);
}

#[test]
fn dropping_the_supervisor_reaps_the_child() {
    let site = TestSite::new().expect("site");
    let server = server_with(&site, &serving_script(), ScriptedProbe::ready());
    assert!(server.start().is_active());
    let pid = server.child_id().expect("child");
    assert!(process_alive(pid));

    drop(server);

    assert!(!process_alive(pid));
}

#[test]
fn concurrent_lifecycle_calls_keep_one_child() {
    let site = TestSite::new().expect("site");
    let pids = site.path().join("pids");
    let script = format!("echo $$ >> '{}'\n{}", pids.display(), serving_script());
    let server = Arc::new(server_with(&site, &script, ScriptedProbe::ready()));

    let restarter = {
        let server = Arc::clone(&server);
        thread::spawn(move || {
            for _ in 0..4 {
                server.restart();
            }
        })
    };
    let toggler = {
        let server = Arc::clone(&server);
        thread::spawn(move || {
            for _ in 0..4 {
                server.start();
                server.stop();
            }
        })
    };
    restarter.join().expect("restarter");
    toggler.join().expect("toggler");

    assert!(server.start().is_active());
    let current = server.child_id().expect("child");
    let spawned: Vec<u32> = fs::read_to_string(&pids)
        .expect("pids")
        .lines()
        .map(|line| line.trim().parse().expect("pid"))
        .collect();
    assert!(spawned.contains(&current));
    let alive: Vec<u32> = spawned.into_iter().filter(|pid| process_alive(*pid)).collect();
    assert_eq!(alive, vec![current]);

    server.stop();
    assert!(!process_alive(current));
}
