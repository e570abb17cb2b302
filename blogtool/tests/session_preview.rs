//! `Session::preview` with a scripted readiness check and a recording opener.
#![cfg(unix)]

use std::cell::RefCell;

use blogtool::core::types::ServerState;
use blogtool::io::desktop::LaunchError;
use blogtool::session::{PreviewOutcome, Session};
use blogtool::test_support::{ScriptedProbe, TestSite, fake_tool, serving_script};

fn session_with(site: &TestSite, script: &str, probe: ScriptedProbe) -> Session {
    let hugo = fake_tool(site.path(), "hugo", script).expect("fake hugo");
    let mut config = site.config();
    config.tools.hugo = Some(hugo);
    config.server.host = "127.0.0.1".to_string();
    config.server.startup_timeout_secs = 2;
    config.server.stop_timeout_secs = 2;
    Session::start_with_probe(config, site.path(), Box::new(probe)).expect("session")
}

#[test]
fn declined_start_leaves_server_stopped() {
    let site = TestSite::new().expect("site");
    let probe = ScriptedProbe::ready();
    let session = session_with(&site, &serving_script(), probe.clone());
    let opened = RefCell::new(Vec::new());

    let outcome = session.preview_with(
        || false,
        |url: &str| -> Result<String, LaunchError> {
            opened.borrow_mut().push(url.to_string());
            Ok("fake-browser".to_string())
        },
    );

    assert!(matches!(outcome, PreviewOutcome::Declined), "got {outcome:?}");
    assert_eq!(session.server().state(), ServerState::Stopped);
    assert_eq!(session.server().child_id(), None);
    assert_eq!(probe.calls(), 0);
    assert!(opened.borrow().is_empty());
}

#[test]
fn failed_start_never_opens_a_browser() {
    let site = TestSite::new().expect("site");
    let session = session_with(
        &site,
        "echo 'Error: port 1313 already in use' >&2\nexit 1",
        ScriptedProbe::ready(),
    );
    let opened = RefCell::new(Vec::new());

    let outcome = session.preview_with(
        || true,
        |url: &str| -> Result<String, LaunchError> {
            opened.borrow_mut().push(url.to_string());
            Ok("fake-browser".to_string())
        },
    );

    let PreviewOutcome::ServerUnavailable(ServerState::Failed { reason }) = &outcome else {
        panic!("expected an unavailable server, got {outcome:?}");
    };
    assert!(reason.contains("already in use"), "reason: {reason}");
    assert!(opened.borrow().is_empty());
}

#[test]
fn confirmed_start_opens_the_running_url_once() {
    let site = TestSite::new().expect("site");
    let session = session_with(&site, &serving_script(), ScriptedProbe::ready());
    let opened = RefCell::new(Vec::new());

    let outcome = session.preview_with(
        || true,
        |url: &str| -> Result<String, LaunchError> {
            opened.borrow_mut().push(url.to_string());
            Ok("fake-browser".to_string())
        },
    );

    match outcome {
        PreviewOutcome::Opened { url, launcher } => {
            assert_eq!(url, "http://127.0.0.1:1313/");
            assert_eq!(launcher, "fake-browser");
        }
        other => panic!("expected the browser to open, got {other:?}"),
    }
    assert_eq!(*opened.borrow(), vec!["http://127.0.0.1:1313/".to_string()]);
    assert!(session.server().child_id().is_some());

    session.shutdown();
    assert_eq!(session.server().child_id(), None);
}

#[test]
fn running_server_opens_without_asking() {
    let site = TestSite::new().expect("site");
    let session = session_with(&site, &serving_script(), ScriptedProbe::ready());
    assert!(session.server().start().is_active());

    let outcome = session.preview_with(
        || panic!("must not ask while the server runs"),
        |_url: &str| -> Result<String, LaunchError> {
            Err(LaunchError {
                target: "http://127.0.0.1:1313/".to_string(),
                attempts: vec![("xdg-open".to_string(), "not found".to_string())],
            })
        },
    );

    assert!(
        matches!(outcome, PreviewOutcome::LaunchFailed { ref url, .. } if url == "http://127.0.0.1:1313/"),
        "got {outcome:?}"
    );
    assert!(session.server().state().is_active());
}
