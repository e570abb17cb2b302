//! Orchestration layer for authoring a Hugo blog kept in git.
//!
//! The crate wraps two external tools, `hugo` and `git`, and turns their
//! plain-text output into typed values for a presentation shell:
//!
//! - **[`core`]**: Pure logic (front matter, title/preview derivation, porcelain
//!   parsing, commit templates). No I/O, fully testable in isolation.
//! - **[`io`]**: Façades with side effects: the content lister, the git façade,
//!   the dev-server supervisor, content creation, and desktop launchers.
//!
//! [`session::Session`] owns the configuration and every façade for the
//! lifetime of the application; the `blogtool` binary is a thin CLI over it.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
