//! Deterministic, pure logic shared by the façades.
//!
//! Core modules are free of I/O side effects. They parse and derive values from
//! text already read by `io`, which keeps them testable in isolation.

pub mod derive;
pub mod frontmatter;
pub mod porcelain;
pub mod templates;
pub mod types;
