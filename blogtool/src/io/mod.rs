//! Side-effecting façades over the filesystem, git, and hugo.

pub mod config;
pub mod content;
pub mod desktop;
pub mod drafter;
pub mod git;
pub mod hugo;
pub mod process;
pub mod server;
pub mod tools;
