//! Device CLI session module.

pub mod prompt;
pub mod session;
pub mod ssh;
