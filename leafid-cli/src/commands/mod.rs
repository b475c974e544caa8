//! Subcommand implementations.

#[cfg(feature = "hosted")]
pub mod auth;
pub mod history;
pub mod identify;
