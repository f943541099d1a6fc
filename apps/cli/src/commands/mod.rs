//! Command implementations for the Hubwright CLI.

pub mod event;
pub mod keys;
pub mod models;
pub mod process;
pub mod roles;
pub mod run;
pub mod types;

pub use types::{KeysCommand, ModelsCommand, RolesCommand};
