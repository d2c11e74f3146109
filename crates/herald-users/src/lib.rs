//! `herald-users`: the slice of the identity store this subsystem needs
//! (users looked up by email) and the chat link registry.
//!
//! The registry is owned by the chat relay: only the relay calls the mutating
//! methods of [`links::ChatLinkRegistry`]. The main application reads it when it
//! is configured to share the relay's database.

pub mod db;
pub mod directory;
pub mod error;
pub mod links;
pub mod types;

pub use directory::UserDirectory;
pub use error::{Result, UserError};
pub use links::{ChatLinkRegistry, LinkOutcome};
pub use types::{ChatLink, User};
