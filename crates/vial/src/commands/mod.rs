//! CLI command handlers.

use vial_session::SessionStore;

pub mod session;
pub mod user;

/// Shared context for all commands.
pub struct Context {
    /// Store connected to the configured backend.
    pub store: SessionStore,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}
