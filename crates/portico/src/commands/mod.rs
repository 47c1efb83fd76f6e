//! CLI command handlers.

pub mod check;
pub mod settings;
pub mod start;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}
