//! Error kinds surfaced by the engine.

use thiserror::Error;

/// Every failure the engine reports to its caller.
///
/// Unrecognized file names and malformed descriptor numbers are the only inputs that are
/// silently ignored; everything else ends up here.
#[derive(Debug, Error)]
pub enum DojoError {
    /// No agent matches the given descriptor.
    #[error("ai '{descriptor}' not found")]
    NotFound {
        /// Name (or full text) of the descriptor that matched nothing.
        descriptor: String,
    },

    /// The caller supplied arguments the operation cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The game output could not be turned into a match result.
    #[error("unparseable game result: {0}")]
    ProtocolViolation(String),

    /// The game process failed to start, exited with a non-zero status or timed out.
    #[error("running the game failed ({status}):\n{stderr}")]
    ExecutionFailure {
        /// Exit status, or a short reason when there is none.
        status: String,
        /// Diagnostic output captured from the game.
        stderr: String,
    },

    /// The agent has no source file a new version could be derived from.
    #[error("the AI {agent} does not have a source file")]
    MissingSource {
        /// Player name of the agent.
        agent: String,
    },

    /// The compile command failed; no match was run.
    #[error("compilation failed ({status}): {output}")]
    Compilation {
        /// Exit status of the compile command.
        status: String,
        /// First line of the compiler diagnostics.
        output: String,
    },

    /// File system access failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used by the core modules.
pub type Result<T> = std::result::Result<T, DojoError>;
