//! Error types.
//!
//! [`ToolError`] covers everything that can go wrong while handling a
//! `tools/call` request. These never become protocol faults: the dispatcher
//! folds them into a content-level error envelope. [`ServerError`] covers
//! transport startup and I/O, and is fatal to the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("PERPLEXITY_API_KEY not set")]
    MissingCredential,

    #[error("No arguments provided")]
    MissingArguments,

    #[error("Invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl ToolError {
    /// Text placed in the error envelope returned to the client.
    ///
    /// Unknown tools are reported verbatim; everything else gets an
    /// `Error: ` prefix.
    pub fn envelope_text(&self) -> String {
        match self {
            ToolError::UnknownTool(_) => self.to_string(),
            other => format!("Error: {other}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
