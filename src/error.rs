//! Private module for selective re-export.

use std::io;

/// Errors surfaced while loading a concurrent pushdown system or querying a
/// stack. Exploration itself never returns these: the engines pre-check
/// emptiness on their hot paths.
#[derive(Debug, thiserror::Error)]
pub enum CubaError {
    /// `top()` was called on an empty stack.
    #[error("top() called on an empty stack")]
    EmptyStack,

    /// An input file could not be read.
    #[error("unable to read `{path}`")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The system description does not declare any shared control states.
    #[error("no shared control states declared")]
    NoControlStates,

    /// A line of the system description could not be parsed.
    #[error("malformed system description: {0}")]
    MalformedSystem(String),

    /// A configuration string (`"q|w1,w2,..."`) could not be parsed.
    #[error("malformed configuration `{0}`")]
    MalformedConfig(String),
}
