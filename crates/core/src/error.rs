use std::io;

/// An error returned while parsing user input.
///
/// Only problems in the *input* surface here. Mistakes in parameter
/// definitions (duplicate names, wrong target kinds, bad split patterns)
/// are bugs in the calling program and panic instead; see [`crate::Param`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input: stray separators, premature quotes, invalid
    /// characters. The context holds up to the last 15 bytes of input
    /// before the failure point.
    #[error(r#"at "{context}": {message}"#)]
    Syntax { context: String, message: String },

    /// A chain of symbol references loops back on itself.
    #[error(r#"cyclical symbol definition detected: "{0}""#)]
    SymbolCycle(String),

    /// A name or value still contains unresolved symbol references where a
    /// resolved one is required.
    #[error("{0}")]
    Unresolved(String),

    /// A value failed conversion to the target type.
    #[error("{0}")]
    Value(String),

    /// Wrong number of values for a parameter, or a default that fails a
    /// custom scanner.
    #[error("{0}")]
    Count(String),

    /// Unknown parameter, include cycle, or an operator-specific failure.
    #[error("{0}")]
    Invocation(String),

    /// Reading an included file failed.
    #[error("include: {0}")]
    Io(#[from] io::Error),

    /// Wrapper naming the parameter the error occurred on.
    #[error("Parse error on {name}: {source}")]
    OnParam { name: String, source: Box<Error> },
}

impl Error {
    /// Wrap `self` with the canonical name of the offending parameter.
    pub(crate) fn on_param(self, name: &str) -> Error {
        let name = if name.is_empty() {
            "anonymous parameter".to_string()
        } else {
            name.to_string()
        };
        Error::OnParam {
            name,
            source: Box::new(self),
        }
    }
}
