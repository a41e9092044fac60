//! Error types for building registries and scanning input.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

use crate::values::TokenId;

/// An error that occurs while assembling or compiling a [`Registry`].
///
/// [`Registry`]: crate::Registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("a registry needs at least one definition")]
    Empty,
    #[error("io failed for '{path}': '{source}'")]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed rule file: {0}")]
    RuleFile(#[from] serde_json::Error),
    #[error("rule {index} must set exactly one of 'regex' or 'literal'")]
    AmbiguousRule { index: usize },
}

/// An error raised by a dispatch handler.
///
/// Handlers can fail with any error type; it is boxed and carried through
/// the scan unchanged.
#[derive(Debug)]
pub struct HandlerError(Box<dyn std::error::Error + Send + Sync>);

impl HandlerError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        HandlerError(err.into())
    }

    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync> {
        self.0
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// An error that ends a scan.
///
/// Positions and ranges are character offsets into the source.
///
/// Reaching the end of the input is not an error; it is reported as `Ok(None)`
/// by [`Lexer::next_token`].
///
/// [`Lexer::next_token`]: crate::Lexer::next_token
#[derive(Debug, Error)]
pub enum LexError {
    #[error("no pattern matches at offset {position}: '{}'", truncate(.remaining))]
    UnmatchedInput { position: usize, remaining: String },
    #[error("dispatch handler failed at {}..{}: {source}", .range.start, .range.end)]
    Handler {
        range: std::ops::Range<usize>,
        #[source]
        source: HandlerError,
    },
    #[error("token at {}..{} refers to {target}, which has not been produced", .range.start, .range.end)]
    DanglingReference {
        range: std::ops::Range<usize>,
        target: TokenId,
    },
    #[error("token limit reached at offset {position}")]
    TooManyTokens { position: usize },
}

impl LexError {
    /// The character offset in the source at which the scan stopped.
    pub fn position(&self) -> usize {
        match self {
            LexError::UnmatchedInput { position, .. } | LexError::TooManyTokens { position } => {
                *position
            }
            LexError::Handler { range, .. } | LexError::DanglingReference { range, .. } => {
                range.start
            }
        }
    }
}

// keep error messages readable when the unmatched tail is a whole file
fn truncate(text: &str) -> String {
    const MAX_CHARS: usize = 32;
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
