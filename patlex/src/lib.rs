//! Build lexers from an ordered table of patterns.
//!
//! A lexer is described by a list of definitions, each pairing a pattern with
//! one of three roles: emit a token of a fixed kind, hand the match to a
//! dispatch function that computes the kind and value, or skip the text.
//! The definitions are compiled once into a [`Registry`], which any number of
//! [`Lexer`]s can then share.
//!
//! ```
//! use patlex::{Lexer, Pattern, Registry};
//!
//! #[derive(Debug, Clone, Copy, PartialEq)]
//! enum Kind {
//!     Word,
//! }
//!
//! let registry: Registry<Kind> = Registry::builder()
//!     .skip(Pattern::regex(r"\s+")?)
//!     .token(Kind::Word, Pattern::regex(r"\w+")?)
//!     .build()?;
//!
//! let mut lexer = Lexer::new("  ab", &registry);
//! let (kind, id) = lexer.next_token()?.unwrap();
//! assert_eq!(kind, Kind::Word);
//! assert_eq!(lexer.range(id), Some(2..4));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod lexer;
mod pattern;
mod registry;
pub mod rules;
mod values;

pub use error::{HandlerError, LexError, RegistryError};
pub use lexer::{Lexer, Recovery, ScanState, Token, Unmatched};
pub use pattern::{Lookahead, Pattern};
pub use registry::{Definition, Handler, Registry, RegistryBuilder, Role};
pub use values::{TokenId, Value, ValueTable};
