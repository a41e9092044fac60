//! The match patterns that definitions are registered with.

use std::fmt;

use regex::Regex;
use regex_syntax::ast;
use smol_str::SmolStr;

use crate::error::RegistryError;

/// Something to match at the cursor: exact text, or a regular expression.
///
/// A `&str` or `String` converts into a [`Pattern::Literal`], so
/// `builder.add_token(Kind::Semi, ";")` matches a single semicolon.
/// Use [`Pattern::regex`] (or convert a compiled [`Regex`]) for anything else.
#[derive(Clone)]
pub enum Pattern {
    Literal(SmolStr),
    Regex(Regex),
}

impl Pattern {
    /// Compile a regular expression pattern.
    pub fn regex(pattern: &str) -> Result<Pattern, RegistryError> {
        Regex::new(pattern)
            .map(Pattern::Regex)
            .map_err(|source| RegistryError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// The regex source for this pattern; literals are escaped.
    pub fn source(&self) -> String {
        match self {
            Pattern::Literal(text) => regex::escape(text),
            Pattern::Regex(re) => re.as_str().to_string(),
        }
    }

    /// The source, made safe to wrap in a group.
    ///
    /// A verbose-mode pattern ending in a `#` comment would swallow whatever
    /// follows it, so the comment is closed with a newline. Verbose mode is
    /// still on at that point, so the newline is ignored by the matcher.
    pub(crate) fn group_source(&self) -> String {
        let mut source = self.source();
        if ends_in_open_comment(&source) {
            source.push('\n');
        }
        source
    }

    /// The number of capture groups inside this pattern, not counting the
    /// implicit whole-match group.
    pub(crate) fn inner_groups(&self) -> usize {
        match self {
            Pattern::Literal(_) => 0,
            Pattern::Regex(re) => re.captures_len() - 1,
        }
    }
}

fn ends_in_open_comment(source: &str) -> bool {
    if !source.contains('#') || source.ends_with('\n') {
        return false;
    }
    ast::parse::Parser::new()
        .parse_with_comments(source)
        .ok()
        .and_then(|parsed| parsed.comments.last().map(|c| c.span.end.offset))
        .is_some_and(|end| end == source.len())
}

/// A pattern compiled to test the input at the cursor.
///
/// Unlike a plain [`Regex`] search, a lookahead never scans past the cursor
/// looking for a later match.
#[derive(Clone, Debug)]
pub struct Lookahead {
    anchored: Regex,
}

impl Lookahead {
    pub fn new(pattern: impl Into<Pattern>) -> Result<Lookahead, RegistryError> {
        let source = format!(r"\A(?:{})", pattern.into().group_source());
        Regex::new(&source)
            .map(|anchored| Lookahead { anchored })
            .map_err(|source_err| RegistryError::InvalidPattern {
                pattern: source,
                source: source_err,
            })
    }

    /// The length in bytes of the match at the start of `text`, if any.
    pub fn match_len(&self, text: &str) -> Option<usize> {
        self.anchored.find(text).map(|m| m.end())
    }
}

impl From<&str> for Pattern {
    fn from(src: &str) -> Pattern {
        Pattern::Literal(src.into())
    }
}

impl From<String> for Pattern {
    fn from(src: String) -> Pattern {
        Pattern::Literal(src.into())
    }
}

impl From<SmolStr> for Pattern {
    fn from(src: SmolStr) -> Pattern {
        Pattern::Literal(src)
    }
}

impl From<Regex> for Pattern {
    fn from(src: Regex) -> Pattern {
        Pattern::Regex(src)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(text) => write!(f, "{text:?}"),
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}
