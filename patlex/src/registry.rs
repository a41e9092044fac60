//! Registering pattern definitions and compiling them into one matcher.
//!
//! A [`RegistryBuilder`] collects definitions in order; [`RegistryBuilder::build`]
//! unions every pattern into a single alternation, with one capture group per
//! definition, so that a single anchored match at the cursor tells us both how
//! much input to consume and which definition fired.
//!
//! When more than one definition could match at the same offset, the one
//! registered first wins. Later definitions with overlapping patterns are
//! unreachable at those offsets; nothing warns about this.

use std::{fmt, sync::Arc};

use log::debug;
use regex::{CaptureLocations, Regex};
use smol_str::SmolStr;

use crate::{
    error::{HandlerError, RegistryError},
    pattern::Pattern,
    values::{Value, ValueTable},
};

/// A function that computes a token's kind and value from the matched text.
///
/// The handler also sees the lexer's value table, so that it can store a
/// [`Value::TokenRef`] to a token produced earlier in the same scan.
pub type Handler<K, V> =
    Arc<dyn Fn(&str, &ValueTable<V>) -> Result<(K, Value<V>), HandlerError> + Send + Sync>;

/// What happens when a definition's pattern matches.
#[derive(Clone)]
pub enum Role<K, V> {
    /// Emit a token of this kind, storing the matched text.
    Token(K),
    /// Ask a handler for the kind and value.
    Dispatch(Handler<K, V>),
    /// Discard the matched text.
    Skip,
}

impl<K: fmt::Debug, V> fmt::Debug for Role<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Token(kind) => f.debug_tuple("Token").field(kind).finish(),
            Role::Dispatch(_) => f.write_str("Dispatch(..)"),
            Role::Skip => f.write_str("Skip"),
        }
    }
}

/// One lexical alternative.
#[derive(Clone)]
pub struct Definition<K, V> {
    pub pattern: Pattern,
    pub role: Role<K, V>,
}

impl<K: fmt::Debug, V> fmt::Debug for Definition<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("pattern", &self.pattern)
            .field("role", &self.role)
            .finish()
    }
}

/// An ordered list of definitions, before compilation.
pub struct RegistryBuilder<K, V = SmolStr> {
    definitions: Vec<Definition<K, V>>,
}

impl<K, V> Default for RegistryBuilder<K, V> {
    fn default() -> Self {
        RegistryBuilder {
            definitions: Vec::new(),
        }
    }
}

impl<K, V> RegistryBuilder<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Emit tokens of `kind` wherever `pattern` matches.
    pub fn add_token(&mut self, kind: K, pattern: impl Into<Pattern>) -> &mut Self {
        self.push(pattern.into(), Role::Token(kind))
    }

    /// Discard input wherever `pattern` matches.
    pub fn add_skip(&mut self, pattern: impl Into<Pattern>) -> &mut Self {
        self.push(pattern.into(), Role::Skip)
    }

    /// Hand text matched by `pattern` to `handler`, which picks the kind and value.
    pub fn add_dispatch<F>(&mut self, handler: F, pattern: impl Into<Pattern>) -> &mut Self
    where
        F: Fn(&str, &ValueTable<V>) -> Result<(K, Value<V>), HandlerError> + Send + Sync + 'static,
    {
        self.push(pattern.into(), Role::Dispatch(Arc::new(handler)))
    }

    #[must_use]
    pub fn token(mut self, kind: K, pattern: impl Into<Pattern>) -> Self {
        self.add_token(kind, pattern);
        self
    }

    #[must_use]
    pub fn skip(mut self, pattern: impl Into<Pattern>) -> Self {
        self.add_skip(pattern);
        self
    }

    #[must_use]
    pub fn dispatch<F>(mut self, handler: F, pattern: impl Into<Pattern>) -> Self
    where
        F: Fn(&str, &ValueTable<V>) -> Result<(K, Value<V>), HandlerError> + Send + Sync + 'static,
    {
        self.add_dispatch(handler, pattern);
        self
    }

    fn push(&mut self, pattern: Pattern, role: Role<K, V>) -> &mut Self {
        self.definitions.push(Definition { pattern, role });
        self
    }

    /// Compile the alternation matcher.
    ///
    /// Flags set on a [`Regex`] through `RegexBuilder` are not carried into the
    /// combined matcher; use inline flags such as `(?i)` instead.
    pub fn build(self) -> Result<Registry<K, V>, RegistryError> {
        if self.definitions.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut source = String::from(r"\A(?:");
        let mut groups = Vec::with_capacity(self.definitions.len());
        let mut next_group = 1;
        for (i, def) in self.definitions.iter().enumerate() {
            if i > 0 {
                source.push('|');
            }
            source.push('(');
            source.push_str(&def.pattern.group_source());
            source.push(')');
            groups.push(next_group);
            next_group += 1 + def.pattern.inner_groups();
        }
        source.push(')');

        let matcher = Regex::new(&source).map_err(|e| RegistryError::InvalidPattern {
            pattern: source.clone(),
            source: e,
        })?;
        debug!(
            "compiled {} definitions into a matcher with {} groups",
            self.definitions.len(),
            matcher.captures_len()
        );

        Ok(Registry {
            definitions: self.definitions,
            groups,
            matcher,
        })
    }
}

/// A compiled, immutable set of definitions.
///
/// Any number of [`Lexer`]s can scan with the same registry, including from
/// different threads (wrap it in an `Arc` or hold it in a `static`).
///
/// [`Lexer`]: crate::Lexer
pub struct Registry<K, V = SmolStr> {
    definitions: Vec<Definition<K, V>>,
    // capture group index for each definition, in registration order
    groups: Vec<usize>,
    matcher: Regex,
}

/// The result of matching the registry at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Hit {
    pub(crate) definition: usize,
    pub(crate) len: usize,
}

impl<K, V> Registry<K, V> {
    pub fn builder() -> RegistryBuilder<K, V> {
        RegistryBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definitions(&self) -> &[Definition<K, V>] {
        &self.definitions
    }

    pub fn definition(&self, index: usize) -> Option<&Definition<K, V>> {
        self.definitions.get(index)
    }

    /// The source of the combined alternation, for debugging.
    pub fn matcher_source(&self) -> &str {
        self.matcher.as_str()
    }

    pub(crate) fn capture_locations(&self) -> CaptureLocations {
        self.matcher.capture_locations()
    }

    /// Match at the very start of `rest`, reporting the earliest-registered
    /// definition that fired and how many bytes it consumed.
    pub(crate) fn match_start(&self, locs: &mut CaptureLocations, rest: &str) -> Option<Hit> {
        let whole = self.matcher.captures_read(locs, rest)?;
        debug_assert_eq!(whole.start(), 0);
        let definition = self
            .groups
            .iter()
            .position(|group| locs.get(*group).is_some())?;
        Some(Hit {
            definition,
            len: whole.end(),
        })
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Registry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("definitions", &self.definitions)
            .field("matcher", &self.matcher.as_str())
            .finish()
    }
}
