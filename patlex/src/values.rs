//! Out-of-line storage for the text and position of emitted tokens.
//!
//! The scan loop hands the caller a small [`TokenId`] for each token; the
//! token's value and source range live here and are looked up on demand.

use std::{fmt, num::NonZeroU32, ops::Range};

use smol_str::SmolStr;

/// A handle to a token produced by one [`Lexer`].
///
/// Ids start at 1 and increase by one for every emitted token. Zero is never
/// a valid id, which lets `Option<TokenId>` stay the size of a `u32`.
///
/// An id is only meaningful to the lexer (and value table) that produced it.
///
/// [`Lexer`]: crate::Lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId(NonZeroU32);

impl TokenId {
    /// The first id handed out by a fresh table.
    pub const FIRST: TokenId = TokenId(NonZeroU32::MIN);

    /// Create an id from its raw value; returns `None` for zero.
    pub fn new(raw: u32) -> Option<TokenId> {
        NonZeroU32::new(raw).map(TokenId)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    // the id of the `count`th token, if it fits
    fn from_count(count: usize) -> Option<TokenId> {
        u32::try_from(count).ok().and_then(TokenId::new)
    }

    fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The value stored for a token.
///
/// Fixed-kind definitions always store the matched [`Text`]. Dispatch
/// handlers may store text, an arbitrary computed [`Literal`], or a
/// [`TokenRef`] pointing back at an earlier token of the same lexer.
///
/// [`Text`]: Value::Text
/// [`Literal`]: Value::Literal
/// [`TokenRef`]: Value::TokenRef
#[derive(Debug, Clone, PartialEq)]
pub enum Value<V> {
    Text(SmolStr),
    Literal(V),
    TokenRef(TokenId),
}

impl<V> Value<V> {
    pub fn text(text: impl Into<SmolStr>) -> Self {
        Value::Text(text.into())
    }

    /// If this value is a back-reference, the id it refers to.
    pub fn as_token_ref(&self) -> Option<TokenId> {
        match self {
            Value::TokenRef(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&V> {
        match self {
            Value::Literal(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Entry<V> {
    value: Value<V>,
    // character offsets
    start: usize,
    end: usize,
    bytes: Range<usize>,
}

/// An append-only, id-indexed store of token values and source ranges.
///
/// Positions are character offsets into the source. The matching byte range
/// is kept alongside, for slicing the source text.
#[derive(Debug, Clone)]
pub struct ValueTable<V> {
    entries: Vec<Entry<V>>,
}

impl<V> Default for ValueTable<V> {
    fn default() -> Self {
        ValueTable {
            entries: Vec::new(),
        }
    }
}

impl<V> ValueTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a token and return its freshly allocated id.
    ///
    /// `range` is in characters and `bytes` is the same span in bytes.
    /// Returns `None` once every id that fits in a `u32` has been handed out.
    ///
    /// # Panics
    ///
    /// Panics if either range is reversed; the caller computes both from a
    /// single match, so this is a bug in the caller.
    pub fn append(
        &mut self,
        value: Value<V>,
        range: Range<usize>,
        bytes: Range<usize>,
    ) -> Option<TokenId> {
        assert!(
            range.start <= range.end && bytes.start <= bytes.end,
            "invalid token range {range:?} (bytes {bytes:?})"
        );
        let id = self.next_id()?;
        self.entries.push(Entry {
            value,
            start: range.start,
            end: range.end,
            bytes,
        });
        Some(id)
    }

    /// The id that the next call to [`append`] will return, if there is one.
    ///
    /// [`append`]: ValueTable::append
    pub fn next_id(&self) -> Option<TokenId> {
        self.entries
            .len()
            .checked_add(1)
            .and_then(TokenId::from_count)
    }

    /// The most recently allocated id, if any.
    pub fn last_id(&self) -> Option<TokenId> {
        TokenId::from_count(self.entries.len())
    }

    pub fn contains(&self, id: TokenId) -> bool {
        id.index() < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn value(&self, id: TokenId) -> Option<&Value<V>> {
        self.entry(id).map(|entry| &entry.value)
    }

    /// The character offset where this token starts.
    pub fn start(&self, id: TokenId) -> Option<usize> {
        self.entry(id).map(|entry| entry.start)
    }

    /// The character offset just past this token.
    pub fn end(&self, id: TokenId) -> Option<usize> {
        self.entry(id).map(|entry| entry.end)
    }

    /// The half-open character range consumed by this token.
    pub fn range(&self, id: TokenId) -> Option<Range<usize>> {
        self.entry(id).map(|entry| entry.start..entry.end)
    }

    /// The half-open byte range consumed by this token.
    pub fn byte_range(&self, id: TokenId) -> Option<Range<usize>> {
        self.entry(id).map(|entry| entry.bytes.clone())
    }

    /// Follow back-references until reaching a value that is not a [`TokenRef`].
    ///
    /// Returns `None` if `id` or any id along the chain is unknown, or if a
    /// reference does not point to an earlier token.
    ///
    /// [`TokenRef`]: Value::TokenRef
    pub fn resolve(&self, mut id: TokenId) -> Option<&Value<V>> {
        loop {
            match self.value(id)? {
                Value::TokenRef(target) if *target < id => id = *target,
                Value::TokenRef(_) => return None,
                value => return Some(value),
            }
        }
    }

    /// Iterate over `(id, value, character range)` in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, &Value<V>, Range<usize>)> + '_ {
        self.entries
            .iter()
            .zip((1..=u32::MAX).filter_map(TokenId::new))
            .map(|(entry, id)| (id, &entry.value, entry.start..entry.end))
    }

    fn entry(&self, id: TokenId) -> Option<&Entry<V>> {
        self.entries.get(id.index())
    }
}
