//! Scan a string, producing a sequence of tokens.
//!
//! A [`Lexer`] walks its input once, from left to right. At each position it
//! asks the [`Registry`] which definition matches; skipped spans are dropped,
//! and everything else is recorded in the lexer's [`ValueTable`] and handed to
//! the caller as a `(kind, id)` pair.
//!
//! The `Lexer` is usually driven by a parser, which pulls tokens on demand
//! with [`Lexer::next_token`] and looks up values by id as it needs them.

use std::ops::Range;

use log::{trace, warn};
use regex::CaptureLocations;

use crate::{
    error::LexError,
    pattern::Lookahead,
    registry::{Registry, Role},
    values::{TokenId, Value, ValueTable},
};

/// Where a scan is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScanState {
    #[default]
    Running,
    /// Every character of the input has been consumed.
    EndOfInput,
    /// The last call to `next_token` returned an error.
    Failed,
}

/// What to do when no definition matches at the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recovery {
    /// Stop, returning [`LexError::UnmatchedInput`].
    Fail,
    /// Discard this many characters (at least one) and keep scanning.
    Skip(usize),
}

/// Everything an error hook needs to decide how to recover.
#[derive(Clone, Copy, Debug)]
pub struct Unmatched<'a> {
    /// The character offset of the cursor.
    pub position: usize,
    pub remaining: &'a str,
}

type RecoveryHook<'a> = Box<dyn FnMut(Unmatched<'_>) -> Recovery + 'a>;

/// A token as collected by [`Lexer::tokenize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<K> {
    pub kind: K,
    pub id: TokenId,
    /// Character offsets.
    pub range: Range<usize>,
    /// Byte offsets, for slicing the source.
    pub bytes: Range<usize>,
}

/// A single scan over one input string.
///
/// Positions reported by the lexer (token ranges, error positions, the
/// cursor) count characters. Byte offsets are available separately through
/// [`byte_position`] and [`ValueTable::byte_range`].
///
/// [`byte_position`]: Lexer::byte_position
pub struct Lexer<'a, K, V = smol_str::SmolStr> {
    input: &'a str,
    pos: usize,
    char_pos: usize,
    registry: &'a Registry<K, V>,
    locs: CaptureLocations,
    values: ValueTable<V>,
    state: ScanState,
    on_unmatched: Option<RecoveryHook<'a>>,
}

impl<'a, K: Clone, V> Lexer<'a, K, V> {
    pub fn new(input: &'a str, registry: &'a Registry<K, V>) -> Self {
        Lexer {
            input,
            pos: 0,
            char_pos: 0,
            registry,
            locs: registry.capture_locations(),
            values: ValueTable::new(),
            state: ScanState::default(),
            on_unmatched: None,
        }
    }

    /// Install a hook that is consulted whenever no definition matches.
    ///
    /// Without a hook, unmatched input ends the scan with an error.
    #[must_use]
    pub fn on_unmatched(mut self, hook: impl FnMut(Unmatched<'_>) -> Recovery + 'a) -> Self {
        self.on_unmatched = Some(Box::new(hook));
        self
    }

    /// Advance to the next token.
    ///
    /// Returns `Ok(None)` once the input is exhausted. Errors are not
    /// sticky: a failing match leaves the cursor where it was, so calling
    /// this again after an error fails the same way.
    pub fn next_token(&mut self) -> Result<Option<(K, TokenId)>, LexError> {
        let result = self.scan();
        self.state = match &result {
            Ok(Some(_)) => ScanState::Running,
            Ok(None) => ScanState::EndOfInput,
            Err(_) => ScanState::Failed,
        };
        result
    }

    fn scan(&mut self) -> Result<Option<(K, TokenId)>, LexError> {
        // skipped spans loop here rather than recursing, so any number of
        // them in a row is fine
        let input = self.input;
        let registry = self.registry;
        loop {
            if self.is_at_end() {
                return Ok(None);
            }

            let start = self.pos;
            let rest = &input[start..];
            let hit = match registry.match_start(&mut self.locs, rest) {
                // an empty match would never advance the cursor
                Some(hit) if hit.len > 0 => hit,
                _ => {
                    self.recover()?;
                    continue;
                }
            };

            let end = start + hit.len;
            let text = &input[start..end];
            let char_start = self.char_pos;
            let char_end = char_start + text.chars().count();

            // match_start only reports indices into the registry's definitions
            let def = &registry.definitions()[hit.definition];
            let (kind, value) = match &def.role {
                Role::Skip => {
                    trace!("{char_start}..{char_end} skip");
                    self.advance(end, char_end);
                    continue;
                }
                Role::Token(kind) => (kind.clone(), Value::text(text)),
                Role::Dispatch(handler) => handler(text, &self.values).map_err(|source| {
                    LexError::Handler {
                        range: char_start..char_end,
                        source,
                    }
                })?,
            };

            if let Value::TokenRef(target) = value {
                if !self.values.contains(target) {
                    return Err(LexError::DanglingReference {
                        range: char_start..char_end,
                        target,
                    });
                }
            }

            let id = self
                .values
                .append(value, char_start..char_end, start..end)
                .ok_or(LexError::TooManyTokens {
                    position: char_start,
                })?;
            self.advance(end, char_end);
            trace!("{char_start}..{char_end} token {id}");
            return Ok(Some((kind, id)));
        }
    }

    fn advance(&mut self, pos: usize, char_pos: usize) {
        self.pos = pos;
        self.char_pos = char_pos;
    }

    fn recover(&mut self) -> Result<(), LexError> {
        let input = self.input;
        let unmatched = Unmatched {
            position: self.char_pos,
            remaining: &input[self.pos..],
        };
        let recovery = match self.on_unmatched.as_mut() {
            Some(hook) => hook(unmatched),
            None => Recovery::Fail,
        };

        match recovery {
            Recovery::Fail => Err(LexError::UnmatchedInput {
                position: unmatched.position,
                remaining: unmatched.remaining.to_string(),
            }),
            Recovery::Skip(count) => {
                let (skipped, target) = skip_target(unmatched.remaining, count);
                warn!(
                    "no pattern matches at offset {}, skipping {skipped} chars",
                    self.char_pos
                );
                self.advance(self.pos + target, self.char_pos + skipped);
                Ok(())
            }
        }
    }

    /// Report whether `lookahead` matches at the cursor, without consuming input.
    pub fn peek_match(&self, lookahead: &Lookahead) -> bool {
        lookahead.match_len(self.remaining()).is_some()
    }

    /// Consume the lexer, collecting every remaining token.
    pub fn tokenize(mut self) -> Result<(Vec<Token<K>>, ValueTable<V>), LexError> {
        let mut tokens = Vec::new();
        while let Some((kind, id)) = self.next_token()? {
            let range = self.values.range(id).unwrap_or_default();
            let bytes = self.values.byte_range(id).unwrap_or_default();
            tokens.push(Token {
                kind,
                id,
                range,
                bytes,
            });
        }
        Ok((tokens, self.values))
    }
}

// at least one character, never past the end of `rest`;
// returns (chars skipped, bytes skipped)
fn skip_target(rest: &str, count: usize) -> (usize, usize) {
    let count = count.max(1);
    match rest.char_indices().nth(count) {
        Some((offset, _)) => (count, offset),
        None => (rest.chars().count(), rest.len()),
    }
}

impl<'a, K, V> Lexer<'a, K, V> {
    pub fn source(&self) -> &'a str {
        self.input
    }

    /// The character offset of the cursor.
    pub fn position(&self) -> usize {
        self.char_pos
    }

    /// The byte offset of the cursor.
    pub fn byte_position(&self) -> usize {
        self.pos
    }

    /// The input not yet consumed.
    pub fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn registry(&self) -> &'a Registry<K, V> {
        self.registry
    }

    pub fn values(&self) -> &ValueTable<V> {
        &self.values
    }

    pub fn into_values(self) -> ValueTable<V> {
        self.values
    }

    pub fn value(&self, id: TokenId) -> Option<&Value<V>> {
        self.values.value(id)
    }

    pub fn start(&self, id: TokenId) -> Option<usize> {
        self.values.start(id)
    }

    pub fn end(&self, id: TokenId) -> Option<usize> {
        self.values.end(id)
    }

    pub fn range(&self, id: TokenId) -> Option<Range<usize>> {
        self.values.range(id)
    }

    /// The source text consumed by a token.
    ///
    /// For dispatched tokens this can differ from the stored value.
    pub fn text(&self, id: TokenId) -> Option<&'a str> {
        let input = self.input;
        self.values.byte_range(id).and_then(|range| input.get(range))
    }
}

impl<K: Clone, V> Iterator for Lexer<'_, K, V> {
    type Item = Result<(K, TokenId), LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != ScanState::Running {
            return None;
        }
        self.next_token().transpose()
    }
}

impl<K: Clone, V> std::iter::FusedIterator for Lexer<'_, K, V> {}

#[cfg(test)]
pub(crate) fn debug_tokens<K: std::fmt::Debug>(tokens: &[Token<K>]) -> Vec<String> {
    tokens
        .iter()
        .map(|token| format!("{}..{} {:?}", token.range.start, token.range.end, token.kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use smol_str::SmolStr;

    use super::*;
    use crate::{error::HandlerError, pattern::Pattern, registry::RegistryBuilder};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Kind {
        Word,
        Digit,
        Ident,
        Plus,
        SelfQ,
        Ref,
    }

    fn re(src: &str) -> Pattern {
        Pattern::regex(src).unwrap()
    }

    fn words() -> Registry<Kind> {
        Registry::builder()
            .skip(re(r"\s+"))
            .token(Kind::Word, re(r"\w+"))
            .build()
            .unwrap()
    }

    #[test]
    fn skip_then_word() {
        let registry = words();
        let mut lexer = Lexer::new("  ab", &registry);
        let (kind, id) = lexer.next_token().unwrap().unwrap();
        assert_eq!(kind, Kind::Word);
        assert_eq!(id.get(), 1);
        assert_eq!(lexer.start(id), Some(2));
        assert_eq!(lexer.end(id), Some(4));
        assert_eq!(lexer.next_token().unwrap(), None);
        assert_eq!(lexer.state(), ScanState::EndOfInput);
    }

    #[test]
    fn offsets_count_characters() {
        let registry = words();
        let mut lexer = Lexer::new("é ab", &registry);
        let (_, first) = lexer.next_token().unwrap().unwrap();
        let (_, second) = lexer.next_token().unwrap().unwrap();
        assert_eq!(lexer.range(first), Some(0..1));
        assert_eq!(lexer.range(second), Some(2..4));
        assert_eq!(lexer.values().byte_range(second), Some(3..5));
        assert_eq!(lexer.text(second), Some("ab"));
        assert_eq!(lexer.position(), 4);
        assert_eq!(lexer.byte_position(), 5);
    }

    #[test]
    fn error_positions_count_characters() {
        let registry = words();
        let mut lexer = Lexer::new("日本 +", &registry);
        lexer.next_token().unwrap().unwrap();
        let err = lexer.next_token().unwrap_err();
        assert!(matches!(err, LexError::UnmatchedInput { position: 3, ref remaining } if remaining == "+"));
    }

    #[test]
    fn empty_input() {
        let registry = words();
        let mut lexer = Lexer::new("", &registry);
        assert_eq!(lexer.next_token().unwrap(), None);
        assert!(lexer.values().is_empty());
    }

    #[test]
    fn unmatched_character() {
        let registry: Registry<Kind> = Registry::builder()
            .token(Kind::Digit, re(r"\d+"))
            .build()
            .unwrap();
        let mut lexer = Lexer::new("a1", &registry);
        let err = lexer.next_token().unwrap_err();
        assert!(
            matches!(err, LexError::UnmatchedInput { position: 0, ref remaining } if remaining == "a1")
        );
        assert_eq!(lexer.state(), ScanState::Failed);
        // deterministic: the same failure recurs
        assert_eq!(lexer.next_token().unwrap_err().position(), 0);
    }

    #[test]
    fn skip_only_input_allocates_nothing() {
        let registry: Registry<Kind> = Registry::builder().skip(re(r"\s+")).build().unwrap();
        let mut lexer = Lexer::new("   ", &registry);
        assert_eq!(lexer.next_token().unwrap(), None);
        assert!(lexer.values().is_empty());
        assert_eq!(lexer.position(), 3);
    }

    #[test]
    fn many_skips_do_not_recurse() {
        let registry: Registry<Kind> = Registry::builder()
            .skip(" ")
            .token(Kind::Word, re(r"\w+"))
            .build()
            .unwrap();
        let input = format!("{}end", " ".repeat(200_000));
        let mut lexer = Lexer::new(&input, &registry);
        let (_, id) = lexer.next_token().unwrap().unwrap();
        assert_eq!(lexer.text(id), Some("end"));
    }

    #[test]
    fn ids_increase_and_cover_input() {
        let registry = words();
        let input = " alpha beta\tgamma \n";
        let mut lexer = Lexer::new(input, &registry);
        let mut ids = Vec::new();
        let mut token_len = 0;
        while let Some((_, id)) = lexer.next_token().unwrap() {
            let range = lexer.range(id).unwrap();
            assert_eq!(lexer.value(id).and_then(Value::as_text), lexer.text(id));
            token_len += range.len();
            ids.push(id.get());
        }
        assert_eq!(ids, vec![1, 2, 3]);
        let skipped = input.chars().filter(|c| c.is_whitespace()).count();
        assert_eq!(token_len + skipped, input.chars().count());
    }

    #[test]
    fn dispatch_stores_computed_value() {
        let registry: Registry<Kind> = Registry::builder()
            .skip(re(r"\s+"))
            .dispatch(
                |text, _| {
                    let stripped = text.trim_matches('`');
                    Ok((Kind::Ident, Value::text(stripped)))
                },
                re(r"`[a-z]+`"),
            )
            .build()
            .unwrap();
        let mut lexer = Lexer::new(" `foo`", &registry);
        let (kind, id) = lexer.next_token().unwrap().unwrap();
        assert_eq!(kind, Kind::Ident);
        assert_eq!(lexer.value(id), Some(&Value::Text(SmolStr::new("foo"))));
        assert_eq!(lexer.text(id), Some("`foo`"));
        assert_eq!(lexer.range(id), Some(1..6));
    }

    #[test]
    fn dispatch_literal_values() {
        let registry: Registry<Kind, i64> = Registry::builder()
            .dispatch(
                |text, _| {
                    let value = text.parse::<i64>().map_err(HandlerError::new)?;
                    Ok((Kind::Digit, Value::Literal(value)))
                },
                re(r"\d+"),
            )
            .build()
            .unwrap();
        let mut lexer = Lexer::new("1", &registry);
        let (_, id) = lexer.next_token().unwrap().unwrap();
        // a literal 1 is not mistaken for a reference to token 1
        assert_eq!(lexer.value(id), Some(&Value::Literal(1)));
        assert_eq!(lexer.value(id).unwrap().as_token_ref(), None);
    }

    #[test]
    fn dispatch_back_reference() {
        let registry: Registry<Kind> = Registry::builder()
            .token(Kind::Word, re(r"[a-z]+"))
            .dispatch(
                |_, values| match values.last_id() {
                    Some(prev) => Ok((Kind::Ref, Value::TokenRef(prev))),
                    None => Err(HandlerError::new("nothing to refer to")),
                },
                "^",
            )
            .build()
            .unwrap();
        let mut lexer = Lexer::new("ab^", &registry);
        let (_, word) = lexer.next_token().unwrap().unwrap();
        let (kind, reference) = lexer.next_token().unwrap().unwrap();
        assert_eq!(kind, Kind::Ref);
        assert_eq!(lexer.value(reference).unwrap().as_token_ref(), Some(word));
        assert_eq!(
            lexer.values().resolve(reference).and_then(Value::as_text),
            Some("ab")
        );
    }

    #[test]
    fn dangling_reference_is_an_error() {
        let registry: Registry<Kind> = Registry::builder()
            .dispatch(
                |_, values| match values.next_id() {
                    Some(next) => Ok((Kind::Ref, Value::TokenRef(next))),
                    None => Err(HandlerError::new("table is full")),
                },
                "^",
            )
            .build()
            .unwrap();
        let mut lexer = Lexer::new("^", &registry);
        let err = lexer.next_token().unwrap_err();
        assert!(matches!(err, LexError::DanglingReference { range, .. } if range == (0..1)));
        assert!(lexer.values().is_empty());
        // the offending token was not consumed
        assert_eq!(lexer.position(), 0);
        assert!(matches!(
            lexer.next_token(),
            Err(LexError::DanglingReference { .. })
        ));
    }

    #[test]
    fn handler_failure_propagates() {
        let registry: Registry<Kind> = Registry::builder()
            .skip(" ")
            .dispatch(|_, _| Err(HandlerError::new("nope")), "x")
            .build()
            .unwrap();
        let mut lexer = Lexer::new(" x", &registry);
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.position(), 1);
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn handler_failure_does_not_consume_input() {
        let registry: Registry<Kind> = Registry::builder()
            .skip(re(r"\s+"))
            .dispatch(|_, _| Err(HandlerError::new("bad token")), "x")
            .token(Kind::Word, re(r"[a-w]+"))
            .build()
            .unwrap();
        let mut lexer = Lexer::new("x ab", &registry);
        for _ in 0..2 {
            let err = lexer.next_token().unwrap_err();
            assert!(matches!(err, LexError::Handler { ref range, .. } if *range == (0..1)));
            assert_eq!(lexer.state(), ScanState::Failed);
            assert_eq!(lexer.position(), 0);
            assert_eq!(lexer.remaining(), "x ab");
        }
        assert!(lexer.values().is_empty());
    }

    #[test]
    fn empty_match_is_unmatched() {
        let registry: Registry<Kind> = Registry::builder()
            .token(Kind::Word, re(r"[a-z]*"))
            .build()
            .unwrap();
        let mut lexer = Lexer::new("ab1", &registry);
        assert!(lexer.next_token().unwrap().is_some());
        let err = lexer.next_token().unwrap_err();
        assert!(matches!(err, LexError::UnmatchedInput { position: 2, .. }));
    }

    #[test]
    fn recovery_hook_skips_input() {
        let registry: Registry<Kind> = Registry::builder()
            .token(Kind::Digit, re(r"\d+"))
            .build()
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let lexer = Lexer::new("1éé2", &registry).on_unmatched(move |unmatched| {
            sink.lock().unwrap().push(unmatched.position);
            Recovery::Skip(1)
        });
        let (tokens, _) = lexer.tokenize().unwrap();
        assert_eq!(debug_tokens(&tokens), vec!["0..1 Digit", "3..4 Digit"]);
        assert_eq!(tokens[1].bytes, 5..6);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn recovery_skip_counts_characters() {
        assert_eq!(skip_target("éab", 0), (1, 2));
        assert_eq!(skip_target("éab", 2), (2, 3));
        assert_eq!(skip_target("éa", 9), (2, 3));
    }

    #[test]
    fn recovery_hook_can_fail() {
        let registry: Registry<Kind> = Registry::builder()
            .token(Kind::Digit, re(r"\d+"))
            .build()
            .unwrap();
        let mut lexer = Lexer::new("x", &registry).on_unmatched(|_| Recovery::Fail);
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn peek_does_not_consume() {
        let registry: Registry<Kind> = Registry::builder()
            .token(Kind::SelfQ, "self?")
            .token(Kind::Word, re(r"\w+"))
            .build()
            .unwrap();
        let lookahead = |pattern: Pattern| Lookahead::new(pattern).unwrap();
        let mut lexer = Lexer::new("self?", &registry);
        assert!(lexer.peek_match(&lookahead(Pattern::from("self"))));
        assert!(lexer.peek_match(&lookahead(re(r"s\w+\?"))));
        // matches later in the input do not count
        assert!(!lexer.peek_match(&lookahead(re(r"\?"))));
        assert_eq!(lexer.position(), 0);
        let (kind, _) = lexer.next_token().unwrap().unwrap();
        assert_eq!(kind, Kind::SelfQ);
    }

    #[test]
    fn iterator_fuses_after_error() {
        let registry: Registry<Kind> = Registry::builder()
            .token(Kind::Plus, "+")
            .build()
            .unwrap();
        let results: Vec<_> = Lexer::new("++-+", &registry).collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(results[2].is_err());
    }

    #[rstest]
    #[case("self?", vec!["0..5 SelfQ"])]
    #[case("selfish", vec!["0..7 Word"])]
    #[case("a+b", vec!["0..1 Word", "1..2 Plus", "2..3 Word"])]
    #[case(" self? self ", vec!["1..6 SelfQ", "7..11 Word"])]
    fn precedence(#[case] input: &str, #[case] expected: Vec<&str>) {
        let mut builder: RegistryBuilder<Kind> = RegistryBuilder::new();
        builder
            .add_skip(re(r"\s+"))
            .add_token(Kind::SelfQ, "self?")
            .add_token(Kind::Plus, "+")
            .add_token(Kind::Word, re(r"\w+"));
        let registry = builder.build().unwrap();
        let (tokens, _) = Lexer::new(input, &registry).tokenize().unwrap();
        assert_eq!(debug_tokens(&tokens), expected);
    }

    #[test]
    fn registry_shared_across_threads() {
        let registry = Arc::new(words());
        let handles: Vec<_> = ["one two", "three", "four five six"]
            .into_iter()
            .map(|input| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let (tokens, _) = Lexer::new(input, &*registry).tokenize().unwrap();
                    tokens.len()
                })
            })
            .collect();
        let counts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(counts, vec![2, 1, 3]);
    }
}
