//! Source tokens attached to properties.
//!
//! A [`Token`] views a span of text split in three regions:
//!
//! ```text
//!   "   my_var ;"
//!    ^^^            prefix
//!       ^^^^^^      word
//!             ^^    suffix
//! ```
//!
//! Tokens produced by a parser share the parsed source through an
//! `Arc<str>` and never copy it. The first in-place edit (pushing a
//! suffix, replacing the word, ...) copies the token's own span into an
//! owned `String`; the shared source is never written to.

use std::fmt;
use std::sync::Arc;

use crate::error::TokenError;
use crate::value::{Value, ValueType};

/// Lexical category of a token.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum TokenKind {
    #[default]
    None,
    Ignore,
    Identifier,
    Literal(ValueType),
    Operator,
    TypeKeyword(ValueType),
    If,
    Else,
    For,
    While,
    EndOfInstruction,
    ScopeBegin,
    ScopeEnd,
}

#[derive(Clone, Debug, Default)]
enum Buffer {
    #[default]
    Empty,
    Shared(Arc<str>),
    Owned(String),
}

impl Buffer {
    fn as_str(&self) -> &str {
        match self {
            Buffer::Empty => "",
            Buffer::Shared(text) => text,
            Buffer::Owned(text) => text,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Token {
    kind: TokenKind,
    buffer: Buffer,
    /// Start of the prefix inside the buffer.
    offset: usize,
    prefix_len: usize,
    word_len: usize,
    suffix_len: usize,
}

impl Token {
    pub fn new(kind: TokenKind) -> Self {
        Token {
            kind,
            ..Token::default()
        }
    }

    /// A token whose whole text is `word`, held as an owned buffer.
    pub fn owned(kind: TokenKind, word: impl Into<String>) -> Self {
        let word = word.into();
        Token {
            kind,
            word_len: word.len(),
            buffer: Buffer::Owned(word),
            ..Token::default()
        }
    }

    /// A token viewing `len` bytes of `source` from `offset`, all of them
    /// word. The source is shared, not copied. Both ends of the span must
    /// fall inside the source on character boundaries.
    pub fn from_source(kind: TokenKind, source: &Arc<str>, offset: usize, len: usize) -> Result<Self, TokenError> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= source.len())
            .ok_or(TokenError::OutOfSource {
                offset,
                end: offset.saturating_add(len),
                source_len: source.len(),
            })?;
        for at in [offset, end] {
            if !source.is_char_boundary(at) {
                return Err(TokenError::NotCharBoundary { at });
            }
        }
        Ok(Token {
            kind,
            buffer: Buffer::Shared(Arc::clone(source)),
            offset,
            word_len: len,
            ..Token::default()
        })
    }

    /// Literal text for `value`, e.g. `42` or `false`.
    pub fn literal(value: Value) -> Self {
        Token::owned(TokenKind::Literal(value.ty()), value.to_string())
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: TokenKind) {
        self.kind = kind;
    }

    pub fn is_some(&self) -> bool {
        self.kind != TokenKind::None
    }

    // ── Regions ──────────────────────────────────────────────────────

    fn slice(&self, start: usize, len: usize) -> &str {
        let start = self.offset + start;
        self.buffer.as_str().get(start..start + len).unwrap_or("")
    }

    pub fn prefix(&self) -> &str {
        self.slice(0, self.prefix_len)
    }

    pub fn word(&self) -> &str {
        self.slice(self.prefix_len, self.word_len)
    }

    pub fn suffix(&self) -> &str {
        self.slice(self.prefix_len + self.word_len, self.suffix_len)
    }

    /// Prefix, word and suffix together.
    pub fn text(&self) -> &str {
        self.slice(0, self.len())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    pub fn word_len(&self) -> usize {
        self.word_len
    }

    pub fn suffix_len(&self) -> usize {
        self.suffix_len
    }

    pub fn len(&self) -> usize {
        self.prefix_len + self.word_len + self.suffix_len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_buffer(&self) -> bool {
        !matches!(self.buffer, Buffer::Empty)
    }

    /// Whether edits already promoted the token to its own buffer.
    pub fn is_owned(&self) -> bool {
        matches!(self.buffer, Buffer::Owned(_))
    }

    // ── Boundary moves (text unchanged) ──────────────────────────────

    /// Move the word's start by `amount` bytes. The prefix absorbs the
    /// difference.
    pub fn word_move_begin(&mut self, amount: isize) -> Result<(), TokenError> {
        let moved = amount.unsigned_abs();
        let (prefix_len, word_len) = if amount >= 0 {
            (Some(self.prefix_len + moved), self.word_len.checked_sub(moved))
        } else {
            (self.prefix_len.checked_sub(moved), Some(self.word_len + moved))
        };
        let (Some(prefix_len), Some(word_len)) = (prefix_len, word_len) else {
            return Err(TokenError::OutOfToken { amount });
        };
        self.check_boundary(prefix_len)?;
        self.prefix_len = prefix_len;
        self.word_len = word_len;
        Ok(())
    }

    /// Move the word's end by `amount` bytes. The suffix absorbs the
    /// difference.
    pub fn word_move_end(&mut self, amount: isize) -> Result<(), TokenError> {
        let moved = amount.unsigned_abs();
        let (word_len, suffix_len) = if amount >= 0 {
            (Some(self.word_len + moved), self.suffix_len.checked_sub(moved))
        } else {
            (self.word_len.checked_sub(moved), Some(self.suffix_len + moved))
        };
        let (Some(word_len), Some(suffix_len)) = (word_len, suffix_len) else {
            return Err(TokenError::OutOfToken { amount });
        };
        self.check_boundary(self.prefix_len + word_len)?;
        self.word_len = word_len;
        self.suffix_len = suffix_len;
        Ok(())
    }

    /// `at` is relative to the token's start.
    fn check_boundary(&self, at: usize) -> Result<(), TokenError> {
        let at = self.offset + at;
        if self.buffer.as_str().is_char_boundary(at) {
            Ok(())
        } else {
            Err(TokenError::NotCharBoundary { at })
        }
    }

    // ── Edits (promote to owned) ─────────────────────────────────────

    /// Copy the token's span into an owned buffer starting at offset 0.
    fn make_owned(&mut self) -> &mut String {
        if !self.is_owned() || self.offset != 0 {
            let text = self.text().to_owned();
            self.buffer = Buffer::Owned(text);
            self.offset = 0;
        }
        match &mut self.buffer {
            Buffer::Owned(text) => {
                text.truncate(self.prefix_len + self.word_len + self.suffix_len);
                text
            }
            Buffer::Empty | Buffer::Shared(_) => unreachable!("buffer was just promoted"),
        }
    }

    pub fn prefix_push_front(&mut self, text: &str) {
        self.make_owned().insert_str(0, text);
        self.prefix_len += text.len();
    }

    pub fn suffix_push_back(&mut self, text: &str) {
        self.make_owned().push_str(text);
        self.suffix_len += text.len();
    }

    /// Replace the word, keeping prefix and suffix.
    pub fn word_replace(&mut self, word: &str) {
        let start = self.prefix_len;
        let end = start + self.word_len;
        self.make_owned().replace_range(start..end, word);
        self.word_len = word.len();
    }

    /// Give this token `source`'s prefix and suffix. `source` keeps only its
    /// word and stays on its original buffer.
    pub fn take_prefix_suffix_from(&mut self, source: &mut Token) {
        let prefix = source.prefix().to_owned();
        let suffix = source.suffix().to_owned();

        source.offset += source.prefix_len;
        source.prefix_len = 0;
        source.suffix_len = 0;

        let owned = self.make_owned();
        owned.insert_str(0, &prefix);
        owned.push_str(&suffix);
        self.prefix_len += prefix.len();
        self.suffix_len += suffix.len();
    }

    /// Drop the text, keep the kind.
    pub fn clear(&mut self) {
        self.buffer = Buffer::Empty;
        self.offset = 0;
        self.prefix_len = 0;
        self.word_len = 0;
        self.suffix_len = 0;
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}
