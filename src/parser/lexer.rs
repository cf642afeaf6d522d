//! Tokenizer for telemetry lines.
//!
//! The lexer never fails: characters it does not recognize become [`TokenKind::Other`]
//! tokens so that log prefixes with arbitrary content can still be skipped by the parser.

/// Kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// ASCII identifier: letter or `_`, then letters, digits or `_`
    Ident,
    /// Decimal number with optional sign, fraction and exponent
    Number,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `->`
    Arrow,
    /// Any other single character
    Other,
}

/// A token together with the slice of input it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Token kind
    pub kind: TokenKind,
    /// Source text
    pub text: &'a str,
    /// Byte offset of the token in the line
    pub offset: usize,
}

impl<'a> Token<'a> {
    /// True for an identifier spelled exactly `word`.
    pub fn is_ident(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == word
    }

    /// True for an unsigned run of decimal digits.
    pub fn is_unsigned_integer(&self) -> bool {
        self.kind == TokenKind::Number && self.text.bytes().all(|b| b.is_ascii_digit())
    }
}

/// Splits `line` into tokens, skipping whitespace.
pub fn tokenize(line: &str) -> Vec<Token<'_>> {
    let bytes = line.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let b = bytes[pos];
        if b.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let kind = match b {
            b'(' => {
                pos += 1;
                TokenKind::LParen
            }
            b')' => {
                pos += 1;
                TokenKind::RParen
            }
            b',' => {
                pos += 1;
                TokenKind::Comma
            }
            b':' => {
                pos += 1;
                TokenKind::Colon
            }
            b'-' if bytes.get(pos + 1) == Some(&b'>') => {
                pos += 2;
                TokenKind::Arrow
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => match scan_number(bytes, pos) {
                Some(end) => {
                    pos = end;
                    TokenKind::Number
                }
                None => {
                    pos += 1;
                    TokenKind::Other
                }
            },
            b if b.is_ascii_alphabetic() || b == b'_' => {
                pos += 1;
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                    pos += 1;
                }
                TokenKind::Ident
            }
            _ => {
                // step over a whole UTF-8 scalar so slices stay on char boundaries
                let width = line[pos..].chars().next().map_or(1, char::len_utf8);
                pos += width;
                TokenKind::Other
            }
        };

        tokens.push(Token {
            kind,
            text: &line[start..pos],
            offset: start,
        });
    }

    tokens
}

/// Returns the end offset of a number starting at `start`, if one starts there.
fn scan_number(bytes: &[u8], start: usize) -> Option<usize> {
    let mut pos = start;
    if matches!(bytes.get(pos), Some(b'+' | b'-')) {
        pos += 1;
    }

    let int_start = pos;
    while bytes.get(pos).is_some_and(u8::is_ascii_digit) {
        pos += 1;
    }
    let mut digits = pos - int_start;

    if bytes.get(pos) == Some(&b'.') {
        let frac_start = pos + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        let frac_digits = frac_end - frac_start;
        if digits > 0 || frac_digits > 0 {
            pos = frac_end;
            digits += frac_digits;
        }
    }

    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(pos), Some(b'e' | b'E')) {
        let mut exp = pos + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits_start = exp;
        while bytes.get(exp).is_some_and(u8::is_ascii_digit) {
            exp += 1;
        }
        if exp > exp_digits_start {
            pos = exp;
        }
    }

    Some(pos)
}
