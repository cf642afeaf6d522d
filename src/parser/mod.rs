//! Telemetry line parser.
//!
//! Turns one line of controller log output into a [`LegSample`]. The expected record is
//!
//! ```text
//! <ignored-prefix>(<timestamp_us>)Leg <n> IK: BodyXYZ(x, y, z) -> LegXYZ(x, y, z) -> LegAng(a, b, c)
//! ```
//!
//! Parsing is a two-step affair: [`lexer::tokenize`] splits the line into tokens, then a
//! small recursive-descent matcher walks the grammar. Every way a line can fail maps to a
//! [`ParseError`] variant; nothing here panics and nothing is retained between calls.
//!
//! # Truncated versus malformed
//!
//! The transport may hand over a fragment of a line. When the input ends while the
//! grammar is in the middle of a record the result is [`ParseError::Truncated`]. That
//! includes a cut inside a token: a keyword prefix (`Le`, `BodyXY`), half an arrow (`-`),
//! a lone sign or point where a number belongs, or an exponent with no digits yet.
//! When the input ends cleanly after a complete vector group but before the remaining
//! groups, the line is reported as [`MalformedReason::MissingGroup`].
//!
//! # Example
//! ```
//! use hexapod_telemetry::parser::parse;
//!
//! let line = "I (39868) wbc: (39599638)Leg 0 IK: BodyXYZ(0.106, 0.280, -0.043) \
//!             -> LegXYZ(0.230, -0.026, -0.043) -> LegAng(-0.112, 0.025, 0.768)";
//! let sample = parse(line).unwrap();
//! assert_eq!(sample.leg_index.get(), 0);
//! assert_eq!(sample.robot_timestamp_us, 39599638);
//! ```

pub mod lexer;

use crate::geometry::LegIndex;
use crate::sample::LegSample;
use lexer::{Token, TokenKind};
use nalgebra::Point3;
use serde::Serialize;
use std::num::IntErrorKind;
use thiserror::Error;

const GROUPS: [&str; 3] = ["BodyXYZ", "LegXYZ", "LegAng"];

/// Why a line was rejected as structurally wrong.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedReason {
    #[error("empty line")]
    Empty,

    #[error("no leg IK record found")]
    NoRecord,

    #[error("expected {expected}, found '{found}'")]
    Unexpected { expected: &'static str, found: String },

    #[error("missing {0} group")]
    MissingGroup(&'static str),

    #[error("non-numeric value '{found}' in {group}")]
    NonNumeric { group: &'static str, found: String },

    #[error("{group} has {count} values, expected 3")]
    WrongArity { group: &'static str, count: usize },

    #[error("'{0}' is not a valid integer")]
    BadInteger(String),
}

/// Failure to turn a line into a [`LegSample`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The line is structurally wrong and should be discarded.
    #[error("malformed line: {0}")]
    Malformed(MalformedReason),

    /// The line ended in the middle of a record; likely a transport fragment.
    #[error("truncated line: input ended while expecting {expected}")]
    Truncated { expected: &'static str },

    /// The record is well formed but names a leg outside 0-5.
    #[error("leg index {value} is outside 0-5")]
    InvalidLegIndex { value: i64 },
}

/// Coarse classification of a [`ParseError`], used for counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailureKind {
    /// See [`ParseError::Malformed`]
    Malformed,
    /// See [`ParseError::Truncated`]
    Truncated,
    /// See [`ParseError::InvalidLegIndex`]
    InvalidLegIndex,
}

impl ParseError {
    /// Classification of this error.
    pub fn kind(&self) -> ParseFailureKind {
        match self {
            ParseError::Malformed(_) => ParseFailureKind::Malformed,
            ParseError::Truncated { .. } => ParseFailureKind::Truncated,
            ParseError::InvalidLegIndex { .. } => ParseFailureKind::InvalidLegIndex,
        }
    }

    /// True when waiting for more data from the transport could complete the line.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ParseError::Truncated { .. })
    }
}

impl From<MalformedReason> for ParseError {
    fn from(reason: MalformedReason) -> Self {
        ParseError::Malformed(reason)
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// Parses one telemetry line.
///
/// Leading prefix text (log level, tick count, tag) is skipped. Text after the closing
/// parenthesis of the `LegAng` group is ignored.
///
/// # Errors
/// See [`ParseError`] and the module documentation.
pub fn parse(line: &str) -> ParseResult<LegSample> {
    let tokens = lexer::tokenize(line);
    if tokens.is_empty() {
        return Err(MalformedReason::Empty.into());
    }

    let start = find_record_start(&tokens)?;
    let mut cursor = Cursor {
        tokens: &tokens,
        pos: start,
    };

    // ( <timestamp> ) Leg
    cursor.pos += 1;
    let timestamp_token = cursor.bump("timestamp")?;
    let robot_timestamp_us = timestamp_token
        .text
        .parse::<u64>()
        .map_err(|_| MalformedReason::BadInteger(timestamp_token.text.to_string()))?;
    cursor.pos += 2;

    let index_token = cursor.bump("leg index")?;
    if index_token.kind != TokenKind::Number {
        if is_cut_number(cursor.tail_from_last()) {
            return Err(ParseError::Truncated { expected: "leg index" });
        }
        return Err(unexpected("leg index", index_token));
    }
    let leg_value = parse_leg_value(index_token.text)?;

    cursor.expect_ident("IK")?;
    cursor.expect(TokenKind::Colon, "':'")?;

    let body = cursor.vector_group(0)?;
    cursor.group_separator(1)?;
    let leg = cursor.vector_group(1)?;
    cursor.group_separator(2)?;
    let angles = cursor.vector_group(2)?;

    if let Some(rest) = cursor.peek() {
        tracing::trace!(offset = rest.offset, "ignoring trailing text after LegAng group");
    }

    let leg_index = u8::try_from(leg_value)
        .ok()
        .and_then(LegIndex::new)
        .ok_or(ParseError::InvalidLegIndex { value: leg_value })?;

    Ok(LegSample {
        leg_index,
        robot_timestamp_us,
        body_xyz: Point3::from(body),
        leg_xyz: Point3::from(leg),
        raw_angles: angles,
    })
}

/// Locates the first `( <digits> ) Leg` sequence.
fn find_record_start(tokens: &[Token<'_>]) -> ParseResult<usize> {
    const EXPECTED: [&str; 4] = ["'('", "timestamp", "')'", "'Leg'"];

    for (i, token) in tokens.iter().enumerate() {
        if token.kind != TokenKind::LParen {
            continue;
        }
        let candidate = &tokens[i..];
        let checks: [fn(&Token<'_>) -> bool; 4] = [
            |t| t.kind == TokenKind::LParen,
            |t| t.is_unsigned_integer(),
            |t| t.kind == TokenKind::RParen,
            |t| t.is_ident("Leg"),
        ];

        let mut matched = true;
        for (step, check) in checks.iter().enumerate() {
            match candidate.get(step) {
                Some(t) if check(t) => {}
                Some(_) if step == 3 && is_cut_word(&candidate[step..], "Leg") => {
                    return Err(ParseError::Truncated { expected: EXPECTED[step] });
                }
                Some(_) => {
                    matched = false;
                    break;
                }
                None => return Err(ParseError::Truncated { expected: EXPECTED[step] }),
            }
        }
        if matched {
            return Ok(i);
        }
    }

    Err(MalformedReason::NoRecord.into())
}

/// Leg index as written. Integers too large for `i64` saturate so they still count as
/// out of range rather than malformed.
fn parse_leg_value(text: &str) -> ParseResult<i64> {
    text.parse::<i64>().or_else(|e| match e.kind() {
        IntErrorKind::PosOverflow => Ok(i64::MAX),
        IntErrorKind::NegOverflow => Ok(i64::MIN),
        _ => Err(MalformedReason::BadInteger(text.to_string()).into()),
    })
}

/// `tail` (the rest of the line) is a single token spelling the start of `word`.
fn is_cut_word(tail: &[Token<'_>], word: &str) -> bool {
    match tail {
        [last] => last.text.len() < word.len() && word.starts_with(last.text),
        _ => false,
    }
}

/// `tail` is a sign and/or decimal point with nothing after it, e.g. `-` or `-.`.
fn is_cut_number(tail: &[Token<'_>]) -> bool {
    !tail.is_empty()
        && tail.len() <= 2
        && tail
            .iter()
            .all(|t| t.kind == TokenKind::Other && matches!(t.text, "+" | "-" | "."))
        && adjacent(tail)
}

/// `tail` is the start of an exponent on the number just before it: `e`, `E`, `e-`, `E+`.
fn is_cut_exponent(number: &Token<'_>, tail: &[Token<'_>]) -> bool {
    let Some((first, rest)) = tail.split_first() else {
        return false;
    };
    first.kind == TokenKind::Ident
        && matches!(first.text, "e" | "E")
        && first.offset == number.offset + number.text.len()
        && match rest {
            [] => true,
            [sign] => matches!(sign.text, "+" | "-") && adjacent(tail),
            _ => false,
        }
}

fn adjacent(tokens: &[Token<'_>]) -> bool {
    tokens
        .windows(2)
        .all(|w| w[0].offset + w[0].text.len() == w[1].offset)
}

fn unexpected(expected: &'static str, found: &Token<'_>) -> ParseError {
    MalformedReason::Unexpected {
        expected,
        found: found.text.to_string(),
    }
    .into()
}

struct Cursor<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
}

impl<'t, 'a> Cursor<'t, 'a> {
    fn peek(&self) -> Option<&'t Token<'a>> {
        self.tokens.get(self.pos)
    }

    /// Tokens from the most recently consumed one to the end of the line.
    fn tail_from_last(&self) -> &'t [Token<'a>] {
        &self.tokens[self.pos.saturating_sub(1)..]
    }

    /// Consumes the next token; end of input means the line was cut short.
    fn bump(&mut self, expected: &'static str) -> ParseResult<&'t Token<'a>> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or(ParseError::Truncated { expected })?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> ParseResult<()> {
        let token = self.bump(expected)?;
        if token.kind == kind {
            Ok(())
        } else {
            Err(unexpected(expected, token))
        }
    }

    fn expect_ident(&mut self, word: &'static str) -> ParseResult<()> {
        let token = self.bump(word)?;
        if token.is_ident(word) {
            Ok(())
        } else if is_cut_word(self.tail_from_last(), word) {
            Err(ParseError::Truncated { expected: word })
        } else {
            Err(unexpected(word, token))
        }
    }

    /// Arrow between two groups. `next` is the index of the group that must follow.
    fn group_separator(&mut self, next: usize) -> ParseResult<()> {
        let Some(token) = self.peek() else {
            // clean end right after a complete group
            return Err(MalformedReason::MissingGroup(GROUPS[next]).into());
        };
        if token.kind != TokenKind::Arrow {
            if is_cut_word(&self.tokens[self.pos..], "->") {
                return Err(ParseError::Truncated { expected: "'->'" });
            }
            return Err(unexpected("'->'", token));
        }
        self.pos += 1;
        Ok(())
    }

    /// `<Name>(f, f, f)` for `GROUPS[index]`.
    fn vector_group(&mut self, index: usize) -> ParseResult<[f64; 3]> {
        let name = GROUPS[index];
        let head = self.bump(name)?;
        if !head.is_ident(name) {
            let tail = self.tail_from_last();
            if head.kind == TokenKind::Ident && is_cut_word(tail, name) {
                return Err(ParseError::Truncated { expected: name });
            }
            let later = &GROUPS[index + 1..];
            if head.kind == TokenKind::Ident
                && (later.contains(&head.text) || later.iter().any(|g| is_cut_word(tail, g)))
            {
                return Err(MalformedReason::MissingGroup(name).into());
            }
            return Err(unexpected(name, head));
        }
        self.expect(TokenKind::LParen, "'('")?;

        let mut values = Vec::with_capacity(3);
        if self.peek().map(|t| t.kind) == Some(TokenKind::RParen) {
            self.pos += 1;
        } else {
            loop {
                let token = self.bump("number")?;
                if token.kind != TokenKind::Number {
                    if is_cut_number(self.tail_from_last()) {
                        return Err(ParseError::Truncated { expected: "number" });
                    }
                    return Err(MalformedReason::NonNumeric {
                        group: name,
                        found: token.text.to_string(),
                    }
                    .into());
                }
                let value = token
                    .text
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| MalformedReason::NonNumeric {
                        group: name,
                        found: token.text.to_string(),
                    })?;
                values.push(value);

                let sep = self.bump("',' or ')'")?;
                match sep.kind {
                    TokenKind::Comma => continue,
                    TokenKind::RParen => break,
                    _ if is_cut_exponent(token, self.tail_from_last()) => {
                        return Err(ParseError::Truncated { expected: "exponent" });
                    }
                    _ => return Err(unexpected("',' or ')'", sep)),
                }
            }
        }

        <[f64; 3]>::try_from(values.as_slice()).map_err(|_| {
            MalformedReason::WrongArity {
                group: name,
                count: values.len(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "I (39868) wbc: (39599638)Leg 0 IK: BodyXYZ(0.106, 0.280, -0.043) -> LegXYZ(0.230, -0.026, -0.043) -> LegAng(-0.112, 0.025, 0.768)";

    #[test]
    fn parses_reference_line() {
        let sample = parse(LINE).unwrap();
        assert_eq!(sample.leg_index.get(), 0);
        assert_eq!(sample.robot_timestamp_us, 39599638);
        assert_eq!(sample.body_xyz, Point3::new(0.106, 0.280, -0.043));
        assert_eq!(sample.leg_xyz, Point3::new(0.230, -0.026, -0.043));
        assert_eq!(sample.raw_angles, [-0.112, 0.025, 0.768]);
    }

    #[test]
    fn prefix_is_optional_and_whitespace_insignificant() {
        let bare = "(39599638)Leg 0 IK: BodyXYZ(0.106, 0.280, -0.043) -> LegXYZ(0.230, -0.026, -0.043) -> LegAng(-0.112, 0.025, 0.768)";
        let spaced = "  ( 39599638 ) Leg   0  IK :BodyXYZ( 0.106 ,0.280,-0.043 )->LegXYZ(0.230,-0.026,-0.043)   ->  LegAng(-0.112,0.025,0.768)\r\n";
        assert_eq!(parse(bare).unwrap(), parse(LINE).unwrap());
        assert_eq!(parse(spaced).unwrap(), parse(LINE).unwrap());
    }

    #[test]
    fn accepts_exponents_and_explicit_plus() {
        let line = "(1)Leg 3 IK: BodyXYZ(1e-1, +2.5E0, -3) -> LegXYZ(0, 0, 0) -> LegAng(.5, -.5, 1.)";
        let sample = parse(line).unwrap();
        assert_eq!(sample.body_xyz, Point3::new(0.1, 2.5, -3.0));
        assert_eq!(sample.raw_angles, [0.5, -0.5, 1.0]);
    }

    #[test]
    fn trailing_text_is_ignored() {
        let line = format!("{LINE} [extra]");
        assert!(parse(&line).is_ok());
    }

    #[test]
    fn empty_and_unrelated_lines_are_malformed() {
        assert_eq!(parse(""), Err(ParseError::Malformed(MalformedReason::Empty)));
        assert_eq!(parse("   \r\n"), Err(ParseError::Malformed(MalformedReason::Empty)));
        assert_eq!(
            parse("Invalid line format"),
            Err(ParseError::Malformed(MalformedReason::NoRecord))
        );
        assert_eq!(
            parse("I (123) main: starting gait engine"),
            Err(ParseError::Malformed(MalformedReason::NoRecord))
        );
    }

    #[test]
    fn leg_index_out_of_range() {
        let line = LINE.replace("Leg 0", "Leg 6");
        assert_eq!(parse(&line), Err(ParseError::InvalidLegIndex { value: 6 }));
        let line = LINE.replace("Leg 0", "Leg -1");
        assert_eq!(parse(&line), Err(ParseError::InvalidLegIndex { value: -1 }));
    }

    #[test]
    fn fractional_leg_index_is_malformed() {
        let line = LINE.replace("Leg 0", "Leg 1.5");
        assert_eq!(
            parse(&line),
            Err(ParseError::Malformed(MalformedReason::BadInteger("1.5".into())))
        );
    }

    #[test]
    fn missing_group_at_clean_end() {
        let line = "(1)Leg 0 IK: BodyXYZ(0.1, 0.2, 0.3) -> LegXYZ(0.1, 0.2, 0.3)";
        assert_eq!(
            parse(line),
            Err(ParseError::Malformed(MalformedReason::MissingGroup("LegAng")))
        );
    }

    #[test]
    fn skipped_group_is_missing() {
        let line = "(1)Leg 0 IK: BodyXYZ(0.1, 0.2, 0.3) -> LegAng(0.1, 0.2, 0.3)";
        assert_eq!(
            parse(line),
            Err(ParseError::Malformed(MalformedReason::MissingGroup("LegXYZ")))
        );
    }

    #[test]
    fn wrong_arity() {
        let line = LINE.replace("BodyXYZ(0.106, 0.280, -0.043)", "BodyXYZ(0.106, 0.280)");
        assert_eq!(
            parse(&line),
            Err(ParseError::Malformed(MalformedReason::WrongArity {
                group: "BodyXYZ",
                count: 2
            }))
        );
        let line = LINE.replace("LegAng(-0.112, 0.025, 0.768)", "LegAng(-0.112, 0.025, 0.768, 1.0)");
        assert_eq!(
            parse(&line),
            Err(ParseError::Malformed(MalformedReason::WrongArity {
                group: "LegAng",
                count: 4
            }))
        );
        let line = LINE.replace("LegXYZ(0.230, -0.026, -0.043)", "LegXYZ()");
        assert_eq!(
            parse(&line),
            Err(ParseError::Malformed(MalformedReason::WrongArity {
                group: "LegXYZ",
                count: 0
            }))
        );
    }

    #[test]
    fn non_numeric_value() {
        let line = LINE.replace("0.280", "abc");
        assert_eq!(
            parse(&line),
            Err(ParseError::Malformed(MalformedReason::NonNumeric {
                group: "BodyXYZ",
                found: "abc".into()
            }))
        );
        let line = LINE.replace("0.768", "nan");
        assert!(matches!(
            parse(&line),
            Err(ParseError::Malformed(MalformedReason::NonNumeric { group: "LegAng", .. }))
        ));
    }

    #[test]
    fn truncated_fragments() {
        for cut in [
            "I (39868) wbc: (39599638)Leg 0 IK: BodyXYZ(0.106, 0.2",
            "I (39868) wbc: (39599638)Leg 0 IK: BodyXYZ(0.106, 0.280, -0.043) ->",
            "I (39868) wbc: (39599638)Leg 0 IK:",
            "I (39868) wbc: (39599638)Leg",
            "I (39868) wbc: (3959",
            "(39599638)Leg 0 IK: BodyXYZ(0.106, 0.280, -0.043) -> LegXYZ(0.230, -0.026, -0.043) -> LegAng(-0.112, 0.025,",
        ] {
            let err = parse(cut).unwrap_err();
            assert_eq!(err.kind(), ParseFailureKind::Truncated, "line: {cut}");
            assert!(err.is_recoverable());
        }
    }

    #[test]
    fn cuts_inside_words_arrows_and_signs_are_truncated() {
        for (cut, expected) in [
            ("I (39868) wbc: (39599638)Le", "'Leg'"),
            ("(39599638)L", "'Leg'"),
            ("(39599638)Leg 0 I", "IK"),
            ("(39599638)Leg -", "leg index"),
            ("(1)Leg 0 IK: Bo", "BodyXYZ"),
            ("(1)Leg 0 IK: BodyXYZ(0.1, 0.2, 0.3) -", "'->'"),
            ("(1)Leg 0 IK: BodyXYZ(0.1, 0.2, 0.3) -> Leg", "LegXYZ"),
            ("(1)Leg 0 IK: BodyXYZ(0.1, 0.2, 0.3) -> LegXYZ(0, 0, 0) -> LegA", "LegAng"),
            ("(1)Leg 0 IK: BodyXYZ(0.1, 0.2, -", "number"),
            ("(1)Leg 0 IK: BodyXYZ(0.1, -.", "number"),
            ("(1)Leg 0 IK: BodyXYZ(1e", "exponent"),
            ("(1)Leg 0 IK: BodyXYZ(0.1, 2.5E-", "exponent"),
        ] {
            assert_eq!(parse(cut), Err(ParseError::Truncated { expected }), "line: {cut}");
        }
    }

    #[test]
    fn stray_text_before_the_end_is_still_malformed() {
        assert!(matches!(
            parse("(1)Leg 0 Ik: BodyXYZ(0, 0, 0)"),
            Err(ParseError::Malformed(MalformedReason::Unexpected { expected: "IK", .. }))
        ));
        assert!(matches!(
            parse("(1)Leg 0 IK: BodyXYZ(0, -, 0)"),
            Err(ParseError::Malformed(MalformedReason::NonNumeric { .. }))
        ));
        assert!(matches!(
            parse("(1)Leg 0 IK: BodyXYZ(0, 0, 0) - LegXYZ"),
            Err(ParseError::Malformed(MalformedReason::Unexpected { .. }))
        ));
        // a cut that already skipped a group cannot become valid
        assert_eq!(
            parse("(1)Leg 0 IK: BodyXYZ(0, 0, 0) -> LegA"),
            Err(ParseError::Malformed(MalformedReason::MissingGroup("LegXYZ")))
        );
        assert_eq!(
            parse("I (39868) wb"),
            Err(ParseError::Malformed(MalformedReason::NoRecord))
        );
    }

    #[test]
    fn every_cut_inside_the_record_is_truncated() {
        let record_start = LINE.find("(39599638)").unwrap();
        for end in 0..LINE.len() {
            let cut = &LINE[..end];
            let err = parse(cut).unwrap_err();
            if end <= record_start {
                continue;
            }
            match err {
                ParseError::Truncated { .. } => {}
                // clean end right after BodyXYZ(..) or LegXYZ(..)
                ParseError::Malformed(MalformedReason::MissingGroup(_)) => {
                    assert!(cut.trim_end().ends_with(')'), "cut: {cut}");
                }
                other => panic!("cut {cut:?} gave {other:?}"),
            }
        }
    }

    #[test]
    fn huge_leg_index_is_out_of_range() {
        let line = LINE.replace("Leg 0", "Leg 99999999999999999999");
        assert_eq!(parse(&line), Err(ParseError::InvalidLegIndex { value: i64::MAX }));
        let line = LINE.replace("Leg 0", "Leg -99999999999999999999");
        assert_eq!(parse(&line), Err(ParseError::InvalidLegIndex { value: i64::MIN }));
    }

    #[test]
    fn parse_is_deterministic() {
        assert_eq!(parse(LINE), parse(LINE));
    }
}
