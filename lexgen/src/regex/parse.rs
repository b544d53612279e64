//! Regex parser: layered `nom` combinator functions, one per precedence
//! level, rather than a single precedence-climbing function.
//!
//! Precedence, tight to loose: atom → postfix (`*`, `+`, `?`, `{n[,m]}`) →
//! concatenation (implicit) → alternation (`|`). `~` (prefix-of) takes one
//! atom at the loosest precedence.

use crate::charclass::ByteClass;
use crate::regex::Regex;
use crate::span::Span;
use nom::branch::alt;
use nom::character::complete::char as nchar;
use nom::combinator::{map, opt, value};
use nom::error::{ErrorKind, ParseError};
use nom::multi::{many1, separated_list1};
use nom::sequence::preceded;
use nom::{Err as NomErr, IResult};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegexSyntaxError {
    #[error("at {span}: expected {what}")]
    Expected { span: Span, what: String },
    #[error("at {span}: invalid escape sequence")]
    InvalidEscape { span: Span },
    #[error("at {span}: invalid bracket range (end before start)")]
    InvalidRange { span: Span },
    #[error("at {span}: repetition count {m} is less than {n}")]
    BadRepetitionRange { span: Span, n: u32, m: u32 },
    #[error("at {span}: unterminated string literal")]
    UnterminatedString { span: Span },
}

impl RegexSyntaxError {
    fn span(&self) -> Span {
        match self {
            RegexSyntaxError::Expected { span, .. }
            | RegexSyntaxError::InvalidEscape { span }
            | RegexSyntaxError::InvalidRange { span }
            | RegexSyntaxError::BadRepetitionRange { span, .. }
            | RegexSyntaxError::UnterminatedString { span } => *span,
        }
    }
}

/// `nom`-compatible error carrier so semantic failures (bad hex digit, `m < n`,
/// unterminated string) can flow through `IResult` as `Err::Failure`, then be
/// converted back to a [`RegexSyntaxError`] with a real byte-offset span at
/// the top level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Carrier<'a> {
    pub at: &'a str,
    pub kind: ErrorKind,
    pub semantic: Option<RegexSyntaxError>,
}

impl<'a> ParseError<&'a str> for Carrier<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Carrier {
            at: input,
            kind,
            semantic: None,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

fn fail<'a, T>(at: &'a str, err: RegexSyntaxError) -> IResult<&'a str, T, Carrier<'a>> {
    Err(NomErr::Failure(Carrier {
        at,
        kind: ErrorKind::Fail,
        semantic: Some(err),
    }))
}

type PResult<'a, T> = IResult<&'a str, T, Carrier<'a>>;

pub fn parse(source: &str) -> Result<Regex, RegexSyntaxError> {
    let trimmed = source.trim();
    match alternation(trimmed) {
        Ok((rest, re)) if rest.trim().is_empty() => Ok(re),
        Ok((rest, _)) => Err(make_error(
            source,
            rest,
            RegexSyntaxError::Expected {
                span: Span::point(Span::offset_of(source, rest)),
                what: "end of regex".into(),
            },
        )),
        Err(NomErr::Failure(c)) | Err(NomErr::Error(c)) => Err(make_error(
            source,
            c.at,
            c.semantic.unwrap_or(RegexSyntaxError::Expected {
                span: Span::point(Span::offset_of(source, c.at)),
                what: "expression".into(),
            }),
        )),
        Err(NomErr::Incomplete(_)) => Err(RegexSyntaxError::Expected {
            span: Span::point(source.len()),
            what: "more input".into(),
        }),
    }
}

fn make_error(original: &str, at: &str, err: RegexSyntaxError) -> RegexSyntaxError {
    let _ = (original, at);
    err
}

fn alternation(input: &str) -> PResult<Regex> {
    map(separated_list1(nchar('|'), concatenation), |parts| {
        parts
            .into_iter()
            .reduce(|acc, next| Regex::Alt(Box::new(acc), Box::new(next)))
            .expect("separated_list1 yields at least one element")
    })(input)
}

fn concatenation(input: &str) -> PResult<Regex> {
    map(many1(postfixed_atom), |parts| {
        parts
            .into_iter()
            .reduce(|acc, next| Regex::Concat(Box::new(acc), Box::new(next)))
            .expect("many1 yields at least one element")
    })(input)
}

fn postfixed_atom(input: &str) -> PResult<Regex> {
    let (mut rest, mut re) = atom(skip_ws(input))?;
    loop {
        rest = skip_ws(rest);
        if let Ok((r, _)) = nchar::<_, Carrier>('*')(rest) {
            re = Regex::Star(Box::new(re));
            rest = r;
        } else if let Ok((r, _)) = nchar::<_, Carrier>('+')(rest) {
            re = Regex::Concat(Box::new(re.clone()), Box::new(Regex::Star(Box::new(re))));
            rest = r;
        } else if let Ok((r, _)) = nchar::<_, Carrier>('?')(rest) {
            re = Regex::Alt(Box::new(Regex::Empty), Box::new(re));
            rest = r;
        } else if rest.starts_with('{') {
            let (r, re2) = repetition(rest, re)?;
            re = re2;
            rest = r;
        } else {
            break;
        }
    }
    Ok((rest, re))
}

fn repetition<'a>(input: &'a str, re: Regex) -> PResult<'a, Regex> {
    let start = input;
    let (rest, _) = nchar('{')(input)?;
    let rest = skip_ws(rest);
    let (rest, n) = number(rest)?;
    let rest = skip_ws(rest);
    let (rest, m) = if let Ok((r, _)) = nchar::<_, Carrier>(',')(rest) {
        let r = skip_ws(r);
        let (r, m) = number(r)?;
        (skip_ws(r), m)
    } else {
        (rest, n)
    };
    let (rest, _) = match nchar::<_, Carrier>('}')(rest) {
        Ok(ok) => ok,
        Err(_) => {
            return fail(
                rest,
                RegexSyntaxError::Expected {
                    span: Span::point(Span::offset_of(start, rest)),
                    what: "'}'".into(),
                },
            )
        }
    };
    if m < n {
        return fail(
            start,
            RegexSyntaxError::BadRepetitionRange {
                span: Span::new(
                    Span::offset_of(start, start),
                    Span::offset_of(start, rest),
                ),
                n,
                m,
            },
        );
    }
    Ok((rest, Regex::repeat_range(re, n, m)))
}

fn number(input: &str) -> PResult<u32> {
    let (rest, digits) = nom::bytes::complete::take_while1(|c: char| c.is_ascii_digit())(input)
        .map_err(|_: NomErr<Carrier>| {
            NomErr::Failure(Carrier {
                at: input,
                kind: ErrorKind::Digit,
                semantic: Some(RegexSyntaxError::Expected {
                    span: Span::point(Span::offset_of(input, input)),
                    what: "number".into(),
                }),
            })
        })?;
    let value: u32 = digits.parse().unwrap_or(u32::MAX);
    Ok((rest, value))
}

fn atom(input: &str) -> PResult<Regex> {
    alt((
        dot,
        prefix_op,
        group,
        bracket_class,
        fragment_ref,
        string_literal,
        escaped_atom,
        literal_char,
    ))(input)
}

fn dot(input: &str) -> PResult<Regex> {
    value(Regex::Char(ByteClass::ALL), nchar('.'))(input)
}

fn prefix_op(input: &str) -> PResult<Regex> {
    map(preceded(nchar('~'), alternation), |re| {
        Regex::Prefix(Box::new(re))
    })(input)
}

fn group(input: &str) -> PResult<Regex> {
    let (rest, _) = nchar('(')(input)?;
    let rest2 = skip_ws(rest);
    let (rest2, re) = match alternation(rest2) {
        Ok(ok) => ok,
        Err(NomErr::Error(_)) => (rest2, Regex::Empty),
        Err(e) => return Err(e),
    };
    let rest2 = skip_ws(rest2);
    match nchar::<_, Carrier>(')')(rest2) {
        Ok((r, _)) => Ok((r, re)),
        Err(_) => fail(
            rest2,
            RegexSyntaxError::Expected {
                span: Span::point(Span::offset_of(input, rest2)),
                what: "')'".into(),
            },
        ),
    }
}

fn fragment_ref(input: &str) -> PResult<Regex> {
    let (rest, _) = nchar('<')(input)?;
    let rest = skip_ws(rest);
    let id_start = rest;
    let (rest, id) = nom::bytes::complete::take_while1(is_ref_id_char)(rest).map_err(
        |_: NomErr<Carrier>| {
            NomErr::Failure(Carrier {
                at: rest,
                kind: ErrorKind::Fail,
                semantic: Some(RegexSyntaxError::Expected {
                    span: Span::point(Span::offset_of(input, rest)),
                    what: "fragment identifier".into(),
                }),
            })
        },
    )?;
    let span = Span::new(Span::offset_of(input, id_start), Span::offset_of(input, rest));
    let rest = skip_ws(rest);
    match nchar::<_, Carrier>('>')(rest) {
        Ok((r, _)) => Ok((
            r,
            Regex::Ref(crate::regex::FragmentRef {
                name: id.into(),
                span,
            }),
        )),
        Err(_) => fail(
            rest,
            RegexSyntaxError::Expected {
                span: Span::point(Span::offset_of(input, rest)),
                what: "'>'".into(),
            },
        ),
    }
}

fn is_ref_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn string_literal(input: &str) -> PResult<Regex> {
    let (mut rest, _) = nchar('"')(input)?;
    let mut re = Regex::Empty;
    loop {
        match rest.chars().next() {
            None => {
                return fail(
                    input,
                    RegexSyntaxError::UnterminatedString {
                        span: Span::point(Span::offset_of(input, input)),
                    },
                )
            }
            Some('"') => {
                rest = &rest[1..];
                break;
            }
            Some('\\') => {
                let (r, byte) = escape(&rest[1..])?;
                re = Regex::Concat(Box::new(re), Box::new(Regex::Char(ByteClass::single(byte))));
                rest = r;
            }
            Some(c) => {
                re = Regex::Concat(
                    Box::new(re),
                    Box::new(Regex::Char(ByteClass::single(c as u8))),
                );
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    Ok((rest, re))
}

fn escaped_atom(input: &str) -> PResult<Regex> {
    let (rest, _) = nchar('\\')(input)?;
    let (rest, byte) = escape(rest)?;
    Ok((rest, Regex::Char(ByteClass::single(byte))))
}

const RESERVED: &str = "~{}[]+*.?<>()\\\"|";

fn literal_char(input: &str) -> PResult<Regex> {
    match input.chars().next() {
        Some(c) if !RESERVED.contains(c) && !c.is_whitespace() => Ok((
            &input[c.len_utf8()..],
            Regex::Char(ByteClass::single(c as u8)),
        )),
        _ => Err(NomErr::Error(Carrier::from_error_kind(
            input,
            ErrorKind::Char,
        ))),
    }
}

/// Shared escape table used both inside and outside bracket classes and
/// string literals (`\n \r \t`, `\xHH`, punctuation self-escapes).
fn escape(input: &str) -> PResult<u8> {
    match input.chars().next() {
        Some('n') => Ok((&input[1..], b'\n')),
        Some('r') => Ok((&input[1..], b'\r')),
        Some('t') => Ok((&input[1..], b'\t')),
        Some('x') => {
            let rest = &input[1..];
            let (rest, hi) = hex_digit(rest)?;
            let (rest, lo) = hex_digit(rest)?;
            Ok((rest, hi * 16 + lo))
        }
        Some(c) if c.is_ascii_punctuation() => Ok((&input[c.len_utf8()..], c as u8)),
        _ => fail(
            input,
            RegexSyntaxError::InvalidEscape {
                span: Span::point(Span::offset_of(input, input)),
            },
        ),
    }
}

fn hex_digit(input: &str) -> PResult<u8> {
    match input.chars().next() {
        Some(c) if c.is_ascii_hexdigit() => {
            Ok((&input[1..], c.to_digit(16).unwrap() as u8))
        }
        _ => fail(
            input,
            RegexSyntaxError::Expected {
                span: Span::point(Span::offset_of(input, input)),
                what: "hexadecimal digit".into(),
            },
        ),
    }
}

fn bracket_class(input: &str) -> PResult<Regex> {
    let (rest, _) = nchar('[')(input)?;
    let (rest, invert) = opt(nchar('^'))(rest)?;
    let mut class = ByteClass::EMPTY;
    let mut rest = rest;
    loop {
        if rest.starts_with(']') {
            rest = &rest[1..];
            break;
        }
        let (r, first) = bracket_char(rest)?;
        // A bare `-` at the start/end of the class (no member on one side)
        // is a literal hyphen, never a range operator.
        if r.starts_with('-') && !r[1..].starts_with(']') && !r.is_empty() {
            let after_dash = &r[1..];
            if !after_dash.is_empty() {
                let (r2, second) = bracket_char(after_dash)?;
                if second < first {
                    return fail(
                        rest,
                        RegexSyntaxError::InvalidRange {
                            span: Span::new(Span::offset_of(input, rest), Span::offset_of(input, r2)),
                        },
                    );
                }
                class = class.union(&ByteClass::range(first, second));
                rest = r2;
                continue;
            }
        }
        class.insert(first);
        rest = r;
    }
    if invert.is_some() {
        class = class.complement();
    }
    Ok((rest, Regex::Char(class)))
}

fn bracket_char(input: &str) -> PResult<u8> {
    match input.chars().next() {
        Some('\\') => escape(&input[1..]),
        Some(c) if c != ']' => Ok((&input[c.len_utf8()..], c as u8)),
        _ => fail(
            input,
            RegexSyntaxError::Expected {
                span: Span::point(Span::offset_of(input, input)),
                what: "bracket-class character".into(),
            },
        ),
    }
}

fn skip_ws(input: &str) -> &str {
    input.trim_start_matches(|c: char| c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_accepts(source: &str, input: &[u8]) {
        let re = parse(source).unwrap();
        assert!(accepts(&re, input), "expected {source:?} to accept {input:?}");
    }

    fn assert_rejects(source: &str, input: &[u8]) {
        let re = parse(source).unwrap();
        assert!(!accepts(&re, input), "expected {source:?} to reject {input:?}");
    }

    fn accepts(re: &Regex, input: &[u8]) -> bool {
        use crate::nfa::scc::compute_scc;
        use crate::nfa::subset::build_dfa;
        use crate::nfa::Nfa;
        use crate::regex::FragmentSource;

        struct NoFragments;
        impl FragmentSource for NoFragments {
            fn build_fragment(
                &mut self,
                _nfa: &mut Nfa,
                _name: &str,
            ) -> Result<(crate::nfa::StateId, crate::nfa::StateId), ()> {
                panic!("no fragments expected")
            }
        }

        let mut nfa = Nfa::new();
        let begin = nfa.new_state();
        let end = nfa.new_state();
        nfa.set_rule(end, 0);
        re.build_nfa(&mut nfa, &mut NoFragments, begin, end).unwrap();
        let info = compute_scc(&nfa);
        let dfa = build_dfa(&nfa, begin, &info, |r| r);
        let mut state = dfa.start;
        for &byte in input {
            match dfa.states[state].trans[byte as usize] {
                Some(next) => state = next,
                None => return false,
            }
        }
        dfa.states[state].accept.is_some()
    }

    #[test]
    fn word_class() {
        assert_accepts("[a-z]+", b"abc");
        assert_rejects("[a-z]+", b"ABC");
    }

    #[test]
    fn literal_string() {
        assert_accepts("\"if\"", b"if");
        assert_rejects("\"if\"", b"ifx");
    }

    #[test]
    fn bounded_repetition() {
        assert_rejects("[0-9]{2,4}", b"1");
        assert_accepts("[0-9]{2,4}", b"12");
        assert_accepts("[0-9]{2,4}", b"1234");
    }

    #[test]
    fn hyphen_at_edges_is_literal() {
        assert_accepts("[-a]", b"-");
        assert_accepts("[-a]", b"a");
        assert_accepts("[a-]", b"-");
    }

    #[test]
    fn prefix_operator() {
        assert_accepts("~\"hello\"", b"");
        assert_accepts("~\"hello\"", b"hell");
        assert_accepts("~\"hello\"", b"hello");
        assert_rejects("~\"hello\"", b"hellp");
    }
}
