//! Project file parser: line-oriented `[section]` headers and
//! indentation-continued values.
//!
//! This is a hand-rolled line scanner rather than `nom` combinators: the
//! indentation-continuation rule is inherently stateful across lines (the
//! required indent is established by whichever continuation line comes
//! first, then every later line is compared byte-for-byte against it), which
//! does not compose naturally as a single grammar of combinators the way the
//! regex dialect in [`crate::regex::parse`] does. Byte offsets are tracked
//! directly so diagnostics carry real [`Span`]s instead of failing silently.

use crate::span::Span;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectParseError {
    #[error("at {span}: expected {what}")]
    Expected { span: Span, what: String },
    #[error("at {span}: key '{key}' has no associated value")]
    MissingValue { span: Span, key: String },
    #[error("at {span}: unexpected character, expected a blank line")]
    UnexpectedChar { span: Span },
    #[error("at {span}: unused section '[{name}]'")]
    UnusedSection { span: Span, name: String },
    #[error("at {span}: value given before any section was opened")]
    NoOpenSection { span: Span },
}

/// One committed `key`/value pair inside a section. `text` is the value with
/// its continuation lines already joined by `\n` and per-line indentation
/// stripped: lines at greater indent keep leading whitespace *beyond* the
/// established indent, which is preserved inside `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub key: String,
    pub key_span: Span,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub params: Vec<String>,
    pub span: Span,
    pub values: Vec<Value>,
}

impl Section {
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.iter().find(|v| v.key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectFile {
    pub sections: Vec<Section>,
}

impl ProjectFile {
    pub fn sections_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Section> {
        self.sections.iter().filter(move |s| s.name == name)
    }
}

/// The four sections this crate recognizes. Any other section
/// name parses fine but is rejected by [`check_used`] once the caller has
/// finished consuming the ones it understands.
const KNOWN_SECTIONS: [&str; 4] = ["general", "fragments", "grammar", "codegen"];

/// Raised after a successful parse if any section's name is not one this
/// crate understands. Resolved up front against the fixed set of four real
/// sections rather than a runtime "was this section's values ever iterated"
/// flag, since this crate does not support caller-defined sections.
pub fn check_used(project: &ProjectFile) -> Result<(), ProjectParseError> {
    for section in &project.sections {
        if !KNOWN_SECTIONS.contains(&section.name.as_str()) {
            return Err(ProjectParseError::UnusedSection {
                span: section.span,
                name: section.name.clone(),
            });
        }
    }
    Ok(())
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '+'
}

struct Line<'a> {
    start: usize,
    text: &'a str,
}

fn split_lines(source: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, c) in source.char_indices() {
        if c == '\n' {
            let mut end = i;
            if end > start && source.as_bytes()[end - 1] == b'\r' {
                end -= 1;
            }
            lines.push(Line {
                start,
                text: &source[start..end],
            });
            start = i + 1;
        }
    }
    if start < source.len() {
        lines.push(Line {
            start,
            text: &source[start..],
        });
    }
    lines
}

struct PendingValue {
    key: String,
    key_span: Span,
    indent: Option<String>,
    lines: Vec<String>,
}

pub fn parse(source: &str) -> Result<ProjectFile, ProjectParseError> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current_section: Option<usize> = None;
    let mut pending: Option<PendingValue> = None;

    for line in split_lines(source) {
        let trimmed_start = line.text.trim_start();
        let indent_len = line.text.len() - trimmed_start.len();
        let first = trimmed_start.chars().next();

        match first {
            None => {
                // Blank line: preserved as an embedded newline inside an
                // in-progress value, otherwise ignored.
                if let Some(p) = pending.as_mut() {
                    if !p.lines.is_empty() || p.indent.is_some() {
                        p.lines.push(String::new());
                    }
                }
            }
            Some('#') if indent_len == 0 => {
                close_pending(&mut sections, current_section, pending.take())?;
            }
            Some('[') if indent_len == 0 => {
                close_pending(&mut sections, current_section, pending.take())?;
                let (name, params) = parse_section_header(source, line.start, trimmed_start)?;
                let span = Span::new(line.start, line.start + line.text.len());
                sections.push(Section {
                    name,
                    params,
                    span,
                    values: Vec::new(),
                });
                current_section = Some(sections.len() - 1);
            }
            Some(c) if indent_len == 0 && is_word_char(c) => {
                close_pending(&mut sections, current_section, pending.take())?;
                if current_section.is_none() {
                    return Err(ProjectParseError::NoOpenSection {
                        span: Span::point(line.start),
                    });
                }
                let key_start = line.start;
                let key: String = trimmed_start.chars().take_while(|&c| is_word_char(c)).collect();
                let key_span = Span::new(key_start, key_start + key.len());
                let rest = trimmed_start[key.len()..].trim_start();
                if rest.is_empty() {
                    pending = Some(PendingValue {
                        key,
                        key_span,
                        indent: None,
                        lines: Vec::new(),
                    });
                } else {
                    pending = Some(PendingValue {
                        key,
                        key_span,
                        indent: None,
                        lines: vec![rest.trim_end().to_string()],
                    });
                }
            }
            Some(_) => {
                // Continuation of the pending multi-line value.
                match pending.as_mut() {
                    None => {
                        return Err(ProjectParseError::UnexpectedChar {
                            span: Span::point(line.start),
                        });
                    }
                    Some(p) => match &p.indent {
                        None => {
                            p.indent = Some(line.text[..indent_len].to_string());
                            p.lines.push(trimmed_start.trim_end().to_string());
                        }
                        Some(indent) => {
                            if line.text.starts_with(indent.as_str()) {
                                p.lines.push(line.text[indent.len()..].trim_end().to_string());
                            } else {
                                return Err(ProjectParseError::UnexpectedChar {
                                    span: Span::point(line.start),
                                });
                            }
                        }
                    },
                }
            }
        }
    }

    close_pending(&mut sections, current_section, pending.take())?;
    Ok(ProjectFile { sections })
}

fn close_pending(
    sections: &mut [Section],
    current_section: Option<usize>,
    pending: Option<PendingValue>,
) -> Result<(), ProjectParseError> {
    let Some(p) = pending else { return Ok(()) };
    if p.lines.is_empty() {
        return Err(ProjectParseError::MissingValue {
            span: p.key_span,
            key: p.key,
        });
    }
    let section = current_section
        .and_then(|i| sections.get_mut(i))
        .expect("a pending value always has a current section by construction");
    section.values.push(Value {
        key: p.key,
        key_span: p.key_span,
        text: p.lines.join("\n"),
    });
    Ok(())
}

fn parse_section_header(
    source: &str,
    start: usize,
    trimmed: &str,
) -> Result<(String, Vec<String>), ProjectParseError> {
    let rest = &trimmed[1..]; // skip '['
    let name: String = rest.chars().take_while(|&c| is_word_char(c)).collect();
    if name.is_empty() {
        return Err(ProjectParseError::Expected {
            span: Span::point(start),
            what: "section name".into(),
        });
    }
    let mut rest = rest[name.len()..].trim_start();
    let mut params = Vec::new();
    if let Some(inner) = rest.strip_prefix('(') {
        rest = inner.trim_start();
        loop {
            if let Some(close) = rest.strip_prefix(')') {
                rest = close;
                break;
            }
            let param: String = rest.chars().take_while(|&c| is_word_char(c)).collect();
            if param.is_empty() {
                return Err(ProjectParseError::Expected {
                    span: Span::point(Span::offset_of(source, rest)),
                    what: "parameter name or ')'".into(),
                });
            }
            rest = rest[param.len()..].trim_start();
            params.push(param);
            if let Some(comma) = rest.strip_prefix(',') {
                rest = comma.trim_start();
            }
        }
    }
    rest = rest.trim_start();
    if let Some(closed) = rest.strip_prefix(']') {
        if !closed.trim().is_empty() {
            return Err(ProjectParseError::UnexpectedChar {
                span: Span::point(Span::offset_of(source, closed)),
            });
        }
        Ok((name, params))
    } else {
        Err(ProjectParseError::Expected {
            span: Span::point(Span::offset_of(source, rest)),
            what: "']'".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_values() {
        let src = "[general]\nstate default\nstate str\n";
        let pf = parse(src).unwrap();
        assert_eq!(pf.sections.len(), 1);
        let section = &pf.sections[0];
        assert_eq!(section.name, "general");
        assert_eq!(section.values.len(), 2);
        assert_eq!(section.values[0].text, "default");
        assert_eq!(section.values[1].text, "str");
    }

    #[test]
    fn multi_line_continuation() {
        let src = "[fragments]\ndigit [0-9]\n  more stuff\nletter [a-z]\n";
        let pf = parse(src).unwrap();
        let section = &pf.sections[0];
        assert_eq!(section.values[0].key, "digit");
        assert_eq!(section.values[0].text, "[0-9]\nmore stuff");
        assert_eq!(section.values[1].text, "[a-z]");
    }

    #[test]
    fn comment_closes_value() {
        let src = "[general]\nstate default\n# a comment\nstate str\n";
        let pf = parse(src).unwrap();
        assert_eq!(pf.sections[0].values.len(), 2);
    }

    #[test]
    fn section_with_params() {
        let src = "[codegen(cpp)]\nheader foo\n";
        let pf = parse(src).unwrap();
        assert_eq!(pf.sections[0].name, "codegen");
        assert_eq!(pf.sections[0].params, vec!["cpp".to_string()]);
    }

    #[test]
    fn key_without_value_is_an_error() {
        let src = "[general]\nstate\n[fragments]\n";
        assert!(parse(src).is_err());
    }

    #[test]
    fn unknown_section_rejected_by_check_used() {
        let src = "[bogus]\nkey val\n";
        let pf = parse(src).unwrap();
        assert!(check_used(&pf).is_err());
    }
}
