//! Textual substitution engine: `$(name)` placeholders in a template line are
//! replaced by a precomputed, possibly multi-line, value.
//!
//! [`process_template`] splices a multi-line substitution's first line
//! verbatim, then prefixes every later line with the template line's own
//! leading whitespace, restoring `#line` bookkeeping afterward for any
//! substitution that emitted its own.

use thiserror::Error;

/// A value substituted for one `$(name)`: one or more output lines, plus
/// whether it already emitted its own `#line` directives (in which case the
/// emitter must restore the surrounding template's position afterward).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstValue {
    pub lines: Vec<String>,
    pub changes_line_info: bool,
}

impl SubstValue {
    pub fn empty() -> SubstValue {
        SubstValue::default()
    }

    pub fn inline(value: impl Into<String>) -> SubstValue {
        SubstValue {
            lines: vec![value.into()],
            changes_line_info: false,
        }
    }

    /// Appends `sep` to the *previously* pushed line (if any), then pushes a
    /// fresh line. Used to build `a,\nb,\nc` lists with no trailing
    /// separator on the last entry.
    pub fn add_line(&mut self, line: impl Into<String>, sep: Option<&str>) {
        if let Some(sep) = sep {
            if let Some(last) = self.lines.last_mut() {
                last.push_str(sep);
            }
        }
        self.lines.push(line.into());
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("value must be inline, not multi-line")]
    NotInline,
    #[error("no substitution registered for '$({0})'")]
    MissingSubstitution(String),
}

/// Single-line, whitespace-trimmed value parser, used for `prefix`.
/// Leading/trailing whitespace (including blank lines) is trimmed; an
/// embedded newline followed by further non-blank content is rejected,
/// since an inline value cannot legally span lines.
pub fn parse_inline(text: &str) -> Result<SubstValue, TemplateError> {
    let trimmed_trailing = text.trim_end();
    if trimmed_trailing.contains('\n') {
        return Err(TemplateError::NotInline);
    }
    Ok(SubstValue::inline(trimmed_trailing.trim_start()))
}

/// Multi-line value parser used for `header`/`source` (raw code blocks).
/// Project values don't carry a live character-stream position
/// (`crate::project` joins continuation lines into a flat string), so this
/// emits one `#line` directive covering the whole block, restoring
/// synchronization for the common case of a single uninterrupted source
/// file, then tracks line numbers internally for any nested emitter that
/// consumes `changes_line_info`.
pub fn parse(text: &str, file: &str) -> SubstValue {
    let mut value = SubstValue::empty();
    let lines: Vec<&str> = text.split('\n').collect();
    if !lines.is_empty() {
        value.lines.push(format!("#line 1 {file:?}"));
        value.changes_line_info = true;
    }
    for line in lines {
        value.lines.push(line.to_string());
    }
    value
}

fn leading_whitespace(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

/// Scans one line for `$(name)` placeholders, in source order; `name` is
/// `[a-zA-Z0-9_-]+`.
fn find_placeholder(line: &str) -> Option<(usize, usize, &str)> {
    let start = line.find("$(")?;
    let after = &line[start + 2..];
    let end_rel = after.find(')')?;
    let name = &after[..end_rel];
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        Some((start, start + 2 + end_rel + 1, name))
    } else {
        None
    }
}

/// Runs the substitution pass over one template's full text, using `lookup`
/// to resolve each `$(name)`. `filename` is used only for the corrective
/// `#line` directive inserted after any line whose substituted value set
/// `changes_line_info`.
pub fn process_template(
    template: &str,
    filename: &str,
    lookup: impl Fn(&str) -> Option<SubstValue>,
) -> Result<String, TemplateError> {
    let mut out = String::new();
    let mut line_num: usize = 1;

    for raw_line in template.split_inclusive('\n') {
        let (line, newline) = match raw_line.strip_suffix('\n') {
            Some(rest) => (rest, true),
            None => (raw_line, false),
        };
        let indent = leading_whitespace(line);
        let mut should_reset_line = false;
        let mut rest = line;
        let mut rendered = String::new();

        while let Some((start, end, name)) = find_placeholder(rest) {
            rendered.push_str(&rest[..start]);
            let value = lookup(name).ok_or_else(|| TemplateError::MissingSubstitution(name.to_string()))?;
            if value.changes_line_info {
                should_reset_line = true;
            }
            line_num += value.lines.len().saturating_sub(1);
            match value.lines.len() {
                0 => {}
                1 => rendered.push_str(&value.lines[0]),
                _ => {
                    rendered.push_str(&value.lines[0]);
                    for extra in &value.lines[1..] {
                        rendered.push('\n');
                        rendered.push_str(indent);
                        rendered.push_str(extra);
                    }
                }
            }
            rest = &rest[end..];
        }
        rendered.push_str(rest);

        out.push_str(&rendered);
        if newline {
            out.push('\n');
            line_num += 1;
        }
        if should_reset_line {
            line_num += 1;
            out.push_str(&format!("#line {line_num} {filename:?}\n"));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_trims_whitespace() {
        let v = parse_inline("  hello  \n").unwrap();
        assert_eq!(v.lines, vec!["hello".to_string()]);
    }

    #[test]
    fn inline_rejects_embedded_content_after_newline() {
        assert!(parse_inline("hello\nworld").is_err());
    }

    #[test]
    fn single_line_substitution() {
        let out = process_template("prefix: $(name)\n", "f", |n| {
            (n == "name").then(|| SubstValue::inline("jlex"))
        })
        .unwrap();
        assert_eq!(out, "prefix: jlex\n");
    }

    #[test]
    fn multiline_substitution_preserves_indent() {
        let mut value = SubstValue::empty();
        value.add_line("one,", None);
        value.add_line("two", None);
        let out = process_template("    $(items)\n", "f", |_| Some(value.clone())).unwrap();
        assert_eq!(out, "    one,\n    two\n");
    }

    #[test]
    fn missing_substitution_errors() {
        let err = process_template("$(nope)\n", "f", |_| None).unwrap_err();
        assert_eq!(err, TemplateError::MissingSubstitution("nope".into()));
    }
}
