//! `lexgen` is a lexer generator: it reads a declarative project file
//! describing lexical states, reusable regex fragments and per-state rules,
//! and compiles it down to a compact, equivalence-class-compressed
//! transition table suitable for a table-driven scanner.
//!
//! ## Pipeline
//!
//! ```text
//! project text -> ProjectFile -> Grammar -> per-xstate NFA -> subset
//!   construction -> minimized DFA -> byte equivalence classes ->
//!   encoded transition words -> template substitution -> header + source
//! ```
//!
//! * [`project`] parses the `[section]`-based project file into a
//!   [`project::ProjectFile`].
//! * [`grammar`] resolves fragments, interns tokens, and drives the
//!   NFA -> DFA -> minimize pipeline for every lexical state, producing a
//!   [`grammar::CompiledGrammar`] plus any non-fatal [`error::Warning`]s.
//! * [`regex`] and [`regex::parse`] are the regex AST and parser; [`nfa`]
//!   is the ε-NFA arena with SCC-based subset construction
//!   ([`nfa::scc`], [`nfa::subset`]); [`dfa`] is the DFA arena and
//!   partition-refinement minimizer ([`dfa::minimize`]).
//! * [`codegen`] flattens every lexical state's minimized DFA into one
//!   global transition table, partitions the 256-byte alphabet into
//!   equivalence classes, and encodes the longest-match/backtracking word
//!   per cell; [`codegen::template`] substitutes the resulting values into
//!   a pair of text templates.
//!
//! ## Usage
//!
//! ```
//! let source = "[grammar]\nword [a-z]+\n";
//! let (header, src, warnings) = lexgen::generate(source, "lexer").unwrap();
//! assert!(header.contains("enum class Token"));
//! assert!(src.contains("lexer_transitions"));
//! assert!(warnings.is_empty());
//! ```

pub mod charclass;
pub mod codegen;
pub mod dfa;
pub mod error;
pub mod grammar;
pub mod nfa;
pub mod project;
pub mod regex;
pub mod span;

use codegen::template::process_template;
use codegen::Codegen;
use error::{Result, Warning};
use grammar::Grammar;

const HEADER_TEMPLATE: &str = include_str!("codegen/templates/lexer.h.tmpl");
const SOURCE_TEMPLATE: &str = include_str!("codegen/templates/lexer.cpp.tmpl");

/// Run the full pipeline over one project file's source text: parse, build
/// the grammar and its per-state automata, build the codegen tables, and
/// substitute them into the two shipped C++ templates.
///
/// `prefix` is the default value for the `$(prefix)` substitution (the
/// `[codegen]` section's own `prefix` key, if present, takes priority); the
/// CLI passes the input file's stem.
///
/// Returns `(header_text, source_text, warnings)` on success. Warnings
/// (unused rules, EOF-only rules) never fail the build; see
/// [`error::Warning`].
pub fn generate(source: &str, prefix: &str) -> Result<(String, String, Vec<Warning>)> {
    let project = project::parse(source)?;
    project::check_used(&project)?;

    let mut codegen = Codegen::from_project(&project, prefix)?;

    let grammar = Grammar::from_project(&project)?;
    let (compiled, warnings) = grammar.build()?;
    codegen.build(&compiled);

    let lookup = |name: &str| codegen.lookup(name);
    let header = process_template(HEADER_TEMPLATE, "lexer.h", &lookup)
        .map_err(|e| error::InternalError::new(e.to_string()))?;
    let source_out = process_template(SOURCE_TEMPLATE, "lexer.cpp", &lookup)
        .map_err(|e| error::InternalError::new(e.to_string()))?;

    Ok((header, source_out, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_single_rule_scenario_s1() {
        let (header, source, warnings) = generate("[grammar]\nword [a-z]+\n", "lexer").unwrap();
        assert!(header.contains("Word"));
        assert!(source.contains("lexer_transitions"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn generate_reports_regex_syntax_errors() {
        let err = generate("[grammar]\nword [z-a]\n", "lexer").unwrap_err();
        assert!(err.to_string().contains("invalid bracket range"));
    }

    #[test]
    fn generate_reports_unknown_fragment() {
        let err = generate("[grammar]\nnum <digit>+\n", "lexer").unwrap_err();
        assert!(err.to_string().contains("unknown fragment"));
    }

    #[test]
    fn generate_two_lexical_states_scenario_s5() {
        let src = "\
[general]
state str
[grammar]
open_q \"\\\"\" {-> str}
close_q {str} \"\\\"\" {-> default}
body {str} [^\\\"]+
";
        let (header, _source, _warnings) = generate(src, "lexer").unwrap();
        assert!(header.contains("Str"));
        assert!(header.contains("Default"));
    }
}
