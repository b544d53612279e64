//! Integration test asserting that running the full pipeline twice on the
//! same input byte-for-byte produces the same emitted text, and a few sanity
//! checks on the example projects shipped under `benches/example_projects/`.

const SMALL: &str = include_str!("../benches/example_projects/small.lex");
const STRINGS: &str = include_str!("../benches/example_projects/strings.lex");

fn assert_deterministic(source: &str, prefix: &str) {
    let (header1, src1, warnings1) = lexgen::generate(source, prefix).unwrap();
    let (header2, src2, warnings2) = lexgen::generate(source, prefix).unwrap();
    assert_eq!(header1, header2);
    assert_eq!(src1, src2);
    assert_eq!(warnings1, warnings2);
}

#[test]
fn small_project_is_deterministic() {
    assert_deterministic(SMALL, "lexer");
}

#[test]
fn strings_project_is_deterministic() {
    assert_deterministic(STRINGS, "lexer");
}

#[test]
fn small_project_compiles_clean() {
    let (header, source, _warnings) = lexgen::generate(SMALL, "small").unwrap();
    for token in ["KwIf", "KwElse", "KwWhile", "Ident", "Number", "Ws"] {
        assert!(header.contains(token), "missing token {token} in header");
    }
    assert!(source.contains("small_transitions"));
    assert!(source.contains("small_eq_classes"));
    assert!(source.contains("small_eof_transitions"));
}

#[test]
fn strings_project_has_two_extra_lexical_states() {
    let (header, _source, _warnings) = lexgen::generate(STRINGS, "strings").unwrap();
    assert!(header.contains("Default"));
    assert!(header.contains("Str"));
    assert!(header.contains("Comment"));
}
