use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lazy_static::lazy_static;
use std::fs;
use std::path::Path;

lazy_static! {
    static ref PROJECTS: Box<[String]> = {
        ["small.lex", "strings.lex"]
            .iter()
            .map(|name| {
                let path = Path::new("benches/example_projects").join(name);
                fs::read_to_string(&path).unwrap()
            })
            .collect()
    };
}

pub fn compile_small(c: &mut Criterion) {
    c.bench_function("compile small.lex", |b| {
        b.iter(|| lexgen::generate(black_box(&PROJECTS[0]), "lexer").unwrap())
    });
}

pub fn compile_strings(c: &mut Criterion) {
    c.bench_function("compile strings.lex", |b| {
        b.iter(|| lexgen::generate(black_box(&PROJECTS[1]), "lexer").unwrap())
    });
}

pub fn regex_parse(c: &mut Criterion) {
    c.bench_function("parse identifier regex", |b| {
        b.iter(|| lexgen::regex::parse::parse(black_box("<letter>(<letter>|<digit>|_)*")).unwrap())
    });
}

pub fn minimize_strings_project(c: &mut Criterion) {
    use lexgen::dfa::minimize::minimize;
    use lexgen::grammar::Grammar;
    use lexgen::project;

    let parsed = project::parse(&PROJECTS[1]).unwrap();
    let grammar = Grammar::from_project(&parsed).unwrap();
    let (compiled, _warnings) = grammar.build().unwrap();
    let xstate = &compiled.compiled[0];

    c.bench_function("reminimize strings.lex default state", |b| {
        b.iter(|| minimize(black_box(&xstate.dfa), |x, y| x == y))
    });
}

criterion_group!(
    benches,
    compile_small,
    compile_strings,
    regex_parse,
    minimize_strings_project
);
criterion_main!(benches);
