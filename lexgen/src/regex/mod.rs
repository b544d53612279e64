//! Regex AST and NFA emission.
//!
//! Seven variants, each knowing how to emit an NFA fragment into a
//! caller-owned `(begin, end)` pair of states. Fragment references are
//! resolved through a [`FragmentSource`] so this module stays ignorant of
//! how the grammar stores or interns fragments.

pub mod parse;

use crate::charclass::ByteClass;
use crate::nfa::{Nfa, StateId};
use crate::span::Span;
use std::rc::Rc;

/// An unresolved `<id>` reference, as produced by the parser. The grammar
/// context resolves the name to a fragment at build time: fragments are
/// looked up by id, not pre-interned at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRef {
    pub name: Rc<str>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Regex {
    Empty,
    Char(ByteClass),
    Ref(FragmentRef),
    Concat(Box<Regex>, Box<Regex>),
    Alt(Box<Regex>, Box<Regex>),
    Star(Box<Regex>),
    Prefix(Box<Regex>),
}

/// Raised when a `Ref` names a fragment the grammar context never declared.
/// Kept local to this module (rather than the grammar's own error enum) so
/// `regex` has no dependency on `grammar`; the grammar module wraps this into
/// its own `GrammarError::UnknownFragment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFragment(pub FragmentRef);

/// Supplies a fresh, independently-mutable clone of a fragment's NFA
/// subgraph on demand, building the fragment's own NFA at most once and
/// cloning the subgraph for every reference site.
pub trait FragmentSource {
    fn build_fragment(
        &mut self,
        nfa: &mut Nfa,
        name: &str,
    ) -> Result<(StateId, StateId), ()>;
}

impl Regex {
    pub fn build_nfa(
        &self,
        nfa: &mut Nfa,
        fragments: &mut impl FragmentSource,
        begin: StateId,
        end: StateId,
    ) -> Result<(), UnknownFragment> {
        match self {
            Regex::Empty => nfa.add_eps(begin, end),
            Regex::Char(class) => nfa.add_trans(begin, *class, end),
            Regex::Ref(r) => {
                let (frag_begin, frag_end) = fragments
                    .build_fragment(nfa, &r.name)
                    .map_err(|_| UnknownFragment(r.clone()))?;
                nfa.add_eps(begin, frag_begin);
                nfa.add_eps(frag_end, end);
            }
            Regex::Concat(l, r) => {
                let mid = nfa.new_state();
                l.build_nfa(nfa, fragments, begin, mid)?;
                r.build_nfa(nfa, fragments, mid, end)?;
            }
            Regex::Alt(l, r) => {
                let left_begin = nfa.new_state();
                let left_end = nfa.new_state();
                let right_begin = nfa.new_state();
                let right_end = nfa.new_state();
                nfa.add_eps(begin, left_begin);
                nfa.add_eps(begin, right_begin);
                nfa.add_eps(left_end, end);
                nfa.add_eps(right_end, end);
                l.build_nfa(nfa, fragments, left_begin, left_end)?;
                r.build_nfa(nfa, fragments, right_begin, right_end)?;
            }
            Regex::Star(r) => {
                let mid_begin = nfa.new_state();
                let mid_end = nfa.new_state();
                nfa.add_eps(begin, mid_begin);
                nfa.add_eps(begin, end);
                nfa.add_eps(mid_end, mid_begin);
                nfa.add_eps(mid_end, end);
                r.build_nfa(nfa, fragments, mid_begin, mid_end)?;
            }
            Regex::Prefix(r) => {
                // Accepts any prefix (incl. empty/full) of a string in L(r):
                // build r into fresh states, then add an ε-edge straight to
                // `end` from every state reachable from `mb` (by any edge),
                // so stopping after any number of consumed bytes still leads
                // to an accept.
                let mid_begin = nfa.new_state();
                let mid_end = nfa.new_state();
                r.build_nfa(nfa, fragments, mid_begin, mid_end)?;
                nfa.add_eps(begin, mid_begin);
                for state in nfa.reachable_from(mid_begin) {
                    nfa.add_eps(state, end);
                }
            }
        }
        Ok(())
    }

    /// Desugars `{n,m}` into `n` mandatory copies concatenated with `m-n`
    /// optional copies. `m` may equal `n` (exact count) or
    /// be `None` already handled by the caller turning `{n,}`-less grammar
    /// into the two concrete bounds before calling this.
    pub fn repeat_range(re: Regex, min: u32, max: u32) -> Regex {
        let mut tail = Regex::Empty;
        let mut remaining_optional = max - min;
        while remaining_optional > 0 {
            tail = Regex::Alt(
                Box::new(Regex::Concat(Box::new(re.clone()), Box::new(tail))),
                Box::new(Regex::Empty),
            );
            remaining_optional -= 1;
        }
        let mut remaining_mandatory = min;
        while remaining_mandatory > 0 {
            tail = Regex::Concat(Box::new(re.clone()), Box::new(tail));
            remaining_mandatory -= 1;
        }
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::scc::compute_scc;
    use crate::nfa::subset::build_dfa;

    struct NoFragments;
    impl FragmentSource for NoFragments {
        fn build_fragment(&mut self, _nfa: &mut Nfa, _name: &str) -> Result<(StateId, StateId), ()> {
            panic!("no fragments in this test")
        }
    }

    fn accepts(re: &Regex, input: &[u8]) -> bool {
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
    fn star_accepts_empty_and_repeats() {
        let re = Regex::Star(Box::new(Regex::Char(ByteClass::single(b'a'))));
        assert!(accepts(&re, b""));
        assert!(accepts(&re, b"a"));
        assert!(accepts(&re, b"aaaa"));
        assert!(!accepts(&re, b"aab"));
    }

    #[test]
    fn prefix_accepts_every_prefix() {
        let word = |s: &[u8]| -> Regex {
            s.iter()
                .rev()
                .fold(Regex::Empty, |acc, &b| Regex::Concat(Box::new(Regex::Char(ByteClass::single(b))), Box::new(acc)))
        };
        let re = Regex::Prefix(Box::new(word(b"hi")));
        assert!(accepts(&re, b""));
        assert!(accepts(&re, b"h"));
        assert!(accepts(&re, b"hi"));
        assert!(!accepts(&re, b"hx"));
    }

    #[test]
    fn repeat_range_bounds() {
        let re = Regex::repeat_range(Regex::Char(ByteClass::range(b'0', b'9')), 2, 4);
        assert!(!accepts(&re, b"1"));
        assert!(accepts(&re, b"12"));
        assert!(accepts(&re, b"1234"));
        assert!(!accepts(&re, b"12345"));
    }
}
