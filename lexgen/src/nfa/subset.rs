//! Subset (powerset) construction: NFA → DFA via SCC closures.

use crate::dfa::{Dfa, DfaState};
use crate::nfa::scc::{SccId, SccInfo};
use crate::nfa::{Nfa, StateId};
use std::collections::HashMap;

/// Canonical, hashable key for a DFA-state subset: a sorted, deduplicated
/// list of SCC ids, never a raw `HashSet`, so two runs with identical input
/// produce identical insertion order into the worklist regardless of hasher
/// seed.
pub type SccSet = Vec<SccId>;

fn canonical(mut sccs: Vec<SccId>) -> SccSet {
    sccs.sort_unstable();
    sccs.dedup();
    sccs
}

fn union_closures(info: &SccInfo, sccs: &[SccId]) -> SccSet {
    let mut all = Vec::new();
    for &s in sccs {
        all.extend_from_slice(&info.closures[s]);
    }
    canonical(all)
}

/// Build a DFA from the NFA reachable from `start`. `rule_order` maps a rule
/// id (opaque here) to its priority — the rule with the lowest value wins
/// when a DFA state folds together multiple accepting NFA states; ties are
/// impossible by construction since rule ids are unique per accept state and
/// orders are assigned densely per lexical state, so this module never
/// needs to break one.
pub fn build_dfa(
    nfa: &Nfa,
    start: StateId,
    info: &SccInfo,
    rule_order: impl Fn(usize) -> usize,
) -> Dfa {
    let start_closure = union_closures(info, &[info.scc_of[start]]);

    let mut powerset: HashMap<SccSet, usize> = HashMap::new();
    let mut states: Vec<DfaState> = Vec::new();
    let mut worklist: Vec<SccSet> = Vec::new();

    let start_idx = 0;
    powerset.insert(start_closure.clone(), start_idx);
    states.push(DfaState::new());
    worklist.push(start_closure);

    // BFS over the worklist in insertion order, never a HashMap iteration.
    let mut cursor = 0;
    while cursor < worklist.len() {
        let subset = worklist[cursor].clone();
        cursor += 1;
        let dfa_idx = powerset[&subset];

        let mut per_byte: Vec<Vec<SccId>> = vec![Vec::new(); 256];
        let mut accept: Option<usize> = None;

        for &scc in &subset {
            // members of this SCC: scan once per SCC over the whole NFA.
            // (For pathological grammars one would index members per SCC up
            // front; kept as a direct scan here since it mirrors the
            // original's "for nfa_state in scc.states" and state counts in
            // generated lexers are small.)
            for (state_id, nfa_state) in nfa.states.iter().enumerate() {
                if info.scc_of[state_id] != scc {
                    continue;
                }
                if let Some(rule) = nfa_state.rule {
                    accept = Some(match accept {
                        None => rule,
                        Some(current) => {
                            if rule_order(rule) < rule_order(current) {
                                rule
                            } else {
                                current
                            }
                        }
                    });
                }
                for &(chars, target) in &nfa_state.trans {
                    let target_scc = info.scc_of[target];
                    for byte in chars.iter() {
                        per_byte[byte as usize].push(target_scc);
                    }
                }
            }
        }

        states[dfa_idx].accept = accept;

        for (byte, sccs) in per_byte.into_iter().enumerate() {
            if sccs.is_empty() {
                continue;
            }
            let closure = union_closures(info, &sccs);
            let target_idx = *powerset.entry(closure.clone()).or_insert_with(|| {
                states.push(DfaState::new());
                worklist.push(closure);
                states.len() - 1
            });
            states[dfa_idx].trans[byte] = Some(target_idx);
        }
    }

    Dfa {
        states,
        start: start_idx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charclass::ByteClass;
    use crate::nfa::scc::compute_scc;

    fn simulate_nfa(nfa: &Nfa, info: &SccInfo, start: StateId, input: &[u8]) -> bool {
        let mut current = union_closures(info, &[info.scc_of[start]]);
        for &byte in input {
            let mut next_sccs = Vec::new();
            for &scc in &current {
                for &state in &scc_members(info, scc, nfa) {
                    for &(chars, target) in &nfa.states[state].trans {
                        if chars.contains(byte) {
                            next_sccs.push(info.scc_of[target]);
                        }
                    }
                }
            }
            if next_sccs.is_empty() {
                return false;
            }
            current = union_closures(info, &next_sccs);
        }
        current.iter().any(|&scc| {
            scc_members(info, scc, nfa)
                .iter()
                .any(|&s| nfa.states[s].rule.is_some())
        })
    }

    fn scc_members(info: &SccInfo, scc: SccId, nfa: &Nfa) -> Vec<StateId> {
        (0..nfa.states.len()).filter(|&s| info.scc_of[s] == scc).collect()
    }

    fn dfa_accepts(dfa: &Dfa, input: &[u8]) -> bool {
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
    fn powerset_equivalence_on_star() {
        // regex: a(b|c)*  (built directly as an NFA)
        let mut nfa = Nfa::new();
        let start = nfa.new_state();
        let after_a = nfa.new_state();
        let loop_begin = nfa.new_state();
        let loop_end = nfa.new_state();
        let accept = nfa.new_state();
        nfa.set_rule(accept, 0);

        nfa.add_trans(start, ByteClass::single(b'a'), after_a);
        nfa.add_eps(after_a, loop_begin);
        nfa.add_eps(after_a, accept);
        nfa.add_eps(loop_end, loop_begin);
        nfa.add_eps(loop_end, accept);
        nfa.add_trans(loop_begin, ByteClass::from_bytes([b'b', b'c']), loop_end);

        let info = compute_scc(&nfa);
        let dfa = build_dfa(&nfa, start, &info, |r| r);

        for input in [&b"a"[..], b"abc", b"abcbcbc", b""] {
            assert_eq!(
                simulate_nfa(&nfa, &info, start, input),
                dfa_accepts(&dfa, input),
                "mismatch for input {input:?}"
            );
        }
        assert!(!dfa_accepts(&dfa, b"b"));
    }

    // Property-based powerset equivalence: for a random regex over a small,
    // randomly-ordered alphabet and a random input up to length 16, the DFA
    // built by subset construction must agree with a naive per-state NFA
    // simulator.
    mod powerset_property {
        use super::*;
        use crate::regex::{FragmentSource, Regex};
        use proptest::prelude::*;
        use rand::seq::SliceRandom;

        struct NoFragments;
        impl FragmentSource for NoFragments {
            fn build_fragment(&mut self, _nfa: &mut Nfa, _name: &str) -> Result<(StateId, StateId), ()> {
                panic!("no fragments in this test")
            }
        }

        // Shuffle the alphabet with `rand::thread_rng()` before handing it to
        // proptest so byte order isn't a confound across runs.
        fn shuffled_alphabet() -> Vec<u8> {
            let mut alphabet = vec![b'a', b'b', b'c'];
            alphabet.shuffle(&mut rand::thread_rng());
            alphabet
        }

        fn arb_regex(alphabet: Vec<u8>) -> impl Strategy<Value = Regex> {
            let leaf = prop_oneof![
                Just(Regex::Empty),
                prop::sample::select(alphabet).prop_map(|b| Regex::Char(ByteClass::single(b))),
            ];
            leaf.prop_recursive(4, 32, 3, |inner| {
                prop_oneof![
                    (inner.clone(), inner.clone())
                        .prop_map(|(l, r)| Regex::Concat(Box::new(l), Box::new(r))),
                    (inner.clone(), inner.clone())
                        .prop_map(|(l, r)| Regex::Alt(Box::new(l), Box::new(r))),
                    inner.clone().prop_map(|r| Regex::Star(Box::new(r))),
                    inner.prop_map(|r| Regex::Prefix(Box::new(r))),
                ]
            })
        }

        proptest! {
            #[test]
            fn powerset_equivalence_random(
                re in arb_regex(shuffled_alphabet()),
                input in prop::collection::vec(prop::sample::select(vec![b'a', b'b', b'c']), 0..16),
            ) {
                let mut nfa = Nfa::new();
                let begin = nfa.new_state();
                let end = nfa.new_state();
                nfa.set_rule(end, 0);
                re.build_nfa(&mut nfa, &mut NoFragments, begin, end).unwrap();

                let info = compute_scc(&nfa);
                let dfa = build_dfa(&nfa, begin, &info, |r| r);

                prop_assert_eq!(simulate_nfa(&nfa, &info, begin, &input), dfa_accepts(&dfa, &input));
            }
        }
    }
}
