//! Two-phase partition-refinement minimization: one refinement pass by
//! accept-equality alone, then repeated full `equiv` passes to a fixed
//! point. Each state's partition membership lives in an explicit
//! `Vec<usize>` side table, rebuilt after every round, rather than a mutable
//! pointer on the state itself.

use crate::dfa::{Dfa, DfaState};

/// `same_accept(a, b)` decides whether two accept annotations are
/// interchangeable for minimization: both `None`, or both `Some` with equal
/// `(token, target_lexical_state)`. This module only knows rule ids as
/// opaque `usize`s, so the grammar supplies the comparator.
pub fn minimize(dfa: &Dfa, same_accept: impl Fn(Option<usize>, Option<usize>) -> bool) -> Dfa {
    let states = dfa.reachable_states();
    let n = states.len();
    // local index (0..n) <-> original DfaStateId
    let local_of: std::collections::HashMap<usize, usize> =
        states.iter().enumerate().map(|(i, &s)| (s, i)).collect();

    let local_trans: Vec<[Option<usize>; 256]> = states
        .iter()
        .map(|&s| {
            let mut row = [None; 256];
            for (b, t) in dfa.states[s].trans.iter().enumerate() {
                row[b] = t.and_then(|t| local_of.get(&t).copied());
            }
            row
        })
        .collect();
    let local_accept: Vec<Option<usize>> = states.iter().map(|&s| dfa.states[s].accept).collect();

    // Initial partition: one class containing every state, per spec.
    let mut classes: Vec<Vec<usize>> = vec![(0..n).collect()];

    let assign_repr = |classes: &[Vec<usize>]| -> Vec<usize> {
        let mut repr = vec![0usize; n];
        for class in classes {
            let r = class[0];
            for &s in class {
                repr[s] = r;
            }
        }
        repr
    };

    let refine_all = |classes: Vec<Vec<usize>>,
                       equiv: &dyn Fn(usize, usize, &[usize]) -> bool|
     -> (Vec<Vec<usize>>, bool) {
        let repr = assign_repr(&classes);
        let mut new_classes = Vec::new();
        let mut any_progress = false;
        for class in classes {
            if class.len() <= 1 {
                new_classes.push(class);
                continue;
            }
            let mut buckets: Vec<Vec<usize>> = Vec::new();
            'outer: for s in class {
                for bucket in buckets.iter_mut() {
                    if equiv(bucket[0], s, &repr) {
                        bucket.push(s);
                        continue 'outer;
                    }
                }
                buckets.push(vec![s]);
            }
            if buckets.len() > 1 {
                any_progress = true;
            }
            new_classes.extend(buckets);
        }
        (new_classes, any_progress)
    };

    let accept_equiv = |a: usize, b: usize, _repr: &[usize]| same_accept(local_accept[a], local_accept[b]);
    let (mut classes, _) = refine_all(classes, &accept_equiv);

    let full_equiv = |a: usize, b: usize, repr: &[usize]| {
        for byte in 0..256 {
            let ta = local_trans[a][byte];
            let tb = local_trans[b][byte];
            let same = match (ta, tb) {
                (None, None) => true,
                (Some(x), Some(y)) => repr[x] == repr[y],
                _ => false,
            };
            if !same {
                return false;
            }
        }
        true
    };

    loop {
        let (next, progress) = refine_all(classes, &full_equiv);
        classes = next;
        if !progress {
            break;
        }
    }

    // Rebuild: one DFA state per class, representative-indexed.
    let repr = assign_repr(&classes);
    let mut class_of_repr: std::collections::HashMap<usize, usize> = std::collections::HashMap::new();
    for &r in repr.iter() {
        let next = class_of_repr.len();
        class_of_repr.entry(r).or_insert(next);
    }

    let mut new_states: Vec<DfaState> = (0..class_of_repr.len()).map(|_| DfaState::new()).collect();
    for (local_idx, &r) in repr.iter().enumerate() {
        let new_idx = class_of_repr[&r];
        new_states[new_idx].accept = local_accept[local_idx];
        for byte in 0..256 {
            if let Some(t) = local_trans[local_idx][byte] {
                let t_repr = repr[t];
                new_states[new_idx].trans[byte] = Some(class_of_repr[&t_repr]);
            }
        }
    }

    let new_start = class_of_repr[&repr[local_of[&dfa.start]]];

    Dfa {
        states: new_states,
        start: new_start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charclass::ByteClass;
    use crate::nfa::scc::compute_scc;
    use crate::nfa::subset::build_dfa;
    use crate::nfa::Nfa;

    /// `(a|b)*abb` classic textbook example: minimization should collapse
    /// the subset-construction DFA down to 4 states.
    #[test]
    fn minimizes_classic_example() {
        let mut nfa = Nfa::new();
        let start = nfa.new_state();
        let s_a = nfa.new_state();
        let s_ab = nfa.new_state();
        let accept = nfa.new_state();
        nfa.set_rule(accept, 0);

        nfa.add_trans(start, ByteClass::single(b'a'), s_a);
        nfa.add_trans(start, ByteClass::single(b'b'), start);
        nfa.add_trans(s_a, ByteClass::single(b'a'), s_a);
        nfa.add_trans(s_a, ByteClass::single(b'b'), s_ab);
        nfa.add_trans(s_ab, ByteClass::single(b'a'), s_a);
        nfa.add_trans(s_ab, ByteClass::single(b'b'), accept);
        nfa.add_trans(accept, ByteClass::single(b'a'), s_a);
        nfa.add_trans(accept, ByteClass::single(b'b'), start);

        let scc_info = compute_scc(&nfa);
        let dfa = build_dfa(&nfa, start, &scc_info, |rule| rule);
        let min = minimize(&dfa, |a, b| a == b);
        assert_eq!(min.states.len(), 4);
    }

    #[test]
    fn irreducible_after_minimization() {
        let mut nfa = Nfa::new();
        let start = nfa.new_state();
        let mid = nfa.new_state();
        let accept = nfa.new_state();
        nfa.set_rule(accept, 0);
        nfa.add_trans(start, ByteClass::single(b'a'), mid);
        nfa.add_trans(mid, ByteClass::single(b'a'), accept);
        nfa.add_trans(accept, ByteClass::single(b'a'), accept);

        let scc_info = compute_scc(&nfa);
        let dfa = build_dfa(&nfa, start, &scc_info, |rule| rule);
        let min = minimize(&dfa, |a, b| a == b);

        // No two reachable states should satisfy `equiv` after minimization.
        let states = min.reachable_states();
        for i in 0..states.len() {
            for j in (i + 1)..states.len() {
                let a = &min.states[states[i]];
                let b = &min.states[states[j]];
                assert!(a.accept != b.accept || a.trans.iter().ne(b.trans.iter()));
            }
        }
    }
}
