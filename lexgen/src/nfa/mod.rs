//! NFA arena, fragment cloning and ε-transition strongly-connected-component
//! analysis.
//!
//! States live in a flat `Vec<NfaState>` inside one [`Nfa`]; transitions are
//! indices, never owning back-pointers, avoiding the `Rc`/`RefCell` cycles
//! that a pointer-based graph with ambient mutation would otherwise need.

pub mod scc;
pub mod subset;

use crate::charclass::ByteClass;

pub type StateId = usize;

#[derive(Debug, Clone, Default)]
pub struct NfaState {
    pub etrans: Vec<StateId>,
    pub trans: Vec<(ByteClass, StateId)>,
    /// Index into the grammar's flat rule arena, if this state is a rule's
    /// accept state. No deduplication across rules.
    pub rule: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Nfa {
    pub states: Vec<NfaState>,
}

impl Nfa {
    pub fn new() -> Nfa {
        Nfa::default()
    }

    pub fn new_state(&mut self) -> StateId {
        self.states.push(NfaState::default());
        self.states.len() - 1
    }

    pub fn add_eps(&mut self, from: StateId, to: StateId) {
        self.states[from].etrans.push(to);
    }

    pub fn add_trans(&mut self, from: StateId, chars: ByteClass, to: StateId) {
        if !chars.is_empty() {
            self.states[from].trans.push((chars, to));
        }
    }

    pub fn set_rule(&mut self, state: StateId, rule: usize) {
        self.states[state].rule = Some(rule);
    }

    /// Every state reachable from `start` via any edge kind (ε or labeled).
    /// Used for `Prefix`'s "every state reachable from mb" rule, which must
    /// walk the whole reachable subgraph (stopping after any number of
    /// consumed bytes still reaches an accept).
    pub fn reachable_from(&self, start: StateId) -> Vec<StateId> {
        let mut visited = vec![false; self.states.len()];
        let mut worklist = vec![start];
        let mut out = Vec::new();
        visited[start] = true;
        while let Some(s) = worklist.pop() {
            out.push(s);
            let state = &self.states[s];
            for &t in &state.etrans {
                if !visited[t] {
                    visited[t] = true;
                    worklist.push(t);
                }
            }
            for &(_, t) in &state.trans {
                if !visited[t] {
                    visited[t] = true;
                    worklist.push(t);
                }
            }
        }
        out
    }

    /// Every state reachable from `start` by ε-edges only (the ε-closure).
    /// Used by the implicit error rule's `nonstart_chars` computation, which
    /// needs the bytes that can label a *first* transition — i.e. transitions
    /// out of states reachable before any byte is consumed — not bytes
    /// reachable anywhere in the rule's subgraph.
    pub fn eps_closure(&self, start: StateId) -> Vec<StateId> {
        let mut visited = vec![false; self.states.len()];
        let mut worklist = vec![start];
        let mut out = Vec::new();
        visited[start] = true;
        while let Some(s) = worklist.pop() {
            out.push(s);
            for &t in &self.states[s].etrans {
                if !visited[t] {
                    visited[t] = true;
                    worklist.push(t);
                }
            }
        }
        out
    }

    /// Clone the subgraph reachable from `begin` (which must reach `end`),
    /// producing a fresh copy with no aliasing to the original states. Used
    /// for fragment use-sites, which must each get an independently-mutable
    /// copy of the fragment's NFA. Implemented with an explicit worklist,
    /// not recursion, since recursive clone would blow the stack on
    /// pathological grammars.
    pub fn clone_fragment(&mut self, begin: StateId, end: StateId) -> (StateId, StateId) {
        use std::collections::HashMap;

        // Pass 1: discover every state reachable from `begin` (which, for a
        // well-formed fragment, includes `end`) and allocate its clone.
        let mut remap: HashMap<StateId, StateId> = HashMap::new();
        let mut worklist = vec![begin];
        remap.insert(begin, self.new_state());
        let mut cursor = 0;
        while cursor < worklist.len() {
            let src = worklist[cursor];
            cursor += 1;
            let etrans = self.states[src].etrans.clone();
            let trans: Vec<StateId> = self.states[src].trans.iter().map(|(_, t)| *t).collect();
            for target in etrans.into_iter().chain(trans) {
                if let std::collections::hash_map::Entry::Vacant(e) = remap.entry(target) {
                    e.insert(self.new_state());
                    worklist.push(target);
                }
            }
        }
        if let std::collections::hash_map::Entry::Vacant(e) = remap.entry(end) {
            e.insert(self.new_state());
        }

        // Pass 2: copy each original state's edges into its clone.
        for (&src, &new_src) in remap.iter() {
            let etrans: Vec<StateId> = self.states[src].etrans.iter().map(|t| remap[t]).collect();
            let trans: Vec<(ByteClass, StateId)> = self.states[src]
                .trans
                .iter()
                .map(|(c, t)| (*c, remap[t]))
                .collect();
            let rule = self.states[src].rule;
            self.states[new_src].etrans = etrans;
            self.states[new_src].trans = trans;
            self.states[new_src].rule = rule;
        }

        (remap[&begin], remap[&end])
    }

    /// Copy the subgraph reachable from `other`'s `begin` (through `end`)
    /// into `self`, allocating fresh state ids here. This is
    /// [`clone_fragment`](Nfa::clone_fragment)'s cross-arena sibling: a
    /// fragment is built at most once into its own standalone `Nfa`, and
    /// every reference site merges a fresh copy of that subgraph into
    /// whichever `Nfa` is being built for a lexical state or for another
    /// fragment.
    pub fn merge_fragment(&mut self, other: &Nfa, begin: StateId, end: StateId) -> (StateId, StateId) {
        use std::collections::HashMap;

        let mut remap: HashMap<StateId, StateId> = HashMap::new();
        let mut worklist = vec![begin];
        remap.insert(begin, self.new_state());
        let mut cursor = 0;
        while cursor < worklist.len() {
            let src = worklist[cursor];
            cursor += 1;
            let etrans = other.states[src].etrans.clone();
            let trans: Vec<StateId> = other.states[src].trans.iter().map(|(_, t)| *t).collect();
            for target in etrans.into_iter().chain(trans) {
                if let std::collections::hash_map::Entry::Vacant(e) = remap.entry(target) {
                    e.insert(self.new_state());
                    worklist.push(target);
                }
            }
        }
        if let std::collections::hash_map::Entry::Vacant(e) = remap.entry(end) {
            e.insert(self.new_state());
        }

        for (&src, &new_src) in remap.iter() {
            let etrans: Vec<StateId> = other.states[src].etrans.iter().map(|t| remap[t]).collect();
            let trans: Vec<(ByteClass, StateId)> = other.states[src]
                .trans
                .iter()
                .map(|(c, t)| (*c, remap[t]))
                .collect();
            self.states[new_src].etrans = etrans;
            self.states[new_src].trans = trans;
            // A fragment's own states never carry a `rule` annotation (only
            // the caller's dedicated accept state does), so `rule` is not
            // copied here.
        }

        (remap[&begin], remap[&end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_preserves_shape() {
        let mut nfa = Nfa::new();
        let a = nfa.new_state();
        let b = nfa.new_state();
        let c = nfa.new_state();
        nfa.add_trans(a, ByteClass::single(b'x'), b);
        nfa.add_eps(b, c);

        let (ca, cc) = nfa.clone_fragment(a, c);
        assert_ne!(ca, a);
        assert_ne!(cc, c);
        assert_eq!(nfa.states[ca].trans.len(), 1);
        let (chars, target) = nfa.states[ca].trans[0];
        assert!(chars.contains(b'x'));
        assert_eq!(nfa.states[target].etrans, vec![cc]);
    }

    #[test]
    fn reachable_from_follows_both_edge_kinds() {
        let mut nfa = Nfa::new();
        let a = nfa.new_state();
        let b = nfa.new_state();
        let c = nfa.new_state();
        nfa.add_eps(a, b);
        nfa.add_trans(b, ByteClass::single(b'y'), c);
        let mut reached = nfa.reachable_from(a);
        reached.sort();
        assert_eq!(reached, vec![a, b, c]);
    }

    #[test]
    fn eps_closure_follows_eps_edges_only() {
        let mut nfa = Nfa::new();
        let a = nfa.new_state();
        let b = nfa.new_state();
        let c = nfa.new_state();
        nfa.add_eps(a, b);
        nfa.add_trans(b, ByteClass::single(b'y'), c);
        let mut closure = nfa.eps_closure(a);
        closure.sort();
        assert_eq!(closure, vec![a, b]);
    }
}
