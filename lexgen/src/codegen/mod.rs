//! Table builder: equivalence-class alphabet partition, DFA-state layout and
//! transition-word encoding.
//!
//! States from every lexical state's minimized DFA are flattened into one
//! global, stride-4-addressed array, the 256-byte alphabet is refined into
//! equivalence classes driven by observed outgoing transitions, and each
//! cell is encoded as one word combining next-state offset, accept bit and
//! accept-token id.

pub mod template;

use crate::charclass::ByteClass;
use crate::dfa::Dfa;
use crate::grammar::{CompiledGrammar, GrammarError};
use crate::project::ProjectFile;
use std::collections::HashSet;

use self::template::{parse as parse_code, parse_inline, SubstValue};

const ACCEPT_BIT: u32 = 0x8000_0000;

/// Every substitution name a template is allowed to reference.
pub struct Codegen {
    pub substs: Vec<(String, SubstValue)>,
}

impl Codegen {
    fn get(&self, name: &str) -> Option<&SubstValue> {
        self.substs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn set(&mut self, name: &str, value: SubstValue) {
        if let Some(slot) = self.substs.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.substs.push((name.to_string(), value));
        }
    }

    pub fn lookup(&self, name: &str) -> Option<SubstValue> {
        self.get(name).cloned()
    }

    /// Parses the `[codegen]` section's `header`/`source`/`prefix` keys,
    /// then fills in the always-present defaults: `header`/`source` each
    /// independently default to empty if absent, `prefix` defaults to
    /// `default_prefix` (the input file's stem), and `extra_fields`/
    /// `lexer_trap` are always empty placeholders with no section key that
    /// populates them.
    pub fn from_project(project: &ProjectFile, default_prefix: &str) -> Result<Codegen, GrammarError> {
        let mut codegen = Codegen { substs: Vec::new() };

        for section in project.sections_named("codegen") {
            for value in &section.values {
                match value.key.as_str() {
                    "header" => {
                        if codegen.get("header").is_some() {
                            return Err(GrammarError::DuplicateCodegenKey {
                                span: value.key_span,
                                key: "header".into(),
                            });
                        }
                        codegen.set("header", parse_code(&value.text, "<codegen>"));
                    }
                    "source" => {
                        if codegen.get("source").is_some() {
                            return Err(GrammarError::DuplicateCodegenKey {
                                span: value.key_span,
                                key: "source".into(),
                            });
                        }
                        codegen.set("source", parse_code(&value.text, "<codegen>"));
                    }
                    "prefix" => {
                        if codegen.get("prefix").is_some() {
                            return Err(GrammarError::DuplicateCodegenKey {
                                span: value.key_span,
                                key: "prefix".into(),
                            });
                        }
                        let inline = parse_inline(&value.text).map_err(|_| GrammarError::BadRuleTag {
                            span: value.key_span,
                            what: "an inline (single-line) prefix value".into(),
                        })?;
                        codegen.set("prefix", inline);
                    }
                    other => {
                        return Err(GrammarError::UnknownCodegenKey {
                            span: value.key_span,
                            key: other.to_string(),
                        });
                    }
                }
            }
        }

        if codegen.get("header").is_none() {
            codegen.set("header", SubstValue::empty());
        }
        if codegen.get("source").is_none() {
            codegen.set("source", SubstValue::empty());
        }
        if codegen.get("prefix").is_none() {
            codegen.set("prefix", SubstValue::inline(default_prefix));
        }
        codegen.set("extra_fields", SubstValue::empty());
        codegen.set("lexer_trap", SubstValue::empty());

        Ok(codegen)
    }

    /// Builds the table-derived substitution values (`enum_states`,
    /// `set_state_switch`, `enum_tokens`, `token_names`, `transitions`,
    /// `eq_classes`, `eof_transitions`) from the compiled automaton.
    pub fn build(&mut self, compiled: &CompiledGrammar) {
        let tables = build_tables(compiled);
        self.set("enum_states", tables.enum_states);
        self.set("set_state_switch", tables.set_state_switch);
        self.set("enum_tokens", tables.enum_tokens);
        self.set("token_names", tables.token_names);
        self.set("transitions", tables.transitions);
        self.set("eq_classes", tables.eq_classes);
        self.set("eof_transitions", tables.eof_transitions);
    }
}

/// One real DFA state, addressed globally across every lexical state's
/// automaton: states are numbered `0..S-1` in one flat run.
struct GlobalState {
    xstate_idx: usize,
    local_id: usize,
    /// The lexical state a longest-match backtrack from this state resets
    /// into: the accepting rule's `target_xstate` if this state accepts,
    /// otherwise this state's own lexical state (no token fires, no state
    /// change).
    reset_xstate: usize,
    accept_token: Option<usize>,
}

struct Tables {
    enum_states: SubstValue,
    set_state_switch: SubstValue,
    enum_tokens: SubstValue,
    token_names: SubstValue,
    transitions: SubstValue,
    eq_classes: SubstValue,
    eof_transitions: SubstValue,
}

fn capitalize(id: &str) -> String {
    id.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => {
                    let rest: String = chars.flat_map(|c| c.to_lowercase()).collect();
                    first.to_uppercase().collect::<String>() + &rest
                }
            }
        })
        .collect()
}

/// Candidate-block refinement of the 256-byte alphabet: `partition` is one
/// state's group of bytes sharing a destination; any existing class that
/// `partition` only partially overlaps is split in place. `seen` dedupes
/// partitions already used as a splitter, by value, purely for membership
/// testing — it is never iterated for output, so insertion order has no
/// bearing on determinism.
fn refine(classes: &mut Vec<ByteClass>, seen: &mut HashSet<ByteClass>, partition: ByteClass) {
    if !seen.insert(partition) {
        return;
    }
    let n = classes.len();
    for idx in 0..n {
        let inter = classes[idx].intersection(&partition);
        if inter == classes[idx] || inter.is_empty() {
            continue;
        }
        classes[idx] = classes[idx].difference(&inter);
        classes.push(inter);
    }
}

/// Groups the 256 bytes by a state's outgoing-transition destination,
/// preserving first-occurrence order over `trans`, which the deterministic
/// `Vec`-based `refine` calls below depend on for byte-identical output.
fn destination_blocks(trans: &[Option<usize>; 256]) -> Vec<ByteClass> {
    let mut blocks: Vec<(Option<usize>, ByteClass)> = Vec::new();
    for byte in 0u16..256 {
        let byte = byte as u8;
        let dest = trans[byte as usize];
        match blocks.iter_mut().find(|(d, _)| *d == dest) {
            Some((_, block)) => block.insert(byte),
            None => blocks.push((dest, ByteClass::single(byte))),
        }
    }
    blocks.into_iter().map(|(_, block)| block).collect()
}

fn build_tables(compiled: &CompiledGrammar) -> Tables {
    let mut classes = vec![ByteClass::ALL];
    let mut seen = HashSet::new();

    for xstate in &compiled.compiled {
        for &state in &xstate.dfa.reachable_states() {
            for block in destination_blocks(&xstate.dfa.states[state].trans) {
                refine(&mut classes, &mut seen, block);
            }
        }
    }

    // Pass 1: flatten every lexical state's reachable DFA into one global,
    // declaration-ordered array, recording (unresolved) reset targets and
    // discovering tokens in first-accepting-state order.
    let mut global_states: Vec<GlobalState> = Vec::new();
    let mut index_of: std::collections::HashMap<(usize, usize), usize> = std::collections::HashMap::new();
    let mut token_order: Vec<usize> = Vec::new();
    let mut enum_states = SubstValue::empty();
    let mut set_state_switch = SubstValue::empty();

    for (xstate_idx, xstate) in compiled.compiled.iter().enumerate() {
        for &local_id in &xstate.dfa.reachable_states() {
            let global_idx = global_states.len();
            index_of.insert((xstate_idx, local_id), global_idx);

            let accept_token = xstate.dfa.states[local_id].accept.map(|rule_idx| {
                let rule = &compiled.xstates[xstate_idx].rules[rule_idx];
                if !token_order.contains(&rule.token) {
                    token_order.push(rule.token);
                }
                rule.token
            });
            let reset_xstate = xstate.dfa.states[local_id]
                .accept
                .map(|rule_idx| compiled.xstates[xstate_idx].rules[rule_idx].target_xstate)
                .unwrap_or(xstate_idx);

            global_states.push(GlobalState {
                xstate_idx,
                local_id,
                reset_xstate,
                accept_token,
            });
        }

        let state_name = capitalize(&compiled.xstates[xstate_idx].name);
        enum_states.add_line(state_name.clone(), Some(","));
        let start_offset = 4 * index_of[&(xstate_idx, xstate.dfa.start)];
        set_state_switch.add_line(
            format!("case State::{state_name}: jlex_lexer->state = {start_offset}; break;"),
            Some(","),
        );
    }

    let states_num = global_states.len();

    // Pass 2: encode one transition word per (class, state) cell.
    let mut transitions = vec![String::new(); classes.len() * states_num];
    let mut eof_transitions: Vec<String> = Vec::with_capacity(states_num);

    for (state_idx, state) in global_states.iter().enumerate() {
        let dfa = &compiled.compiled[state.xstate_idx].dfa;
        let reset_local_start = compiled.compiled[state.reset_xstate].dfa.start;
        let reset_dfa = &compiled.compiled[state.reset_xstate].dfa;

        for (class_idx, class) in classes.iter().enumerate() {
            let ch = class.first().expect("equivalence classes are never empty");
            let target = dfa.states[state.local_id].trans[ch as usize];
            let value: u32 = match target {
                Some(t) => 4 * index_of[&(state.xstate_idx, t)] as u32,
                None => match reset_dfa.states[reset_local_start].trans[ch as usize] {
                    Some(rt) => ACCEPT_BIT | (4 * index_of[&(state.reset_xstate, rt)] as u32),
                    None => 0,
                },
            };

            let cell = match state.accept_token {
                Some(token) => format!(
                    "{value:#x}|(static_cast<uint32_t>(Token::{})<<16)",
                    token_enum_ident(compiled, token)
                ),
                None => format!("{value:#x}"),
            };
            transitions[class_idx * states_num + state_idx] = cell;
        }

        let eof_value = match state.accept_token {
            Some(token) => format!(
                "{ACCEPT_BIT:#x}|(static_cast<uint32_t>(Token::{})<<16)",
                token_enum_ident(compiled, token)
            ),
            None => "0x0".to_string(),
        };
        eof_transitions.push(eof_value);
    }

    let mut eq_classes_val = SubstValue::empty();
    let mut eq_class_index = [0usize; 256];
    for (idx, class) in classes.iter().enumerate() {
        for byte in class.iter() {
            eq_class_index[byte as usize] = idx;
        }
    }
    for chunk in eq_class_index.chunks(16) {
        let line = chunk
            .iter()
            .map(|idx| (*idx * states_num * 4).to_string())
            .collect::<Vec<_>>()
            .join(", ");
        eq_classes_val.add_line(line, Some(","));
    }

    let mut transitions_val = SubstValue::empty();
    for class_idx in 0..classes.len() {
        let row = &transitions[class_idx * states_num..(class_idx + 1) * states_num];
        transitions_val.add_line(row.join(", "), Some(","));
    }

    let eof_transitions_val = SubstValue::inline(eof_transitions.join(","));

    let mut token_names = SubstValue::empty();
    let mut enum_tokens = SubstValue::empty();
    for &token in &token_order {
        let name = &*compiled.tokens[token].name;
        token_names.add_line(format!("{name:?}"), Some(","));
        enum_tokens.add_line(capitalize(name), Some(","));
    }

    Tables {
        enum_states,
        set_state_switch,
        enum_tokens,
        token_names,
        transitions: transitions_val,
        eq_classes: eq_classes_val,
        eof_transitions: eof_transitions_val,
    }
}

/// The `Token::` enum variant name for a token id, matching `enum_tokens`'s
/// own `capitalize` call so a cell's `Token::{name}` always names a variant
/// the header actually declares.
fn token_enum_ident(compiled: &CompiledGrammar, token: usize) -> String {
    capitalize(&compiled.tokens[token].name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use crate::project;

    fn compile(src: &str) -> CompiledGrammar {
        let project = project::parse(src).unwrap();
        let grammar = Grammar::from_project(&project).unwrap();
        grammar.build().unwrap().0
    }

    #[test]
    fn single_rule_builds_nonempty_tables() {
        let compiled = compile("[grammar]\nword [a-z]+\n");
        let tables = build_tables(&compiled);
        assert!(!tables.enum_states.lines.is_empty());
        assert!(!tables.transitions.lines.is_empty());
        assert!(!tables.eq_classes.lines.is_empty());
        assert_eq!(tables.eof_transitions.lines.len(), 1);
    }

    #[test]
    fn token_names_include_error_and_declared_tokens() {
        let compiled = compile("[grammar]\nword [a-z]+\n");
        let tables = build_tables(&compiled);
        let joined = tables.token_names.lines.join("");
        assert!(joined.contains("word"));
        assert!(joined.contains("error"));
    }

    #[test]
    fn capitalize_matches_pascal_case_via_underscore_split() {
        assert_eq!(capitalize("default"), "Default");
        assert_eq!(capitalize("my_state"), "MyState");
    }

    #[test]
    fn codegen_defaults_fill_every_required_key() {
        let project = project::parse("[grammar]\nword [a-z]+\n").unwrap();
        let codegen = Codegen::from_project(&project, "lexer").unwrap();
        for key in ["header", "source", "prefix", "extra_fields", "lexer_trap"] {
            assert!(codegen.get(key).is_some(), "{key} missing");
        }
    }

    #[test]
    fn duplicate_codegen_key_is_rejected() {
        let project = project::parse("[codegen]\nheader foo\nheader bar\n").unwrap();
        assert!(Codegen::from_project(&project, "lexer").is_err());
    }
}
