//! Grammar context: fragments, tokens, lexical states and rules, and the
//! per-lexical-state NFA→DFA→minimize pipeline.
//!
//! Fragments are resolved lazily through [`crate::regex::FragmentSource`]
//! rather than a dict lookup method threaded through every `build_nfa` call.
//! Lexical states/tokens/fragments are each a `Vec` plus a `HashMap` index:
//! the `Vec` preserves declaration/first-use order for anything that affects
//! emitted output, and the `HashMap` is only ever probed, never iterated.

use crate::dfa::minimize::minimize;
use crate::dfa::Dfa;
use crate::nfa::scc::compute_scc;
use crate::nfa::subset::build_dfa;
use crate::nfa::{Nfa, StateId};
use crate::error::Warning;
use crate::project::ProjectFile;
use crate::regex::parse::RegexSyntaxError;
use crate::regex::{FragmentSource, Regex};
use crate::span::Span;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrammarError {
    #[error("at {span}: unknown fragment '{name}'")]
    UnknownFragment { span: Span, name: String },
    #[error("at {span}: unknown lexical state '{name}'")]
    UnknownState { span: Span, name: String },
    #[error("at {span}: duplicate fragment '{name}', first declared at {first}")]
    DuplicateFragment { span: Span, first: Span, name: String },
    #[error("at {span}: duplicate lexical state '{name}'")]
    DuplicateState { span: Span, name: String },
    #[error("fragment '{name}' is defined in terms of itself")]
    FragmentCycle { name: String },
    #[error("at {span}: unknown key '{key}' in [general]")]
    UnknownGeneralKey { span: Span, key: String },
    #[error("at {span}: rule has no regex")]
    RuleMissingRegex { span: Span },
    #[error("at {span}: only one target state tag ('{{-> state}}') is allowed per rule")]
    MultipleTargetStates { span: Span },
    #[error("at {span} (fragment '{fragment}'): {source}")]
    FragmentRegex {
        span: Span,
        fragment: String,
        source: RegexSyntaxError,
    },
    #[error("at {span} (rule '{token}'): {source}")]
    RuleRegex {
        span: Span,
        token: String,
        source: RegexSyntaxError,
    },
    #[error("at {span}: expected {what}")]
    BadRuleTag { span: Span, what: String },
    #[error("at {span}: duplicate key '{key}' in [codegen]")]
    DuplicateCodegenKey { span: Span, key: String },
    #[error("at {span}: unknown key '{key}' in [codegen]")]
    UnknownCodegenKey { span: Span, key: String },
}

pub struct FragmentDef {
    pub name: Rc<str>,
    pub span: Span,
    pub regex: Regex,
    built: Option<(Nfa, StateId, StateId)>,
}

pub struct Token {
    pub name: Rc<str>,
}

/// (regex, accept-token, target lexical state) plus its priority. `order` is
/// redundant with the rule's position in `XState::rules` but kept explicit
/// since `nfa::subset::build_dfa`'s `rule_order` closure wants a plain
/// `usize -> usize` priority function.
pub struct Rule {
    pub token: usize,
    pub regex: Regex,
    pub target_xstate: usize,
    pub order: usize,
    pub span: Span,
}

pub struct XState {
    pub name: Rc<str>,
    pub rules: Vec<Rule>,
}

pub struct Grammar {
    pub fragments: Vec<FragmentDef>,
    fragment_index: HashMap<Rc<str>, usize>,
    pub tokens: Vec<Token>,
    token_index: HashMap<Rc<str>, usize>,
    pub xstates: Vec<XState>,
    xstate_index: HashMap<Rc<str>, usize>,
}

/// A lexical state's compiled automaton, ready for the table builder.
pub struct CompiledXState {
    pub name: Rc<str>,
    pub dfa: Dfa,
}

pub struct CompiledGrammar {
    pub tokens: Vec<Token>,
    pub xstates: Vec<XState>,
    pub compiled: Vec<CompiledXState>,
}

impl Default for Grammar {
    fn default() -> Grammar {
        let mut g = Grammar {
            fragments: Vec::new(),
            fragment_index: HashMap::new(),
            tokens: Vec::new(),
            token_index: HashMap::new(),
            xstates: Vec::new(),
            xstate_index: HashMap::new(),
        };
        g.add_xstate("default").expect("first xstate never duplicates");
        g
    }
}

impl Grammar {
    pub fn add_xstate(&mut self, name: &str) -> Result<usize, GrammarError> {
        if let Some(&idx) = self.xstate_index.get(name) {
            return Err(GrammarError::DuplicateState {
                span: Span::default(),
                name: self.xstates[idx].name.to_string(),
            });
        }
        let idx = self.xstates.len();
        self.xstates.push(XState {
            name: name.into(),
            rules: Vec::new(),
        });
        self.xstate_index.insert(name.into(), idx);
        Ok(idx)
    }

    pub fn xstate_idx(&self, name: &str) -> Option<usize> {
        self.xstate_index.get(name).copied()
    }

    pub fn add_token(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.token_index.get(name) {
            return idx;
        }
        let idx = self.tokens.len();
        self.tokens.push(Token { name: name.into() });
        self.token_index.insert(name.into(), idx);
        idx
    }

    pub fn add_fragment(&mut self, name: &str, span: Span, regex: Regex) -> Result<(), GrammarError> {
        if let Some(&idx) = self.fragment_index.get(name) {
            return Err(GrammarError::DuplicateFragment {
                span,
                first: self.fragments[idx].span,
                name: name.to_string(),
            });
        }
        let idx = self.fragments.len();
        self.fragments.push(FragmentDef {
            name: name.into(),
            span,
            regex,
            built: None,
        });
        self.fragment_index.insert(name.into(), idx);
        Ok(())
    }

    /// Build the `Grammar` from a parsed project file's `general`,
    /// `fragments` and `grammar` sections (`codegen` is left to the caller,
    /// since it has nothing to do with automaton construction).
    pub fn from_project(project: &ProjectFile) -> Result<Grammar, GrammarError> {
        let mut g = Grammar::default();

        for section in project.sections_named("general") {
            for value in &section.values {
                if value.key == "state" {
                    g.add_xstate(value.text.trim()).map_err(|_| GrammarError::DuplicateState {
                        span: value.key_span,
                        name: value.text.trim().to_string(),
                    })?;
                } else {
                    return Err(GrammarError::UnknownGeneralKey {
                        span: value.key_span,
                        key: value.key.clone(),
                    });
                }
            }
        }

        for section in project.sections_named("fragments") {
            for value in &section.values {
                let regex = crate::regex::parse::parse(&value.text).map_err(|source| GrammarError::FragmentRegex {
                    span: value.key_span,
                    fragment: value.key.clone(),
                    source,
                })?;
                g.add_fragment(&value.key, value.key_span, regex)?;
            }
        }

        for section in project.sections_named("grammar") {
            for value in &section.values {
                g.add_rule_from_value(&value.key, value.key_span, &value.text)?;
            }
        }

        Ok(g)
    }

    fn add_rule_from_value(&mut self, token_name: &str, span: Span, text: &str) -> Result<(), GrammarError> {
        let header = parse_rule_header(text, span)?;
        if header.regex_src.trim().is_empty() {
            return Err(GrammarError::RuleMissingRegex { span });
        }
        let regex = crate::regex::parse::parse(header.regex_src).map_err(|source| GrammarError::RuleRegex {
            span,
            token: token_name.to_string(),
            source,
        })?;

        let target_xstate = match &header.target {
            None => None,
            Some(name) => Some(self.xstate_idx(name).ok_or_else(|| GrammarError::UnknownState {
                span,
                name: name.clone(),
            })?),
        };

        let mut rule_xstates: Vec<usize> = Vec::new();
        if header.states.is_empty() {
            rule_xstates.push(self.xstate_idx("default").expect("default always exists"));
        } else {
            for name in &header.states {
                if name == "all" {
                    for idx in 0..self.xstates.len() {
                        if !rule_xstates.contains(&idx) {
                            rule_xstates.push(idx);
                        }
                    }
                } else {
                    let idx = self.xstate_idx(name).ok_or_else(|| GrammarError::UnknownState {
                        span,
                        name: name.clone(),
                    })?;
                    if !rule_xstates.contains(&idx) {
                        rule_xstates.push(idx);
                    }
                }
            }
        }

        let token = self.add_token(token_name);
        for xstate_idx in rule_xstates {
            let target = target_xstate.unwrap_or(xstate_idx);
            let order = self.xstates[xstate_idx].rules.len();
            self.xstates[xstate_idx].rules.push(Rule {
                token,
                regex: regex.clone(),
                target_xstate: target,
                order,
                span,
            });
        }

        Ok(())
    }

    /// Drive the NFA→DFA→minimize pipeline for every lexical state,
    /// collecting non-fatal diagnostics.
    pub fn build(mut self) -> Result<(CompiledGrammar, Vec<Warning>), GrammarError> {
        let mut warnings = Vec::new();
        let mut compiled = Vec::with_capacity(self.xstates.len());

        for xstate_idx in 0..self.xstates.len() {
            let (dfa, xstate_warnings) = self.build_xstate(xstate_idx)?;
            warnings.extend(xstate_warnings);
            compiled.push(CompiledXState {
                name: self.xstates[xstate_idx].name.clone(),
                dfa,
            });
        }

        Ok((
            CompiledGrammar {
                tokens: self.tokens,
                xstates: self.xstates,
                compiled,
            },
            warnings,
        ))
    }

    fn build_xstate(&mut self, xstate_idx: usize) -> Result<(Dfa, Vec<Warning>), GrammarError> {
        let error_token = self.add_token("error");

        let mut nfa = Nfa::new();
        let start = nfa.new_state();

        // Fold declared rules right-to-left into one compound regex for the
        // implicit error rule's prefix-of fallback:
        // Alt(r_n, Alt(r_{n-1}, ... Alt(r_1, Empty))).
        let mut compound = Regex::Empty;
        {
            let rules = &self.xstates[xstate_idx].rules;
            for rule in rules {
                compound = Regex::Alt(Box::new(rule.regex.clone()), Box::new(compound));
            }
        }

        // Build every declared rule into its own accept state.
        let rule_count = self.xstates[xstate_idx].rules.len();
        for local_idx in 0..rule_count {
            let regex = self.xstates[xstate_idx].rules[local_idx].regex.clone();
            let accept = nfa.new_state();
            let mut resolver = FragmentResolver::new(self);
            regex
                .build_nfa(&mut nfa, &mut resolver, start, accept)
                .map_err(|unknown| match resolver.cycle.take() {
                    Some(name) => GrammarError::FragmentCycle { name },
                    None => GrammarError::UnknownFragment {
                        span: self.xstates[xstate_idx].rules[local_idx].span,
                        name: unknown.0.name.to_string(),
                    },
                })?;
            nfa.set_rule(accept, local_idx);
        }

        // nonstart_chars: bytes that cannot start any real rule. Only a
        // *first* transition can rule a byte out, so this walks the
        // ε-closure of `start` (no byte consumed yet) and subtracts each
        // such state's direct labels, matching jellylexer's `visit`.
        let mut nonstart = crate::charclass::ByteClass::ALL;
        for state in nfa.eps_closure(start) {
            for &(chars, _) in &nfa.states[state].trans {
                nonstart = nonstart.difference(&chars);
            }
        }

        let error_regex = Regex::Alt(
            Box::new(Regex::Star(Box::new(Regex::Char(nonstart)))),
            Box::new(Regex::Prefix(Box::new(compound))),
        );
        let error_local_idx = rule_count;
        let error_accept = nfa.new_state();
        {
            let mut resolver = FragmentResolver::new(self);
            error_regex
                .build_nfa(&mut nfa, &mut resolver, start, error_accept)
                .map_err(|unknown| match resolver.cycle.take() {
                    Some(name) => GrammarError::FragmentCycle { name },
                    None => GrammarError::UnknownFragment {
                        span: Span::default(),
                        name: unknown.0.name.to_string(),
                    },
                })?;
        }
        nfa.set_rule(error_accept, error_local_idx);
        self.xstates[xstate_idx].rules.push(Rule {
            token: error_token,
            regex: error_regex,
            target_xstate: xstate_idx,
            order: error_local_idx,
            span: Span::default(),
        });

        let info = compute_scc(&nfa);
        let mut full_dfa = build_dfa(&nfa, start, &info, |order| order);
        // The start state must never already be accepting: reaching the
        // start of a lexical state has consumed no bytes yet, even if the
        // ε-closure of `start` happens to include an accept state (e.g. a
        // rule that matches the empty string).
        full_dfa.states[full_dfa.start].accept = None;

        let warnings = self.scan_diagnostics(xstate_idx, &full_dfa);

        let rules = &self.xstates[xstate_idx].rules;
        let minimized = minimize(&full_dfa, |a, b| match (a, b) {
            (None, None) => true,
            (Some(x), Some(y)) => rules[x].token == rules[y].token && rules[x].target_xstate == rules[y].target_xstate,
            _ => false,
        });

        Ok((minimized, warnings))
    }

    fn scan_diagnostics(&self, xstate_idx: usize, dfa: &Dfa) -> Vec<Warning> {
        let reachable = dfa.reachable_states();
        let rules = &self.xstates[xstate_idx].rules;
        let mut marked = vec![false; rules.len()];
        let mut eof_only = vec![true; rules.len()];

        for &s in &reachable {
            if let Some(rule_idx) = dfa.states[s].accept {
                marked[rule_idx] = true;
                if dfa.states[s].trans.iter().any(|t| t.is_some()) {
                    eof_only[rule_idx] = false;
                }
            }
        }

        let mut warnings = Vec::new();
        // The implicit error rule (last index) never warrants a diagnostic.
        for (idx, rule) in rules.iter().enumerate().take(rules.len().saturating_sub(1)) {
            let xstate = self.xstates[xstate_idx].name.to_string();
            let token = self.tokens[rule.token].name.to_string();
            if !marked[idx] {
                warnings.push(Warning::UnusedRule { xstate, token });
            } else if eof_only[idx] {
                warnings.push(Warning::EofOnlyRule { xstate, token });
            }
        }
        warnings
    }
}

struct FragmentResolver<'a> {
    grammar: &'a mut Grammar,
    building: Vec<usize>,
    cycle: Option<String>,
}

impl<'a> FragmentResolver<'a> {
    fn new(grammar: &'a mut Grammar) -> FragmentResolver<'a> {
        FragmentResolver {
            grammar,
            building: Vec::new(),
            cycle: None,
        }
    }
}

impl<'a> FragmentSource for FragmentResolver<'a> {
    fn build_fragment(&mut self, nfa: &mut Nfa, name: &str) -> Result<(StateId, StateId), ()> {
        let idx = *self.grammar.fragment_index.get(name).ok_or(())?;
        if self.building.contains(&idx) {
            self.cycle = Some(name.to_string());
            return Err(());
        }
        if self.grammar.fragments[idx].built.is_none() {
            self.building.push(idx);
            let regex = self.grammar.fragments[idx].regex.clone();
            let mut frag_nfa = Nfa::new();
            let b = frag_nfa.new_state();
            let e = frag_nfa.new_state();
            let result = regex.build_nfa(&mut frag_nfa, &mut *self, b, e);
            self.building.pop();
            result.map_err(|_| ())?;
            self.grammar.fragments[idx].built = Some((frag_nfa, b, e));
        }
        let (frag_nfa, b, e) = self.grammar.fragments[idx].built.as_ref().unwrap();
        Ok(nfa.merge_fragment(frag_nfa, *b, *e))
    }
}

struct RuleHeader<'a> {
    states: Vec<String>,
    target: Option<String>,
    regex_src: &'a str,
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Parses the leading `{state}`/`{-> target}` tags off a grammar rule's
/// value text, leaving the regex source as the remainder.
fn parse_rule_header(text: &str, span: Span) -> Result<RuleHeader<'_>, GrammarError> {
    let mut states = Vec::new();
    let mut target = None;
    let mut rest = text;
    loop {
        rest = rest.trim_start();
        let Some(after_brace) = rest.strip_prefix('{') else {
            break;
        };
        let after_brace = after_brace.trim_start();
        if let Some(after_arrow) = after_brace.strip_prefix("->") {
            let after_arrow = after_arrow.trim_start();
            let name: String = after_arrow.chars().take_while(|&c| is_tag_char(c)).collect();
            if name.is_empty() {
                return Err(GrammarError::BadRuleTag {
                    span,
                    what: "target state name".into(),
                });
            }
            let after_name = after_arrow[name.len()..].trim_start();
            let Some(after_close) = after_name.strip_prefix('}') else {
                return Err(GrammarError::BadRuleTag {
                    span,
                    what: "'}'".into(),
                });
            };
            if target.is_some() {
                return Err(GrammarError::MultipleTargetStates { span });
            }
            target = Some(name);
            rest = after_close;
        } else {
            let name: String = after_brace.chars().take_while(|&c| is_tag_char(c)).collect();
            if name.is_empty() {
                return Err(GrammarError::BadRuleTag {
                    span,
                    what: "state name".into(),
                });
            }
            let after_name = after_brace[name.len()..].trim_start();
            let Some(after_close) = after_name.strip_prefix('}') else {
                return Err(GrammarError::BadRuleTag {
                    span,
                    what: "'}'".into(),
                });
            };
            states.push(name);
            rest = after_close;
        }
    }
    Ok(RuleHeader {
        states,
        target,
        regex_src: rest,
    })
}
