//! Aggregated error type for the pipeline.
//!
//! Each stage defines its own error kind local to the module that detects it
//! (`regex::parse::RegexSyntaxError`, `project::ProjectParseError`,
//! `grammar::GrammarError`); this module unifies them behind one
//! `thiserror`-derived enum with `#[from]` conversions.

use crate::grammar::GrammarError;
use crate::project::ProjectParseError;
use crate::regex::parse::RegexSyntaxError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Regex(#[from] RegexSyntaxError),
    #[error("{0}")]
    Project(#[from] ProjectParseError),
    #[error("{0}")]
    Grammar(#[from] GrammarError),
    #[error("internal invariant violated: {0}")]
    Internal(#[from] InternalError),
}

/// Should never fire. Surfaced without a span: by definition, an invariant
/// failure means the code computing it no longer knows where it is relative
/// to the source grammar.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InternalError(pub String);

impl InternalError {
    pub fn new(message: impl Into<String>) -> InternalError {
        InternalError(message.into())
    }
}

/// A non-fatal diagnostic collected during grammar construction: unused
/// rules and EOF-only rules. These never halt the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    UnusedRule { xstate: String, token: String },
    EofOnlyRule { xstate: String, token: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnusedRule { xstate, token } => {
                write!(f, "rule '{token}' unused in state '{xstate}'")
            }
            Warning::EofOnlyRule { xstate, token } => {
                write!(
                    f,
                    "in state '{xstate}', rule '{token}' is only usable at the end of file"
                )
            }
        }
    }
}
