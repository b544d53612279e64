//! Source locations used by every diagnostic in the pipeline.
//!
//! A `Span` is a byte-offset range into the project file that was read; it
//! survives past the `nom` borrow of the original `&str` so that grammar-level
//! errors (detected only after parsing) can still point at source text.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }

    pub fn point(at: usize) -> Span {
        Span { start: at, end: at }
    }

    /// Offset of `sub` within `whole`, given both are slices of the same
    /// underlying buffer (the standard `nom` idiom for turning a remaining
    /// `&str` back into a byte offset).
    pub fn offset_of(whole: &str, sub: &str) -> usize {
        sub.as_ptr() as usize - whole.as_ptr() as usize
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
