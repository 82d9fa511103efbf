//! `/regex/`-or-literal filter DSL
//!
//! Query filter lists keep the user-facing shape on the wire: an element
//! wrapped in slashes is a regex (unanchored, case-sensitive, no flags),
//! anything else matches exactly.

use regex::Regex;

/// One compiled filter element.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Exact string match.
    Literal(String),
    /// Unanchored regex match, from a `/pat/` element.
    Regex(Regex),
}

impl Pattern {
    /// Compile a filter element. `/pat/` becomes a regex, everything else a
    /// literal. A bad regex is a query error, not a silent literal.
    pub fn parse(s: &str) -> Result<Pattern, regex::Error> {
        if s.len() >= 2 && s.starts_with('/') && s.ends_with('/') {
            return Ok(Pattern::Regex(Regex::new(&s[1..s.len() - 1])?));
        }
        Ok(Pattern::Literal(s.to_string()))
    }

    /// Compile a whole filter list.
    pub fn parse_all(items: &[String]) -> Result<Vec<Pattern>, regex::Error> {
        items.iter().map(|s| Pattern::parse(s)).collect()
    }

    /// Match a field value against this element.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Literal(s) => s == value,
            Pattern::Regex(re) => re.is_match(value),
        }
    }
}

/// True when `value` matches at least one element. An empty list never
/// matches; callers treat empty lists as "filter disabled" before this.
pub fn any_match(patterns: &[Pattern], value: &str) -> bool {
    patterns.iter().any(|p| p.matches(value))
}

#[cfg(test)]
#[path = "pattern_test.rs"]
mod pattern_test;
