//! Whitelist/blacklist pattern matching.
//!
//! A pattern matches a departure when, after lowercasing, trimming and
//! collapsing whitespace, it equals one of:
//! - the line (`u2`)
//! - the destination (`messestadt ost`)
//! - line and destination (`u2 messestadt ost`)
//! - transport type and line (`u-bahn u2`)
//! - transport type, line and destination (`u-bahn u2 messestadt ost`)
//!
//! Matching is exact on these forms, never by substring, so `Ostbahnhof`
//! does not match `Giesing Bahnhof`.

use crate::domain::Departure;

/// Lowercase, trim and collapse internal whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The normalized forms of one departure that patterns are compared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchKeys {
    forms: [String; 5],
}

impl MatchKeys {
    pub fn new(departure: &Departure) -> Self {
        let line = normalize(&departure.line);
        let destination = normalize(&departure.destination);
        let transport = normalize(&departure.transport_type);

        let join = |parts: &[&str]| normalize(&parts.join(" "));
        let forms = [
            join(&[line.as_str(), destination.as_str()]),
            join(&[transport.as_str(), line.as_str()]),
            join(&[transport.as_str(), line.as_str(), destination.as_str()]),
            line,
            destination,
        ];
        Self { forms }
    }

    /// Whether a single pattern matches. Blank patterns never match.
    pub fn matches(&self, pattern: &str) -> bool {
        let pattern = normalize(pattern);
        !pattern.is_empty() && self.forms.iter().any(|form| *form == pattern)
    }

    /// Whether any of `patterns` matches.
    pub fn matches_any<S: AsRef<str>>(&self, patterns: &[S]) -> bool {
        patterns.iter().any(|p| self.matches(p.as_ref()))
    }
}
