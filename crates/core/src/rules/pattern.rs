//! Dot-segment event-type patterns (`invoice.*`, `*.created`, `stock.low`).

use std::fmt;

use super::MatchError;

/// The single-segment wildcard.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard,
}

/// A parsed event-type pattern.
///
/// Each segment is either a literal (compared case-sensitively) or `*`,
/// which matches exactly one segment. There is no multi-segment wildcard,
/// so the event type must have the same number of segments as the pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTypePattern {
    segments: Vec<Segment>,
}

impl EventTypePattern {
    /// Parse a pattern, rejecting empty patterns and empty segments.
    pub fn parse(pattern: &str) -> Result<Self, MatchError> {
        if pattern.is_empty() {
            return Err(MatchError::InvalidPattern(pattern.to_string()));
        }
        let segments = pattern
            .split('.')
            .map(|s| match s {
                "" => Err(MatchError::InvalidPattern(pattern.to_string())),
                WILDCARD => Ok(Segment::Wildcard),
                literal => Ok(Segment::Literal(literal.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    pub fn matches(&self, event_type: &str) -> bool {
        let mut parts = event_type.split('.');
        for segment in &self.segments {
            let Some(part) = parts.next() else {
                return false;
            };
            match segment {
                Segment::Wildcard => {}
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return false,
            }
        }
        parts.next().is_none()
    }
}

impl fmt::Display for EventTypePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self
            .segments
            .iter()
            .map(|s| match s {
                Segment::Literal(l) => l.as_str(),
                Segment::Wildcard => WILDCARD,
            })
            .collect();
        f.write_str(&parts.join("."))
    }
}
