//! Policy path patterns.
//!
//! A pattern is one of:
//! - an exact path: `kv/data/app/db`
//! - a prefix glob, `*` as the final character: `kv/data/app/*`
//! - a segment pattern, where a `+` segment matches exactly one path segment:
//!   `kv/+/app`, optionally also ending in `*`: `kv/+/app/*`
//!
//! Patterns are compared by [`Specificity`] so that the most specific rule
//! that matches a path decides its capabilities.

use std::cmp::Ordering;
use std::fmt;

use crate::constants::MAX_PATTERN_LENGTH;
use crate::error::AuthError;
use crate::error::Result;

/// One segment of a segment pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `+`: any single non-empty segment.
    Any,
}

impl Segment {
    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == segment,
            Segment::Any => !segment.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternKind {
    Exact,
    Prefix { prefix: String },
    Segments { segments: Vec<Segment>, glob: bool },
}

/// A compiled policy path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    kind: PatternKind,
}

impl PathPattern {
    /// Compile a pattern.
    ///
    /// A leading `/` is ignored. `*` may only appear as the final character and
    /// `+` only as a whole segment.
    pub fn parse(pattern: &str) -> Result<Self> {
        let raw = pattern.strip_prefix('/').unwrap_or(pattern);
        let invalid = |reason: &str| AuthError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if raw.len() > MAX_PATTERN_LENGTH {
            return Err(invalid(&format!("length {} exceeds max {}", raw.len(), MAX_PATTERN_LENGTH)));
        }

        let (body, glob) = match raw.strip_suffix('*') {
            Some(body) => (body, true),
            None => (raw, false),
        };
        if body.contains('*') {
            return Err(invalid("'*' is only allowed at the end of a pattern"));
        }

        let has_plus = body.contains('+');
        if has_plus && body.split('/').any(|seg| seg.contains('+') && seg != "+") {
            return Err(invalid("'+' must be a whole path segment"));
        }

        let kind = match (has_plus, glob) {
            (false, false) => PatternKind::Exact,
            (false, true) => PatternKind::Prefix {
                prefix: body.to_string(),
            },
            (true, glob) => PatternKind::Segments {
                segments: body
                    .split('/')
                    .map(|seg| {
                        if seg == "+" {
                            Segment::Any
                        } else {
                            Segment::Literal(seg.to_string())
                        }
                    })
                    .collect(),
                glob,
            },
        };

        Ok(Self {
            raw: raw.to_string(),
            kind,
        })
    }

    /// The pattern text, without any leading slash.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true if this pattern contains no wildcard.
    pub fn is_exact(&self) -> bool {
        matches!(self.kind, PatternKind::Exact)
    }

    /// For a plain `prefix*` pattern, the literal prefix.
    pub fn glob_prefix(&self) -> Option<&str> {
        match &self.kind {
            PatternKind::Prefix { prefix } => Some(prefix),
            _ => None,
        }
    }

    /// Returns true if `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        match &self.kind {
            PatternKind::Exact => self.raw == path,
            PatternKind::Prefix { prefix } => path.starts_with(prefix.as_str()),
            PatternKind::Segments { segments, glob } => match_segments(segments, *glob, path),
        }
    }

    /// Ranking key used to pick between several matching patterns.
    pub fn specificity(&self) -> Specificity {
        let first_wildcard = self.raw.find(['*', '+']).unwrap_or(self.raw.len());
        let plus_segments = match &self.kind {
            PatternKind::Segments { segments, .. } => segments.iter().filter(|s| **s == Segment::Any).count(),
            _ => 0,
        };
        Specificity {
            exact: self.is_exact(),
            first_wildcard,
            trailing_glob: self.raw.ends_with('*'),
            plus_segments,
            len: self.raw.len(),
            raw: self.raw.clone(),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn match_segments(segments: &[Segment], glob: bool, path: &str) -> bool {
    let parts: Vec<&str> = path.split('/').collect();
    let Some((last, head)) = segments.split_last() else {
        return false;
    };

    if glob {
        if parts.len() < segments.len() {
            return false;
        }
    } else if parts.len() != segments.len() {
        return false;
    }

    if !head.iter().zip(parts.iter()).all(|(seg, part)| seg.matches(part)) {
        return false;
    }

    let part = parts[head.len()];
    match (last, glob) {
        (Segment::Literal(lit), true) => part.starts_with(lit.as_str()),
        (Segment::Any, true) => true,
        (seg, false) => seg.matches(part),
    }
}

/// How specific a pattern is. Greater is more specific.
///
/// Ordering, highest priority first:
/// 1. exact patterns beat any wildcard pattern
/// 2. a later first wildcard (longer literal prefix) beats an earlier one
/// 3. a pattern not ending in `*` beats one that does
/// 4. fewer `+` segments beats more
/// 5. a longer pattern beats a shorter one
/// 6. the lexicographically smaller pattern wins the final tie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specificity {
    exact: bool,
    first_wildcard: usize,
    trailing_glob: bool,
    plus_segments: usize,
    len: usize,
    raw: String,
}

impl Ord for Specificity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.exact
            .cmp(&other.exact)
            .then(self.first_wildcard.cmp(&other.first_wildcard))
            .then(other.trailing_glob.cmp(&self.trailing_glob))
            .then(other.plus_segments.cmp(&self.plus_segments))
            .then(self.len.cmp(&other.len))
            .then(other.raw.cmp(&self.raw))
    }
}

impl PartialOrd for Specificity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
