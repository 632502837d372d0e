//! Page path patterns for funnel page steps.

use serde::{Deserialize, Serialize};

/// A path pattern matched against the current page path.
///
/// Patterns are segment-wise: `*` matches exactly one segment, a trailing
/// `*` matches the rest of the path. `/pricing` matches only `/pricing`;
/// `/docs/*` matches `/docs/intro` and `/docs/intro/advanced`; `*` alone
/// matches every path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PagePattern(String);

impl PagePattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        PagePattern(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Test a page path against this pattern.
    ///
    /// Query strings and fragments are stripped from the path before
    /// matching; trailing slashes are ignored on both sides.
    pub fn matches(&self, path: &str) -> bool {
        if self.0 == "*" {
            return true;
        }

        let path = path.split(['?', '#']).next().unwrap_or(path);
        let pattern_segs: Vec<&str> = segments(&self.0);
        let path_segs: Vec<&str> = segments(path);

        let mut i = 0;
        for (idx, pat) in pattern_segs.iter().enumerate() {
            if *pat == "*" && idx == pattern_segs.len() - 1 {
                // Trailing wildcard swallows the remainder, including an
                // empty remainder ("/docs/*" matches "/docs").
                return true;
            }
            match path_segs.get(i) {
                Some(seg) if *pat == "*" || pat == seg => i += 1,
                _ => return false,
            }
        }
        i == path_segs.len()
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
