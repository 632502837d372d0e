//! Click-target selectors for funnel event steps.
//!
//! The host reports clicks as a [`ClickTarget`] snapshot of the clicked
//! element (tag, id, classes). Funnel event steps carry a compound
//! selector over the same three axes -- `button`, `#buy`, `.cta`,
//! `button.cta#buy` -- resolved into a [`Selector`] at definition load
//! time. This is deliberately the subset the dashboard's step editor can
//! produce, not a general CSS engine.

use serde::{Deserialize, Serialize};

/// Snapshot of a clicked element, supplied by the embedding host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickTarget {
    /// Lowercase tag name ("button", "a", ...).
    #[serde(default)]
    pub tag: String,
    /// Element id, empty when absent.
    #[serde(default)]
    pub id: String,
    /// Class list in document order.
    #[serde(default)]
    pub classes: Vec<String>,
}

impl ClickTarget {
    pub fn new(tag: impl Into<String>) -> Self {
        ClickTarget {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }
}

/// A parsed compound selector: optional tag, optional id, any number of
/// classes. All present parts must match the target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Selector {
    /// Parse a compound selector string.
    ///
    /// Grammar: `[tag] ('#' ident | '.' ident)*` where `ident` is
    /// `[A-Za-z0-9_-]+`. Returns `None` for an empty or malformed
    /// selector (descendant combinators, attributes, and pseudo-classes
    /// are not supported).
    pub fn parse(input: &str) -> Option<Selector> {
        let input = input.trim();
        if input.is_empty() || input.contains(char::is_whitespace) {
            return None;
        }

        let mut sel = Selector::default();
        let mut chars = input.chars().peekable();

        // Leading bare identifier is the tag name.
        let mut tag = String::new();
        while let Some(&c) = chars.peek() {
            if !is_ident_char(c) {
                break;
            }
            tag.push(c);
            chars.next();
        }
        if !tag.is_empty() {
            sel.tag = Some(tag.to_ascii_lowercase());
        }

        while let Some(marker) = chars.next() {
            let mut ident = String::new();
            while let Some(&c) = chars.peek() {
                if !is_ident_char(c) {
                    break;
                }
                ident.push(c);
                chars.next();
            }
            if ident.is_empty() {
                return None;
            }
            match marker {
                '#' => {
                    // Duplicate id parts make the selector unsatisfiable.
                    if sel.id.is_some() {
                        return None;
                    }
                    sel.id = Some(ident);
                }
                '.' => sel.classes.push(ident),
                _ => return None,
            }
        }

        if sel.tag.is_none() && sel.id.is_none() && sel.classes.is_empty() {
            return None;
        }
        Some(sel)
    }

    /// Test whether a click target satisfies this selector.
    pub fn matches(&self, target: &ClickTarget) -> bool {
        if let Some(ref tag) = self.tag {
            if !target.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(ref id) = self.id {
            if target.id != *id {
                return false;
            }
        }
        self.classes
            .iter()
            .all(|c| target.classes.iter().any(|tc| tc == c))
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_only() {
        let sel = Selector::parse("#buy").unwrap();
        assert!(sel.matches(&ClickTarget::new("button").with_id("buy")));
        assert!(!sel.matches(&ClickTarget::new("button").with_id("cancel")));
    }

    #[test]
    fn parse_tag_only() {
        let sel = Selector::parse("button").unwrap();
        assert!(sel.matches(&ClickTarget::new("button")));
        assert!(sel.matches(&ClickTarget::new("BUTTON")));
        assert!(!sel.matches(&ClickTarget::new("a")));
    }

    #[test]
    fn parse_class_only() {
        let sel = Selector::parse(".cta").unwrap();
        assert!(sel.matches(&ClickTarget::new("a").with_class("cta")));
        assert!(!sel.matches(&ClickTarget::new("a").with_class("nav")));
    }

    #[test]
    fn compound_requires_all_parts() {
        let sel = Selector::parse("button.cta#buy").unwrap();
        let full = ClickTarget::new("button").with_id("buy").with_class("cta");
        assert!(sel.matches(&full));

        let wrong_tag = ClickTarget::new("a").with_id("buy").with_class("cta");
        assert!(!sel.matches(&wrong_tag));

        let missing_class = ClickTarget::new("button").with_id("buy");
        assert!(!sel.matches(&missing_class));
    }

    #[test]
    fn multiple_classes_are_subset_match() {
        let sel = Selector::parse(".cta.primary").unwrap();
        let target = ClickTarget::new("button")
            .with_class("primary")
            .with_class("cta")
            .with_class("large");
        assert!(sel.matches(&target));
    }

    #[test]
    fn malformed_selectors_rejected() {
        assert!(Selector::parse("").is_none());
        assert!(Selector::parse("  ").is_none());
        assert!(Selector::parse("#").is_none());
        assert!(Selector::parse("button >.cta").is_none());
        assert!(Selector::parse("#a#b").is_none());
        assert!(Selector::parse("a:hover").is_none());
    }
}
