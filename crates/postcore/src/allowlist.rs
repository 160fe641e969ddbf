//! The fixed set of tags and attributes that survive sanitization.
//!
//! Kept as a plain table so the policy can be read and tested on its own,
//! independent of the sanitizer that enforces it.

use std::collections::{HashMap, HashSet};

const NO_ATTRIBUTES: &[&str] = &[];

/// Permitted tags, each paired with the attributes it may carry.
pub const ALLOWED_TAGS: &[(&str, &[&str])] = &[
    ("pre", NO_ATTRIBUTES),
    ("code", NO_ATTRIBUTES),
    ("table", NO_ATTRIBUTES),
    ("blockquote", NO_ATTRIBUTES),
    ("br", NO_ATTRIBUTES),
    ("p", NO_ATTRIBUTES),
    ("li", NO_ATTRIBUTES),
    ("ol", NO_ATTRIBUTES),
    ("ul", NO_ATTRIBUTES),
    ("h1", NO_ATTRIBUTES),
    ("h2", NO_ATTRIBUTES),
    ("h3", NO_ATTRIBUTES),
    ("h4", NO_ATTRIBUTES),
    ("h5", NO_ATTRIBUTES),
    ("h6", NO_ATTRIBUTES),
    ("b", NO_ATTRIBUTES),
    ("strong", NO_ATTRIBUTES),
    ("i", NO_ATTRIBUTES),
    ("em", NO_ATTRIBUTES),
    ("s", NO_ATTRIBUTES),
    ("strike", NO_ATTRIBUTES),
    ("img", &["src", "alt", "title"]),
    ("a", &["href", "title"]),
    ("sup", NO_ATTRIBUTES),
    ("hr", NO_ATTRIBUTES),
    ("span", &["class"]),
    ("thead", NO_ATTRIBUTES),
    ("tr", NO_ATTRIBUTES),
    ("th", NO_ATTRIBUTES),
    ("tbody", NO_ATTRIBUTES),
    ("td", NO_ATTRIBUTES),
    // Produced by image link rewriting; allowed so a second pass keeps them.
    ("figure", NO_ATTRIBUTES),
    ("figcaption", NO_ATTRIBUTES),
];

pub fn allowed_tags() -> HashSet<&'static str> {
    ALLOWED_TAGS.iter().map(|(tag, _)| *tag).collect()
}

/// Tag to attribute mapping in the shape ammonia expects. Tags without
/// attributes are left out.
pub fn tag_attributes() -> HashMap<&'static str, HashSet<&'static str>> {
    ALLOWED_TAGS
        .iter()
        .filter(|(_, attrs)| !attrs.is_empty())
        .map(|(tag, attrs)| (*tag, attrs.iter().copied().collect()))
        .collect()
}

pub fn is_allowed(tag: &str) -> bool {
    ALLOWED_TAGS.iter().any(|(t, _)| t.eq_ignore_ascii_case(tag))
}

pub fn attributes_for(tag: &str) -> Option<&'static [&'static str]> {
    ALLOWED_TAGS
        .iter()
        .find(|(t, _)| t.eq_ignore_ascii_case(tag))
        .map(|(_, attrs)| *attrs)
}
