use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::{Captures, Regex, RegexBuilder};

use crate::config::{HighlightConfig, DEFAULT_HIGHLIGHT_CLASS};

lazy_static! {
    static ref DEFAULT_HIGHLIGHTER: Highlighter = Highlighter::new(DEFAULT_HIGHLIGHT_CLASS);
}

/// Wraps each space-prefixed occurrence of a highlight word in a styled span.
///
/// Returns the source untouched when `highlights` is empty, and `None` when
/// there is something to highlight but the source is empty.
///
/// Every match is wrapped with its own text, so differently cased
/// occurrences keep their casing. The original web client reused the first
/// match's text for all of them; this differs on purpose.
pub fn highlight<S: AsRef<str>>(source: &str, highlights: &[S]) -> Option<String> {
    DEFAULT_HIGHLIGHTER.highlight(source, highlights)
}

#[derive(Debug, Clone)]
pub struct Highlighter {
    class: String,
}

impl Highlighter {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
        }
    }

    pub fn from_config(config: &HighlightConfig) -> Self {
        Self::new(config.class.clone())
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn highlight<S: AsRef<str>>(&self, source: &str, highlights: &[S]) -> Option<String> {
        if highlights.is_empty() {
            return Some(source.to_string());
        }
        if source.is_empty() {
            return None;
        }

        // Each word scans the output of the previous one, so overlapping
        // words can wrap text that is already wrapped.
        let mut output = source.to_string();
        for word in highlights {
            let word = word.as_ref();
            let regex = match word_matcher(word) {
                Ok(regex) => regex,
                Err(e) => {
                    log::warn!("Skipping highlight word {:?}: {}", word, e);
                    continue;
                }
            };

            let replaced = match regex.replace_all(&output, |caps: &Captures| {
                format!("&nbsp;<span class=\"{}\">{}</span>", self.class, &caps[0])
            }) {
                Cow::Borrowed(_) => continue,
                Cow::Owned(replaced) => replaced,
            };
            output = replaced;
        }

        Some(output)
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(DEFAULT_HIGHLIGHT_CLASS)
    }
}

fn word_matcher(word: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!(" {}", regex::escape(word)))
        .case_insensitive(true)
        .build()
}
