//! # Topic Templates
//!
//! A template is a `/`-separated topic where a segment may contain a single
//! `{}` placeholder, optionally surrounded by literal text:
//!
//! ```text
//! /sys/{}/{}/thing/service/{}        captures [pk, dk, identifier]
//! /sys/{}/{}/thing/service/{}_reply  captures [pk, dk, identifier]
//! ```
//!
//! Matching a topic yields the captured values in order; rendering does the
//! reverse.

use crate::errors::MessageError;
use std::fmt;

/// Placeholder token inside a template segment.
pub const PLACEHOLDER: &str = "{}";

/// A topic pattern with positional placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicTemplate {
    raw: String,
}

impl TopicTemplate {
    /// Create a template from its textual form.
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The textual form of the template.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Number of placeholders (and therefore captured path params).
    #[must_use]
    pub fn arity(&self) -> usize {
        self.raw
            .split('/')
            .filter(|segment| segment.contains(PLACEHOLDER))
            .count()
    }

    /// Match `topic` against the template.
    ///
    /// Returns the captured path params in order, or `None` if the topic does
    /// not fit. A placeholder never captures an empty string.
    #[must_use]
    pub fn capture(&self, topic: &str) -> Option<Vec<String>> {
        let mut pattern = self.raw.split('/');
        let mut actual = topic.split('/');
        let mut params = Vec::with_capacity(self.arity());

        loop {
            match (pattern.next(), actual.next()) {
                (None, None) => return Some(params),
                (Some(expected), Some(segment)) => {
                    let Some(idx) = expected.find(PLACEHOLDER) else {
                        if expected != segment {
                            return None;
                        }
                        continue;
                    };
                    let prefix = &expected[..idx];
                    let suffix = &expected[idx + PLACEHOLDER.len()..];
                    if segment.len() <= prefix.len() + suffix.len()
                        || !segment.starts_with(prefix)
                        || !segment.ends_with(suffix)
                    {
                        return None;
                    }
                    params.push(segment[prefix.len()..segment.len() - suffix.len()].to_string());
                }
                _ => return None,
            }
        }
    }

    /// Returns true if `topic` fits the template.
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        self.capture(topic).is_some()
    }

    /// Render a concrete topic by substituting `args` in order.
    pub fn render<S: AsRef<str>>(&self, args: &[S]) -> Result<String, MessageError> {
        let expected = self.arity();
        if args.len() != expected {
            return Err(MessageError::TopicArity {
                template: self.raw.clone(),
                expected,
                actual: args.len(),
            });
        }

        let mut args = args.iter();
        let segments: Vec<String> = self
            .raw
            .split('/')
            .map(|segment| {
                if !segment.contains(PLACEHOLDER) {
                    return segment.to_string();
                }
                // arity was checked above
                let arg: &str = match args.next() {
                    Some(arg) => arg.as_ref(),
                    None => "",
                };
                segment.replacen(PLACEHOLDER, arg, 1)
            })
            .collect();

        Ok(segments.join("/"))
    }
}

impl fmt::Display for TopicTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for TopicTemplate {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
