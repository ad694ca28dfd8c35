//! Topic-exchange binding patterns.
//!
//! Routing keys are dot-separated words. In a pattern `*` matches exactly
//! one word and `#` matches zero or more words.

use std::fmt;

use relay_protocol::NAMESPACES;

use crate::error::BrokerError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Word(String),
    Star,
    Hash,
}

/// One parsed binding pattern, e.g. `order.*.confirmed` or `product.#`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl TopicPattern {
    pub fn parse(pattern: &str) -> Result<Self, BrokerError> {
        if pattern.is_empty() {
            return Err(BrokerError::InvalidPattern("empty pattern".to_string()));
        }
        let segments = pattern
            .split('.')
            .map(|w| match w {
                "*" => Ok(Segment::Star),
                "#" => Ok(Segment::Hash),
                "" => Err(BrokerError::InvalidPattern(format!(
                    "empty word in '{pattern}'"
                ))),
                w if w.contains(|c: char| c == '*' || c == '#') => Err(
                    BrokerError::InvalidPattern(format!(
                        "wildcard must be a whole word in '{pattern}'"
                    )),
                ),
                w => Ok(Segment::Word(w.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, routing_key: &str) -> bool {
        let words: Vec<&str> = routing_key.split('.').collect();
        match_from(&self.segments, &words)
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn match_from(pattern: &[Segment], words: &[&str]) -> bool {
    match pattern.split_first() {
        None => words.is_empty(),
        Some((Segment::Hash, rest)) => (0..=words.len()).any(|i| match_from(rest, &words[i..])),
        Some((Segment::Star, rest)) => !words.is_empty() && match_from(rest, &words[1..]),
        Some((Segment::Word(w), rest)) => {
            words.first() == Some(&w.as_str()) && match_from(rest, &words[1..])
        }
    }
}

/// The set of patterns a consumer accepts. A routing key is accepted when
/// any pattern matches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    patterns: Vec<TopicPattern>,
}

impl Binding {
    /// One `<namespace>.#` pattern per catalog namespace.
    pub fn catalog_default() -> Self {
        Self {
            patterns: NAMESPACES
                .iter()
                .map(|ns| TopicPattern {
                    raw: format!("{ns}.#"),
                    segments: vec![Segment::Word((*ns).to_string()), Segment::Hash],
                })
                .collect(),
        }
    }

    /// Parse configured patterns; an empty list falls back to [`Binding::catalog_default`].
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, BrokerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| TopicPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if patterns.is_empty() {
            return Ok(Self::catalog_default());
        }
        Ok(Self { patterns })
    }

    pub fn matches(&self, routing_key: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(routing_key))
    }

    pub fn patterns(&self) -> &[TopicPattern] {
        &self.patterns
    }
}
