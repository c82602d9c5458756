//! Search pattern generation and include/exclude matching
//!
//! Pattern generation is kept apart from scoring so each can be tested on
//! its own.

use once_cell::sync::Lazy;
use regex::{Matches, Regex, RegexBuilder};
use std::collections::HashSet;
use tracing::debug;

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s_\-]+").expect("separator pattern is valid"));

const FLEXIBLE_SEPARATOR: &str = r"[\s_\-]+";
const MIN_TOKEN_CHARS: usize = 3;
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Where a search pattern came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// The requirement itself
    Literal,
    /// The requirement with separators matching any run of whitespace, `_` or `-`
    Flexible,
    /// A whitespace-separated token of the requirement
    Token,
    /// A part of a hyphenated compound
    CompoundPart,
}

/// A compiled, case-insensitive search pattern
#[derive(Debug, Clone)]
pub struct SearchPattern {
    pub kind: PatternKind,
    pub source: String,
    regex: Regex,
}

impl SearchPattern {
    fn compile(kind: PatternKind, source: String, expression: &str) -> Option<Self> {
        match RegexBuilder::new(expression)
            .case_insensitive(true)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
        {
            Ok(regex) => Some(Self { kind, source, regex }),
            Err(e) => {
                debug!("Skipping search pattern {:?}: {}", source, e);
                None
            }
        }
    }

    pub fn find_iter<'r, 't>(&'r self, text: &'t str) -> Matches<'r, 't> {
        self.regex.find_iter(text)
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Derive the search patterns for one requirement.
///
/// Order is literal, flexible phrase, tokens, compound parts; a pattern
/// equal (ignoring case) to an earlier one is dropped.
pub fn generate_patterns(requirement: &str) -> Vec<SearchPattern> {
    let requirement = requirement.trim();
    if requirement.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut patterns = Vec::new();
    let mut push = |kind: PatternKind, source: String, expression: String| {
        if seen.insert(expression.to_lowercase()) {
            if let Some(pattern) = SearchPattern::compile(kind, source, &expression) {
                patterns.push(pattern);
            }
        }
    };

    push(
        PatternKind::Literal,
        requirement.to_string(),
        regex::escape(requirement),
    );

    let parts: Vec<&str> = SEPARATORS
        .split(requirement)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.len() > 1 {
        let expression = parts
            .iter()
            .map(|part| regex::escape(part))
            .collect::<Vec<_>>()
            .join(FLEXIBLE_SEPARATOR);
        push(PatternKind::Flexible, parts.join(" "), expression);
    }

    let tokens: Vec<&str> = requirement.split_whitespace().collect();
    for token in &tokens {
        if token.chars().count() >= MIN_TOKEN_CHARS {
            push(PatternKind::Token, token.to_string(), regex::escape(token));
        }
    }

    for token in tokens.iter().filter(|token| token.contains('-')) {
        for part in token.split('-') {
            if part.chars().count() >= MIN_TOKEN_CHARS {
                push(
                    PatternKind::CompoundPart,
                    part.to_string(),
                    regex::escape(part),
                );
            }
        }
    }

    patterns
}

/// Translate an include/exclude pattern into a permissive expression:
/// `*` and `-` match any run of characters, `?` any single character.
fn permissive_expression(pattern: &str) -> String {
    let mut expression = String::with_capacity(pattern.len() * 2);
    for ch in pattern.chars() {
        match ch {
            '*' | '-' => expression.push_str(".*"),
            '?' => expression.push('.'),
            other => expression.push(other),
        }
    }
    expression
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
}

/// Whether an include/exclude pattern matches text.
///
/// Tries a case-insensitive substring match, then the permissive
/// expression, and if that does not compile, requires every word of the
/// pattern to appear as a whole word in the text. Never fails.
pub fn pattern_matches(text: &str, pattern: &str) -> bool {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return false;
    }

    let text_lower = text.to_lowercase();
    let pattern_lower = pattern.to_lowercase();
    if text_lower.contains(&pattern_lower) {
        return true;
    }

    match RegexBuilder::new(&permissive_expression(pattern))
        .case_insensitive(true)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
    {
        Ok(regex) => regex.is_match(text),
        Err(e) => {
            debug!("Pattern {:?} is not a valid expression ({}), matching words", pattern, e);
            let text_words: HashSet<&str> = words(&text_lower).collect();
            let mut pattern_words = words(&pattern_lower).peekable();
            pattern_words.peek().is_some() && pattern_words.all(|word| text_words.contains(word))
        }
    }
}
