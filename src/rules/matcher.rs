//! Line-oriented pattern matching over raw file text.
//!
//! Matching deliberately stays textual: a hit is dropped when it sits inside a `//`
//! comment or a string literal opened earlier on the same line. Block comments and
//! strings spanning lines are not tracked.

use glob::Pattern;
use regex::Regex;

use super::model::{PatternKind, Rule};
use crate::error::AtlasError;

enum Needle {
    Literal(String),
    Regex(Regex),
}

/// A rule ready to run: pattern compiled, file globs expanded.
pub struct CompiledRule<'a> {
    pub set: &'a str,
    pub rule: &'a Rule,
    needle: Needle,
    files: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl<'a> CompiledRule<'a> {
    pub fn compile(set: &'a str, rule: &'a Rule) -> Result<Self, AtlasError> {
        let invalid = |reason: String| AtlasError::Configuration {
            name: set.to_owned(),
            reason: format!("rule '{}': {reason}", rule.id),
        };

        if rule.pattern.is_empty() {
            return Err(invalid("empty pattern".to_owned()));
        }
        let needle = match rule.kind {
            PatternKind::Literal => Needle::Literal(rule.pattern.clone()),
            PatternKind::Regex => {
                Needle::Regex(Regex::new(&rule.pattern).map_err(|e| invalid(e.to_string()))?)
            }
        };

        let files = match &rule.files {
            Some(glob) => compile_globs(glob).map_err(invalid)?,
            None => Vec::new(),
        };
        let mut exclude = Vec::new();
        for glob in &rule.exclude {
            exclude.extend(compile_globs(glob).map_err(invalid)?);
        }

        Ok(Self {
            set,
            rule,
            needle,
            files,
            exclude,
        })
    }

    /// `relative` uses `/` separators.
    pub fn applies_to(&self, relative: &str) -> bool {
        (self.files.is_empty() || self.files.iter().any(|p| p.matches(relative)))
            && !self.exclude.iter().any(|p| p.matches(relative))
    }

    /// First match on `line` that lies in live code, as `(byte offset, matched text)`.
    pub fn find_live(&self, line: &str) -> Option<(usize, String)> {
        match &self.needle {
            Needle::Literal(lit) => line
                .match_indices(lit.as_str())
                .find(|(offset, _)| is_live_offset(line, *offset))
                .map(|(offset, text)| (offset, text.to_owned())),
            Needle::Regex(re) => re
                .find_iter(line)
                .find(|m| is_live_offset(line, m.start()))
                .map(|m| (m.start(), m.as_str().to_owned())),
        }
    }
}

/// Whether `offset` is outside any `//` comment and string literal, scanning `line`
/// left to right. Quotes toggle on `'`, `"` and `` ` ``; a backslash escapes the next
/// character inside a string.
pub fn is_live_offset(line: &str, offset: usize) -> bool {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < offset && i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'/' if bytes.get(i + 1) == Some(&b'/') => return false,
                _ => {}
            },
        }
        i += 1;
    }
    quote.is_none()
}

/// Nesting depth of `<tag ...>` / `</tag>` over `text`.
pub fn tag_depth(text: &str, tag: &str) -> i64 {
    let open = format!("<{tag}");
    let close = format!("</{tag}");
    let mut depth = 0i64;
    let mut rest = text;
    while let Some(pos) = rest.find('<') {
        rest = &rest[pos..];
        if rest.starts_with(&close) && tag_boundary(&rest[close.len()..]) {
            depth -= 1;
            rest = &rest[close.len()..];
        } else if rest.starts_with(&open) && tag_boundary(&rest[open.len()..]) {
            depth += 1;
            rest = &rest[open.len()..];
        } else {
            rest = &rest[1..];
        }
    }
    depth
}

/// `<template>` and `<template lang="pug">` open a template; `<templates>` does not.
fn tag_boundary(after: &str) -> bool {
    after
        .chars()
        .next()
        .map(|c| c == '>' || c == '/' || c.is_whitespace())
        .unwrap_or(true)
}

/// Compile a glob, expanding `{a,b}` alternation first since `glob` has no brace support.
fn compile_globs(glob: &str) -> Result<Vec<Pattern>, String> {
    expand_braces(glob)
        .iter()
        .map(|g| Pattern::new(g).map_err(|e| format!("invalid glob '{g}': {e}")))
        .collect()
}

pub fn expand_braces(glob: &str) -> Vec<String> {
    let Some(start) = glob.find('{') else {
        return vec![glob.to_owned()];
    };
    let Some(len) = glob[start..].find('}') else {
        return vec![glob.to_owned()];
    };
    let end = start + len;
    let (head, alternatives, tail) = (&glob[..start], &glob[start + 1..end], &glob[end + 1..]);
    alternatives
        .split(',')
        .flat_map(|alt| expand_braces(&format!("{head}{alt}{tail}")))
        .collect()
}
