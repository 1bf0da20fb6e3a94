//! Ignore patterns for dotfile scanning

use regex::Regex;
use std::path::{Component, Path};

/// Entries at the root of the plonk directory that are never dotfiles
const RESERVED: &[&str] = &["plonk.yaml", "plonk.lock", ".plonk"];

#[derive(Debug)]
enum Pattern {
    /// Matches any path component with this exact name
    Component(String),
    /// Shell glob, matched against the file name and the whole relative path
    Glob(Regex),
}

/// Compiled `ignore_patterns`
#[derive(Debug, Default)]
pub struct IgnoreFilter {
    patterns: Vec<Pattern>,
}

impl IgnoreFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> anyhow::Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for raw in patterns {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            // **/name/** and name/ both mean "any component called name"
            let pattern = raw.strip_prefix("**/").unwrap_or(raw);
            let pattern = pattern
                .strip_suffix("/**")
                .or_else(|| pattern.strip_suffix('/'))
                .unwrap_or(pattern);

            if has_glob_chars(pattern) {
                compiled.push(Pattern::Glob(Regex::new(&glob_to_regex(pattern))?));
            } else {
                compiled.push(Pattern::Component(pattern.to_string()));
            }
        }
        Ok(Self { patterns: compiled })
    }

    /// Whether `rel` (relative to the scanned root) should be skipped
    pub fn should_skip(&self, rel: &Path) -> bool {
        let components: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        let Some(file_name) = components.last() else {
            return false;
        };
        if components.len() == 1 && RESERVED.contains(&file_name.as_str()) {
            return true;
        }

        let joined = components.join("/");
        self.patterns.iter().any(|pattern| match pattern {
            Pattern::Component(name) => components.iter().any(|c| c == name),
            Pattern::Glob(re) => {
                re.is_match(file_name)
                    || re.is_match(&joined)
                    || components.iter().any(|c| re.is_match(c))
            }
        })
    }
}

fn has_glob_chars(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Translate a shell glob into an anchored regex
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                for next in chars.by_ref() {
                    if next == ']' {
                        break;
                    }
                    if next == '\\' {
                        out.push('\\');
                    }
                    out.push(next);
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}
