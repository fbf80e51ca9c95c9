//! Token normalization.
//!
//! Raw class text mixes literal words with embedded expressions
//! (`p-4 {active ? 'font-bold' : ''}`). The tokenizer keeps literal words and
//! the contents of string and template literals found inside expressions, and
//! discards everything else. Grouped syntax `prefix:(a b)` is expanded before
//! splitting.

use crate::markup::scan_expression_end;
use indexmap::IndexSet;

/// Deduplicated, insertion-ordered set of class tokens
pub type TokenSet = IndexSet<String>;

/// Normalize raw class text into a token set
pub fn normalize(raw: &str) -> TokenSet {
    tokens_of(&expand_groups(&class_text(raw)))
}

/// Normalize several raw strings into one set
pub fn normalize_all<'a, I: IntoIterator<Item = &'a str>>(raws: I) -> TokenSet {
    let mut set = TokenSet::new();
    for raw in raws {
        set.extend(normalize(raw));
    }
    set
}

fn tokens_of(text: &str) -> TokenSet {
    text.split_whitespace()
        .filter(|token| token.chars().any(|c| c.is_alphanumeric()))
        .map(str::to_string)
        .collect()
}

/// Strip expression structure, keeping literal words. Group syntax is left intact.
pub fn class_text(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    let mut literal_start = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                out.push_str(&raw[literal_start..i]);
                out.push(' ');
                let end = scan_expression_end(bytes, i + 1).unwrap_or(bytes.len());
                out.push_str(&expression_literals(&raw[i + 1..end]));
                out.push(' ');
                i = (end + 1).min(bytes.len());
                literal_start = i;
            }
            b'`' => {
                out.push_str(&raw[literal_start..i]);
                out.push(' ');
                i += 1;
                literal_start = i;
            }
            _ => i += 1,
        }
    }
    out.push_str(&raw[literal_start.min(raw.len())..]);
    out
}

/// Contents of the string and template literals in an expression, space separated.
fn expression_literals(expr: &str) -> String {
    let bytes = expr.as_bytes();
    let mut out = String::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            q @ (b'"' | b'\'') => {
                let start = i + 1;
                i = start;
                while i < bytes.len() && bytes[i] != q {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                out.push_str(&expr[start..i.min(bytes.len())]);
                out.push(' ');
                i += 1;
            }
            b'`' => {
                i += 1;
                let mut start = i;
                while i < bytes.len() && bytes[i] != b'`' {
                    if bytes[i] == b'\\' {
                        i += 2;
                        continue;
                    }
                    if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
                        out.push_str(&expr[start..i]);
                        out.push(' ');
                        let end = scan_expression_end(bytes, i + 2).unwrap_or(bytes.len());
                        out.push_str(&expression_literals(&expr[i + 2..end]));
                        out.push(' ');
                        i = end + 1;
                        start = i.min(bytes.len());
                        continue;
                    }
                    i += 1;
                }
                out.push_str(&expr[start.min(bytes.len())..i.min(bytes.len())]);
                out.push(' ');
                i += 1;
            }
            _ => i += 1,
        }
    }
    out
}

/// Expand `prefix:(a b c)` into `prefix:a prefix:b prefix:c`, recursively.
pub fn expand_groups(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut word_start = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            out.extend(&chars[word_start..=i]);
            i += 1;
            word_start = i;
            continue;
        }
        if c == '(' && i > word_start && chars[i - 1] == ':' && !in_brackets(&chars[word_start..i]) {
            if let Some(close) = matching_paren(&chars, i) {
                let prefix: String = chars[word_start..i].iter().collect();
                let inner: String = chars[i + 1..close].iter().collect();
                let expanded: Vec<String> = expand_groups(&inner)
                    .split_whitespace()
                    .map(|token| format!("{}{}", prefix, token))
                    .collect();
                out.push_str(&expanded.join(" "));
                i = close + 1;
                word_start = i;
                continue;
            }
        }
        i += 1;
    }
    out.extend(&chars[word_start.min(chars.len())..]);
    out
}

fn in_brackets(prefix: &[char]) -> bool {
    let open = prefix.iter().filter(|c| **c == '[').count();
    let close = prefix.iter().filter(|c| **c == ']').count();
    open > close
}

fn matching_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in chars.iter().enumerate().skip(open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
