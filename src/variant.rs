//! Variant tagging for directive attributes such as `md="p-4 hover:(m-1 m-2)"`.

use crate::normalizer::{expand_groups, TokenSet};

/// Directive names that are spelled differently from the variant they select
pub const VARIANT_ALIASES: &[(&str, &str)] = &[("xxl", "2xl")];

/// Resolve a directive attribute name to its variant name
pub fn resolve_alias(name: &str) -> &str {
    VARIANT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, variant)| *variant)
        .unwrap_or(name)
}

/// Prefix every unit of `text` with `variant:`.
///
/// A grouped run `name:(...)` counts as one unit and receives exactly one
/// outer prefix; its members are not prefixed individually.
pub fn add_variant(text: &str, variant: &str) -> TokenSet {
    let variant = resolve_alias(variant);
    units(text)
        .into_iter()
        .map(|unit| format!("{}:{}", variant, unit))
        .collect()
}

/// Tag and expand in one step, yielding flat tokens
pub fn tagged_tokens(text: &str, variant: &str) -> TokenSet {
    add_variant(text, variant)
        .iter()
        .flat_map(|unit| {
            expand_groups(unit)
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Split into whitespace-separated units, keeping `name:(...)` groups whole
fn units(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in text.chars() {
        match c {
            '(' if depth > 0 || current.ends_with(':') => {
                depth += 1;
                current.push(c);
            }
            ')' if depth > 0 => {
                depth -= 1;
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    units.push(std::mem::take(&mut current));
                }
            }
            c if c.is_whitespace() => {
                if !current.ends_with(' ') {
                    current.push(' ');
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        units.push(current);
    }
    units
}
