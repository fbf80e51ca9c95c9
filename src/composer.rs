//! Merging of per-origin fragments and the global scoping transform.

use crate::stylesheet::{StyleGroup, StyleSheet};
use tracing::trace;

const GLOBAL_PSEUDO: &str = ":global";
const GLOBAL_KEYFRAMES_MARKER: &str = "-global-";

/// Merge fragments into one deduplicated, canonically ordered stylesheet.
///
/// Fragments are first ordered by origin precedence (preflight, author style,
/// directive, attributify, main) so a rule appearing under several origins is
/// merged into its lowest-precedence occurrence.
pub fn compose<I>(fragments: I) -> StyleSheet
where
    I: IntoIterator<Item = StyleSheet>,
{
    let mut styles: Vec<_> = fragments.into_iter().flat_map(|f| f.children).collect();
    styles.sort_by_key(|style| style.meta.origin);
    let composed = StyleSheet::from_styles(styles).combine().sort();
    trace!(rules = composed.len(), "composed stylesheet");
    composed
}

/// Make every rule of `sheet` escape component-local scoping.
///
/// Selectors are wrapped in `:global(...)`; keyframes cannot be wrapped so
/// their name gets the `-global-` marker instead. Rules already global are left
/// untouched, which makes the transform idempotent.
pub fn globalize(mut sheet: StyleSheet) -> StyleSheet {
    for style in &mut sheet.children {
        match style.meta.group {
            StyleGroup::Statement => {}
            StyleGroup::Keyframes => {
                for at_rule in &mut style.at_rules {
                    if let Some(renamed) = globalize_keyframes(at_rule) {
                        *at_rule = renamed;
                    }
                }
            }
            StyleGroup::Base | StyleGroup::Utility => {
                if style.selector.starts_with('@') || style.selector.contains(GLOBAL_PSEUDO) {
                    continue;
                }
                style.wrap_rule(|rule| format!("{}({})", GLOBAL_PSEUDO, rule));
            }
        }
    }
    sheet
}

fn globalize_keyframes(prelude: &str) -> Option<String> {
    let name = prelude.split_whitespace().next()?;
    if !name.ends_with("keyframes") {
        return None;
    }
    let ident = prelude[name.len()..].trim();
    if ident.is_empty() || ident.starts_with(GLOBAL_KEYFRAMES_MARKER) {
        return None;
    }
    Some(format!("{} {}{}", name, GLOBAL_KEYFRAMES_MARKER, ident))
}
