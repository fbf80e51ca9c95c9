//! Stylesheet model: rules, fragments and their textual emission.

use indexmap::IndexMap;
use serde::Serialize;
use std::cmp::Ordering;

/// Semantic group of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum StyleGroup {
    /// `@import`, `@charset` and other statement at-rules
    Statement,
    /// Base/reset rules
    Base,
    /// Rules inside a `@keyframes` block
    Keyframes,
    /// Everything else
    Utility,
}

/// Where a fragment came from. Declaration order is merge precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FragmentOrigin {
    Preflight,
    AuthorStyle,
    Directive,
    Attributify,
    Main,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StyleMeta {
    pub group: StyleGroup,
    pub origin: FragmentOrigin,
    /// Position in the producing compiler's (or author's) output
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

/// One CSS rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Style {
    /// Selector, or the full statement text for `StyleGroup::Statement`
    pub selector: String,
    /// Enclosing at-rule preludes, outermost first
    pub at_rules: Vec<String>,
    pub declarations: Vec<Declaration>,
    pub meta: StyleMeta,
}

impl Style {
    pub fn new(selector: impl Into<String>, declarations: Vec<Declaration>) -> Self {
        Self {
            selector: selector.into(),
            at_rules: Vec::new(),
            declarations,
            meta: StyleMeta {
                group: StyleGroup::Utility,
                origin: FragmentOrigin::Main,
                order: 0,
            },
        }
    }

    pub fn with_at_rules(mut self, at_rules: Vec<String>) -> Self {
        self.at_rules = at_rules;
        self
    }

    pub fn with_group(mut self, group: StyleGroup) -> Self {
        self.meta.group = group;
        self
    }

    /// Wrap the selector with `f`, applied to each selector of a list
    pub fn wrap_rule<F: Fn(&str) -> String>(&mut self, f: F) {
        let wrapped: Vec<String> = crate::selector::split_list(&self.selector)
            .into_iter()
            .map(|part| f(part))
            .collect();
        self.selector = wrapped.join(", ");
    }

    pub(crate) fn merge_key(&self) -> (String, String, StyleGroup) {
        (self.at_rules.join("\u{1}"), self.selector.clone(), self.meta.group)
    }

    fn sort_key(&self) -> (u8, FragmentOrigin, AtRuleWeight, StyleGroup, usize) {
        let statement = if self.meta.group == StyleGroup::Statement { 0 } else { 1 };
        match self.meta.origin {
            // author rules and base rules keep their own cascade
            FragmentOrigin::AuthorStyle | FragmentOrigin::Preflight => (
                statement,
                self.meta.origin,
                AtRuleWeight::default(),
                StyleGroup::Utility,
                self.meta.order,
            ),
            _ => (
                statement,
                self.meta.origin,
                AtRuleWeight::of(&self.at_rules),
                self.meta.group,
                0,
            ),
        }
    }
}

/// Ordering weight of an at-rule chain: plain rules, then `min-width` media
/// queries ascending, then other conditional blocks, then keyframes.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
struct AtRuleWeight(u8, u32, String);

impl AtRuleWeight {
    fn of(at_rules: &[String]) -> Self {
        let Some(first) = at_rules.first() else {
            return Self::default();
        };
        let joined = at_rules.join(" ");
        if first.contains("keyframes") {
            return Self(3, 0, joined);
        }
        if first.starts_with("@media") {
            if let Some(px) = min_width_px(first) {
                return Self(1, px, joined);
            }
        }
        Self(2, 0, joined)
    }
}

fn min_width_px(prelude: &str) -> Option<u32> {
    let rest = &prelude[prelude.find("min-width")? + "min-width".len()..];
    let rest = rest.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let value: u32 = digits.parse().ok()?;
    if rest[digits.len()..].starts_with("em") || rest[digits.len()..].starts_with("rem") {
        Some(value.saturating_mul(16))
    } else {
        Some(value)
    }
}

/// An ordered collection of rules
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StyleSheet {
    pub children: Vec<Style>,
}

impl StyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_styles(children: Vec<Style>) -> Self {
        Self { children }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn add(&mut self, style: Style) {
        self.children.push(style);
    }

    /// Tag every rule with `origin`
    pub fn with_origin(mut self, origin: FragmentOrigin) -> Self {
        for style in &mut self.children {
            style.meta.origin = origin;
        }
        self
    }

    /// Number rules by their current position
    pub fn numbered(mut self) -> Self {
        for (order, style) in self.children.iter_mut().enumerate() {
            style.meta.order = order;
        }
        self
    }

    /// Merge rules sharing selector and at-rule chain. The merged rule keeps the
    /// position and meta of its first occurrence; repeated declarations are dropped.
    pub fn combine(self) -> Self {
        let mut merged: IndexMap<(String, String, StyleGroup), Style> = IndexMap::new();
        for style in self.children {
            match merged.get_mut(&style.merge_key()) {
                Some(existing) => {
                    for declaration in style.declarations {
                        if !existing.declarations.contains(&declaration) {
                            existing.declarations.push(declaration);
                        }
                    }
                }
                None => {
                    merged.insert(style.merge_key(), style);
                }
            }
        }
        Self {
            children: merged.into_values().collect(),
        }
    }

    /// Canonical ordering: statements, origin precedence, at-rule weight, group,
    /// then selector text. Author and preflight rules keep their source order
    /// within their origin.
    pub fn sort(mut self) -> Self {
        self.children.sort_by(|a, b| {
            a.sort_key()
                .cmp(&b.sort_key())
                .then_with(|| a.selector.cmp(&b.selector))
                .then_with(|| compare_declarations(&a.declarations, &b.declarations))
        });
        self
    }

    /// Emit CSS text
    pub fn build(&self, minify: bool) -> String {
        let mut out = String::new();
        let mut open: Vec<&str> = Vec::new();

        for style in &self.children {
            if style.meta.group != StyleGroup::Statement && style.declarations.is_empty() {
                continue;
            }
            let mut common = 0;
            while common < open.len()
                && common < style.at_rules.len()
                && open[common] == style.at_rules[common].as_str()
            {
                common += 1;
            }
            while open.len() > common {
                open.pop();
                close_block(&mut out, open.len(), minify);
            }
            for at_rule in &style.at_rules[common..] {
                open_block(&mut out, at_rule, open.len(), minify);
                open.push(at_rule);
            }
            write_style(&mut out, style, open.len(), minify);
        }
        while !open.is_empty() {
            open.pop();
            close_block(&mut out, open.len(), minify);
        }
        out
    }
}

fn compare_declarations(a: &[Declaration], b: &[Declaration]) -> Ordering {
    let a = a.iter().map(|d| (&d.property, &d.value));
    let b = b.iter().map(|d| (&d.property, &d.value));
    a.cmp(b)
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn open_block(out: &mut String, prelude: &str, depth: usize, minify: bool) {
    if minify {
        out.push_str(prelude);
        out.push('{');
    } else {
        indent(out, depth);
        out.push_str(prelude);
        out.push_str(" {\n");
    }
}

fn close_block(out: &mut String, depth: usize, minify: bool) {
    if minify {
        out.push('}');
    } else {
        indent(out, depth);
        out.push_str("}\n");
    }
}

fn write_style(out: &mut String, style: &Style, depth: usize, minify: bool) {
    if style.meta.group == StyleGroup::Statement {
        if !minify {
            indent(out, depth);
        }
        out.push_str(&style.selector);
        // blocks kept verbatim are already closed
        if !style.selector.ends_with('}') {
            out.push(';');
        }
        if !minify {
            out.push('\n');
        }
        return;
    }

    if minify {
        out.push_str(&style.selector);
        out.push('{');
        let body: Vec<String> = style
            .declarations
            .iter()
            .map(|d| format!("{}:{}", d.property, d.value))
            .collect();
        out.push_str(&body.join(";"));
        out.push('}');
    } else {
        indent(out, depth);
        out.push_str(&style.selector);
        out.push_str(" {\n");
        for declaration in &style.declarations {
            indent(out, depth + 1);
            out.push_str(&format!("{}: {};\n", declaration.property, declaration.value));
        }
        indent(out, depth);
        out.push_str("}\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(selector: &str, property: &str, value: &str) -> Style {
        Style::new(selector, vec![Declaration::new(property, value)])
    }

    #[test]
    fn test_combine_merges_duplicate_selectors() {
        let sheet = StyleSheet::from_styles(vec![
            rule(".p-4", "padding", "1rem"),
            rule(".m-2", "margin", "0.5rem"),
            rule(".p-4", "padding", "1rem"),
            rule(".p-4", "color", "red"),
        ])
        .combine();

        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.children[0].declarations.len(), 2);
    }

    #[test]
    fn test_combine_keeps_media_rules_apart() {
        let sheet = StyleSheet::from_styles(vec![
            rule(".p-4", "padding", "1rem"),
            rule(".p-4", "padding", "1rem").with_at_rules(vec!["@media (min-width: 640px)".into()]),
        ])
        .combine();
        assert_eq!(sheet.len(), 2);
    }

    #[test]
    fn test_sort_orders_breakpoints_ascending() {
        let sheet = StyleSheet::from_styles(vec![
            rule(".md\\:p-4", "padding", "1rem").with_at_rules(vec!["@media (min-width: 768px)".into()]),
            rule(".sm\\:p-4", "padding", "1rem").with_at_rules(vec!["@media (min-width: 640px)".into()]),
            rule(".p-4", "padding", "1rem"),
        ])
        .sort();

        let selectors: Vec<&str> = sheet.children.iter().map(|s| s.selector.as_str()).collect();
        assert_eq!(selectors, vec![".p-4", ".sm\\:p-4", ".md\\:p-4"]);
    }

    #[test]
    fn test_build_pretty() {
        let sheet = StyleSheet::from_styles(vec![
            rule(".a", "color", "red"),
            rule(".b", "margin", "0").with_at_rules(vec!["@media (min-width: 640px)".into()]),
        ]);
        assert_eq!(
            sheet.build(false),
            ".a {\n  color: red;\n}\n@media (min-width: 640px) {\n  .b {\n    margin: 0;\n  }\n}\n"
        );
    }

    #[test]
    fn test_build_minified_groups_shared_at_rules() {
        let media = vec!["@media (min-width: 640px)".to_string()];
        let sheet = StyleSheet::from_styles(vec![
            rule(".a", "color", "red").with_at_rules(media.clone()),
            rule(".b", "margin", "0").with_at_rules(media),
        ]);
        insta::assert_snapshot!(sheet.build(true), @"@media (min-width: 640px){.a{color:red}.b{margin:0}}");
    }

    #[test]
    fn test_build_skips_empty_rules() {
        let sheet = StyleSheet::from_styles(vec![Style::new(".empty", vec![])]);
        assert_eq!(sheet.build(true), "");
    }

    #[test]
    fn test_wrap_rule_applies_to_each_selector() {
        let mut style = rule("h1, h2", "margin", "0");
        style.wrap_rule(|s| format!(":global({})", s));
        assert_eq!(style.selector, ":global(h1), :global(h2)");
    }

    #[test]
    fn test_verbatim_block_statement_gets_no_semicolon() {
        let sheet = StyleSheet::from_styles(vec![
            Style::new("@import \"a.css\"", Vec::new()).with_group(StyleGroup::Statement),
            Style::new("@page{@top-left{content:\"x\"}}", Vec::new()).with_group(StyleGroup::Statement),
        ]);
        assert_eq!(sheet.build(true), "@import \"a.css\";@page{@top-left{content:\"x\"}}");
    }

    #[test]
    fn test_min_width_parsing() {
        assert_eq!(min_width_px("@media (min-width: 640px)"), Some(640));
        assert_eq!(min_width_px("@media (min-width: 40em)"), Some(640));
        assert_eq!(min_width_px("@media print"), None);
        assert_eq!(min_width_px("@media (min-width: 4294967295em)"), Some(u32::MAX));
    }
}
