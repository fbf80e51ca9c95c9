use std::collections::HashSet;
use windi_preprocess::compiler::{
    attributify_selector, attributify_token, rename_classes, AttributifyMap, Compiled, Interpreted,
    PreflightRequest, UtilityCompiler,
};
use windi_preprocess::normalizer::TokenSet;
use windi_preprocess::selector::escape_class;
use windi_preprocess::stylesheet::{Declaration, FragmentOrigin, Style, StyleGroup, StyleSheet};
use windi_preprocess::Result;

/// Deterministic compiler for pipeline tests.
///
/// Resolves `p-*`, `m-*`, `font-*` and `border*` utilities (after any variant
/// prefix) to a single `--token` declaration and emits one base rule per
/// requested tag.
#[derive(Default)]
pub struct FakeCompiler;

impl FakeCompiler {
    fn resolves(token: &str) -> bool {
        let utility = token.rsplit(':').next().unwrap_or(token);
        ["p-", "m-", "font-", "border"].iter().any(|p| utility.starts_with(p))
    }

    fn rules(tokens: &TokenSet) -> (StyleSheet, Vec<String>) {
        let mut sheet = StyleSheet::new();
        let mut ignored = Vec::new();
        for token in tokens {
            if Self::resolves(token) {
                sheet.add(Style::new(
                    format!(".{}", escape_class(token)),
                    vec![Declaration::new("--token", token.as_str())],
                ));
            } else {
                ignored.push(token.clone());
            }
        }
        (sheet, ignored)
    }
}

impl UtilityCompiler for FakeCompiler {
    fn interpret(&mut self, tokens: &TokenSet) -> Result<Interpreted> {
        let (style_sheet, ignored) = Self::rules(tokens);
        Ok(Interpreted { style_sheet, ignored })
    }

    fn compile(&mut self, tokens: &TokenSet, prefix: &str, _hash: bool) -> Result<Compiled> {
        let (style_sheet, ignored) = Self::rules(tokens);
        if style_sheet.is_empty() {
            return Ok(Compiled { class_name: None, ignored, style_sheet });
        }
        let resolved: Vec<String> = tokens.iter().filter(|t| !ignored.contains(t)).cloned().collect();
        let class_name = format!("{}{}", prefix, resolved.join("_"));
        Ok(Compiled {
            style_sheet: rename_classes(style_sheet, &resolved, &class_name).combine(),
            class_name: Some(class_name),
            ignored,
        })
    }

    fn attributify(&mut self, attributes: &AttributifyMap) -> Result<Interpreted> {
        let mut result = Interpreted::default();
        for (attribute, values) in attributes {
            for value in values {
                let token = attributify_token(attribute, value);
                if Self::resolves(&token) {
                    result.style_sheet.add(Style::new(
                        attributify_selector(attribute, value),
                        vec![Declaration::new("--token", token.as_str())],
                    ));
                } else {
                    result.ignored.push(format!("{}=\"{}\"", attribute, value));
                }
            }
        }
        result.style_sheet = result.style_sheet.with_origin(FragmentOrigin::Attributify);
        Ok(result)
    }

    fn preflight(&mut self, request: &PreflightRequest) -> Result<StyleSheet> {
        let mut sheet = StyleSheet::new();
        if !request.include_base {
            return Ok(sheet);
        }
        if request.include_global {
            sheet.add(Style::new("*", vec![Declaration::new("box-sizing", "border-box")]).with_group(StyleGroup::Base));
        }
        for tag in &request.tags {
            sheet.add(Style::new(tag.as_str(), vec![Declaration::new("--base", tag.as_str())]).with_group(StyleGroup::Base));
        }
        Ok(sheet.with_origin(FragmentOrigin::Preflight))
    }

    fn resolve_variants(&self) -> Vec<String> {
        vec!["sm".to_string(), "md".to_string()]
    }
}

/// [`FakeCompiler`] that, like a compiler with its own cache, hands out each
/// base rule only once.
#[derive(Default)]
pub struct DedupCompiler {
    inner: FakeCompiler,
    emitted: HashSet<String>,
}

impl UtilityCompiler for DedupCompiler {
    fn interpret(&mut self, tokens: &TokenSet) -> Result<Interpreted> {
        self.inner.interpret(tokens)
    }

    fn compile(&mut self, tokens: &TokenSet, prefix: &str, hash: bool) -> Result<Compiled> {
        self.inner.compile(tokens, prefix, hash)
    }

    fn attributify(&mut self, attributes: &AttributifyMap) -> Result<Interpreted> {
        self.inner.attributify(attributes)
    }

    fn preflight(&mut self, request: &PreflightRequest) -> Result<StyleSheet> {
        let sheet = self.inner.preflight(request)?;
        let fresh = sheet
            .children
            .into_iter()
            .filter(|style| request.dev || self.emitted.insert(style.selector.clone()))
            .collect();
        Ok(StyleSheet::from_styles(fresh))
    }

    fn resolve_variants(&self) -> Vec<String> {
        self.inner.resolve_variants()
    }
}
