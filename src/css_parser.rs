//! Author style blocks and compiler output, read through `lightningcss`.
//!
//! Parsed rules are flattened into [`StyleSheet`] entries: conditional group
//! rules (`@media`, `@supports`, `@layer`) become at-rule chains, keyframes
//! become `Keyframes` entries, descriptor blocks such as `@font-face` keep
//! their declarations, and anything else is carried as a statement.
//! `@apply` lines are kept as pseudo declarations so the caller can expand
//! them.

use crate::stylesheet::{Declaration, FragmentOrigin, Style, StyleGroup, StyleMeta, StyleSheet};
use lightningcss::declaration::DeclarationBlock;
use lightningcss::printer::PrinterOptions;
use lightningcss::rules::CssRule;
use lightningcss::stylesheet::{ParserOptions, StyleSheet as CssStyleSheet};
use lightningcss::traits::ToCss;
use std::borrow::Cow;
use thiserror::Error;

/// Property name used to carry `@apply` directives through parsing
pub const APPLY_DIRECTIVE: &str = "@apply";

/// `@apply` is not CSS; it travels through the parser as this custom property
const APPLY_PROPERTY: &str = "--windi-apply";

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message} at line {line}, column {column}")]
pub struct CssSyntaxError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl CssSyntaxError {
    fn printing(message: impl std::fmt::Display) -> Self {
        Self {
            line: 0,
            column: 0,
            message: format!("unprintable rule: {}", message),
        }
    }
}

/// Parse author CSS. Any invalid rule or declaration is an error.
pub fn parse(css: &str) -> Result<StyleSheet, CssSyntaxError> {
    parse_with(css, false)
}

/// Parse generated CSS, skipping anything `lightningcss` cannot read
pub fn parse_lenient(css: &str) -> Result<StyleSheet, CssSyntaxError> {
    parse_with(css, true)
}

fn parse_with(css: &str, error_recovery: bool) -> Result<StyleSheet, CssSyntaxError> {
    let source = protect_apply(css);
    let options = ParserOptions {
        error_recovery,
        ..ParserOptions::default()
    };
    let sheet = CssStyleSheet::parse(&source, options).map_err(|e| {
        let (line, column) = e.loc.as_ref().map_or((0, 0), |loc| (loc.line + 1, loc.column));
        CssSyntaxError {
            line,
            column,
            message: e.kind.to_string(),
        }
    })?;

    let mut flattener = Flattener::default();
    flattener.rules(&sheet.rules.0, &[], StyleGroup::Utility)?;
    Ok(StyleSheet::from_styles(flattener.out))
}

/// Rewrite `@apply a b;` into a custom property declaration
fn protect_apply(css: &str) -> Cow<'_, str> {
    if !css.contains(APPLY_DIRECTIVE) {
        return Cow::Borrowed(css);
    }
    let mut out = String::with_capacity(css.len() + 16);
    let mut rest = css;
    while let Some(index) = rest.find(APPLY_DIRECTIVE) {
        let after = &rest[index + APPLY_DIRECTIVE.len()..];
        out.push_str(&rest[..index]);
        if after.starts_with(char::is_whitespace) {
            out.push_str(APPLY_PROPERTY);
            out.push(':');
        } else {
            out.push_str(APPLY_DIRECTIVE);
        }
        rest = after;
    }
    out.push_str(rest);
    Cow::Owned(out)
}

#[derive(Default)]
struct Flattener {
    out: Vec<Style>,
    order: usize,
}

impl Flattener {
    fn push(&mut self, selector: String, at_rules: &[String], declarations: Vec<Declaration>, group: StyleGroup) {
        self.out.push(Style {
            selector,
            at_rules: at_rules.to_vec(),
            declarations,
            meta: StyleMeta {
                group,
                origin: FragmentOrigin::AuthorStyle,
                order: self.order,
            },
        });
        self.order += 1;
    }

    fn rules(&mut self, rules: &[CssRule<'_>], at_rules: &[String], group: StyleGroup) -> Result<(), CssSyntaxError> {
        for rule in rules {
            match rule {
                CssRule::Style(style) => {
                    let selector = print(&style.selectors)?;
                    let declarations = declarations(&style.declarations)?;
                    self.push(selector, at_rules, declarations, group);
                }
                CssRule::Media(media) => {
                    let chain = nested(at_rules, format!("@media {}", print(&media.query)?));
                    self.rules(&media.rules.0, &chain, group)?;
                }
                CssRule::Supports(supports) => {
                    let chain = nested(at_rules, format!("@supports {}", print(&supports.condition)?));
                    self.rules(&supports.rules.0, &chain, group)?;
                }
                CssRule::LayerBlock(layer) => {
                    let prelude = match &layer.name {
                        Some(name) => format!("@layer {}", print(name)?),
                        None => "@layer".to_string(),
                    };
                    self.rules(&layer.rules.0, &nested(at_rules, prelude), group)?;
                }
                CssRule::Keyframes(keyframes) => {
                    let chain = nested(at_rules, format!("@keyframes {}", print(&keyframes.name)?));
                    for keyframe in &keyframes.keyframes {
                        let selectors = keyframe
                            .selectors
                            .iter()
                            .map(print)
                            .collect::<Result<Vec<_>, _>>()?
                            .join(", ");
                        let declarations = declarations(&keyframe.declarations)?;
                        self.push(selectors, &chain, declarations, StyleGroup::Keyframes);
                    }
                }
                CssRule::Ignored => {}
                other => self.other(other, at_rules)?,
            }
        }
        Ok(())
    }

    /// Descriptor blocks (`@font-face`, `@page`, ...) keep their declarations;
    /// statements and anything with nested blocks are kept as printed.
    fn other(&mut self, rule: &CssRule<'_>, at_rules: &[String]) -> Result<(), CssSyntaxError> {
        let text = rule
            .to_css_string(PrinterOptions {
                minify: true,
                ..PrinterOptions::default()
            })
            .map_err(CssSyntaxError::printing)?;
        let text = text.trim();
        if let Some(statement) = text.strip_suffix(';') {
            self.push(statement.to_string(), at_rules, Vec::new(), StyleGroup::Statement);
            return Ok(());
        }
        match text.split_once('{') {
            Some((prelude, body)) if !body.contains('{') => {
                let declarations = body
                    .trim_end_matches('}')
                    .split(';')
                    .filter_map(|entry| entry.split_once(':'))
                    .map(|(property, value)| Declaration::new(property.trim(), value.trim()))
                    .collect();
                self.push(prelude.trim().to_string(), at_rules, declarations, StyleGroup::Base);
            }
            _ => self.push(text.to_string(), at_rules, Vec::new(), StyleGroup::Statement),
        }
        Ok(())
    }
}

fn nested(at_rules: &[String], prelude: String) -> Vec<String> {
    let mut chain = at_rules.to_vec();
    chain.push(prelude);
    chain
}

fn print<T: ToCss>(value: &T) -> Result<String, CssSyntaxError> {
    value
        .to_css_string(PrinterOptions::default())
        .map_err(CssSyntaxError::printing)
}

fn declarations(block: &DeclarationBlock<'_>) -> Result<Vec<Declaration>, CssSyntaxError> {
    let normal = block.declarations.iter().map(|property| (property, false));
    let important = block.important_declarations.iter().map(|property| (property, true));
    normal
        .chain(important)
        .map(|(property, important)| {
            let text = property
                .to_css_string(important, PrinterOptions::default())
                .map_err(CssSyntaxError::printing)?;
            let (name, value) = text.split_once(':').unwrap_or((text.as_str(), ""));
            let (name, value) = (name.trim(), value.trim());
            Ok(if name == APPLY_PROPERTY {
                Declaration::new(APPLY_DIRECTIVE, value)
            } else {
                Declaration::new(name, value)
            })
        })
        .collect()
}
