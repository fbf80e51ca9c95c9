//! Seam between the preprocessor and the utility-class compiler.
//!
//! [`UtilityCompiler`] is everything the pipeline needs from a compiler:
//! interpretation of token sets into rules, compilation into a single class
//! name, attributify resolution, base rules and the list of known variants.
//! [`TailwindCompiler`] implements it over `tailwind-rs`.

use crate::config::CompilerConfig;
use crate::css_parser;
use crate::errors::{PreprocessError, Result};
use crate::normalizer::TokenSet;
use crate::selector::{class_names, element_names, escape_class, is_document_wide, replace_class};
use crate::stylesheet::{FragmentOrigin, StyleGroup, StyleSheet};
use indexmap::{IndexMap, IndexSet};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use tailwind_rs::TailwindBuilder;
use tracing::trace;

/// Attribute name → tokens found in that attribute, aggregated per file
pub type AttributifyMap = IndexMap<String, TokenSet>;

/// Attributify values that select the bare utility, e.g. `border="~"` → `border`
pub const ATTRIBUTIFY_SELF_VALUES: &[&str] = &["~", "default"];

/// Result of interpreting a token set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interpreted {
    pub style_sheet: StyleSheet,
    /// Tokens the compiler could not resolve, in input order
    pub ignored: Vec<String>,
}

/// Result of compiling a token set into one class name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compiled {
    /// `None` when no token resolved
    pub class_name: Option<String>,
    pub ignored: Vec<String>,
    pub style_sheet: StyleSheet,
}

impl Compiled {
    /// Replacement class list: compiled name followed by unresolved tokens
    pub fn class_list(&self) -> String {
        self.class_name
            .iter()
            .chain(self.ignored.iter())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Which base rules a file needs
#[derive(Debug, Clone, Default)]
pub struct PreflightRequest {
    /// Tag names owned by the file
    pub tags: IndexSet<String>,
    /// Emit element-keyed base rules at all
    pub include_base: bool,
    /// Also emit document-wide rules (`*`, `html`, `body`, ...)
    pub include_global: bool,
    /// Development mode: base rules are rebuilt on every request
    pub dev: bool,
}

pub trait UtilityCompiler {
    fn interpret(&mut self, tokens: &TokenSet) -> Result<Interpreted>;

    /// Compile `tokens` into one class name. With `hash` the name is derived
    /// from the resolved tokens; otherwise names are handed out sequentially.
    fn compile(&mut self, tokens: &TokenSet, prefix: &str, hash: bool) -> Result<Compiled>;

    fn attributify(&mut self, attributes: &AttributifyMap) -> Result<Interpreted>;

    fn preflight(&mut self, request: &PreflightRequest) -> Result<StyleSheet>;

    /// Variant names usable as directive attributes
    fn resolve_variants(&self) -> Vec<String>;
}

/// Rewrite compiled rules so every resolved token selects `class_name`
pub fn rename_classes(sheet: StyleSheet, resolved: &[String], class_name: &str) -> StyleSheet {
    let replacement = format!(".{}", escape_class(class_name));
    let mut sheet = sheet;
    for style in &mut sheet.children {
        for token in resolved {
            style.selector = replace_class(&style.selector, token, &replacement);
        }
    }
    sheet
}

/// Content-derived class name for a sorted token list
pub fn hashed_class_name(prefix: &str, tokens: &[String]) -> String {
    let mut hasher = DefaultHasher::new();
    for token in tokens {
        token.hash(&mut hasher);
    }
    format!("{}{}", prefix, to_base62(hasher.finish()))
}

/// Convert a number to base62 string
pub fn to_base62(mut num: u64) -> String {
    const CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

    if num == 0 {
        return "0".to_string();
    }

    let mut result = String::new();
    while num > 0 {
        result.insert(0, CHARS[(num % 62) as usize] as char);
        num /= 62;
    }
    result
}

/// Split an attributify value into its utility token, e.g.
/// (`bg`, `hover:blue-600`) → `hover:bg-blue-600`.
/// Variants may also sit on the attribute name: (`sm:bg`, `red`) → `sm:bg-red`.
pub fn attributify_token(attribute: &str, value: &str) -> String {
    let (key_variants, key) = match attribute.rsplit_once(':') {
        Some((variants, key)) => (Some(variants), key),
        None => (None, attribute),
    };
    let (value_variants, value) = match value.rsplit_once(':') {
        Some((variants, value)) if !value.is_empty() => (Some(variants), value),
        _ => (None, value),
    };
    let (important, value) = match value.strip_prefix('!') {
        Some(value) => ("!", value),
        None => ("", value),
    };
    let utility = if ATTRIBUTIFY_SELF_VALUES.contains(&value) {
        key.to_string()
    } else if let Some(negative) = value.strip_prefix('-') {
        format!("-{}-{}", key, negative)
    } else {
        format!("{}-{}", key, value)
    };
    let variants: Vec<&str> = key_variants.into_iter().chain(value_variants).collect();
    if variants.is_empty() {
        format!("{}{}", important, utility)
    } else {
        format!("{}:{}{}", variants.join(":"), important, utility)
    }
}

/// Attribute selector matching one attributify value
pub fn attributify_selector(attribute: &str, value: &str) -> String {
    format!(
        "[{}~=\"{}\"]",
        escape_class(attribute),
        value.replace('\\', "\\\\").replace('"', "\\\"")
    )
}

/// Variants `tailwind-rs` understands as prefixes
const TAILWIND_VARIANTS: &[&str] = &[
    "sm", "md", "lg", "xl", "2xl", "dark", "hover", "focus", "focus-within", "focus-visible",
    "active", "visited", "disabled", "checked", "first", "last", "odd", "even", "group-hover",
    "group-focus", "peer-hover", "peer-focus", "motion-safe", "motion-reduce", "print",
    "before", "after", "placeholder", "selection", "marker",
];

/// [`UtilityCompiler`] over `tailwind-rs`.
///
/// Every call traces into a fresh builder so that fragments never leak rules
/// from earlier calls. Base rules are filtered per request; deciding which
/// file a base rule is emitted for is left to the session.
pub struct TailwindCompiler {
    config: CompilerConfig,
    counter: u64,
    base: Option<StyleSheet>,
}

impl TailwindCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            counter: 0,
            base: None,
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    fn builder(preflight: bool) -> TailwindBuilder {
        let mut builder = TailwindBuilder::default();
        builder.preflight.disable = !preflight;
        builder
    }

    fn bundle(builder: &mut TailwindBuilder) -> Result<StyleSheet> {
        let css = builder
            .bundle()
            .map_err(|e| PreprocessError::CompilerError(format!("Failed to generate CSS: {:?}", e)))?;
        css_parser::parse_lenient(&css)
            .map_err(|e| PreprocessError::CompilerError(format!("Unreadable compiler output: {}", e)))
    }

    /// Trace `tokens` and split them into resolved and ignored
    fn trace_tokens(&mut self, tokens: &[String]) -> Result<(StyleSheet, Vec<String>, Vec<String>)> {
        let mut builder = Self::builder(false);
        for token in tokens {
            if let Err(e) = builder.trace(token, false) {
                trace!(token = token.as_str(), error = ?e, "trace failed");
            }
        }
        let sheet = if tokens.is_empty() {
            StyleSheet::new()
        } else {
            Self::bundle(&mut builder)?
        };

        let emitted: HashSet<String> = sheet
            .children
            .iter()
            .flat_map(|style| class_names(&style.selector))
            .collect();
        let (resolved, ignored): (Vec<String>, Vec<String>) =
            tokens.iter().cloned().partition(|token| emitted.contains(token));

        let sheet = StyleSheet::from_styles(
            sheet
                .children
                .into_iter()
                .filter(|style| {
                    style.meta.group != StyleGroup::Utility
                        || class_names(&style.selector).iter().any(|name| resolved.contains(name))
                        || class_names(&style.selector).is_empty()
                })
                .collect(),
        );
        Ok((sheet.with_origin(FragmentOrigin::Main), resolved, ignored))
    }

    fn sorted(tokens: &TokenSet) -> Vec<String> {
        let mut sorted: Vec<String> = tokens.iter().cloned().collect();
        sorted.sort();
        sorted
    }

    fn in_input_order(tokens: &TokenSet, subset: &[String]) -> Vec<String> {
        tokens.iter().filter(|t| subset.contains(t)).cloned().collect()
    }
}

impl Default for TailwindCompiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

impl UtilityCompiler for TailwindCompiler {
    fn interpret(&mut self, tokens: &TokenSet) -> Result<Interpreted> {
        let (style_sheet, _, ignored) = self.trace_tokens(&Self::sorted(tokens))?;
        Ok(Interpreted {
            style_sheet,
            ignored: Self::in_input_order(tokens, &ignored),
        })
    }

    fn compile(&mut self, tokens: &TokenSet, prefix: &str, hash: bool) -> Result<Compiled> {
        let (style_sheet, resolved, ignored) = self.trace_tokens(&Self::sorted(tokens))?;
        let ignored = Self::in_input_order(tokens, &ignored);
        if resolved.is_empty() {
            return Ok(Compiled {
                class_name: None,
                ignored,
                style_sheet: StyleSheet::new(),
            });
        }

        let class_name = if hash {
            hashed_class_name(prefix, &resolved)
        } else {
            self.counter += 1;
            format!("{}{}", prefix, to_base62(self.counter))
        };
        Ok(Compiled {
            style_sheet: rename_classes(style_sheet, &resolved, &class_name).combine(),
            class_name: Some(class_name),
            ignored,
        })
    }

    fn attributify(&mut self, attributes: &AttributifyMap) -> Result<Interpreted> {
        if !self.config.attributify {
            return Ok(Interpreted::default());
        }

        let mut utilities: IndexMap<String, Vec<(String, String)>> = IndexMap::new();
        for (attribute, values) in attributes {
            for value in values {
                utilities
                    .entry(attributify_token(attribute, value))
                    .or_default()
                    .push((attribute.clone(), value.clone()));
            }
        }

        let tokens: Vec<String> = {
            let mut tokens: Vec<String> = utilities.keys().cloned().collect();
            tokens.sort();
            tokens
        };
        let (mut sheet, resolved, ignored) = self.trace_tokens(&tokens)?;

        let mut rewritten = StyleSheet::new();
        for style in sheet.children.drain(..) {
            let names = class_names(&style.selector);
            let mut matched = false;
            for token in resolved.iter().filter(|t| names.contains(t)) {
                for (attribute, value) in &utilities[token] {
                    let mut copy = style.clone();
                    copy.selector = replace_class(&style.selector, token, &attributify_selector(attribute, value));
                    rewritten.add(copy);
                    matched = true;
                }
            }
            if !matched {
                rewritten.add(style);
            }
        }

        let ignored = ignored
            .iter()
            .flat_map(|token| utilities[token].iter().map(|(a, v)| format!("{}=\"{}\"", a, v)))
            .collect();
        Ok(Interpreted {
            style_sheet: rewritten.with_origin(FragmentOrigin::Attributify).combine(),
            ignored,
        })
    }

    fn preflight(&mut self, request: &PreflightRequest) -> Result<StyleSheet> {
        if !request.include_base || !self.config.preflight {
            return Ok(StyleSheet::new());
        }

        let full = match (&self.base, request.dev) {
            (Some(base), false) => base.clone(),
            _ => {
                let base = Self::bundle(&mut Self::builder(true))?;
                self.base = Some(base.clone());
                base
            }
        };
        let mut sheet = StyleSheet::new();
        for mut style in full.children {
            if style.meta.group == StyleGroup::Utility {
                style.meta.group = StyleGroup::Base;
            }
            let wanted = if is_document_wide(&style.selector) {
                request.include_global
            } else {
                element_names(&style.selector).iter().any(|e| request.tags.contains(e))
            };
            if !wanted {
                continue;
            }
            style.meta.origin = FragmentOrigin::Preflight;
            sheet.add(style);
        }
        trace!(rules = sheet.len(), tags = request.tags.len(), "preflight");
        Ok(sheet)
    }

    fn resolve_variants(&self) -> Vec<String> {
        TAILWIND_VARIANTS
            .iter()
            .map(|v| v.to_string())
            .chain(self.config.variants.iter().cloned())
            .collect()
    }
}
