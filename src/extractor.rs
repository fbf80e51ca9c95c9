//! Discovery of class-bearing text in a parsed component.
//!
//! Extraction never mutates source and never fails: every [`Extraction`]
//! carries the byte span it came from so the caller can rewrite markup later.

use crate::expression::collect_class_literals;
use crate::markup::{Attribute, Document, Element, Node, Span, ValuePart};
use crate::variant::resolve_alias;
use std::collections::HashSet;

/// Attributes that hold class text directly
pub const CLASS_ATTRIBUTES: &[&str] = &["class", "tw"];

/// Attributes never interpreted as attributify utilities or variants
pub const RESERVED_ATTRIBUTES: &[&str] = &[
    "class", "tw", "style", "href", "src", "srcset", "id", "ref", "this", "key", "name", "type",
    "value", "alt", "title", "width", "height", "for", "slot", "lang", "role", "placeholder",
    "target", "rel", "action", "method", "content", "charset", "xmlns", "viewBox", "d", "points",
    "disabled", "checked", "selected", "required", "readonly", "open", "hidden", "tabindex",
    "autocomplete", "autofocus", "form", "label", "media", "sizes", "loading", "colspan",
    "rowspan", "min", "max", "step", "pattern", "accept", "download", "context", "module",
    "http-equiv", "property", "crossorigin", "integrity",
];

const RESERVED_PREFIXES: &[&str] = &["data-", "aria-", "on", "xlink:", "xml"];

/// Where a piece of class text was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionSite {
    /// `class` or `tw` attribute. `interpolated` is set for `{...}` value parts.
    ClassAttribute { interpolated: bool },
    /// Attribute named after a variant, e.g. `md="p-4"`
    VariantDirective { variant: String },
    /// `class:name` toggle directive
    ClassDirective,
    /// Any other static attribute, e.g. `bg="red-500"`
    AttributifyAttribute { attribute: String },
    /// Both branches of a `cond ? 'a' : 'b'` expression
    ConditionalExpression,
    /// Content of a `windi`/`tw` tagged template
    TaggedLiteral,
}

/// Merge precedence class of extracted tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenOrigin {
    ClassAttribute,
    VariantDirective,
    ClassDirective,
    AttributifyAttribute,
    ConditionalExpression,
}

impl ExtractionSite {
    pub fn origin(&self) -> TokenOrigin {
        match self {
            ExtractionSite::ClassAttribute { .. } => TokenOrigin::ClassAttribute,
            ExtractionSite::VariantDirective { .. } => TokenOrigin::VariantDirective,
            ExtractionSite::ClassDirective => TokenOrigin::ClassDirective,
            ExtractionSite::AttributifyAttribute { .. } => TokenOrigin::AttributifyAttribute,
            ExtractionSite::ConditionalExpression | ExtractionSite::TaggedLiteral => {
                TokenOrigin::ConditionalExpression
            }
        }
    }
}

/// One piece of raw class text
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub site: ExtractionSite,
    pub raw: String,
    pub span: Span,
    /// Span of the whole attribute, for attribute sites
    pub attribute: Option<Span>,
    /// Index of the owning element in document order, for attribute sites
    pub element: Option<usize>,
}

/// Walks a document and yields extractions for every supported syntax form
#[derive(Debug, Clone)]
pub struct TokenExtractor {
    variants: HashSet<String>,
    attributify: bool,
    excluded: HashSet<String>,
}

impl TokenExtractor {
    pub fn new<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut variants: HashSet<String> = variants.into_iter().map(Into::into).collect();
        variants.insert("xxl".to_string());
        Self {
            variants,
            attributify: true,
            excluded: HashSet::new(),
        }
    }

    pub fn with_attributify(mut self, enabled: bool) -> Self {
        self.attributify = enabled;
        self
    }

    /// Extend the reserved attribute list
    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn is_variant(&self, name: &str) -> bool {
        self.variants.contains(name)
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        RESERVED_ATTRIBUTES.contains(&name)
            || self.excluded.contains(name)
            || RESERVED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
    }

    pub fn extract(&self, document: &Document) -> Vec<Extraction> {
        let mut extractions = Vec::new();
        let mut element_index = 0;
        document.walk(&mut |node| match node {
            Node::Element(element) => {
                self.extract_element(element, element_index, &mut extractions);
                element_index += 1;
            }
            Node::Expression(tag) => {
                Self::extract_expression(&tag.source, tag.span, &mut extractions);
            }
            Node::Text(_) | Node::Comment(_) => {}
        });
        extractions
    }

    fn extract_element(&self, element: &Element, index: usize, out: &mut Vec<Extraction>) {
        let component = is_component(&element.name);
        for attribute in &element.attributes {
            for part in attribute.parts() {
                if let ValuePart::Expression { source, span } = part {
                    Self::extract_expression(source, *span, out);
                }
            }
            if component {
                continue;
            }
            if let Some(site) = self.classify(attribute) {
                self.push_attribute(site, attribute, index, out);
            }
        }
    }

    /// Decide which handler an attribute belongs to. Reserved names are
    /// checked before variant names so `placeholder` never reads as a variant.
    fn classify(&self, attribute: &Attribute) -> Option<ExtractionSite> {
        let name = attribute.name.as_str();
        if name.is_empty() {
            return None;
        }
        if CLASS_ATTRIBUTES.contains(&name) {
            return Some(ExtractionSite::ClassAttribute { interpolated: false });
        }
        if let Some((prefix, directive)) = attribute.directive() {
            return (prefix == "class" && !directive.is_empty()).then_some(ExtractionSite::ClassDirective);
        }
        if self.is_reserved(name) {
            return None;
        }
        attribute.static_value()?;
        if self.is_variant(name) {
            return Some(ExtractionSite::VariantDirective {
                variant: resolve_alias(name).to_string(),
            });
        }
        self.attributify.then(|| ExtractionSite::AttributifyAttribute {
            attribute: name.to_string(),
        })
    }

    fn push_attribute(&self, site: ExtractionSite, attribute: &Attribute, index: usize, out: &mut Vec<Extraction>) {
        match site {
            ExtractionSite::ClassAttribute { .. } => {
                for part in attribute.parts() {
                    let (raw, span, interpolated) = match part {
                        ValuePart::Text { data, span } => (data.clone(), *span, false),
                        ValuePart::Expression { source, span } => (format!("{{{}}}", source), *span, true),
                    };
                    if raw.trim().is_empty() {
                        continue;
                    }
                    out.push(Extraction {
                        site: ExtractionSite::ClassAttribute { interpolated },
                        raw,
                        span,
                        attribute: Some(attribute.span),
                        element: Some(index),
                    });
                }
            }
            ExtractionSite::ClassDirective => {
                if let Some((_, name)) = attribute.directive() {
                    out.push(Extraction {
                        site,
                        raw: name.to_string(),
                        span: attribute.span,
                        attribute: Some(attribute.span),
                        element: Some(index),
                    });
                }
            }
            ExtractionSite::VariantDirective { .. } | ExtractionSite::AttributifyAttribute { .. } => {
                if let Some(raw) = attribute.static_value() {
                    if !raw.trim().is_empty() || matches!(site, ExtractionSite::AttributifyAttribute { .. }) {
                        out.push(Extraction {
                            site,
                            raw,
                            span: attribute.span,
                            attribute: Some(attribute.span),
                            element: Some(index),
                        });
                    }
                }
            }
            ExtractionSite::ConditionalExpression | ExtractionSite::TaggedLiteral => {}
        }
    }

    fn extract_expression(source: &str, span: Span, out: &mut Vec<Extraction>) {
        let literals = collect_class_literals(source);
        for raw in literals.conditionals {
            out.push(Extraction {
                site: ExtractionSite::ConditionalExpression,
                raw,
                span,
                attribute: None,
                element: None,
            });
        }
        for raw in literals.tagged {
            out.push(Extraction {
                site: ExtractionSite::TaggedLiteral,
                raw,
                span,
                attribute: None,
                element: None,
            });
        }
    }
}

/// Components and special elements take props, not attributes
pub fn is_component(name: &str) -> bool {
    name.contains(':') || name.chars().next().map_or(false, |c| c.is_ascii_uppercase())
}
