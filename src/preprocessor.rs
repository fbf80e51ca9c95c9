//! The per-file pipeline: parse, extract, compile, compose, write.

use crate::compiler::{AttributifyMap, PreflightRequest, TailwindCompiler, UtilityCompiler};
use crate::composer::{compose, globalize};
use crate::config::{CompilerConfig, PreprocessOptions};
use crate::css_parser::{self, APPLY_DIRECTIVE};
use crate::errors::{PreprocessError, Result};
use crate::extractor::{is_component, Extraction, ExtractionSite, TokenExtractor};
use crate::markup::{self, Document, Span};
use crate::normalizer::{normalize, TokenSet};
use crate::output::{inject_style, write_bundle};
use crate::registry::Session;
use crate::selector::escape_class;
use crate::splice::SourceEditor;
use crate::stylesheet::{Declaration, FragmentOrigin, StyleSheet};
use crate::variant::tagged_tokens;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

/// Output of one `process` call
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    /// Transformed component source
    pub code: String,
    /// Stylesheet composed for this file
    pub css: String,
    /// Tokens left unresolved in this pass
    pub ignored: Vec<String>,
}

/// Class-bearing attributes of one element, gathered for rewriting
#[derive(Default)]
struct ElementClasses {
    attributes: Vec<Span>,
    tokens: TokenSet,
    interpolated: Vec<String>,
    interpolated_tokens: TokenSet,
}

/// Style fragments collected while processing one file
#[derive(Default)]
struct Fragments {
    author: StyleSheet,
    main: Vec<StyleSheet>,
    directive: StyleSheet,
    attributify: StyleSheet,
    ignored: Vec<String>,
}

pub struct Preprocessor<C: UtilityCompiler> {
    options: PreprocessOptions,
    config: CompilerConfig,
    compiler: C,
    extractor: TokenExtractor,
    session: Session,
}

impl Preprocessor<TailwindCompiler> {
    /// Build a preprocessor backed by `tailwind-rs`
    pub fn from_options(options: PreprocessOptions) -> Result<Self> {
        let config = options.compiler_config()?;
        let compiler = TailwindCompiler::new(config.clone());
        Self::with_config(options, config, compiler)
    }
}

impl<C: UtilityCompiler> Preprocessor<C> {
    pub fn new(options: PreprocessOptions, compiler: C) -> Result<Self> {
        let config = options.compiler_config()?;
        Self::with_config(options, config, compiler)
    }

    pub fn with_config(options: PreprocessOptions, config: CompilerConfig, compiler: C) -> Result<Self> {
        options
            .validate()
            .map_err(|message| PreprocessError::ConfigError { message })?;
        let mut session = Session::new();
        session.set_variants(compiler.resolve_variants());
        let extractor = Self::build_extractor(&config, session.variants());
        let preprocessor = Self {
            options,
            config,
            compiler,
            extractor,
            session,
        };
        preprocessor.log_banner();
        Ok(preprocessor)
    }

    fn build_extractor(config: &CompilerConfig, variants: &[String]) -> TokenExtractor {
        TokenExtractor::new(variants.iter().cloned())
            .with_attributify(config.attributify)
            .exclude(config.exclude_attributes.iter().cloned())
    }

    fn log_banner(&self) {
        info!(
            mode = if self.options.dev { "development" } else { "production" },
            compilation = self.options.compile,
            prefix = self.options.prefix.as_str(),
            bundle = ?self.options.bundle,
            "windi-preprocess ready"
        );
    }

    /// Replace options and compiler, clearing all session state
    pub fn reconfigure(&mut self, options: PreprocessOptions, compiler: C) -> Result<()> {
        let config = options.compiler_config()?;
        options
            .validate()
            .map_err(|message| PreprocessError::ConfigError { message })?;
        self.session.reset();
        self.session.set_variants(compiler.resolve_variants());
        self.extractor = Self::build_extractor(&config, self.session.variants());
        self.options = options;
        self.config = config;
        self.compiler = compiler;
        debug!("session reset");
        self.log_banner();
        Ok(())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn options(&self) -> &PreprocessOptions {
        &self.options
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Forget a file. In bundle mode the bundle is rewritten without it; if
    /// that write fails the file stays in the session.
    pub fn drop_file(&mut self, filename: &str) -> Result<bool> {
        let snapshot = self.session.clone();
        if !self.session.drop_file(filename) {
            return Ok(false);
        }
        if let Some(path) = &self.options.bundle {
            if let Err(e) = write_bundle(path, &self.session.bundle_union().build(true)) {
                warn!(file = filename, error = %e, "bundle write failed");
                self.session = snapshot;
                return Err(e);
            }
        }
        Ok(true)
    }

    /// Transform one component
    pub fn process(&mut self, content: &str, filename: &str) -> Result<Processed> {
        let document = markup::parse(content).map_err(|e| PreprocessError::ParseError {
            path: filename.to_string(),
            message: e.to_string(),
        })?;
        let mut editor = SourceEditor::new(content);
        let mut fragments = Fragments::default();

        if let Some(style) = document.style_block() {
            if let Some(raw) = style.raw {
                let author = css_parser::parse(&content[raw.start..raw.end]).map_err(|e| {
                    PreprocessError::StyleError {
                        path: filename.to_string(),
                        message: e.to_string(),
                    }
                })?;
                let (author, ignored) = self.expand_apply(author)?;
                fragments.author = author.with_origin(FragmentOrigin::AuthorStyle);
                fragments.ignored.extend(ignored);
            }
            editor.remove(style.span.start, style.span.end);
        }

        let extractions = self.extractor.extract(&document);
        self.rewrite_classes(&extractions, &mut editor, &mut fragments)?;
        self.interpret_directives(&extractions, &mut fragments)?;
        self.interpret_attributify(&extractions, &mut fragments)?;

        // nothing below may leave the session half updated
        let snapshot = self.session.clone();
        match self.commit(filename, &document, fragments, &mut editor) {
            Ok((css, ignored)) => Ok(Processed {
                code: editor.finish(),
                css,
                ignored,
            }),
            Err(e) => {
                self.session = snapshot;
                Err(e)
            }
        }
    }

    /// Register the file in the session, add its base rules, compose and
    /// write its stylesheet
    fn commit(
        &mut self,
        filename: &str,
        document: &Document,
        fragments: Fragments,
        editor: &mut SourceEditor<'_>,
    ) -> Result<(String, Vec<String>)> {
        let tags = element_tags(document);
        let claimed = self.session.register_tags(filename, tags.iter().map(String::as_str));
        let request = PreflightRequest {
            tags: self
                .session
                .owned_tags(filename)
                .into_iter()
                .filter(|tag| !is_component(tag))
                .collect(),
            include_base: self.config.preflight,
            include_global: self.session.is_first_file(filename),
            dev: self.options.dev,
        };
        let preflight = self.compiler.preflight(&request)?;
        let preflight = self.session.claim_base_rules(filename, preflight, self.options.dev);
        let preflight = self.session.record_preflight(filename, preflight);

        let composed = self.compose(preflight, fragments.author, fragments.directive, fragments.attributify, fragments.main);
        let ignored = fragments.ignored;
        if self.options.debug {
            info!(file = filename, ignored = ?ignored, rules = composed.len(), "component diagnostics");
        } else if !ignored.is_empty() {
            debug!(file = filename, ignored = ?ignored, "unresolved classes");
        }
        self.session.record_ignored(ignored.iter().cloned());
        self.session.set_stylesheet(filename, composed.clone());

        let css = if let Some(path) = &self.options.bundle {
            if let Err(e) = write_bundle(path, &self.session.bundle_union().build(true)) {
                warn!(file = filename, error = %e, "bundle write failed");
                return Err(e);
            }
            composed.build(true)
        } else {
            let css = composed.build(self.options.minify);
            inject_style(editor, &css);
            css
        };

        debug!(
            file = filename,
            claimed = claimed.len(),
            rules = composed.len(),
            "processed component"
        );
        Ok((css, ignored))
    }

    fn compose(
        &self,
        preflight: StyleSheet,
        author: StyleSheet,
        directive: StyleSheet,
        attributify: StyleSheet,
        main: Vec<StyleSheet>,
    ) -> StyleSheet {
        let inject = !self.options.is_bundle();
        let preflight = if inject && self.options.global_preflight {
            globalize(preflight)
        } else {
            preflight
        };
        let utilities = |sheet: StyleSheet| {
            if inject && self.options.global_utility {
                globalize(sheet)
            } else {
                sheet
            }
        };
        let mut fragments = vec![preflight, author, utilities(directive), utilities(attributify)];
        fragments.extend(main.into_iter().map(utilities));
        compose(fragments)
    }

    /// Replace `@apply` lines in author rules with the declarations of the
    /// applied utilities
    fn expand_apply(&mut self, mut sheet: StyleSheet) -> Result<(StyleSheet, Vec<String>)> {
        let mut ignored = Vec::new();
        for style in &mut sheet.children {
            if !style.declarations.iter().any(|d| d.property == APPLY_DIRECTIVE) {
                continue;
            }
            let mut expanded = Vec::new();
            for declaration in std::mem::take(&mut style.declarations) {
                if declaration.property != APPLY_DIRECTIVE {
                    expanded.push(declaration);
                    continue;
                }
                let tokens = normalize(&declaration.value);
                let interpreted = self.compiler.interpret(&tokens)?;
                ignored.extend(interpreted.ignored);
                for token in &tokens {
                    let selector = format!(".{}", escape_class(token));
                    let declarations: Vec<Declaration> = interpreted
                        .style_sheet
                        .children
                        .iter()
                        .filter(|rule| rule.at_rules.is_empty() && rule.selector == selector)
                        .flat_map(|rule| rule.declarations.iter().cloned())
                        .collect();
                    for declaration in declarations {
                        if !expanded.contains(&declaration) {
                            expanded.push(declaration);
                        }
                    }
                }
            }
            style.declarations = expanded;
        }
        Ok((sheet, ignored))
    }

    /// Rewrite class, `tw` and variant attributes of each element into one
    /// `class` attribute and compile or interpret their tokens
    fn rewrite_classes(
        &mut self,
        extractions: &[Extraction],
        editor: &mut SourceEditor<'_>,
        fragments: &mut Fragments,
    ) -> Result<()> {
        let mut elements: IndexMap<usize, ElementClasses> = IndexMap::new();
        for extraction in extractions {
            let (Some(index), Some(attribute)) = (extraction.element, extraction.attribute) else {
                continue;
            };
            let classes = match &extraction.site {
                ExtractionSite::ClassAttribute { .. } | ExtractionSite::VariantDirective { .. } => {
                    elements.entry(index).or_default()
                }
                _ => continue,
            };
            if !classes.attributes.contains(&attribute) {
                classes.attributes.push(attribute);
            }
            match &extraction.site {
                ExtractionSite::ClassAttribute { interpolated: false } => {
                    classes.tokens.extend(normalize(&extraction.raw));
                }
                ExtractionSite::ClassAttribute { interpolated: true } => {
                    classes.interpolated.push(extraction.raw.clone());
                    classes.interpolated_tokens.extend(normalize(&extraction.raw));
                }
                ExtractionSite::VariantDirective { variant } => {
                    classes.tokens.extend(tagged_tokens(&extraction.raw, variant));
                }
                _ => {}
            }
        }

        let mut interpreted_tokens = TokenSet::new();
        for classes in elements.into_values() {
            let Some(first) = classes.attributes.iter().map(|span| span.start).min() else {
                continue;
            };
            for span in &classes.attributes {
                editor.remove(span.start, span.end);
            }

            let mut value: Vec<String> = if self.options.compile {
                let compiled = self
                    .compiler
                    .compile(&classes.tokens, &self.options.prefix, self.options.hash_class_names)?;
                fragments.ignored.extend(compiled.ignored.iter().cloned());
                let class_list = compiled.class_list();
                fragments.main.push(compiled.style_sheet);
                if class_list.is_empty() {
                    Vec::new()
                } else {
                    vec![class_list]
                }
            } else {
                interpreted_tokens.extend(classes.tokens.iter().cloned());
                classes.tokens.iter().cloned().collect()
            };
            interpreted_tokens.extend(classes.interpolated_tokens);
            value.extend(classes.interpolated);

            if !value.is_empty() {
                editor.prepend_left(first, format!("class=\"{}\"", value.join(" ")));
            }
        }

        if !interpreted_tokens.is_empty() {
            let interpreted = self.compiler.interpret(&interpreted_tokens)?;
            fragments.ignored.extend(interpreted.ignored);
            fragments.main.push(interpreted.style_sheet);
        }
        Ok(())
    }

    /// Class-toggle directives and expression literals
    fn interpret_directives(&mut self, extractions: &[Extraction], fragments: &mut Fragments) -> Result<()> {
        let tokens: TokenSet = extractions
            .iter()
            .filter(|e| {
                matches!(
                    e.site,
                    ExtractionSite::ClassDirective
                        | ExtractionSite::ConditionalExpression
                        | ExtractionSite::TaggedLiteral
                )
            })
            .flat_map(|e| normalize(&e.raw))
            .collect();
        if tokens.is_empty() {
            return Ok(());
        }
        let interpreted = self.compiler.interpret(&tokens)?;
        fragments.ignored.extend(interpreted.ignored);
        fragments.directive = interpreted.style_sheet.with_origin(FragmentOrigin::Directive);
        Ok(())
    }

    fn interpret_attributify(&mut self, extractions: &[Extraction], fragments: &mut Fragments) -> Result<()> {
        let mut attributes = AttributifyMap::new();
        for extraction in extractions {
            if let ExtractionSite::AttributifyAttribute { attribute } = &extraction.site {
                // values are kept as written: `~` selects the bare utility
                let tokens: TokenSet = extraction.raw.split_whitespace().map(str::to_string).collect();
                if !tokens.is_empty() {
                    attributes.entry(attribute.clone()).or_default().extend(tokens);
                }
            }
        }
        if attributes.is_empty() {
            return Ok(());
        }
        let interpreted = self.compiler.attributify(&attributes)?;
        fragments.ignored.extend(interpreted.ignored);
        fragments.attributify = interpreted.style_sheet.with_origin(FragmentOrigin::Attributify);
        Ok(())
    }
}

/// Tag names used in a document, in order. Plain elements are lowercased;
/// component names keep their case.
fn element_tags(document: &Document) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for element in document.elements() {
        let name = if is_component(&element.name) {
            element.name.clone()
        } else {
            element.name.to_ascii_lowercase()
        };
        if name.starts_with('!') || name == "script" || name == "style" {
            continue;
        }
        if !tags.contains(&name) {
            tags.push(name);
        }
    }
    tags
}
