//! Class literals inside embedded `{...}` expressions, read with swc.
//!
//! Only two shapes matter: conditionals, whose branches both contribute their
//! string literals, and templates tagged `windi` or `tw`.

use swc_core::common::{FileName, Globals, SourceMap, GLOBALS};
use swc_core::common::sync::Lrc;
use swc_core::ecma::ast::*;
use swc_core::ecma::parser::{parse_file_as_expr, Syntax, TsSyntax};
use swc_core::ecma::visit::{Visit, VisitWith};
use tracing::trace;

/// Tags whose template literal content is class text
pub const CLASS_TEMPLATE_TAGS: &[&str] = &["windi", "tw"];

/// Class-bearing literals found in one embedded expression
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpressionLiterals {
    /// One entry per conditional: both branches' deepest literals joined
    pub conditionals: Vec<String>,
    /// Content of `windi`/`tw` tagged templates
    pub tagged: Vec<String>,
}

impl ExpressionLiterals {
    pub fn is_empty(&self) -> bool {
        self.conditionals.is_empty() && self.tagged.is_empty()
    }
}

#[derive(Clone, Copy)]
enum Branch {
    Consequent,
    Alternate,
}

/// Visitor collecting conditional branches and tagged class templates
#[derive(Default)]
struct ClassLiteralCollector {
    literals: ExpressionLiterals,
}

impl ClassLiteralCollector {
    /// Follow `branch` through nested conditionals and parentheses to a literal
    fn deepest_literal(expr: &Expr, branch: Branch) -> Option<String> {
        match expr {
            Expr::Lit(Lit::Str(s)) => Some(s.value.to_string()),
            Expr::Tpl(tpl) if tpl.exprs.is_empty() => Some(template_text(tpl)),
            Expr::Paren(paren) => Self::deepest_literal(&paren.expr, branch),
            Expr::Cond(cond) => match branch {
                Branch::Consequent => Self::deepest_literal(&cond.cons, branch),
                Branch::Alternate => Self::deepest_literal(&cond.alt, branch),
            },
            _ => None,
        }
    }
}

fn template_text(tpl: &Tpl) -> String {
    let mut text = String::new();
    for quasi in &tpl.quasis {
        if let Some(cooked) = &quasi.cooked {
            text.push_str(&cooked.to_string());
        } else {
            text.push_str(&quasi.raw);
        }
        text.push(' ');
    }
    text.trim_end().to_string()
}

impl Visit for ClassLiteralCollector {
    fn visit_cond_expr(&mut self, node: &CondExpr) {
        let branches: Vec<String> = [
            Self::deepest_literal(&node.cons, Branch::Consequent),
            Self::deepest_literal(&node.alt, Branch::Alternate),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !branches.is_empty() {
            self.literals.conditionals.push(branches.join(" "));
        }
        node.visit_children_with(self);
    }

    fn visit_tagged_tpl(&mut self, node: &TaggedTpl) {
        if let Expr::Ident(tag) = &*node.tag {
            if CLASS_TEMPLATE_TAGS.contains(&&*tag.sym) {
                self.literals.tagged.push(template_text(&node.tpl));
            }
        }
        node.visit_children_with(self);
    }
}

/// Parse an embedded expression and collect its class literals.
///
/// Expressions that do not parse contribute nothing.
pub fn collect_class_literals(source: &str) -> ExpressionLiterals {
    if !source.contains('?') && !source.contains('`') {
        return ExpressionLiterals::default();
    }

    let source_map: Lrc<SourceMap> = Default::default();
    let source_file = source_map.new_source_file(
        FileName::Custom("expression".to_string()).into(),
        source.to_string(),
    );

    let syntax = Syntax::Typescript(TsSyntax {
        tsx: false,
        decorators: false,
        dts: false,
        no_early_errors: true,
        disallow_ambiguous_jsx_like: false,
    });

    let parsed = GLOBALS.set(&Globals::new(), || {
        parse_file_as_expr(&source_file, syntax, EsVersion::latest(), None, &mut vec![])
    });

    match parsed {
        Ok(expr) => {
            let mut collector = ClassLiteralCollector::default();
            expr.visit_with(&mut collector);
            collector.literals
        }
        Err(e) => {
            trace!(?e, expression = source, "skipping unparsable expression");
            ExpressionLiterals::default()
        }
    }
}
