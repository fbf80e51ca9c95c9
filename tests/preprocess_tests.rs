mod common;

use common::{DedupCompiler, FakeCompiler};
use std::fs;
use tempfile::TempDir;
use windi_preprocess::{CompilerConfig, CompilerConfigSource, PreprocessError, PreprocessOptions, Preprocessor};

fn inject(compile: bool) -> Preprocessor<FakeCompiler> {
    let options = PreprocessOptions {
        compile,
        ..PreprocessOptions::default()
    };
    Preprocessor::new(options, FakeCompiler).unwrap()
}

fn bundled(dir: &TempDir) -> Preprocessor<FakeCompiler> {
    Preprocessor::new(bundle_options(dir), FakeCompiler).unwrap()
}

fn bundle_options(dir: &TempDir) -> PreprocessOptions {
    PreprocessOptions {
        bundle: Some(dir.path().join("bundle.css")),
        ..PreprocessOptions::default()
    }
}

fn bundle_text(dir: &TempDir) -> String {
    fs::read_to_string(dir.path().join("bundle.css")).unwrap()
}

#[test]
fn test_injected_component_snapshot() {
    let options = PreprocessOptions {
        compile: false,
        config: Some(CompilerConfigSource::Inline(CompilerConfig {
            preflight: false,
            ..CompilerConfig::default()
        })),
        ..PreprocessOptions::default()
    };
    let mut pre = Preprocessor::new(options, FakeCompiler).unwrap();

    let out = pre.process("<div class=\"p-4 m-2\">x</div>\n", "App.svelte").unwrap();
    insta::assert_snapshot!(out.code, @r###"
<div class="p-4 m-2">x</div>

<style>
:global(.m-2) {
  --token: m-2;
}
:global(.p-4) {
  --token: p-4;
}
</style>
"###);
}

#[test]
fn test_compile_mode_merges_class_and_variant_attributes() {
    let mut pre = inject(true);
    let out = pre
        .process(r#"<p class="p-4 card" sm="m-2" md="(p-1 font-bold)">hi</p>"#, "A.svelte")
        .unwrap();
    assert_eq!(out.code.matches("class=").count(), 1, "{}", out.code);
    assert!(out.code.contains(r#"class="windi-p-4_sm:m-2_md:p-1_md:font-bold card""#), "{}", out.code);
    assert!(!out.code.contains("sm="));
    assert_eq!(out.ignored, vec!["card".to_string()]);
}

#[test]
fn test_tag_ownership_survives_reprocessing() {
    let mut pre = inject(true);
    pre.process("<div><p>a</p></div>", "A.svelte").unwrap();
    let b = pre.process("<div><span>b</span></div>", "B.svelte").unwrap();
    assert_eq!(pre.session().tag_owner("div"), Some("A.svelte"));
    assert_eq!(pre.session().tag_owner("span"), Some("B.svelte"));
    // B only gets base rules for what it owns
    assert!(b.css.contains("--base: span"));
    assert!(!b.css.contains("--base: div"));
    assert!(!b.css.contains("box-sizing"));

    // reprocessing A without its div does not hand the tag over
    pre.process("<p>a</p>", "A.svelte").unwrap();
    let b = pre.process("<div><span>b</span></div>", "B.svelte").unwrap();
    assert_eq!(pre.session().tag_owner("div"), Some("A.svelte"));
    assert!(!b.css.contains("--base: div"));
}

#[test]
fn test_first_file_gets_global_base_rules() {
    let mut pre = inject(true);
    let a = pre.process("<div></div>", "A.svelte").unwrap();
    assert!(a.css.contains(":global(*)"), "{}", a.css);
    let again = pre.process("<div></div>", "A.svelte").unwrap();
    assert!(again.css.contains(":global(*)"));
}

#[test]
fn test_conditional_expression_compiles_both_branches() {
    let mut pre = inject(true);
    let out = pre
        .process("<div class:active={on}>{on ? 'p-1' : 'm-3'}</div>", "A.svelte")
        .unwrap();
    assert!(out.css.contains(r":global(.p-1)"), "{}", out.css);
    assert!(out.css.contains(r":global(.m-3)"), "{}", out.css);
    assert!(out.ignored.contains(&"active".to_string()));
}

#[test]
fn test_bundle_is_superset_of_processed_files() {
    let dir = TempDir::new().unwrap();
    let mut pre = bundled(&dir);
    let a = pre.process(r#"<div class="p-1">a</div><style>.x{color:red}</style>"#, "A.svelte").unwrap();
    let b = pre.process(r#"<span class="m-2">b</span>"#, "B.svelte").unwrap();

    // styles never go back into the component in bundle mode
    assert!(!a.code.contains("<style>"));
    assert!(!b.code.contains("<style>"));

    let bundle = fs::read_to_string(dir.path().join("bundle.css")).unwrap();
    for rule in a.css.split('}').chain(b.css.split('}')).filter(|r| !r.is_empty()) {
        assert!(bundle.contains(rule), "missing {rule} in {bundle}");
    }
    // bundle rules are not made global
    assert!(!bundle.contains(":global"));
}

#[test]
fn test_reprocessing_replaces_file_contribution_in_bundle() {
    let dir = TempDir::new().unwrap();
    let mut pre = bundled(&dir);
    pre.process(r#"<div class="p-1"></div>"#, "A.svelte").unwrap();
    pre.process(r#"<div class="p-9"></div>"#, "A.svelte").unwrap();
    let bundle = fs::read_to_string(dir.path().join("bundle.css")).unwrap();
    assert!(bundle.contains("p-9"));
    assert!(!bundle.contains("p-1"));
}

#[test]
fn test_drop_file_rewrites_bundle() {
    let dir = TempDir::new().unwrap();
    let mut pre = bundled(&dir);
    pre.process(r#"<div class="p-1"></div>"#, "A.svelte").unwrap();
    pre.process(r#"<span class="m-2"></span>"#, "B.svelte").unwrap();
    assert!(pre.drop_file("A.svelte").unwrap());
    assert!(!pre.drop_file("A.svelte").unwrap());

    let bundle = fs::read_to_string(dir.path().join("bundle.css")).unwrap();
    assert!(!bundle.contains("p-1"));
    assert!(bundle.contains("m-2"));
    assert_eq!(pre.session().tag_owner("div"), None);
}

#[test]
fn test_malformed_markup_leaves_session_untouched() {
    let mut pre = inject(true);
    pre.process("<div></div>", "A.svelte").unwrap();
    let err = pre.process("<section><b></section>", "B.svelte").unwrap_err();
    assert!(matches!(err, PreprocessError::ParseError { .. }));
    assert!(!pre.session().contains("B.svelte"));
    assert_eq!(pre.session().tag_owner("section"), None);
}

#[test]
fn test_ignored_tokens_accumulate_across_files() {
    let mut pre = inject(true);
    pre.process(r#"<div class="p-1 card"></div>"#, "A.svelte").unwrap();
    pre.process(r#"<div class="shadowy m-1"></div>"#, "B.svelte").unwrap();
    let ignored: Vec<_> = pre.session().ignored().iter().cloned().collect();
    assert_eq!(ignored, vec!["card", "shadowy"]);
}

#[test]
fn test_component_tags_stay_with_first_writer() {
    let mut pre = inject(true);
    let a = pre.process("<Foo/><p>a</p>", "A.svelte").unwrap();
    let b = pre.process("<Foo/><p>b</p>", "B.svelte").unwrap();
    pre.process("<Foo/><p>a</p>", "A.svelte").unwrap();

    assert_eq!(pre.session().tag_owner("Foo"), Some("A.svelte"));
    assert!(pre.session().files()["A.svelte"].tags.contains("Foo"));
    assert!(pre.session().files()["B.svelte"].tags.is_empty());
    // components have no base rules of their own
    assert!(!a.css.contains("--base: Foo"));
    assert!(!b.css.contains("Foo"));
}

#[test]
fn test_reprocessing_keeps_base_rules_from_deduping_compiler() {
    let dir = TempDir::new().unwrap();
    let mut pre = Preprocessor::new(bundle_options(&dir), DedupCompiler::default()).unwrap();
    pre.process(r#"<div class="p-1"></div>"#, "A.svelte").unwrap();
    pre.process(r#"<span class="m-2"></span>"#, "B.svelte").unwrap();
    let again = pre.process(r#"<div class="p-2"></div>"#, "A.svelte").unwrap();

    assert!(again.css.contains("box-sizing:border-box"), "{}", again.css);
    assert!(again.css.contains("--base:div"), "{}", again.css);
    let bundle = bundle_text(&dir);
    for rule in ["box-sizing:border-box", "--base:div", "--base:span", "p-2"] {
        assert!(bundle.contains(rule), "missing {rule} in {bundle}");
    }
    assert!(!bundle.contains("p-1"));
}

#[test]
fn test_injected_reprocess_keeps_base_rules_from_deduping_compiler() {
    let mut pre = Preprocessor::new(PreprocessOptions::default(), DedupCompiler::default()).unwrap();
    pre.process("<div></div>", "A.svelte").unwrap();
    let again = pre.process("<div></div>", "A.svelte").unwrap();
    assert!(again.css.contains(":global(*)"), "{}", again.css);
    assert!(again.css.contains("--base: div"), "{}", again.css);
}

#[test]
fn test_dropping_first_file_hands_base_rules_over() {
    let dir = TempDir::new().unwrap();
    let mut pre = Preprocessor::new(bundle_options(&dir), DedupCompiler::default()).unwrap();
    pre.process("<div><p>a</p></div>", "A.svelte").unwrap();
    pre.process("<div><span>b</span></div>", "B.svelte").unwrap();
    assert!(pre.drop_file("A.svelte").unwrap());

    assert_eq!(pre.session().tag_owner("div"), Some("B.svelte"));
    assert_eq!(pre.session().tag_owner("p"), None);
    let bundle = bundle_text(&dir);
    for rule in ["box-sizing:border-box", "--base:div", "--base:span"] {
        assert!(bundle.contains(rule), "missing {rule} in {bundle}");
    }
    assert!(!bundle.contains("--base:p"));

    // B now holds the document-wide rules across its own reprocessing
    let b = pre.process("<div><span>b</span></div>", "B.svelte").unwrap();
    assert!(b.css.contains("box-sizing:border-box"), "{}", b.css);
}

#[test]
fn test_failed_bundle_write_leaves_session_untouched() {
    let dir = TempDir::new().unwrap();
    let bundle = dir.path().join("bundle.css");
    // a directory in the way makes the rename fail
    fs::create_dir(&bundle).unwrap();
    let mut pre = bundled(&dir);
    let source = r#"<div class="p-1 card"></div>"#;

    let err = pre.process(source, "A.svelte").unwrap_err();
    assert!(matches!(err, PreprocessError::OutputError { .. }), "{err:?}");
    assert!(!pre.session().contains("A.svelte"));
    assert_eq!(pre.session().tag_owner("div"), None);
    assert!(pre.session().ignored().is_empty());

    fs::remove_dir(&bundle).unwrap();
    pre.process(source, "A.svelte").unwrap();
    let css = bundle_text(&dir);
    for rule in ["box-sizing:border-box", "--base:div", "--token:p-1"] {
        assert!(css.contains(rule), "missing {rule} in {css}");
    }
    assert_eq!(pre.session().tag_owner("div"), Some("A.svelte"));
    assert!(pre.session().ignored().contains("card"));
}

#[test]
fn test_attributify_values_reach_the_compiler_as_written() {
    let mut pre = inject(true);
    let out = pre
        .process(r#"<div border="~ t-2" bg="red">x</div>"#, "A.svelte")
        .unwrap();
    // attributify attributes stay on the element
    assert!(out.code.contains(r#"border="~ t-2""#), "{}", out.code);
    assert!(out.css.contains(r#"[border~="~"]"#), "{}", out.css);
    assert!(out.css.contains("--token: border;"), "{}", out.css);
    assert!(out.css.contains(r#"[border~="t-2"]"#), "{}", out.css);
    assert!(out.css.contains("--token: border-t-2;"), "{}", out.css);
    assert_eq!(out.ignored, vec![r#"bg="red""#.to_string()]);
}

#[test]
fn test_tagged_literal_is_interpreted() {
    let mut pre = inject(true);
    let out = pre
        .process("<div>{windi`p-1 md:m-2 fancy`}</div>", "A.svelte")
        .unwrap();
    assert!(out.css.contains(":global(.p-1)"), "{}", out.css);
    assert!(out.css.contains(r":global(.md\:m-2)"), "{}", out.css);
    assert!(out.ignored.contains(&"fancy".to_string()));
    // the literal itself is left for the runtime
    assert!(out.code.contains("{windi`p-1 md:m-2 fancy`}"));
}

#[test]
fn test_element_order_does_not_change_css() {
    let forward = r#"<p class="m-2 font-bold" md="p-1"></p><div class="p-4"><span></span></div>"#;
    let permuted = r#"<div class="p-4"><span></span></div><p class="m-2 font-bold" md="p-1"></p>"#;
    for compile in [false, true] {
        let a = inject(compile).process(forward, "A.svelte").unwrap();
        let b = inject(compile).process(permuted, "A.svelte").unwrap();
        assert_eq!(a.css, b.css, "compile = {compile}");
    }
}
