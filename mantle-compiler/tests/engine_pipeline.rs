//! End-to-end: templates on disk → compiled views → rendered output, plus
//! cache invalidation and batch artifacts.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use mantle_compiler::{artifact, CompiledViewCache, EngineError, ViewEngine};
use mantle_core::{EngineSettings, TemplateId, ViewDescriptor};
use mantle_syntax::{ContentProvider, FileSystemProvider, InMemoryProvider};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).expect("create dir");
    }
    fs::write(path, text).expect("write template");
}

fn site() -> TempDir {
    let tmp = TempDir::new().expect("tmp");
    let root = tmp.path();
    write(root, "home/page.html", "[layer0]<content name=\"head\">[layer0head]</content>");
    write(
        root,
        "shared/layout.html",
        "[layer1top]<content name=\"head\">[layer1head]</content><use content=\"head\"/><use content=\"view\"/>[layer1bottom]",
    );
    write(
        root,
        "shared/site.html",
        "<html><title><use content=\"title\">Untitled</use></title><use content=\"view\"/></html>",
    );
    write(
        root,
        "home/index.html",
        "<extends template=\"site\"/><content name=\"title\">Home</content><p>${name}</p><include file=\"_footer\" year=\"2024\"/>",
    );
    write(root, "shared/_footer.html", "<footer>${year}</footer>");
    tmp
}

fn fs_engine(root: &Path) -> ViewEngine {
    ViewEngine::new(
        Arc::new(FileSystemProvider::new(root)),
        EngineSettings::default(),
        Arc::new(CompiledViewCache::new()),
    )
}

fn render(engine: &ViewEngine, descriptor: &ViewDescriptor, model: serde_json::Value) -> String {
    engine
        .create_instance(descriptor)
        .expect("instance")
        .render_to_string(&model)
        .expect("render")
}

// ---------------------------------------------------------------------------
// 1. Rendering
// ---------------------------------------------------------------------------

#[test]
fn layout_chain_renders_sections_inner_to_outer() {
    let tmp = site();
    let engine = fs_engine(tmp.path());
    let d = engine.descriptor(["home/page.html", "shared/layout.html"]);
    assert_eq!(
        render(&engine, &d, json!({})),
        "[layer1top][layer0head][layer1head][layer0][layer1bottom]"
    );
}

#[test]
fn extends_and_include_compose_into_one_layer() {
    let tmp = site();
    let engine = fs_engine(tmp.path());
    let d = engine.descriptor(["home/index.html"]);
    assert_eq!(
        render(&engine, &d, json!({"name": "Ada"})),
        "<html><title>Home</title><p>Ada</p><footer>2024</footer></html>"
    );

    let entry = engine.get_entry(&d).expect("cached");
    let loaded: Vec<&str> = entry.loaded.iter().map(TemplateId::as_str).collect();
    assert_eq!(loaded, vec!["home/index.html", "shared/_footer.html", "shared/site.html"]);
}

#[test]
fn extended_page_locals_reach_its_sections() {
    let provider = InMemoryProvider::with_templates([
        (
            "page.html",
            "<var t=\"'Hello'\"/><extends template=\"layout\"/><content name=\"title\">${t}</content>${t} body",
        ),
        ("layout.html", "<title><use content=\"title\"/></title><use content=\"view\"/>"),
    ]);
    let engine = ViewEngine::new(
        Arc::new(provider),
        EngineSettings::default(),
        Arc::new(CompiledViewCache::new()),
    );
    let d = engine.descriptor(["page.html"]);
    assert_eq!(render(&engine, &d, json!({})), "<title>Hello</title>Hello body");
}

#[test]
fn every_render_starts_with_empty_sections() {
    let tmp = site();
    let engine = fs_engine(tmp.path());
    let d = engine.descriptor(["home/page.html", "shared/layout.html"]);
    let first = render(&engine, &d, json!({}));
    let second = render(&engine, &d, json!({}));
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// 2. Invalidation
// ---------------------------------------------------------------------------

#[test]
fn invalidating_a_layout_rebuilds_dependents() {
    let tmp = site();
    let engine = fs_engine(tmp.path());
    let index = engine.descriptor(["home/index.html"]);
    let page = engine.descriptor(["home/page.html", "shared/layout.html"]);
    let before = engine.create_entry(&index).expect("index");
    engine.create_entry(&page).expect("page");

    write(tmp.path(), "shared/site.html", "<main><use content=\"view\"/></main>");
    let removed = engine.invalidate(&TemplateId::from("shared/site.html"));
    assert_eq!(removed, vec![index.clone()]);
    assert!(engine.get_entry(&index).is_none());
    assert!(engine.get_entry(&page).is_some());

    let after = engine.create_entry(&index).expect("rebuilt");
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(
        render(&engine, &index, json!({"name": "Ada"})),
        "<main><p>Ada</p><footer>2024</footer></main>"
    );
}

#[test]
fn evict_stale_catches_deleted_includes() {
    let tmp = site();
    let engine = fs_engine(tmp.path());
    let index = engine.descriptor(["home/index.html"]);
    engine.create_entry(&index).expect("index");

    fs::remove_file(tmp.path().join("shared/_footer.html")).expect("remove");
    assert_eq!(engine.evict_stale(), vec![index.clone()]);
    assert!(engine.get_entry(&index).is_none());
}

#[test]
fn syntax_errors_do_not_poison_the_cache() {
    let provider = Arc::new(InMemoryProvider::with_templates([("bad.html", "${a +}")]));
    let engine = ViewEngine::new(
        Arc::clone(&provider) as Arc<dyn ContentProvider>,
        EngineSettings::default(),
        Arc::new(CompiledViewCache::new()),
    );
    let d = engine.descriptor(["bad.html"]);
    let err = engine.create_entry(&d).unwrap_err();
    assert!(err.to_string().contains("bad.html:1:1"), "got: {err}");
    assert!(engine.cache().is_empty());

    provider.add("bad.html", "${a + 1}");
    assert_eq!(render(&engine, &d, json!({"a": 1})), "2");
}

// ---------------------------------------------------------------------------
// 3. Batch compilation
// ---------------------------------------------------------------------------

#[test]
fn batch_artifact_reloads_without_sources() {
    let tmp = site();
    let engine = fs_engine(tmp.path());
    let index = engine.descriptor(["home/index.html"]);
    let page = engine.descriptor(["home/page.html", "shared/layout.html"]);

    let artifact = engine
        .batch_compilation(&[index.clone(), page.clone(), index.clone()])
        .expect("batch");
    assert_eq!(artifact.len(), 2);
    assert_eq!(engine.cache().len(), 2);
    let unit = artifact.find(&index).expect("index unit");
    assert!(unit.class_name.starts_with("View_"));
    assert!(unit.source.contains("layer 0 home/index.html"));

    let path = tmp.path().join("build").join("views.json");
    artifact::save_at(&path, &artifact).expect("save");
    let loaded = artifact::load_at(&path).expect("load");

    let offline = ViewEngine::new(
        Arc::new(InMemoryProvider::new()),
        EngineSettings::default(),
        Arc::new(CompiledViewCache::new()),
    );
    let registered = offline.load_batch_compilation(&loaded).expect("register");
    assert_eq!(registered, vec![index.clone(), page.clone()]);
    assert_eq!(
        render(&offline, &index, json!({"name": "Ada"})),
        render(&engine, &index, json!({"name": "Ada"}))
    );
}

#[test]
fn tampered_artifact_is_rejected() {
    let tmp = site();
    let engine = fs_engine(tmp.path());
    let d = engine.descriptor(["home/page.html"]);
    let mut artifact = engine.batch_compilation(&[d]).expect("batch");
    artifact.entries[0].view_id = "0".repeat(64);

    let err = engine.load_batch_compilation(&artifact).unwrap_err();
    assert!(matches!(err, EngineError::ArtifactMismatch { .. }));
}
