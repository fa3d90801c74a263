//! Loader integration tests against a template folder on disk.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use mantle_core::{EngineSettings, TemplateId};
use mantle_syntax::{Chunk, FileSystemProvider, LoadError, SyntaxOptions, ViewLoader};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, text).expect("write template");
}

fn site() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    write(
        dir.path(),
        "home/index.html",
        "<extends template=\"master\"/>\n<content name=\"title\">Home</content>\n<p>${message}</p>\n<include file=\"_item\" label=\"'first'\"/>\n",
    );
    write(dir.path(), "home/_item.html", "<li>${label}</li>");
    write(
        dir.path(),
        "shared/master.html",
        "<html><title><use content=\"title\">Untitled</use></title><body><use content=\"view\"/></body></html>",
    );
    dir
}

fn loader(root: &Path, settings: &EngineSettings) -> ViewLoader {
    ViewLoader::new(
        Arc::new(FileSystemProvider::new(root)),
        SyntaxOptions::from_settings(settings),
    )
}

// ---------------------------------------------------------------------------
// 1. Composition
// ---------------------------------------------------------------------------

#[test]
fn page_with_shared_layout_and_include() {
    let dir = site();
    let mut l = loader(dir.path(), &EngineSettings::default());
    let chunks = l.load(&TemplateId::from("home/index.html")).expect("load");

    assert!(matches!(&chunks[0], Chunk::Content { name, .. } if name == "title"));
    let include = chunks.iter().find_map(|c| match c {
        Chunk::Include { template, locals, .. } => Some((template.clone(), locals.clone())),
        _ => None,
    });
    let (template, locals) = include.expect("include survives substitution");
    assert_eq!(template, Some(TemplateId::from("home/_item.html")));
    assert_eq!(locals, vec![("label".to_string(), "'first'".to_string())]);

    let loaded: Vec<&str> = l.everything_loaded().iter().map(TemplateId::as_str).collect();
    assert_eq!(loaded, vec!["home/_item.html", "home/index.html", "shared/master.html"]);
}

#[test]
fn prefixed_syntax_is_honoured_from_settings() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), "a.html", "<s:if condition=\"x\">yes</s:if><if>raw</if>");
    let mut l = loader(dir.path(), &EngineSettings::default().set_prefix("s"));
    let chunks = l.load(&TemplateId::from("a.html")).expect("load");
    assert!(matches!(chunks[0], Chunk::Conditional { .. }));
    assert_eq!(chunks[1], Chunk::literal("<if>raw</if>"));
}

// ---------------------------------------------------------------------------
// 2. Failures
// ---------------------------------------------------------------------------

#[test]
fn syntax_error_names_file_line_and_column() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), "bad.html", "line one\n  <for each=\"x in xs\">\n");
    let mut l = loader(dir.path(), &EngineSettings::default());
    let err = l.load(&TemplateId::from("bad.html")).unwrap_err();
    assert!(matches!(err, LoadError::TemplateSyntax { .. }), "got: {err}");
    assert!(err.to_string().contains("bad.html:2:3"), "got: {err}");
}

#[test]
fn missing_layout_is_not_found() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), "page.html", "<extends template=\"nowhere\"/>");
    let mut l = loader(dir.path(), &EngineSettings::default());
    let err = l.load(&TemplateId::from("page.html")).unwrap_err();
    assert!(err.to_string().contains("nowhere.html"), "got: {err}");
}

#[test]
fn self_include_is_a_cycle() {
    let dir = TempDir::new().expect("tempdir");
    write(dir.path(), "loop.html", "<include file=\"loop\"/>");
    let mut l = loader(dir.path(), &EngineSettings::default());
    let err = l.load(&TemplateId::from("loop.html")).unwrap_err();
    assert!(matches!(err, LoadError::CompositionCycle { ref chain } if chain.len() == 2));
}
