//! Serialisation tests for descriptors as they appear in batch descriptor files.
//!
//! Each `#[case]` is isolated — no shared state.

use mantle_core::types::{CompileParams, TemplateId, ViewDescriptor};
use rstest::rstest;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn page_only() -> ViewDescriptor {
    ViewDescriptor::new(["home/index.html"])
}

fn page_with_layouts() -> ViewDescriptor {
    ViewDescriptor::new(["home/index.html", "layouts/application.html", "layouts/html.html"])
}

fn with_params() -> ViewDescriptor {
    page_with_layouts().with_params(CompileParams {
        base_type: Some("SiteView".to_string()),
        namespaces: vec!["site.helpers".to_string()],
        references: vec!["site-core".to_string()],
        debug: true,
    })
}

fn unicode_names() -> ViewDescriptor {
    ViewDescriptor::new(["страницы/главная.html", "レイアウト/基本.html"])
}

// ---------------------------------------------------------------------------
// Parameterised roundtrip test
// ---------------------------------------------------------------------------

#[rstest]
#[case("page_only", page_only())]
#[case("layouts", page_with_layouts())]
#[case("params", with_params())]
#[case("unicode", unicode_names())]
fn descriptor_roundtrip(#[case] label: &str, #[case] descriptor: ViewDescriptor) {
    let yaml = serde_yaml::to_string(&descriptor)
        .unwrap_or_else(|e| panic!("[{label}] serialize failed: {e}"));
    let back: ViewDescriptor = serde_yaml::from_str(&yaml)
        .unwrap_or_else(|e| panic!("[{label}] deserialize failed: {e}"));
    assert_eq!(descriptor, back, "[{label}] descriptor");
    assert_eq!(descriptor.canonical_key(), back.canonical_key(), "[{label}] key");
}

#[test]
fn params_are_optional_in_yaml() {
    let yaml = "templates:\n  - home/index.html\n  - layouts/site.html\n";
    let descriptor: ViewDescriptor = serde_yaml::from_str(yaml).expect("deserialize");
    assert_eq!(descriptor.templates.len(), 2);
    assert_eq!(descriptor.templates[1], TemplateId::from("layouts/site.html"));
    assert_eq!(descriptor.params, CompileParams::default());
}

#[rstest]
#[case("a.html", None, "a.html")]
#[case("dir/a.html", Some("dir"), "a.html")]
#[case("dir/sub/a.html", Some("dir/sub"), "a.html")]
fn template_id_split(#[case] raw: &str, #[case] dir: Option<&str>, #[case] file: &str) {
    let id = TemplateId::from(raw);
    assert_eq!(id.directory(), dir.unwrap_or(""));
    assert_eq!(id.file_name(), file);
}
