//! Decorator render protocol: section ordering across layers and scope
//! release on error.

use std::sync::Arc;

use mantle_renderer::{
    Decorator, FnBody, RenderContext, RenderError, ScopeTarget, Sink, ViewBody,
};
use rstest::rstest;
use serde_json::{json, Value};

fn body<F>(f: F) -> Arc<dyn ViewBody>
where
    F: Fn(&mut RenderContext<'_>) -> Result<(), RenderError> + Send + Sync + 'static,
{
    Arc::new(FnBody(f))
}

fn write_section(ctx: &mut RenderContext<'_>, name: &str, text: &str) -> Result<(), RenderError> {
    let mut scope = ctx.enter_scope(ScopeTarget::named(name))?;
    scope.write(text)?;
    scope.exit()
}

fn emit_content(ctx: &mut RenderContext<'_>, name: &str) -> Result<(), RenderError> {
    let text = ctx.content(name).to_string();
    ctx.write(&text)
}

// ---------------------------------------------------------------------------
// 1. Section accumulation between layers
// ---------------------------------------------------------------------------

#[test]
fn content_collection_works_between_layers() {
    let layer0 = body(|ctx| {
        ctx.write("[layer0]")?;
        write_section(ctx, "head", "[layer0head]")
    });
    let layer1 = body(|ctx| {
        write_section(ctx, "head", "[layer1head]")?;
        ctx.write("[layer1top]")?;
        emit_content(ctx, "head")?;
        emit_content(ctx, "view")?;
        ctx.write("[layer1bottom]")
    });

    let chain = Decorator::wrap(layer1, Decorator::leaf(layer0));
    let out = chain.render_to_string(&Value::Null).expect("render");
    assert_eq!(out, "[layer1top][layer0head][layer1head][layer0][layer1bottom]");
}

#[test]
fn layout_writing_top_before_its_head_section_renders_the_same() {
    let layer0 = body(|ctx| {
        ctx.write("[layer0]")?;
        write_section(ctx, "head", "[layer0head]")
    });
    let layer1 = body(|ctx| {
        ctx.write("[layer1top]")?;
        write_section(ctx, "head", "[layer1head]")?;
        emit_content(ctx, "head")?;
        emit_content(ctx, "view")?;
        ctx.write("[layer1bottom]")
    });

    let chain = Decorator::wrap(layer1, Decorator::leaf(layer0));
    let out = chain.render_to_string(&Value::Null).expect("render");
    assert_eq!(out, "[layer1top][layer0head][layer1head][layer0][layer1bottom]");
}

#[test]
fn three_layers_see_inner_contributions_in_order() {
    let chain = Decorator::from_layers([
        body(|ctx| {
            write_section(ctx, "scripts", "<a.js>")?;
            ctx.write("page")
        }),
        body(|ctx| {
            write_section(ctx, "scripts", "<b.js>")?;
            ctx.write("(")?;
            emit_content(ctx, "view")?;
            ctx.write(")")
        }),
        body(|ctx| {
            write_section(ctx, "scripts", "<c.js>")?;
            emit_content(ctx, "scripts")?;
            ctx.write("[")?;
            emit_content(ctx, "view")?;
            ctx.write("]")
        }),
    ])
    .expect("chain");

    let out = chain.render_to_string(&Value::Null).expect("render");
    assert_eq!(out, "<a.js><b.js><c.js>[(page)]");
}

#[test]
fn missing_section_renders_empty() {
    let chain = Decorator::leaf(body(|ctx| {
        ctx.write("<")?;
        emit_content(ctx, "nothing")?;
        ctx.write(">")
    }));
    assert_eq!(chain.render_to_string(&Value::Null).unwrap(), "<>");
}

#[test]
fn each_render_starts_with_fresh_content() {
    let chain = Decorator::leaf(body(|ctx| {
        write_section(ctx, "once", "x")?;
        emit_content(ctx, "once")
    }));
    assert_eq!(chain.render_to_string(&Value::Null).unwrap(), "x");
    assert_eq!(chain.render_to_string(&Value::Null).unwrap(), "x");
}

#[rstest]
#[case(json!({"name": "Ada"}), "Ada")]
#[case(json!({}), "")]
fn bodies_read_the_model(#[case] model: Value, #[case] expected: &str) {
    let chain = Decorator::leaf(body(|ctx| {
        let name = ctx.model()["name"].as_str().unwrap_or_default().to_string();
        ctx.write(&name)
    }));
    assert_eq!(chain.render_to_string(&model).unwrap(), expected);
}

// ---------------------------------------------------------------------------
// 2. Scope release
// ---------------------------------------------------------------------------

#[test]
fn error_inside_named_scope_discards_partial_buffer_and_propagates() {
    let failing = body(|ctx| {
        ctx.write("visible")?;
        let mut scope = ctx.enter_scope(ScopeTarget::named("head"))?;
        scope.write("partial")?;
        Err(RenderError::ProtocolViolation {
            message: "body failed".into(),
        })
    });
    let mut out = Vec::new();
    let err = Decorator::leaf(failing)
        .render(&Value::Null, &mut out)
        .unwrap_err();
    assert!(err.to_string().contains("body failed"));
    assert_eq!(String::from_utf8(out).unwrap(), "visible");
}

#[test]
fn failed_inner_layer_leaves_no_view_content_behind() {
    let model = Value::Null;
    let mut out = Vec::new();
    let mut ctx = RenderContext::new(&model, &mut out);
    let inner = Decorator::leaf(body(|ctx| {
        ctx.write("half")?;
        Err(RenderError::ProtocolViolation {
            message: "stop".into(),
        })
    }));
    let chain = Decorator::wrap(body(|ctx| ctx.write("outer")), inner);

    assert!(chain.render_view(&mut ctx, Sink::External).is_err());
    assert_eq!(ctx.depth(), 0);
    assert_eq!(ctx.content("view"), "");
}
