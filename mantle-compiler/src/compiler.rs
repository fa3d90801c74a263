//! View compiler — chunk trees to executable operation trees.
//!
//! Every expression is parsed once at compile time; rendering walks the
//! resulting [`Op`] tree against the decorator render protocol.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};

use mantle_core::types::{TemplateId, ViewDescriptor};
use mantle_renderer::{RenderContext, RenderError, ScopeTarget, ViewBody};
use mantle_syntax::{Chunk, Location};

use crate::error::CompileError;
use crate::eval::{evaluate, html_escape, iteration_items, render_value, truthy, Locals};
use crate::expr::{parse_expression, Expr};

// ---------------------------------------------------------------------------
// 1. Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Branch {
    pub condition: Expr,
    pub body: Vec<Op>,
}

#[derive(Debug, Clone)]
pub enum Op {
    Literal(String),
    Output {
        expr: Expr,
        escape: bool,
    },
    Conditional {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Op>>,
    },
    Loop {
        variable: String,
        iterable: Expr,
        body: Vec<Op>,
    },
    Local {
        name: String,
        value: Expr,
    },
    Content {
        name: String,
        body: Vec<Op>,
    },
    UseContent {
        name: String,
        default: Vec<Op>,
    },
    Include {
        template: Option<TemplateId>,
        locals: Vec<(String, Expr)>,
        body: Vec<Op>,
    },
}

/// A `<global>` declaration, evaluated once per render.
#[derive(Debug, Clone)]
pub struct GlobalInit {
    pub name: String,
    pub value: Expr,
}

// ---------------------------------------------------------------------------
// 2. Compiled layers and views
// ---------------------------------------------------------------------------

/// One template of a view, ready to render.
#[derive(Debug)]
pub struct CompiledLayer {
    pub template: TemplateId,
    pub ops: Vec<Op>,
    pub globals: Vec<GlobalInit>,
}

impl ViewBody for CompiledLayer {
    fn initialize(&self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        let locals = Locals::new();
        for global in &self.globals {
            if ctx.global(&global.name).is_some() {
                continue;
            }
            let value = evaluate(&global.value, &locals, ctx);
            ctx.set_global(global.name.clone(), value);
        }
        Ok(())
    }

    fn render_body(&self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        let mut locals = Locals::new();
        run_ops(&self.ops, &mut locals, ctx)
    }
}

fn run_ops(ops: &[Op], locals: &mut Locals, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
    for op in ops {
        run_op(op, locals, ctx)?;
    }
    Ok(())
}

/// Run `ops` in a nested local frame.
fn run_block(ops: &[Op], locals: &mut Locals, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
    locals.push();
    let result = run_ops(ops, locals, ctx);
    locals.pop();
    result
}

fn run_op(op: &Op, locals: &mut Locals, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
    match op {
        Op::Literal(text) => ctx.write(text),
        Op::Output { expr, escape } => {
            let text = render_value(&evaluate(expr, locals, ctx));
            if *escape {
                ctx.write(&html_escape(&text))
            } else {
                ctx.write(&text)
            }
        }
        Op::Conditional {
            branches,
            otherwise,
        } => {
            for branch in branches {
                if truthy(&evaluate(&branch.condition, locals, ctx)) {
                    return run_block(&branch.body, locals, ctx);
                }
            }
            match otherwise {
                Some(body) => run_block(body, locals, ctx),
                None => Ok(()),
            }
        }
        Op::Loop {
            variable,
            iterable,
            body,
        } => {
            let items = iteration_items(evaluate(iterable, locals, ctx));
            let count = items.len();
            for (index, item) in items.into_iter().enumerate() {
                locals.push();
                locals.set(variable.clone(), item);
                locals.set(format!("{variable}Index"), Value::from(index));
                locals.set(format!("{variable}Count"), Value::from(count));
                locals.set(format!("{variable}IsFirst"), Value::Bool(index == 0));
                locals.set(format!("{variable}IsLast"), Value::Bool(index + 1 == count));
                let result = run_ops(body, locals, ctx);
                locals.pop();
                result?;
            }
            Ok(())
        }
        Op::Local { name, value } => {
            let value = evaluate(value, locals, ctx);
            locals.set(name.clone(), value);
            Ok(())
        }
        Op::Content { name, body } => {
            ctx.scoped(ScopeTarget::named(name.clone()), |ctx| run_block(body, locals, ctx))
        }
        Op::UseContent { name, default } => {
            if ctx.has_content(name) {
                let text = ctx.content(name).to_string();
                ctx.write(&text)
            } else {
                run_block(default, locals, ctx)
            }
        }
        Op::Include {
            locals: bindings,
            body,
            ..
        } => {
            let values: Vec<(String, Value)> = bindings
                .iter()
                .map(|(name, expr)| (name.clone(), evaluate(expr, locals, ctx)))
                .collect();
            locals.push();
            for (name, value) in values {
                locals.set(name, value);
            }
            let result = run_ops(body, locals, ctx);
            locals.pop();
            result
        }
    }
}

/// The compiled render unit for one descriptor.
#[derive(Debug)]
pub struct CompiledView {
    pub view_id: String,
    pub class_name: String,
    pub descriptor: ViewDescriptor,
    /// Layer 0 is the page; the last layer is the outermost layout.
    pub layers: Vec<Arc<CompiledLayer>>,
    pub loaded_files: BTreeSet<TemplateId>,
    /// IR listing.
    pub source: String,
    /// Chunk trees the layers were compiled from.
    pub chunks: Vec<(TemplateId, Vec<Chunk>)>,
}

impl CompiledView {
    /// Every `<global>` name declared across the layers, inner to outer.
    pub fn global_names(&self) -> Vec<&str> {
        self.layers
            .iter()
            .flat_map(|l| l.globals.iter().map(|g| g.name.as_str()))
            .collect()
    }
}

/// Hex SHA-256 of the descriptor's canonical key.
pub fn view_id(descriptor: &ViewDescriptor) -> String {
    let mut hasher = Sha256::new();
    hasher.update(descriptor.canonical_key().as_bytes());
    hex::encode(hasher.finalize())
}

/// `View_` followed by the first 16 hex characters of the view id.
pub fn class_name(view_id: &str) -> String {
    format!("View_{}", &view_id[..view_id.len().min(16)])
}

// ---------------------------------------------------------------------------
// 3. ViewCompiler
// ---------------------------------------------------------------------------

pub struct ViewCompiler {
    descriptor: ViewDescriptor,
}

impl ViewCompiler {
    pub fn new(descriptor: ViewDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &ViewDescriptor {
        &self.descriptor
    }

    /// Compile one chunk tree per descriptor template, page first.
    pub fn compile(
        &self,
        chunks_by_template: Vec<(TemplateId, Vec<Chunk>)>,
        loaded_files: BTreeSet<TemplateId>,
    ) -> Result<CompiledView, CompileError> {
        if self.descriptor.templates.is_empty() {
            return Err(CompileError::EmptyDescriptor);
        }
        for id in &self.descriptor.templates {
            if !chunks_by_template.iter().any(|(t, _)| t == id) {
                return Err(CompileError::MissingLayer { id: id.clone() });
            }
        }

        let mut layers = Vec::with_capacity(chunks_by_template.len());
        for (template, chunks) in &chunks_by_template {
            let mut globals = Vec::new();
            let ops = compile_chunks(chunks, &mut globals)?;
            layers.push(Arc::new(CompiledLayer {
                template: template.clone(),
                ops,
                globals,
            }));
        }

        let view_id = view_id(&self.descriptor);
        let class_name = class_name(&view_id);
        let source = self.generate_source(&chunks_by_template);
        tracing::debug!(
            descriptor = %self.descriptor,
            class = %class_name,
            layers = layers.len(),
            "compiled view"
        );

        Ok(CompiledView {
            view_id,
            class_name,
            descriptor: self.descriptor.clone(),
            layers,
            loaded_files,
            source,
            chunks: chunks_by_template,
        })
    }

    /// Textual IR listing of the chunk trees.
    ///
    /// Expressions that fail to parse are listed verbatim; `compile` is the
    /// place that reports them.
    pub fn generate_source(&self, chunks_by_template: &[(TemplateId, Vec<Chunk>)]) -> String {
        let params = &self.descriptor.params;
        let id = view_id(&self.descriptor);
        let mut out = String::new();
        let _ = writeln!(out, "view {} {}", class_name(&id), self.descriptor);
        if let Some(base) = &params.base_type {
            let _ = writeln!(out, "  base {base}");
        }
        for ns in &params.namespaces {
            let _ = writeln!(out, "  using {ns}");
        }
        for reference in &params.references {
            let _ = writeln!(out, "  reference {reference}");
        }
        for (index, (template, chunks)) in chunks_by_template.iter().enumerate() {
            let _ = writeln!(out, "layer {index} {template}");
            list_chunks(&mut out, chunks, 1, params.debug);
        }
        out
    }
}

fn compile_expr(code: &str, location: &Location) -> Result<Expr, CompileError> {
    parse_expression(code).map_err(|e| CompileError::TemplateSyntax {
        location: location.clone(),
        message: format!("in `{code}`: {e}"),
    })
}

fn compile_chunks(chunks: &[Chunk], globals: &mut Vec<GlobalInit>) -> Result<Vec<Op>, CompileError> {
    let mut ops = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let op = match chunk {
            Chunk::Literal { text } => Op::Literal(text.clone()),
            Chunk::Output {
                code,
                escape,
                location,
            } => Op::Output {
                expr: compile_expr(code, location)?,
                escape: *escape,
            },
            Chunk::Conditional {
                branches,
                otherwise,
            } => {
                let mut compiled = Vec::with_capacity(branches.len());
                for branch in branches {
                    compiled.push(Branch {
                        condition: compile_expr(&branch.condition, &branch.location)?,
                        body: compile_chunks(&branch.body, globals)?,
                    });
                }
                let otherwise = match otherwise {
                    Some(body) => Some(compile_chunks(body, globals)?),
                    None => None,
                };
                Op::Conditional {
                    branches: compiled,
                    otherwise,
                }
            }
            Chunk::Loop {
                variable,
                iterable,
                body,
                location,
            } => Op::Loop {
                variable: variable.clone(),
                iterable: compile_expr(iterable, location)?,
                body: compile_chunks(body, globals)?,
            },
            Chunk::LocalVariable {
                name,
                value,
                location,
            } => Op::Local {
                name: name.clone(),
                value: compile_expr(value, location)?,
            },
            Chunk::GlobalVariable {
                name,
                value,
                location,
            } => {
                globals.push(GlobalInit {
                    name: name.clone(),
                    value: compile_expr(value, location)?,
                });
                continue;
            }
            Chunk::Content { name, body } => Op::Content {
                name: name.clone(),
                body: compile_chunks(body, globals)?,
            },
            Chunk::UseContent { name, default } => Op::UseContent {
                name: name.clone(),
                default: compile_chunks(default, globals)?,
            },
            Chunk::Include {
                template,
                locals,
                body,
                location,
                ..
            } => {
                let mut compiled = Vec::with_capacity(locals.len());
                for (name, code) in locals {
                    compiled.push((name.clone(), compile_expr(code, location)?));
                }
                Op::Include {
                    template: template.clone(),
                    locals: compiled,
                    body: compile_chunks(body, globals)?,
                }
            }
            // The loader resolves these; one reaching the compiler is inert.
            Chunk::Extends { .. } => continue,
        };
        ops.push(op);
    }
    Ok(ops)
}

// ---------------------------------------------------------------------------
// 4. IR listing
// ---------------------------------------------------------------------------

fn listed_expr(code: &str) -> String {
    parse_expression(code)
        .map(|e| e.to_string())
        .unwrap_or_else(|_| code.to_string())
}

fn list_chunks(out: &mut String, chunks: &[Chunk], depth: usize, debug: bool) {
    let pad = "  ".repeat(depth);
    for chunk in chunks {
        match chunk {
            Chunk::Literal { text } => {
                let _ = writeln!(out, "{pad}write {text:?}");
            }
            Chunk::Output {
                code,
                escape,
                location,
            } => {
                let verb = if *escape { "output-escaped" } else { "output" };
                let _ = write!(out, "{pad}{verb} {}", listed_expr(code));
                annotate(out, location, debug);
            }
            Chunk::Conditional {
                branches,
                otherwise,
            } => {
                for (i, branch) in branches.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "elseif" };
                    let _ = write!(out, "{pad}{keyword} {}", listed_expr(&branch.condition));
                    annotate(out, &branch.location, debug);
                    list_chunks(out, &branch.body, depth + 1, debug);
                }
                if let Some(body) = otherwise {
                    let _ = writeln!(out, "{pad}else");
                    list_chunks(out, body, depth + 1, debug);
                }
                let _ = writeln!(out, "{pad}end");
            }
            Chunk::Loop {
                variable,
                iterable,
                body,
                location,
            } => {
                let _ = write!(out, "{pad}for {variable} in {}", listed_expr(iterable));
                annotate(out, location, debug);
                list_chunks(out, body, depth + 1, debug);
                let _ = writeln!(out, "{pad}end");
            }
            Chunk::LocalVariable {
                name,
                value,
                location,
            } => {
                let _ = write!(out, "{pad}local {name} = {}", listed_expr(value));
                annotate(out, location, debug);
            }
            Chunk::GlobalVariable {
                name,
                value,
                location,
            } => {
                let _ = write!(out, "{pad}global {name} = {}", listed_expr(value));
                annotate(out, location, debug);
            }
            Chunk::Content { name, body } => {
                let _ = writeln!(out, "{pad}content {name:?}");
                list_chunks(out, body, depth + 1, debug);
                let _ = writeln!(out, "{pad}end");
            }
            Chunk::UseContent { name, default } => {
                let _ = writeln!(out, "{pad}use {name:?}");
                if !default.is_empty() {
                    list_chunks(out, default, depth + 1, debug);
                    let _ = writeln!(out, "{pad}end");
                }
            }
            Chunk::Include {
                file,
                template,
                locals,
                body,
                location,
            } => {
                let target = template
                    .as_ref()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| file.clone());
                let _ = write!(out, "{pad}include {target}");
                for (name, code) in locals {
                    let _ = write!(out, " {name}={}", listed_expr(code));
                }
                annotate(out, location, debug);
                list_chunks(out, body, depth + 1, debug);
                let _ = writeln!(out, "{pad}end");
            }
            Chunk::Extends { file, location } => {
                let _ = write!(out, "{pad}extends {file}");
                annotate(out, location, debug);
            }
        }
    }
}

fn annotate(out: &mut String, location: &Location, debug: bool) {
    if debug {
        let _ = writeln!(out, "  @ {location}");
    } else {
        out.push('\n');
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
