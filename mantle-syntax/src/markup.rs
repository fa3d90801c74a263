//! Chunk builder — turns template markup into a [`Chunk`] tree.
//!
//! Only the special elements (`if`, `elseif`, `else`, `for`, `var`, `global`,
//! `content`, `use`, `include`, `extends`) and configured binding elements
//! are interpreted. Everything else, ordinary tags included, is literal text
//! that still receives `${}` / `!{}` interpolation.

use std::collections::{HashMap, HashSet};

use mantle_core::{settings::EngineSettings, types::TemplateId};

use crate::binding::{BindingNode, BindingPhrase};
use crate::chunk::{extend_chunks, push_chunk, Chunk, ConditionalBranch, Location};
use crate::error::LoadError;

const SPECIAL_ELEMENTS: &[&str] = &[
    "if", "elseif", "else", "for", "var", "global", "content", "use", "include", "extends",
];

/// Name under which a binding element's body is referenced from its phrase.
pub const CHILD_REFERENCE: &str = "child";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Parser knobs derived from [`EngineSettings`].
#[derive(Debug, Clone, Default)]
pub struct SyntaxOptions {
    pub prefix: Option<String>,
    pub automatic_encoding: bool,
    pub bindings: HashMap<String, BindingPhrase>,
}

impl SyntaxOptions {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        let bindings = settings
            .bindings
            .iter()
            .map(|b| (b.element.clone(), BindingPhrase::parse(b.phrase.clone())))
            .collect();
        Self {
            prefix: settings.prefix.clone().filter(|p| !p.is_empty()),
            automatic_encoding: settings.automatic_encoding,
            bindings,
        }
    }

    /// Local name of a special element, honouring the configured prefix.
    fn special_name<'n>(&self, name: &'n str) -> Option<&'n str> {
        let local = match &self.prefix {
            Some(prefix) => name.strip_prefix(prefix.as_str())?.strip_prefix(':')?,
            None => name,
        };
        SPECIAL_ELEMENTS.contains(&local).then_some(local)
    }
}

/// Parse `source` (the text of `template`) into chunks.
pub fn parse_template(
    source: &str,
    template: &TemplateId,
    options: &SyntaxOptions,
) -> Result<Vec<Chunk>, LoadError> {
    Builder::new(source, template, options).run()
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn advance(&mut self, bytes: usize) {
        let end = (self.pos + bytes).min(self.src.len());
        for ch in self.src[self.pos..end].chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.pos = end;
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.rest().chars().next()?;
        self.advance(ch.len_utf8());
        Some(ch)
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Tag {
    name: String,
    attributes: Vec<(String, String)>,
    self_closing: bool,
    len: usize,
}

impl Tag {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '-' | '_' | ':' | '.')
}

fn element_name(s: &str) -> &str {
    let end = s
        .char_indices()
        .find(|(_, ch)| !is_name_char(*ch))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    &s[..end]
}

/// Parse an opening tag at the start of `s` (which begins with `<`).
fn parse_open_tag(s: &str) -> Result<Tag, String> {
    let name = element_name(&s[1..]).to_string();
    let mut i = 1 + name.len();
    let mut attributes = Vec::new();

    loop {
        i += leading_whitespace(&s[i..]);
        let rest = &s[i..];
        if rest.starts_with("/>") {
            return Ok(Tag {
                name,
                attributes,
                self_closing: true,
                len: i + 2,
            });
        }
        if rest.starts_with('>') {
            return Ok(Tag {
                name,
                attributes,
                self_closing: false,
                len: i + 1,
            });
        }
        if rest.is_empty() {
            return Err(format!("unterminated <{name}> tag"));
        }

        let attr_len = rest
            .char_indices()
            .find(|(_, ch)| ch.is_whitespace() || matches!(ch, '=' | '>' | '/'))
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        if attr_len == 0 {
            return Err(format!("malformed attribute in <{name}> tag"));
        }
        let attr = rest[..attr_len].to_string();
        i += attr_len;
        i += leading_whitespace(&s[i..]);
        if !s[i..].starts_with('=') {
            return Err(format!("attribute `{attr}` of <{name}> needs a value"));
        }
        i += 1;
        i += leading_whitespace(&s[i..]);
        let quote = match s[i..].chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(format!("value of attribute `{attr}` must be quoted")),
        };
        i += 1;
        let Some(close) = s[i..].find(quote) else {
            return Err(format!("unterminated value for attribute `{attr}`"));
        };
        attributes.push((attr, s[i..i + close].to_string()));
        i += close + 1;
    }
}

/// Parse a closing tag at the start of `s` (which begins with `</`).
fn parse_close_tag(s: &str) -> Option<(String, usize)> {
    let name = element_name(&s[2..]);
    if name.is_empty() {
        return None;
    }
    let mut i = 2 + name.len();
    i += leading_whitespace(&s[i..]);
    s[i..].starts_with('>').then(|| (name.to_string(), i + 1))
}

fn leading_whitespace(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Byte offset of the `}` closing an expression whose body starts at `s[0]`.
///
/// Nested braces and quoted strings are skipped.
pub(crate) fn expression_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '{' => depth += 1,
            '}' if depth == 0 => return Some(idx),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Split attribute or phrase text into literal and output chunks.
pub(crate) fn interpolate(
    text: &str,
    location: &Location,
    automatic_encoding: bool,
) -> Result<Vec<Chunk>, LoadError> {
    let mut chunks = Vec::new();
    let mut literal = String::new();
    let mut i = 0;
    while i < text.len() {
        let rest = &text[i..];
        if rest.starts_with("\\${") || rest.starts_with("\\!{") {
            literal.push_str(&rest[1..3]);
            i += 3;
            continue;
        }
        if rest.starts_with("${") || rest.starts_with("!{") {
            let Some(end) = expression_end(&rest[2..]) else {
                return Err(LoadError::syntax(location.clone(), "unterminated expression"));
            };
            let code = rest[2..2 + end].trim();
            if code.is_empty() {
                return Err(LoadError::syntax(location.clone(), "empty expression"));
            }
            push_chunk(&mut chunks, Chunk::literal(std::mem::take(&mut literal)));
            chunks.push(Chunk::Output {
                code: code.to_string(),
                escape: rest.starts_with('$') && automatic_encoding,
                location: location.clone(),
            });
            i += 2 + end + 1;
            continue;
        }
        let ch_len = rest.chars().next().map(char::len_utf8).unwrap_or(1);
        literal.push_str(&rest[..ch_len]);
        i += ch_len;
    }
    push_chunk(&mut chunks, Chunk::literal(literal));
    Ok(chunks)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

enum FrameKind {
    If {
        branches: Vec<ConditionalBranch>,
        condition: String,
        condition_location: Location,
        in_else: bool,
    },
    For {
        variable: String,
        iterable: String,
    },
    Content {
        name: String,
    },
    Use {
        name: String,
    },
    Binding {
        attributes: Vec<(String, String)>,
    },
}

struct Frame {
    element: String,
    kind: FrameKind,
    body: Vec<Chunk>,
    location: Location,
}

struct Builder<'a> {
    template: &'a TemplateId,
    options: &'a SyntaxOptions,
    cursor: Cursor<'a>,
    stack: Vec<Frame>,
    root: Vec<Chunk>,
    literal: String,
    extends_seen: bool,
}

impl<'a> Builder<'a> {
    fn new(source: &'a str, template: &'a TemplateId, options: &'a SyntaxOptions) -> Self {
        Self {
            template,
            options,
            cursor: Cursor::new(source),
            stack: Vec::new(),
            root: Vec::new(),
            literal: String::new(),
            extends_seen: false,
        }
    }

    fn location(&self) -> Location {
        Location::new(self.template.clone(), self.cursor.line, self.cursor.column)
    }

    fn body_mut(&mut self) -> &mut Vec<Chunk> {
        match self.stack.last_mut() {
            Some(frame) => &mut frame.body,
            None => &mut self.root,
        }
    }

    fn flush_literal(&mut self) {
        let text = std::mem::take(&mut self.literal);
        push_chunk(self.body_mut(), Chunk::literal(text));
    }

    fn emit(&mut self, chunk: Chunk) {
        self.flush_literal();
        push_chunk(self.body_mut(), chunk);
    }

    fn run(mut self) -> Result<Vec<Chunk>, LoadError> {
        while !self.cursor.at_end() {
            let rest = self.cursor.rest();
            if rest.starts_with("\\${") || rest.starts_with("\\!{") {
                self.literal.push_str(&rest[1..3]);
                self.cursor.advance(3);
                continue;
            }
            if rest.starts_with("${") || rest.starts_with("!{") {
                self.output()?;
                continue;
            }
            if rest.starts_with("<!--") {
                let len = rest.find("-->").map(|i| i + 3).unwrap_or(rest.len());
                self.literal.push_str(&rest[..len]);
                self.cursor.advance(len);
                continue;
            }
            if rest.starts_with("</") {
                if self.close_tag()? {
                    continue;
                }
            } else if rest.starts_with('<') && self.open_tag()? {
                continue;
            }
            if let Some(ch) = self.cursor.bump() {
                self.literal.push(ch);
            }
        }

        self.flush_literal();
        if let Some(frame) = self.stack.last() {
            return Err(LoadError::syntax(
                frame.location.clone(),
                format!("unterminated <{}> element", frame.element),
            ));
        }
        Ok(self.root)
    }

    fn output(&mut self) -> Result<(), LoadError> {
        let location = self.location();
        let rest = self.cursor.rest();
        let escape = rest.starts_with('$') && self.options.automatic_encoding;
        let Some(end) = expression_end(&rest[2..]) else {
            return Err(LoadError::syntax(location, "unterminated expression"));
        };
        let code = rest[2..2 + end].trim().to_string();
        if code.is_empty() {
            return Err(LoadError::syntax(location, "empty expression"));
        }
        self.cursor.advance(2 + end + 1);
        self.emit(Chunk::Output {
            code,
            escape,
            location,
        });
        Ok(())
    }

    fn open_tag(&mut self) -> Result<bool, LoadError> {
        let rest = self.cursor.rest();
        let name = element_name(&rest[1..]);
        if name.is_empty() {
            return Ok(false);
        }
        let special = self.options.special_name(name);
        let is_binding = special.is_none() && self.options.bindings.contains_key(name);
        if special.is_none() && !is_binding {
            return Ok(false);
        }

        let location = self.location();
        let tag = parse_open_tag(rest).map_err(|msg| LoadError::syntax(location.clone(), msg))?;
        self.cursor.advance(tag.len);
        self.flush_literal();

        match special {
            Some(local) => self.special_open(local, tag, location)?,
            None => self.binding_open(tag, location)?,
        }
        Ok(true)
    }

    fn close_tag(&mut self) -> Result<bool, LoadError> {
        let rest = self.cursor.rest();
        let Some((name, len)) = parse_close_tag(rest) else {
            return Ok(false);
        };
        let special = self.options.special_name(&name);
        if special.is_none() && !self.options.bindings.contains_key(&name) {
            return Ok(false);
        }

        let location = self.location();
        if let Some(local) = special {
            if !matches!(local, "if" | "for" | "content" | "use") {
                return Err(LoadError::syntax(
                    location,
                    format!("unexpected </{name}>; <{local}> has no closing tag"),
                ));
            }
        }
        match self.stack.last() {
            Some(frame) if frame.element == name => {}
            Some(frame) => {
                return Err(LoadError::syntax(
                    location,
                    format!("unexpected </{name}>; expected </{}>", frame.element),
                ))
            }
            None => {
                return Err(LoadError::syntax(
                    location,
                    format!("unexpected </{name}> with no open element"),
                ))
            }
        }

        self.cursor.advance(len);
        self.flush_literal();
        if let Some(frame) = self.stack.pop() {
            let chunks = self.finish(frame)?;
            let body = self.body_mut();
            extend_chunks(body, chunks);
        }
        Ok(true)
    }

    fn require<'t>(tag: &'t Tag, attr: &str, location: &Location) -> Result<&'t str, LoadError> {
        tag.attr(attr).ok_or_else(|| {
            LoadError::syntax(
                location.clone(),
                format!("<{}> requires a `{attr}` attribute", tag.name),
            )
        })
    }

    fn require_body(tag: &Tag, location: &Location) -> Result<(), LoadError> {
        if tag.self_closing {
            return Err(LoadError::syntax(
                location.clone(),
                format!("<{}> must have a body", tag.name),
            ));
        }
        Ok(())
    }

    fn require_self_closing(tag: &Tag, location: &Location) -> Result<(), LoadError> {
        if !tag.self_closing {
            return Err(LoadError::syntax(
                location.clone(),
                format!("<{}> must be self-closing", tag.name),
            ));
        }
        Ok(())
    }

    fn push_frame(&mut self, tag: Tag, kind: FrameKind, location: Location) {
        self.stack.push(Frame {
            element: tag.name,
            kind,
            body: Vec::new(),
            location,
        });
    }

    fn special_open(&mut self, local: &str, tag: Tag, location: Location) -> Result<(), LoadError> {
        match local {
            "if" => {
                let condition = Self::require(&tag, "condition", &location)?.trim().to_string();
                Self::require_body(&tag, &location)?;
                let kind = FrameKind::If {
                    branches: Vec::new(),
                    condition,
                    condition_location: location.clone(),
                    in_else: false,
                };
                self.push_frame(tag, kind, location);
            }
            "elseif" => {
                let condition = Self::require(&tag, "condition", &location)?.trim().to_string();
                self.next_branch(Some(condition), location)?;
            }
            "else" => {
                let condition = tag.attr("if").map(|c| c.trim().to_string());
                self.next_branch(condition, location)?;
            }
            "for" => {
                let each = Self::require(&tag, "each", &location)?;
                let (variable, iterable) = parse_each(each).ok_or_else(|| {
                    LoadError::syntax(
                        location.clone(),
                        format!("malformed each=\"{each}\"; expected \"name in expression\""),
                    )
                })?;
                Self::require_body(&tag, &location)?;
                self.push_frame(tag, FrameKind::For { variable, iterable }, location);
            }
            "var" | "global" => {
                Self::require_self_closing(&tag, &location)?;
                if tag.attributes.is_empty() {
                    return Err(LoadError::syntax(
                        location,
                        format!("<{}> declares no variables", tag.name),
                    ));
                }
                for (name, value) in &tag.attributes {
                    if !is_identifier(name) {
                        return Err(LoadError::syntax(
                            location,
                            format!("`{name}` is not a valid variable name"),
                        ));
                    }
                    let value = value.trim().to_string();
                    let chunk = if local == "var" {
                        Chunk::LocalVariable {
                            name: name.clone(),
                            value,
                            location: location.clone(),
                        }
                    } else {
                        Chunk::GlobalVariable {
                            name: name.clone(),
                            value,
                            location: location.clone(),
                        }
                    };
                    self.emit(chunk);
                }
            }
            "content" => {
                let name = Self::require(&tag, "name", &location)?.to_string();
                if tag.self_closing {
                    self.emit(Chunk::Content {
                        name,
                        body: Vec::new(),
                    });
                } else {
                    self.push_frame(tag, FrameKind::Content { name }, location);
                }
            }
            "use" => {
                if let Some(name) = tag.attr("content") {
                    let name = name.to_string();
                    if tag.self_closing {
                        self.emit(Chunk::UseContent {
                            name,
                            default: Vec::new(),
                        });
                    } else {
                        self.push_frame(tag, FrameKind::Use { name }, location);
                    }
                } else if tag.attr("file").is_some() {
                    self.include(tag, location)?;
                } else {
                    return Err(LoadError::syntax(
                        location,
                        format!("<{}> requires a `content` or `file` attribute", tag.name),
                    ));
                }
            }
            "include" => self.include(tag, location)?,
            "extends" => {
                let file = tag
                    .attr("template")
                    .or_else(|| tag.attr("file"))
                    .ok_or_else(|| {
                        LoadError::syntax(
                            location.clone(),
                            format!("<{}> requires a `template` attribute", tag.name),
                        )
                    })?
                    .to_string();
                Self::require_self_closing(&tag, &location)?;
                if !self.stack.is_empty() {
                    return Err(LoadError::syntax(
                        location,
                        format!("<{}> must be at the top level", tag.name),
                    ));
                }
                if self.extends_seen {
                    return Err(LoadError::syntax(
                        location,
                        format!("duplicate <{}>", tag.name),
                    ));
                }
                self.extends_seen = true;
                self.emit(Chunk::Extends { file, location });
            }
            other => {
                return Err(LoadError::syntax(
                    location,
                    format!("unsupported element <{other}>"),
                ))
            }
        }
        Ok(())
    }

    fn include(&mut self, tag: Tag, location: Location) -> Result<(), LoadError> {
        let file = Self::require(&tag, "file", &location)?.to_string();
        Self::require_self_closing(&tag, &location)?;
        let mut locals = Vec::new();
        for (name, value) in tag.attributes.iter().filter(|(k, _)| k != "file") {
            if !is_identifier(name) {
                return Err(LoadError::syntax(
                    location,
                    format!("`{name}` is not a valid variable name"),
                ));
            }
            locals.push((name.clone(), value.trim().to_string()));
        }
        self.emit(Chunk::Include {
            file,
            template: None,
            locals,
            body: Vec::new(),
            location,
        });
        Ok(())
    }

    /// Close the current `<if>` arm and open the next one.
    ///
    /// `condition` is `None` for a plain `<else/>`.
    fn next_branch(&mut self, condition: Option<String>, location: Location) -> Result<(), LoadError> {
        let Some(frame) = self.stack.last_mut() else {
            return Err(LoadError::syntax(location, "<else> / <elseif> outside <if>"));
        };
        let FrameKind::If {
            branches,
            condition: current,
            condition_location,
            in_else,
        } = &mut frame.kind
        else {
            return Err(LoadError::syntax(
                location,
                format!("<else> / <elseif> inside <{}>", frame.element),
            ));
        };
        if *in_else {
            return Err(LoadError::syntax(location, "<else> / <elseif> after <else>"));
        }
        branches.push(ConditionalBranch {
            condition: std::mem::take(current),
            body: std::mem::take(&mut frame.body),
            location: condition_location.clone(),
        });
        match condition {
            Some(next) => {
                *current = next;
                *condition_location = location;
            }
            None => *in_else = true,
        }
        Ok(())
    }

    fn finish(&self, frame: Frame) -> Result<Vec<Chunk>, LoadError> {
        let chunk = match frame.kind {
            FrameKind::If {
                mut branches,
                condition,
                condition_location,
                in_else,
            } => {
                let otherwise = if in_else {
                    Some(frame.body)
                } else {
                    branches.push(ConditionalBranch {
                        condition,
                        body: frame.body,
                        location: condition_location,
                    });
                    None
                };
                Chunk::Conditional {
                    branches,
                    otherwise,
                }
            }
            FrameKind::For { variable, iterable } => Chunk::Loop {
                variable,
                iterable,
                body: frame.body,
                location: frame.location,
            },
            FrameKind::Content { name } => Chunk::Content {
                name,
                body: frame.body,
            },
            FrameKind::Use { name } => Chunk::UseContent {
                name,
                default: frame.body,
            },
            FrameKind::Binding { attributes } => {
                return self.expand_binding(&frame.element, &attributes, Some(frame.body), &frame.location)
            }
        };
        Ok(vec![chunk])
    }

    fn binding_open(&mut self, tag: Tag, location: Location) -> Result<(), LoadError> {
        if tag.self_closing {
            let chunks = self.expand_binding(&tag.name, &tag.attributes, None, &location)?;
            let body = self.body_mut();
            extend_chunks(body, chunks);
        } else {
            let attributes = tag.attributes.clone();
            self.push_frame(tag, FrameKind::Binding { attributes }, location);
        }
        Ok(())
    }

    /// Replace a binding element with its phrase, substituting attribute
    /// references.
    fn expand_binding(
        &self,
        element: &str,
        attributes: &[(String, String)],
        child: Option<Vec<Chunk>>,
        location: &Location,
    ) -> Result<Vec<Chunk>, LoadError> {
        let Some(phrase) = self.options.bindings.get(element) else {
            return Ok(Vec::new());
        };
        let encoding = self.options.automatic_encoding;
        let consumed: HashSet<&str> = phrase.referenced_names().collect();
        let attr = |name: &str| {
            attributes
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };

        let mut out = Vec::new();
        for node in &phrase.nodes {
            match &node.node {
                BindingNode::Literal { text } => {
                    extend_chunks(&mut out, interpolate(text, location, encoding)?);
                }
                BindingNode::NameReference {
                    name,
                    assume_string_value,
                } => match attr(name) {
                    Some(value) if *assume_string_value => {
                        let quote = node.quote(&phrase.text).unwrap_or('"').to_string();
                        push_chunk(&mut out, Chunk::literal(quote.clone()));
                        extend_chunks(&mut out, interpolate(value, location, encoding)?);
                        push_chunk(&mut out, Chunk::literal(quote));
                    }
                    Some(value) => {
                        let code = value.trim();
                        if !code.is_empty() {
                            out.push(Chunk::Output {
                                code: code.to_string(),
                                escape: encoding,
                                location: location.clone(),
                            });
                        }
                    }
                    None if name == CHILD_REFERENCE => {
                        if let Some(child) = &child {
                            extend_chunks(&mut out, child.iter().cloned());
                        }
                    }
                    None => {
                        tracing::trace!(element, attribute = %name, "binding attribute missing, expanding to nothing");
                    }
                },
                BindingNode::PrefixReference { prefix, .. } => {
                    let prefix = prefix.as_deref().unwrap_or("");
                    for (key, value) in attributes {
                        if !key.starts_with(prefix) || consumed.contains(key.as_str()) {
                            continue;
                        }
                        push_chunk(&mut out, Chunk::literal(format!(" {key}=\"")));
                        extend_chunks(&mut out, interpolate(value, location, encoding)?);
                        push_chunk(&mut out, Chunk::literal("\""));
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Split `item in items` into `("item", "items")`.
fn parse_each(each: &str) -> Option<(String, String)> {
    let (variable, iterable) = each.trim().split_once(" in ")?;
    let variable = variable.trim();
    let iterable = iterable.trim();
    (is_identifier(variable) && !iterable.is_empty())
        .then(|| (variable.to_string(), iterable.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id() -> TemplateId {
        TemplateId::from("test.html")
    }

    fn parse(source: &str) -> Vec<Chunk> {
        parse_template(source, &id(), &SyntaxOptions::default())
            .unwrap_or_else(|e| panic!("parse failed: {e}"))
    }

    fn parse_err(source: &str) -> String {
        parse_template(source, &id(), &SyntaxOptions::default())
            .expect_err("expected syntax error")
            .to_string()
    }

    fn loc(line: usize, column: usize) -> Location {
        Location::new(id(), line, column)
    }

    #[test]
    fn plain_markup_is_one_literal() {
        assert_eq!(
            parse("<div class=\"a\"><p>hi</p></div>"),
            vec![Chunk::literal("<div class=\"a\"><p>hi</p></div>")]
        );
    }

    #[test]
    fn output_expressions() {
        assert_eq!(
            parse("Hello ${user.name}!{raw}"),
            vec![
                Chunk::literal("Hello "),
                Chunk::Output {
                    code: "user.name".into(),
                    escape: false,
                    location: loc(1, 7),
                },
                Chunk::Output {
                    code: "raw".into(),
                    escape: false,
                    location: loc(1, 19),
                },
            ]
        );
    }

    #[test]
    fn automatic_encoding_only_affects_dollar_form() {
        let options = SyntaxOptions {
            automatic_encoding: true,
            ..SyntaxOptions::default()
        };
        let chunks = parse_template("${a}!{b}", &id(), &options).expect("parse");
        assert!(matches!(&chunks[0], Chunk::Output { escape: true, .. }));
        assert!(matches!(&chunks[1], Chunk::Output { escape: false, .. }));
    }

    #[test]
    fn escaped_expression_is_literal() {
        assert_eq!(parse("\\${x} \\!{y}"), vec![Chunk::literal("${x} !{y}")]);
    }

    #[test]
    fn expression_with_braces_in_string() {
        let chunks = parse("${ \"}\" + a }");
        assert!(matches!(&chunks[0], Chunk::Output { code, .. } if code == "\"}\" + a"));
    }

    #[test]
    fn interpolation_inside_ordinary_attributes() {
        let chunks = parse("<a href=\"/u/${id}\">x</a>");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], Chunk::literal("<a href=\"/u/"));
        assert_eq!(chunks[2], Chunk::literal("\">x</a>"));
    }

    #[test]
    fn conditional_with_branches() {
        let chunks = parse("<if condition=\"a\">A<elseif condition=\"b\"/>B<else/>C</if>");
        assert_eq!(
            chunks,
            vec![Chunk::Conditional {
                branches: vec![
                    ConditionalBranch {
                        condition: "a".into(),
                        body: vec![Chunk::literal("A")],
                        location: loc(1, 1),
                    },
                    ConditionalBranch {
                        condition: "b".into(),
                        body: vec![Chunk::literal("B")],
                        location: loc(1, 20),
                    },
                ],
                otherwise: Some(vec![Chunk::literal("C")]),
            }]
        );
    }

    #[test]
    fn else_if_attribute_form() {
        let chunks = parse("<if condition=\"a\">A<else if=\"b\"/>B</if>");
        let Chunk::Conditional { branches, otherwise } = &chunks[0] else {
            panic!("expected conditional");
        };
        assert_eq!(branches.len(), 2);
        assert!(otherwise.is_none());
    }

    #[test]
    fn loop_and_variables() {
        let chunks = parse("<var total=\"0\"/><for each=\"item in items\">${item}</for>");
        assert_eq!(
            chunks,
            vec![
                Chunk::LocalVariable {
                    name: "total".into(),
                    value: "0".into(),
                    location: loc(1, 1),
                },
                Chunk::Loop {
                    variable: "item".into(),
                    iterable: "items".into(),
                    body: vec![Chunk::Output {
                        code: "item".into(),
                        escape: false,
                        location: loc(1, 43),
                    }],
                    location: loc(1, 17),
                },
            ]
        );
    }

    #[test]
    fn sections() {
        let chunks = parse("<content name=\"head\"><title/></content><use content=\"head\"/>");
        assert_eq!(
            chunks,
            vec![
                Chunk::Content {
                    name: "head".into(),
                    body: vec![Chunk::literal("<title/>")],
                },
                Chunk::UseContent {
                    name: "head".into(),
                    default: vec![],
                },
            ]
        );
    }

    #[test]
    fn use_with_default_body() {
        let chunks = parse("<use content=\"side\">none</use>");
        assert_eq!(
            chunks,
            vec![Chunk::UseContent {
                name: "side".into(),
                default: vec![Chunk::literal("none")],
            }]
        );
    }

    #[test]
    fn include_collects_locals() {
        let chunks = parse("<include file=\"_row\" item=\"x\" index=\"1\"/>");
        let Chunk::Include { file, locals, template, .. } = &chunks[0] else {
            panic!("expected include");
        };
        assert_eq!(file, "_row");
        assert!(template.is_none());
        assert_eq!(
            locals,
            &vec![("item".to_string(), "x".to_string()), ("index".to_string(), "1".to_string())]
        );
        assert!(matches!(&parse("<use file=\"_row\"/>")[0], Chunk::Include { .. }));
    }

    #[test]
    fn prefix_restricts_special_elements() {
        let options = SyntaxOptions {
            prefix: Some("s".into()),
            ..SyntaxOptions::default()
        };
        let chunks =
            parse_template("<if>x</if><s:if condition=\"a\">y</s:if>", &id(), &options).expect("parse");
        assert_eq!(chunks[0], Chunk::literal("<if>x</if>"));
        assert!(matches!(chunks[1], Chunk::Conditional { .. }));
    }

    #[test]
    fn comments_pass_through_untouched() {
        assert_eq!(
            parse("<!-- <if condition=\"x\"> -->"),
            vec![Chunk::literal("<!-- <if condition=\"x\"> -->")]
        );
    }

    #[test]
    fn syntax_errors_carry_location() {
        assert!(parse_err("a\n<if condition=\"x\">").contains("test.html:2:1"));
        assert!(parse_err("${oops").contains("unterminated expression"));
        assert!(parse_err("</for>").contains("no open element"));
        assert!(parse_err("<for each=\"x\">y</for>").contains("malformed each"));
        assert!(parse_err("<if condition=\"a\">x</for>").contains("expected </if>"));
        assert!(parse_err("<else/>").contains("outside <if>"));
        assert!(parse_err("<content>x</content>").contains("`name`"));
        assert!(parse_err("<var x=1/>").contains("must be quoted"));
        assert!(parse_err("<if condition=\"a\"><extends template=\"l\"/></if>").contains("top level"));
        assert!(parse_err("${ }").contains("empty expression"));
    }

    #[test]
    fn binding_element_expansion() {
        let settings = EngineSettings::default()
            .add_binding("Link", "<a href=\"@href\"@*>@child</a>")
            .add_binding("Count", "[@value]");
        let options = SyntaxOptions::from_settings(&settings);
        let chunks = parse_template(
            "<Link href=\"/x/${id}\" class=\"nav\">Go</Link><Count value=\"items.length\"/>",
            &id(),
            &options,
        )
        .expect("parse");
        assert_eq!(
            chunks,
            vec![
                Chunk::literal("<a href=\"/x/"),
                Chunk::Output {
                    code: "id".into(),
                    escape: false,
                    location: loc(1, 1),
                },
                Chunk::literal("\" class=\"nav\">Go</a>["),
                Chunk::Output {
                    code: "items.length".into(),
                    escape: false,
                    location: loc(1, 44),
                },
                Chunk::literal("]"),
            ]
        );
    }

    #[test]
    fn binding_missing_attribute_expands_to_nothing() {
        let settings = EngineSettings::default().add_binding("Tag", "<b>@label</b>");
        let options = SyntaxOptions::from_settings(&settings);
        let chunks = parse_template("<Tag/>", &id(), &options).expect("parse");
        assert_eq!(chunks, vec![Chunk::literal("<b></b>")]);
    }
}
