//! Binding phrase grammar.
//!
//! A binding phrase is free text in which `@name` style references pick out
//! attribute values of the element being expanded:
//!
//! | Form | Node |
//! |------------------------|----------------------------------------------|
//! | `"@name*"` / `'@name*'` | `PrefixReference { Some(name), true }`       |
//! | `@name*` / `@*`         | `PrefixReference { name?, false }`           |
//! | `"@name"` / `'@name'`   | `NameReference { name, true }`               |
//! | `@name`                 | `NameReference { name, false }`              |
//! | anything else           | `Literal`                                    |
//!
//! The parser is total: every input character lands in exactly one node, so
//! joining the node spans gives back the input.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// One parsed fragment of a binding phrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingNode {
    Literal {
        text: String,
    },
    NameReference {
        name: String,
        assume_string_value: bool,
    },
    PrefixReference {
        prefix: Option<String>,
        assume_string_value: bool,
    },
}

impl BindingNode {
    pub fn literal(text: impl Into<String>) -> Self {
        BindingNode::Literal { text: text.into() }
    }

    pub fn name(name: impl Into<String>, assume_string_value: bool) -> Self {
        BindingNode::NameReference {
            name: name.into(),
            assume_string_value,
        }
    }

    pub fn prefix(prefix: Option<&str>, assume_string_value: bool) -> Self {
        BindingNode::PrefixReference {
            prefix: prefix.map(str::to_owned),
            assume_string_value,
        }
    }
}

/// A node together with the byte range of the phrase it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpannedNode {
    pub node: BindingNode,
    pub span: Range<usize>,
}

impl SpannedNode {
    /// Quote character that delimited a string-valued reference.
    pub fn quote(&self, phrase: &str) -> Option<char> {
        match &self.node {
            BindingNode::NameReference {
                assume_string_value: true,
                ..
            }
            | BindingNode::PrefixReference {
                assume_string_value: true,
                ..
            } => phrase[self.span.clone()].chars().next(),
            _ => None,
        }
    }
}

/// A phrase and its parsed nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingPhrase {
    pub text: String,
    pub nodes: Vec<SpannedNode>,
}

impl BindingPhrase {
    pub fn parse(text: impl Into<String>) -> Self {
        let text = text.into();
        let nodes = parse_bindings(&text);
        Self { text, nodes }
    }

    /// Names consumed by `NameReference` nodes.
    pub fn referenced_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|n| match &n.node {
            BindingNode::NameReference { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Concatenation of every node's source span.
    pub fn reconstruct(&self) -> String {
        reconstruct(&self.text, &self.nodes)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse `text` into binding nodes. Never fails.
pub fn parse_bindings(text: &str) -> Vec<SpannedNode> {
    let mut nodes = Vec::new();
    let mut literal_start: Option<usize> = None;
    let mut pos = 0;

    while pos < text.len() {
        if let Some((node, end)) = reference_at(text, pos) {
            if let Some(start) = literal_start.take() {
                nodes.push(SpannedNode {
                    node: BindingNode::literal(&text[start..pos]),
                    span: start..pos,
                });
            }
            nodes.push(SpannedNode {
                node,
                span: pos..end,
            });
            pos = end;
            continue;
        }
        if literal_start.is_none() {
            literal_start = Some(pos);
        }
        pos += char_len_at(text, pos);
    }

    if let Some(start) = literal_start {
        nodes.push(SpannedNode {
            node: BindingNode::literal(&text[start..]),
            span: start..text.len(),
        });
    }
    nodes
}

/// Rebuild the original text from node spans.
pub fn reconstruct(text: &str, nodes: &[SpannedNode]) -> String {
    nodes
        .iter()
        .map(|n| &text[n.span.clone()])
        .collect::<Vec<_>>()
        .concat()
}

/// Try every reference form at `pos`, most specific first.
fn reference_at(text: &str, pos: usize) -> Option<(BindingNode, usize)> {
    string_prefix_reference(text, pos)
        .or_else(|| raw_prefix_reference(text, pos))
        .or_else(|| string_name_reference(text, pos))
        .or_else(|| raw_name_reference(text, pos))
}

fn string_prefix_reference(text: &str, pos: usize) -> Option<(BindingNode, usize)> {
    let quote = quote_at(text, pos)?;
    let at = pos + 1;
    if !text[at..].starts_with('@') {
        return None;
    }
    let name_start = at + 1;
    let name_end = name_end(text, name_start).unwrap_or(name_start);
    let rest = &text[name_end..];
    let mut chars = rest.chars();
    if chars.next() != Some('*') || chars.next() != Some(quote) {
        return None;
    }
    let prefix = optional_name(text, name_start, name_end);
    Some((BindingNode::prefix(prefix, true), name_end + 1 + quote.len_utf8()))
}

fn raw_prefix_reference(text: &str, pos: usize) -> Option<(BindingNode, usize)> {
    if !text[pos..].starts_with('@') {
        return None;
    }
    let name_start = pos + 1;
    let name_end = name_end(text, name_start).unwrap_or(name_start);
    if !text[name_end..].starts_with('*') {
        return None;
    }
    let prefix = optional_name(text, name_start, name_end);
    Some((BindingNode::prefix(prefix, false), name_end + 1))
}

fn string_name_reference(text: &str, pos: usize) -> Option<(BindingNode, usize)> {
    let quote = quote_at(text, pos)?;
    let at = pos + 1;
    if !text[at..].starts_with('@') {
        return None;
    }
    let name_start = at + 1;
    let name_end = name_end(text, name_start)?;
    if !text[name_end..].starts_with(quote) {
        return None;
    }
    Some((
        BindingNode::name(&text[name_start..name_end], true),
        name_end + quote.len_utf8(),
    ))
}

fn raw_name_reference(text: &str, pos: usize) -> Option<(BindingNode, usize)> {
    if !text[pos..].starts_with('@') {
        return None;
    }
    let name_start = pos + 1;
    let name_end = name_end(text, name_start)?;
    Some((BindingNode::name(&text[name_start..name_end], false), name_end))
}

/// End of the name starting at `start`, or `None` when no name starts there.
///
/// `Name ::= (Letter | '_' | ':') (Letter | Digit | '.' | '-' | '_' | ':')*`
fn name_end(text: &str, start: usize) -> Option<usize> {
    let mut chars = text[start..].char_indices();
    let (_, first) = chars.next()?;
    if !(first.is_alphabetic() || first == '_' || first == ':') {
        return None;
    }
    let mut end = start + first.len_utf8();
    for (offset, ch) in chars {
        if ch.is_alphanumeric() || matches!(ch, '.' | '-' | '_' | ':') {
            end = start + offset + ch.len_utf8();
        } else {
            break;
        }
    }
    Some(end)
}

fn optional_name(text: &str, start: usize, end: usize) -> Option<&str> {
    (end > start).then(|| &text[start..end])
}

fn quote_at(text: &str, pos: usize) -> Option<char> {
    match text[pos..].chars().next() {
        Some(q @ ('"' | '\'')) => Some(q),
        _ => None,
    }
}

fn char_len_at(text: &str, pos: usize) -> usize {
    text[pos..].chars().next().map(char::len_utf8).unwrap_or(1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(text: &str) -> Vec<BindingNode> {
        parse_bindings(text).into_iter().map(|n| n.node).collect()
    }

    #[test]
    fn raw_name_reference() {
        assert_eq!(nodes("@foo"), vec![BindingNode::name("foo", false)]);
    }

    #[test]
    fn quoted_prefix_reference() {
        assert_eq!(nodes("\"@foo*\""), vec![BindingNode::prefix(Some("foo"), true)]);
        assert_eq!(nodes("'@foo*'"), vec![BindingNode::prefix(Some("foo"), true)]);
    }

    #[test]
    fn bare_wildcard() {
        assert_eq!(nodes("@*"), vec![BindingNode::prefix(None, false)]);
        assert_eq!(nodes("\"@*\""), vec![BindingNode::prefix(None, true)]);
    }

    #[test]
    fn plain_text_is_single_literal() {
        assert_eq!(nodes("hello world"), vec![BindingNode::literal("hello world")]);
    }

    #[test]
    fn empty_input_has_no_nodes() {
        assert!(parse_bindings("").is_empty());
    }

    #[test]
    fn mixed_phrase() {
        assert_eq!(
            nodes("link(\"@text\", @action, @route.*)"),
            vec![
                BindingNode::literal("link("),
                BindingNode::name("text", true),
                BindingNode::literal(", "),
                BindingNode::name("action", false),
                BindingNode::literal(", "),
                BindingNode::prefix(Some("route."), false),
                BindingNode::literal(")"),
            ]
        );
    }

    #[test]
    fn lone_at_sign_is_literal() {
        assert_eq!(nodes("a @ b"), vec![BindingNode::literal("a @ b")]);
        assert_eq!(nodes("@1abc"), vec![BindingNode::literal("@1abc")]);
    }

    #[test]
    fn mismatched_quotes_fall_back_to_raw_reference() {
        assert_eq!(
            nodes("\"@foo'"),
            vec![
                BindingNode::literal("\""),
                BindingNode::name("foo", false),
                BindingNode::literal("'"),
            ]
        );
    }

    #[test]
    fn name_characters() {
        assert_eq!(
            nodes("@_x:y.z-1 "),
            vec![BindingNode::name("_x:y.z-1", false), BindingNode::literal(" ")]
        );
        assert_eq!(nodes("@имя"), vec![BindingNode::name("имя", false)]);
    }

    #[test]
    fn quote_is_recovered_from_span() {
        let phrase = BindingPhrase::parse("x='@v'");
        assert_eq!(phrase.nodes[1].quote(&phrase.text), Some('\''));
        assert_eq!(phrase.nodes[0].quote(&phrase.text), None);
    }

    #[test]
    fn referenced_names_lists_name_references_only() {
        let phrase = BindingPhrase::parse("<a href=\"@href\" @*>@child</a>");
        let names: Vec<&str> = phrase.referenced_names().collect();
        assert_eq!(names, vec!["href", "child"]);
    }

    #[test]
    fn reconstruct_is_lossless() {
        for text in [
            "",
            "@",
            "@*",
            "\"@\"",
            "'@a*'x\"@b\"@c*@d",
            "emails like a@b.com and 'quoted' \"text\"",
            "ünïcödé @ñame '@x*' \u{1F680}",
        ] {
            let phrase = BindingPhrase::parse(text);
            assert_eq!(phrase.reconstruct(), text, "round-trip failed for {text:?}");
        }
    }
}
