//! Page document
//!
//! Arena-backed tree built from HTML parsed by `scraper`. Unlike scraper's own
//! tree it can be mutated: nodes are created, replaced and detached the way
//! the banner logic needs. Detached nodes stay in the arena but are no longer
//! reachable from the root, so queries never see them.

use scraper::Html;
use std::collections::HashMap;
use std::fmt::Write;

use crate::error::DomError;
use crate::Result;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements whose text content is written out unescaped
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "xmp", "noembed", "noframes",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Doctype(String),
    Comment(String),
    Text(String),
    Element(Element),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => *existing = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attrs.iter().position(|(k, _)| k == name)?;
        Some(self.attrs.remove(index).1)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let mut classes: Vec<&str> = self.classes().collect();
        classes.push(class);
        let joined = classes.join(" ");
        self.set_attr("class", joined);
    }

    pub fn remove_class(&mut self, class: &str) {
        if !self.has_class(class) {
            return;
        }
        let joined = self
            .classes()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attr("class", joined);
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    const ROOT: NodeId = NodeId(0);

    pub fn empty() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse a complete HTML document; missing html/head/body are implied
    pub fn parse(source: &str) -> Self {
        let html = Html::parse_document(source);
        let mut doc = Self::empty();
        let mut ids = HashMap::new();

        for node in html.tree.root().descendants() {
            let kind = match node.value() {
                scraper::Node::Document | scraper::Node::Fragment => {
                    ids.insert(node.id(), Self::ROOT);
                    continue;
                }
                scraper::Node::Doctype(doctype) => NodeKind::Doctype(doctype.name().to_string()),
                scraper::Node::Comment(comment) => NodeKind::Comment(String::from(&*comment.comment)),
                scraper::Node::Text(text) => NodeKind::Text(String::from(&*text.text)),
                scraper::Node::Element(element) => NodeKind::Element(Element {
                    name: element.name().to_string(),
                    attrs: element
                        .attrs()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                }),
                _ => continue,
            };

            let parent = node
                .parent()
                .and_then(|p| ids.get(&p.id()).copied())
                .unwrap_or(Self::ROOT);
            let id = doc.push(kind);
            doc.nodes[id.0].parent = Some(parent);
            doc.nodes[parent.0].children.push(id);
            ids.insert(node.id(), id);
        }

        doc
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(DomError::NotFound(id))
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id)? {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the node is reachable from the document root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == Self::ROOT {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Pre-order descendants of `scope`, excluding `scope` itself
    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }

        out
    }

    /// Attached elements matching `predicate`, in document order
    pub fn select<F>(&self, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&Element) -> bool,
    {
        self.select_within(Self::ROOT, predicate)
    }

    pub fn select_within<F>(&self, scope: NodeId, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&Element) -> bool,
    {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.element(*id).map(&predicate).unwrap_or(false))
            .collect()
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.select(|el| el.id() == Some(id)).into_iter().next()
    }

    pub fn body(&self) -> Option<NodeId> {
        self.select(|el| el.name() == "body").into_iter().next()
    }

    /// Create a detached element
    pub fn create_element(&mut self, element: Element) -> NodeId {
        self.push(NodeKind::Element(element))
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node(parent)?;
        self.node(child)?;
        if self.is_ancestor_or_self(child, parent) {
            return Err(DomError::Cycle { parent, child });
        }

        self.unlink(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Put `new` where `old` is; `old` ends up detached
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        self.node(new)?;
        let parent = self.node(old)?.parent.ok_or(DomError::NoParent(old))?;
        if old == new {
            return Ok(());
        }
        if self.is_ancestor_or_self(new, parent) {
            return Err(DomError::Cycle { parent, child: new });
        }

        self.unlink(new);
        let siblings = &mut self.nodes[parent.0].children;
        let index = siblings
            .iter()
            .position(|c| *c == old)
            .ok_or(DomError::NotFound(old))?;
        siblings[index] = new;

        self.nodes[old.0].parent = None;
        self.nodes[new.0].parent = Some(parent);
        Ok(())
    }

    /// Remove the node (and its subtree) from the document
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?;
        self.unlink(id);
        Ok(())
    }

    fn unlink(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|n| match self.kind(n) {
                Some(NodeKind::Text(text)) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for child in self.children(Self::ROOT) {
            self.write_node(*child, false, &mut out);
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, false, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, raw_text: bool, out: &mut String) {
        let Some(kind) = self.kind(id) else {
            return;
        };

        match kind {
            NodeKind::Document => {
                for child in self.children(id) {
                    self.write_node(*child, false, out);
                }
            }
            NodeKind::Doctype(name) => {
                let _ = write!(out, "<!DOCTYPE {}>", name);
            }
            NodeKind::Comment(comment) => {
                let _ = write!(out, "<!--{}-->", comment);
            }
            NodeKind::Text(text) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    out.push_str(&escape(text, false));
                }
            }
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.name);
                for (name, value) in &element.attrs {
                    let _ = write!(out, " {}=\"{}\"", name, escape(value, true));
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&element.name.as_str()) {
                    return;
                }

                let raw = RAW_TEXT_ELEMENTS.contains(&element.name.as_str());
                for child in self.children(id) {
                    self.write_node(*child, raw, out);
                }
                let _ = write!(out, "</{}>", element.name);
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::parse("")
    }
}

fn escape(input: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}
