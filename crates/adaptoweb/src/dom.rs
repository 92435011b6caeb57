//! Document tree on top of scraper's `Html`.
//!
//! The tree itself is the `ego_tree` arena inside [`scraper::Html`], so
//! selector matching and serialization come straight from scraper. Nodes are
//! addressed by [`NodeId`] handles that stay valid for the lifetime of the
//! [`Document`]: detaching a node never frees it, so undo records held by the
//! adaptation modules can always resolve the handles they stored.
//!
//! Besides the tree the document carries the bits of browser state the
//! modules interact with: registered event listeners, a mutation log of
//! inserted nodes, media playback state, and host-supplied bounding boxes.

use std::collections::{HashMap, HashSet};
use std::fmt;

use ego_tree::NodeRef;
use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use scraper::node::{Element, Text};
use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};

use crate::events::{EventKind, Listener};
use crate::types::{AdaptError, AdaptResult};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Parse a CSS selector, mapping scraper's error into [`AdaptError`].
pub fn parse_selector(css: &str) -> AdaptResult<Selector> {
    Selector::parse(css).map_err(|e| AdaptError::InvalidSelector(format!("{css}: {e}")))
}

/// Stable handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Registration order of the node within its document.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Host-supplied element geometry in viewport coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Nodes inserted under an attached parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
}

/// Prior values of a fixed set of inline style properties.
///
/// Captured before a module writes those properties and replayed on removal.
/// Restoring only the captured properties keeps modules that style the same
/// element from clobbering each other.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSnapshot {
    raw: Option<String>,
    properties: Vec<(String, Option<String>)>,
}

impl StyleSnapshot {
    /// The `style` attribute exactly as it was captured.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Prior value of one captured property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(p, _)| p == name)
            .and_then(|(_, v)| v.as_deref())
    }
}

/// An HTML document plus the page state the modules read and write.
#[derive(Debug, Clone)]
pub struct Document {
    html: Html,
    handles: Vec<ego_tree::NodeId>,
    ids: HashMap<ego_tree::NodeId, NodeId>,
    listeners: HashMap<NodeId, Vec<(EventKind, Listener)>>,
    mutations: Vec<MutationRecord>,
    paused: HashSet<NodeId>,
    rects: HashMap<NodeId, Rect>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document containing only the root node.
    pub fn new() -> Self {
        Self::from_html(Html::new_document())
    }

    /// Wrap a parsed tree. Every node gets a handle; the root is the first.
    pub(crate) fn from_html(html: Html) -> Self {
        let handles: Vec<ego_tree::NodeId> = html.tree.nodes().map(|n| n.id()).collect();
        let ids = handles
            .iter()
            .enumerate()
            .map(|(i, &h)| (h, NodeId(i)))
            .collect();
        Self {
            html,
            handles,
            ids,
            listeners: HashMap::new(),
            mutations: Vec::new(),
            paused: HashSet::new(),
            rects: HashMap::new(),
        }
    }

    /// The underlying scraper tree.
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// The document root.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of allocated nodes, attached or not.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.len() <= 1
    }

    /// The `<body>` element, or the root when the document has none.
    pub fn body(&self) -> NodeId {
        self.descendants(self.root())
            .into_iter()
            .find(|&id| self.tag_name(id) == Some("body"))
            .unwrap_or_else(|| self.root())
    }

    fn handle(&self, id: NodeId) -> AdaptResult<ego_tree::NodeId> {
        self.handles
            .get(id.0)
            .copied()
            .ok_or(AdaptError::NodeNotFound(id))
    }

    fn node_ref(&self, id: NodeId) -> Option<NodeRef<'_, Node>> {
        self.handles
            .get(id.0)
            .and_then(|&h| self.html.tree.get(h))
    }

    fn id_of(&self, node: NodeRef<'_, Node>) -> Option<NodeId> {
        self.ids.get(&node.id()).copied()
    }

    fn insert(&mut self, value: Node) -> NodeId {
        let handle = self.html.tree.orphan(value).id();
        let id = NodeId(self.handles.len());
        self.handles.push(handle);
        self.ids.insert(handle, id);
        id
    }

    // ── Node creation ───────────────────────────────────────────────

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let name = QualName::new(
            None,
            Namespace::from(HTML_NAMESPACE),
            LocalName::from(tag.to_ascii_lowercase()),
        );
        self.insert(Node::Element(Element::new(name, Vec::new())))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.insert(Node::Text(Text {
            text: scraper::StrTendril::from(text),
        }))
    }

    /// Create a detached copy of `id`. Listeners are not copied.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> AdaptResult<NodeId> {
        let value = self
            .node_ref(id)
            .ok_or(AdaptError::NodeNotFound(id))?
            .value()
            .clone();
        let copy = self.insert(value);
        if deep {
            for child in self.children(id) {
                let child_copy = self.clone_node(child, true)?;
                self.link(copy, child_copy)?;
            }
        }
        Ok(copy)
    }

    /// Deep-copy a node from another scraper tree into this document.
    pub(crate) fn adopt(&mut self, source: NodeRef<'_, Node>) -> AdaptResult<NodeId> {
        let copy = self.insert(source.value().clone());
        for child in source.children() {
            let child_copy = self.adopt(child)?;
            self.link(copy, child_copy)?;
        }
        Ok(copy)
    }

    // ── Tree structure ──────────────────────────────────────────────

    /// The scraper element behind `id`.
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.node_ref(id).and_then(|n| n.value().as_element())
    }

    /// `id` wrapped for scraper's selector and serialization APIs.
    pub fn element_ref(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.node_ref(id).and_then(ElementRef::wrap)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Lowercase tag name of an element.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node_ref(id)
            .and_then(|n| n.parent())
            .and_then(|p| self.id_of(p))
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node_ref(id)
            .map(|n| n.children().filter_map(|c| self.id_of(c)).collect())
            .unwrap_or_default()
    }

    /// Direct children that are elements.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .into_iter()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    /// The element sibling immediately before `id`.
    pub fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node_ref(id)?
            .prev_siblings()
            .find(|s| s.value().is_element())
            .and_then(|s| self.id_of(s))
    }

    /// All nodes below `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.node_ref(id)
            .map(|n| n.descendants().skip(1).filter_map(|d| self.id_of(d)).collect())
            .unwrap_or_default()
    }

    /// Whether `node` is `ancestor` or lies inside it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Whether the node is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(self.root(), id)
    }

    /// Nearest inclusive ancestor element with the given tag.
    pub fn closest(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if self.tag_name(current) == Some(tag) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    fn link(&mut self, parent: NodeId, child: NodeId) -> AdaptResult<()> {
        let child = self.handle(child)?;
        let parent_handle = self.handle(parent)?;
        let mut parent_node = self
            .html
            .tree
            .get_mut(parent_handle)
            .ok_or(AdaptError::NodeNotFound(parent))?;
        parent_node.append_id(child);
        Ok(())
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    ///
    /// Insertions under an attached parent are appended to the mutation log.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> AdaptResult<()> {
        let parent_node = self.node_ref(parent).ok_or(AdaptError::NodeNotFound(parent))?;
        let leaf = matches!(
            parent_node.value(),
            Node::Text(_) | Node::Comment(_) | Node::Doctype(_)
        );
        self.handle(child)?;
        if leaf || child == self.root() || self.contains(child, parent) {
            return Err(AdaptError::InvalidHierarchy { parent, child });
        }

        self.link(parent, child)?;

        if self.is_attached(parent) {
            self.mutations.push(MutationRecord {
                target: parent,
                added: vec![child],
            });
        }
        Ok(())
    }

    /// Remove a node from its parent. The node and its subtree stay allocated.
    pub fn detach(&mut self, id: NodeId) -> AdaptResult<()> {
        let handle = self.handle(id)?;
        if let Some(mut node) = self.html.tree.get_mut(handle) {
            node.detach();
        }
        Ok(())
    }

    /// Detach every child of `id` and return them in their original order.
    pub fn take_children(&mut self, id: NodeId) -> AdaptResult<Vec<NodeId>> {
        self.handle(id)?;
        let children = self.children(id);
        for &child in &children {
            self.detach(child)?;
        }
        Ok(children)
    }

    // ── Text ────────────────────────────────────────────────────────

    /// Concatenated text of the node and all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        self.node_ref(id)
            .map(|n| {
                n.descendants()
                    .filter_map(|d| d.value().as_text())
                    .map(|t| &**t)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace all children of `id` with a single text node.
    ///
    /// Returns the previous children, detached, so callers can put them back.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> AdaptResult<Vec<NodeId>> {
        let previous = self.take_children(id)?;
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node)?;
        }
        Ok(previous)
    }

    // ── Attributes ──────────────────────────────────────────────────

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    /// Rewrite the attribute list of an element.
    ///
    /// The element is rebuilt afterwards so scraper's cached `id` and class
    /// lists follow the new attributes.
    fn edit_attrs<R>(
        &mut self,
        id: NodeId,
        edit: impl FnOnce(&mut Vec<(QualName, String)>) -> R,
    ) -> AdaptResult<R> {
        let handle = self.handle(id)?;
        let mut node = self
            .html
            .tree
            .get_mut(handle)
            .ok_or(AdaptError::NodeNotFound(id))?;
        let Node::Element(el) = node.value() else {
            return Err(AdaptError::NotAnElement(id));
        };
        let mut attrs: Vec<(QualName, String)> = el
            .attrs
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();
        let out = edit(&mut attrs);
        let rebuilt = attrs
            .into_iter()
            .map(|(name, value)| Attribute {
                name,
                value: StrTendril::from_slice(&value),
            })
            .collect();
        *el = Element::new(el.name.clone(), rebuilt);
        Ok(out)
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> AdaptResult<()> {
        self.edit_attrs(id, |attrs| {
            match attrs.iter_mut().find(|(k, _)| &*k.local == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((
                    QualName::new(None, Namespace::from(""), LocalName::from(name)),
                    value.to_string(),
                )),
            }
        })
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> AdaptResult<Option<String>> {
        if !self.has_attr(id, name) {
            self.handle(id)?;
            return Ok(None);
        }
        self.edit_attrs(id, |attrs| {
            let pos = attrs.iter().position(|(k, _)| &*k.local == name);
            pos.map(|p| attrs.remove(p).1)
        })
    }

    // ── Inline style ────────────────────────────────────────────────

    /// Parsed declarations of the `style` attribute, in source order.
    pub fn style_declarations(&self, id: NodeId) -> Vec<(String, String)> {
        parse_style(self.attr(id, "style").unwrap_or(""))
    }

    /// Value of one inline style property.
    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        self.style_declarations(id)
            .into_iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v)
    }

    /// Set one inline style property. An empty value removes it, and the
    /// `style` attribute disappears once no declarations remain.
    pub fn set_style_property(&mut self, id: NodeId, property: &str, value: &str) -> AdaptResult<()> {
        let property = property.trim().to_ascii_lowercase();
        let mut decls = self.style_declarations(id);
        if value.is_empty() {
            decls.retain(|(p, _)| *p != property);
        } else {
            match decls.iter_mut().find(|(p, _)| *p == property) {
                Some((_, v)) => *v = value.to_string(),
                None => decls.push((property, value.to_string())),
            }
        }
        self.write_style(id, &decls)
    }

    /// Replace the whole `style` attribute.
    pub fn set_style_text(&mut self, id: NodeId, css: &str) -> AdaptResult<()> {
        self.write_style(id, &parse_style(css))
    }

    fn write_style(&mut self, id: NodeId, decls: &[(String, String)]) -> AdaptResult<()> {
        if decls.is_empty() {
            self.remove_attr(id, "style")?;
            return Ok(());
        }
        self.set_attr(id, "style", &serialize_style(decls))
    }

    /// Record the current values of `properties` on `id`.
    pub fn capture_style(&self, id: NodeId, properties: &[&str]) -> StyleSnapshot {
        StyleSnapshot {
            raw: self.attr(id, "style").map(str::to_string),
            properties: properties
                .iter()
                .map(|p| (p.to_string(), self.style_property(id, p)))
                .collect(),
        }
    }

    /// Put the captured properties back. When the result is equivalent to the
    /// captured attribute, the original text is restored byte for byte.
    pub fn restore_style(&mut self, id: NodeId, snapshot: &StyleSnapshot) -> AdaptResult<()> {
        for (property, value) in &snapshot.properties {
            self.set_style_property(id, property, value.as_deref().unwrap_or(""))?;
        }
        if let Some(raw) = &snapshot.raw {
            if parse_style(raw) == self.style_declarations(id) {
                self.set_attr(id, "style", raw)?;
            }
        }
        Ok(())
    }

    // ── Selection ───────────────────────────────────────────────────

    /// Whether the element `id` matches `selector`. Combinators are checked
    /// against the node's current ancestors.
    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.element_ref(id)
            .is_some_and(|el| selector.matches(&el))
    }

    /// Elements below `scope` matching `selector`, in document order.
    pub fn select(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&id| self.matches(id, selector))
            .collect()
    }

    /// First element below `scope` matching `selector`.
    pub fn select_first(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|&id| self.matches(id, selector))
    }

    // ── Listeners ───────────────────────────────────────────────────

    pub fn add_listener(&mut self, id: NodeId, kind: EventKind, listener: Listener) {
        let entry = self.listeners.entry(id).or_default();
        if !entry.iter().any(|(k, l)| *k == kind && *l == listener) {
            entry.push((kind, listener));
        }
    }

    /// Listeners registered on `id` for `kind`, in registration order.
    pub fn listeners(&self, id: NodeId, kind: EventKind) -> Vec<Listener> {
        self.listeners
            .get(&id)
            .map(|ls| {
                ls.iter()
                    .filter(|(k, _)| *k == kind)
                    .map(|(_, l)| l.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn remove_listener(&mut self, id: NodeId, kind: EventKind, listener: &Listener) {
        if let Some(ls) = self.listeners.get_mut(&id) {
            ls.retain(|(k, l)| !(*k == kind && l == listener));
            if ls.is_empty() {
                self.listeners.remove(&id);
            }
        }
    }

    /// Drop every listener on `id` and its descendants.
    pub fn clear_listeners(&mut self, id: NodeId) {
        self.listeners.remove(&id);
        for node in self.descendants(id) {
            self.listeners.remove(&node);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Drain the mutation log.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    /// Put records back at the front of the log, ahead of anything newer.
    pub fn requeue_mutations(&mut self, records: Vec<MutationRecord>) {
        if records.is_empty() {
            return;
        }
        let newer = std::mem::replace(&mut self.mutations, records);
        self.mutations.extend(newer);
    }

    pub fn pending_mutations(&self) -> usize {
        self.mutations.len()
    }

    // ── Media & geometry ────────────────────────────────────────────

    /// Stop playback of a media element.
    pub fn pause_media(&mut self, id: NodeId) {
        self.paused.insert(id);
    }

    pub fn is_paused(&self, id: NodeId) -> bool {
        self.paused.contains(&id)
    }

    pub fn set_bounding_rect(&mut self, id: NodeId, rect: Rect) {
        self.rects.insert(id, rect);
    }

    /// Geometry reported by the host, or an empty rect.
    pub fn bounding_rect(&self, id: NodeId) -> Rect {
        self.rects.get(&id).copied().unwrap_or_default()
    }
}

/// Split a `style` attribute into `(property, value)` pairs.
pub fn parse_style(css: &str) -> Vec<(String, String)> {
    css.split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim();
            if prop.is_empty() || value.is_empty() {
                return None;
            }
            Some((prop, value.to_string()))
        })
        .collect()
}

fn serialize_style(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(p, v)| format!("{p}: {v};"))
        .collect::<Vec<_>>()
        .join(" ")
}
