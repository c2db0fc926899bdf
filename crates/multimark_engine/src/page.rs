//! Arena DOM of one loaded page.
//!
//! The page is parsed once with `scraper` and copied into an `ego_tree` arena
//! of [`PageNode`]s that the document engine can split and merge in place.
//! Node handles ([`NodeId`]) stay valid for the life of the page; detached
//! nodes simply stop being reachable from the root.

use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};

use ego_tree::iter::Edge;
use ego_tree::{NodeId, NodeRef, Tree};
use multimark_core::ThemeId;
use scraper::node::Node;
use scraper::{Html, Selector};

pub const HIGHLIGHT_CLASS: &str = "multimark-highlight";
pub const CURRENT_CLASS: &str = "multimark-current";

/// Containers whose text is never rendered as page content or belongs to
/// form controls.
const UNSEARCHABLE_CONTAINERS: &[&str] = &[
    "script", "style", "noscript", "template", "textarea", "input",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageNode {
    Document,
    Element(PageElement),
    Text(String),
    Comment(String),
    /// Highlight wrapper inserted by the engine around one matched fragment.
    Marker(Marker),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub theme: ThemeId,
    pub current: bool,
}

impl Marker {
    pub fn new(theme: ThemeId) -> Self {
        Self {
            theme,
            current: false,
        }
    }

    fn class_list(&self) -> String {
        let mut classes = format!("{HIGHLIGHT_CLASS} multimark-theme-{}", self.theme);
        if self.current {
            classes.push(' ');
            classes.push_str(CURRENT_CLASS);
        }
        classes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("node {0:?} is not a text node")]
    NotText(NodeId),
    #[error("node {0:?} is not attached to a parent")]
    Detached(NodeId),
}

#[derive(Debug, Clone)]
pub struct PageDocument {
    tree: Tree<PageNode>,
    url: String,
    title: Option<String>,
    scrolled_to: Option<NodeId>,
}

impl PageDocument {
    pub fn parse(url: impl Into<String>, html: &str) -> Self {
        let source = Html::parse_document(html);
        let title = Selector::parse("title")
            .ok()
            .and_then(|sel| {
                source
                    .select(&sel)
                    .next()
                    .map(|t| t.text().collect::<String>().trim().to_string())
            })
            .filter(|t| !t.is_empty());

        let mut tree = Tree::new(PageNode::Document);
        let root_id = tree.root().id();
        let mut pending: Vec<(NodeRef<'_, Node>, NodeId)> = source
            .tree
            .root()
            .children()
            .rev()
            .map(|child| (child, root_id))
            .collect();

        // Children are pushed in reverse so each parent receives them in document order.
        while let Some((node, parent_id)) = pending.pop() {
            let Some(value) = convert_node(node.value()) else {
                continue;
            };
            let Some(mut parent) = tree.get_mut(parent_id) else {
                continue;
            };
            let id = parent.append(value).id();
            pending.extend(node.children().rev().map(|child| (child, id)));
        }

        Self {
            tree,
            url: url.into(),
            title,
            scrolled_to: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn tree(&self) -> &Tree<PageNode> {
        &self.tree
    }

    /// The `<body>` element, or the document root for body-less fragments.
    pub fn body(&self) -> NodeId {
        self.tree
            .root()
            .descendants()
            .find(|node| matches!(node.value(), PageNode::Element(el) if el.name == "body"))
            .map(|node| node.id())
            .unwrap_or_else(|| self.tree.root().id())
    }

    pub fn node(&self, id: NodeId) -> Option<&PageNode> {
        self.tree.get(id).map(|node| node.value())
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        let root = self.tree.root().id();
        match self.tree.get(id) {
            Some(node) => node.id() == root || node.ancestors().any(|a| a.id() == root),
            None => false,
        }
    }

    /// Text nodes under the body in document order that a search may wrap.
    ///
    /// Skips unsearchable containers and anything already inside a marker.
    pub fn searchable_text_nodes(&self) -> Vec<NodeId> {
        let mut found = Vec::new();
        let Some(body) = self.tree.get(self.body()) else {
            return found;
        };
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            match node.value() {
                PageNode::Text(text) => {
                    if !text.is_empty() {
                        found.push(node.id());
                    }
                }
                PageNode::Marker(_) => {}
                PageNode::Element(el) if is_unsearchable(&el.name) => {}
                PageNode::Element(_) | PageNode::Document => {
                    stack.extend(node.children().rev());
                }
                PageNode::Comment(_) => {}
            }
        }
        found
    }

    /// Concatenated text of everything the user can read, marker contents included.
    pub fn rendered_text(&self) -> String {
        let mut out = String::new();
        let Some(body) = self.tree.get(self.body()) else {
            return out;
        };
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            match node.value() {
                PageNode::Text(text) => out.push_str(text),
                PageNode::Element(el) if is_unsearchable(&el.name) => {}
                PageNode::Comment(_) => {}
                _ => stack.extend(node.children().rev()),
            }
        }
        out
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.tree.get(id) else {
            return String::new();
        };
        node.descendants()
            .filter_map(|d| match d.value() {
                PageNode::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replaces text node `id` by plain fragments interleaved with one marker
    /// per range. Returns the marker nodes in document order.
    ///
    /// Ranges must be sorted, non-overlapping and on char boundaries.
    pub fn wrap_ranges(
        &mut self,
        id: NodeId,
        ranges: &[Range<usize>],
        marker: Marker,
    ) -> Result<Vec<NodeId>, PageError> {
        let text = match self.node(id) {
            Some(PageNode::Text(text)) => text.clone(),
            _ => return Err(PageError::NotText(id)),
        };
        let has_parent = self.tree.get(id).and_then(|node| node.parent()).is_some();
        if !has_parent || !self.is_attached(id) {
            return Err(PageError::Detached(id));
        }
        let mut node = self.tree.get_mut(id).ok_or(PageError::NotText(id))?;

        let mut markers = Vec::with_capacity(ranges.len());
        let mut cursor = 0;
        for range in ranges {
            if range.start > cursor {
                node.insert_before(PageNode::Text(text[cursor..range.start].to_string()));
            }
            let mut wrapper = node.insert_before(PageNode::Marker(marker));
            wrapper.append(PageNode::Text(text[range.clone()].to_string()));
            markers.push(wrapper.id());
            cursor = range.end;
        }
        if cursor < text.len() {
            node.insert_before(PageNode::Text(text[cursor..].to_string()));
        }
        node.detach();
        Ok(markers)
    }

    /// Replaces a marker by a plain text node holding its text.
    ///
    /// Returns the parent so callers can [`normalize`](Self::normalize) once
    /// per parent. `None` when the node is not an attached marker.
    pub fn unwrap_marker(&mut self, id: NodeId) -> Option<NodeId> {
        let node = self.tree.get(id)?;
        if !matches!(node.value(), PageNode::Marker(_)) {
            return None;
        }
        let parent = node.parent()?.id();
        let text = self.text_content(id);
        if self.scrolled_to == Some(id) {
            self.scrolled_to = None;
        }
        let mut node = self.tree.get_mut(id)?;
        node.insert_before(PageNode::Text(text));
        node.detach();
        Some(parent)
    }

    /// Merges adjacent text children of `parent` and drops empty ones.
    pub fn normalize(&mut self, parent: NodeId) {
        let Some(node) = self.tree.get(parent) else {
            return;
        };
        let children: Vec<NodeId> = node.children().map(|child| child.id()).collect();
        let mut run_head: Option<NodeId> = None;
        for child in children {
            let text = match self.node(child) {
                Some(PageNode::Text(text)) => text.clone(),
                _ => {
                    run_head = None;
                    continue;
                }
            };
            if text.is_empty() {
                if let Some(mut empty) = self.tree.get_mut(child) {
                    empty.detach();
                }
                continue;
            }
            match run_head {
                Some(head) => {
                    if let Some(mut head) = self.tree.get_mut(head) {
                        if let PageNode::Text(existing) = head.value() {
                            existing.push_str(&text);
                        }
                    }
                    if let Some(mut merged) = self.tree.get_mut(child) {
                        merged.detach();
                    }
                }
                None => run_head = Some(child),
            }
        }
    }

    pub fn set_marker_current(&mut self, id: NodeId, current: bool) {
        if let Some(mut node) = self.tree.get_mut(id) {
            if let PageNode::Marker(marker) = node.value() {
                marker.current = current;
            }
        }
    }

    pub fn scroll_into_view(&mut self, id: NodeId) {
        self.scrolled_to = Some(id);
    }

    pub fn scroll_target(&self) -> Option<NodeId> {
        self.scrolled_to
    }

    /// Markers currently attached to the document, in document order.
    pub fn markers(&self) -> Vec<(NodeId, Marker)> {
        self.tree
            .root()
            .descendants()
            .filter_map(|node| match node.value() {
                PageNode::Marker(marker) => Some((node.id(), *marker)),
                _ => None,
            })
            .collect()
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for edge in self.tree.root().traverse() {
            match edge {
                Edge::Open(node) => match node.value() {
                    PageNode::Document => {}
                    PageNode::Element(el) => {
                        out.push('<');
                        out.push_str(&el.name);
                        for (name, value) in &el.attrs {
                            out.push(' ');
                            out.push_str(name);
                            out.push_str("=\"");
                            out.push_str(&escape_attr(value));
                            out.push('"');
                        }
                        out.push('>');
                    }
                    PageNode::Text(text) => {
                        if parent_is_raw_text(node) {
                            out.push_str(text);
                        } else {
                            out.push_str(&escape_text(text));
                        }
                    }
                    PageNode::Comment(comment) => {
                        out.push_str("<!--");
                        out.push_str(comment);
                        out.push_str("-->");
                    }
                    PageNode::Marker(marker) => {
                        out.push_str("<mark class=\"");
                        out.push_str(&marker.class_list());
                        out.push_str("\">");
                    }
                },
                Edge::Close(node) => match node.value() {
                    PageNode::Element(el) if !VOID_ELEMENTS.contains(&el.name.as_str()) => {
                        out.push_str("</");
                        out.push_str(&el.name);
                        out.push('>');
                    }
                    PageNode::Marker(_) => out.push_str("</mark>"),
                    _ => {}
                },
            }
        }
        out
    }
}

/// Page DOM shared between a tab and the engine injected into it.
///
/// Only the document engine mutates it; the lock is never held across an await.
#[derive(Debug, Clone)]
pub struct LivePage {
    inner: Arc<Mutex<PageDocument>>,
}

impl LivePage {
    pub fn new(document: PageDocument) -> Self {
        Self {
            inner: Arc::new(Mutex::new(document)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&PageDocument) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut PageDocument) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn url(&self) -> String {
        self.read(|doc| doc.url().to_string())
    }

    pub fn title(&self) -> Option<String> {
        self.read(|doc| doc.title().map(str::to_string))
    }

    pub fn to_html(&self) -> String {
        self.read(PageDocument::to_html)
    }

    pub fn rendered_text(&self) -> String {
        self.read(PageDocument::rendered_text)
    }
}

pub(crate) fn is_unsearchable(name: &str) -> bool {
    UNSEARCHABLE_CONTAINERS
        .iter()
        .any(|tag| tag.eq_ignore_ascii_case(name))
}

fn convert_node(node: &Node) -> Option<PageNode> {
    match node {
        Node::Text(text) => {
            let content: &str = text;
            Some(PageNode::Text(content.to_owned()))
        }
        Node::Element(element) => Some(PageNode::Element(PageElement {
            name: element.name().to_ascii_lowercase(),
            attrs: element
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        })),
        Node::Comment(comment) => {
            let content: &str = comment;
            Some(PageNode::Comment(content.to_owned()))
        }
        _ => None,
    }
}

fn parent_is_raw_text(node: NodeRef<'_, PageNode>) -> bool {
    matches!(
        node.parent().map(|p| p.value()),
        Some(PageNode::Element(el)) if el.name == "script" || el.name == "style"
    )
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::{Marker, PageDocument, PageNode};
    use multimark_core::ThemeId;

    fn page(body: &str) -> PageDocument {
        PageDocument::parse(
            "https://example.com",
            &format!("<html><head><title> Demo </title></head><body>{body}</body></html>"),
        )
    }

    #[test]
    fn parse_keeps_title_and_body_text() {
        let doc = page("<p>Hello <b>world</b></p>");
        assert_eq!(doc.title(), Some("Demo"));
        assert_eq!(doc.rendered_text(), "Hello world");
    }

    #[test]
    fn searchable_nodes_skip_scripts_and_inputs() {
        let doc = page("<p>a</p><script>var a;</script><style>.a{}</style><textarea>a</textarea>");
        let texts: Vec<String> = doc
            .searchable_text_nodes()
            .into_iter()
            .map(|id| doc.text_content(id))
            .collect();
        assert_eq!(texts, vec!["a".to_string()]);
    }

    #[test]
    fn wrap_then_unwrap_restores_single_text_node() {
        let mut doc = page("<p>cat sat</p>");
        let text_id = doc.searchable_text_nodes()[0];
        let markers = doc
            .wrap_ranges(text_id, &[1..3, 5..7], Marker::new(ThemeId::Ocean))
            .expect("wrap");
        assert_eq!(markers.len(), 2);
        assert!(doc.to_html().contains(
            "<p>c<mark class=\"multimark-highlight multimark-theme-ocean\">at</mark> s"
        ));

        let mut parents = Vec::new();
        for marker in markers {
            parents.extend(doc.unwrap_marker(marker));
        }
        parents.dedup();
        for parent in parents {
            doc.normalize(parent);
        }

        let nodes = doc.searchable_text_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(doc.node(nodes[0]), Some(&PageNode::Text("cat sat".to_string())));
    }

    #[test]
    fn wrapping_detached_node_fails() {
        let mut doc = page("<p>cat</p>");
        let text_id = doc.searchable_text_nodes()[0];
        let first = doc
            .wrap_ranges(text_id, &[0..3], Marker::new(ThemeId::Default))
            .expect("wrap");
        assert_eq!(first.len(), 1);

        // The original text node is detached by the first wrap.
        let err = doc
            .wrap_ranges(text_id, &[0..1], Marker::new(ThemeId::Default))
            .unwrap_err();
        assert_eq!(err, super::PageError::Detached(text_id));
    }

    #[test]
    fn html_escapes_text() {
        let doc = page("<p>a &lt; b</p>");
        assert!(doc.to_html().contains("<p>a &lt; b</p>"));
    }
}
