//! HTML parsing and serialization.
//!
//! Parsing goes through `scraper` (html5ever), so malformed markup is
//! recovered the same way a browser would before the modules ever see it.
//! Serialization is html5ever's serializer run over the live tree.

use scraper::Html;

use crate::dom::{Document, NodeId};
use crate::types::AdaptResult;

/// Parse a full HTML document.
pub fn parse_document(html: &str) -> AdaptResult<Document> {
    Ok(Document::from_html(Html::parse_document(html)))
}

/// Parse an HTML fragment into detached nodes owned by `doc`.
///
/// The returned nodes are in source order; append them wherever they belong.
pub fn parse_fragment(doc: &mut Document, html: &str) -> AdaptResult<Vec<NodeId>> {
    let source = Html::parse_fragment(html);
    let container = source.root_element();
    container
        .children()
        .map(|child| doc.adopt(child))
        .collect()
}

/// Serialize the whole document.
pub fn to_html(doc: &Document) -> String {
    doc.html().html()
}

/// Serialize an element including its own tag.
pub fn outer_html(doc: &Document, id: NodeId) -> Option<String> {
    doc.element_ref(id).map(|el| el.html())
}

/// Serialize the children of an element.
pub fn inner_html(doc: &Document, id: NodeId) -> Option<String> {
    doc.element_ref(id).map(|el| el.inner_html())
}
