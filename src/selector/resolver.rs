//! Structural selector resolution
//!
//! Computes a CSS path that addresses exactly one element of a document: an id
//! selector when the element (or one of its ancestors) has a unique id, and a
//! `>`-joined chain of tag names with `:nth-of-type` qualifiers otherwise.

use scraper::ElementRef;

/// Resolves the structural selector of an element
///
/// # Algorithm
///
/// 1. If the element has a unique `id`, return the id selector.
/// 2. Otherwise walk up the ancestors. Each level contributes its tag name,
///    qualified with `:nth-of-type(k)` when same-tag siblings exist.
/// 3. The walk stops at the root element, or at the first ancestor with a
///    unique `id`, which becomes the leading segment.
///
/// # Example
///
/// ```
/// use pagesweep::selector::resolve_selector;
/// use scraper::{Html, Selector};
///
/// let html = Html::parse_document(r#"<div id="list"><p>a</p><p>b</p></div>"#);
/// let second = html.select(&Selector::parse("p").unwrap()).nth(1).unwrap();
/// assert_eq!(resolve_selector(second), "#list > p:nth-of-type(2)");
/// ```
pub fn resolve_selector(element: ElementRef) -> String {
    if let Some(anchor) = unique_id_selector(element) {
        return anchor;
    }

    let mut path = Vec::new();
    let mut current = element;

    while let Some(parent) = parent_element(current) {
        path.push(segment(current, parent));
        current = parent;

        if let Some(anchor) = unique_id_selector(current) {
            path.push(anchor);
            break;
        }
    }

    if path.is_empty() {
        // The root element has no parent element to qualify against
        return current.value().name().to_string();
    }

    path.reverse();
    path.join(" > ")
}

fn parent_element(element: ElementRef) -> Option<ElementRef> {
    let node = *element;
    node.parent().and_then(ElementRef::wrap)
}

/// Tag name, with a 1-based rank among same-tag siblings when ambiguous
fn segment(element: ElementRef, parent: ElementRef) -> String {
    let tag = element.value().name();
    let parent_node = *parent;
    let same_tag: Vec<ElementRef> = parent_node
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|sibling| sibling.value().name() == tag)
        .collect();

    if same_tag.len() > 1 {
        let rank = same_tag
            .iter()
            .position(|sibling| *sibling == element)
            .map_or(1, |i| i + 1);
        format!("{}:nth-of-type({})", tag, rank)
    } else {
        tag.to_string()
    }
}

/// Id selector for the element, if its id is unique within the document
fn unique_id_selector(element: ElementRef) -> Option<String> {
    let id = element.value().id().filter(|id| !id.is_empty())?;

    let node = *element;
    let root = node.ancestors().last().unwrap_or(node);
    let holders = root
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().id() == Some(id))
        .take(2)
        .count();

    if holders != 1 {
        return None;
    }

    Some(id_selector(id))
}

/// `#id` for plain identifiers, an attribute selector for anything else
fn id_selector(id: &str) -> String {
    if is_css_identifier(id) {
        format!("#{}", id)
    } else {
        let escaped = id.replace('\\', "\\\\").replace('"', "\\\"");
        format!("[id=\"{}\"]", escaped)
    }
}

fn is_css_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };

    let name_char = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii();
    let start_char = |c: char| c.is_ascii_alphabetic() || c == '_' || !c.is_ascii();

    let valid_start = if first == '-' {
        chars.clone().next().map_or(false, start_char)
    } else {
        start_char(first)
    };

    valid_start && chars.all(name_char)
}
