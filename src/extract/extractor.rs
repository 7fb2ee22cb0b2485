//! Field extraction
//!
//! Projects a document into flat records. The first field decides how many
//! records exist; every other field is matched independently and paired with
//! records by position.

use crate::config::FieldSpec;
use crate::extract::{ExtractError, Record};
use scraper::{ElementRef, Html, Selector};

/// Elements whose text never reaches the rendered page
const HIDDEN_TEXT_TAGS: &[&str] = &["script", "style", "template", "noscript"];

/// Extracts records from the current state of a document
///
/// For each index `i` below the match count of `fields[0]`, a record is built
/// with one entry per field: the `i`-th element matching that field's
/// selector, or null if that field has fewer matches.
///
/// # Errors
///
/// * `ExtractError::EmptyFieldList` - `fields` is empty
/// * `ExtractError::InvalidSelector` - a selector does not parse
///
/// # Example
///
/// ```
/// use pagesweep::config::FieldSpec;
/// use pagesweep::extract::extract;
/// use scraper::Html;
///
/// let html = Html::parse_document(r#"<ul><li>a</li><li>b</li></ul>"#);
/// let records = extract(&html, &[FieldSpec::new("item", "li")]).unwrap();
/// assert_eq!(records.len(), 2);
/// ```
pub fn extract(document: &Html, fields: &[FieldSpec]) -> Result<Vec<Record>, ExtractError> {
    if fields.is_empty() {
        return Err(ExtractError::EmptyFieldList);
    }

    let selectors = fields
        .iter()
        .map(|field| compile(&field.selector))
        .collect::<Result<Vec<_>, _>>()?;

    let matches: Vec<Vec<ElementRef>> = selectors
        .iter()
        .map(|selector| document.select(selector).collect())
        .collect();

    let count = matches[0].len();
    let mut records = Vec::with_capacity(count);

    for i in 0..count {
        let record: Record = fields
            .iter()
            .zip(&matches)
            .map(|(field, elements)| {
                let value = elements.get(i).and_then(|el| element_value(*el));
                (field.name.as_str(), value)
            })
            .collect();
        records.push(record);
    }

    Ok(records)
}

fn compile(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Visible text if non-empty, otherwise the `href` attribute
fn element_value(element: ElementRef) -> Option<String> {
    let text = visible_text(element);
    if !text.is_empty() {
        return Some(text);
    }

    element.value().attr("href").map(str::to_string)
}

/// Text content with whitespace collapsed, skipping non-rendered elements
fn visible_text(element: ElementRef) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(element: ElementRef, out: &mut String) {
    let node = *element;
    for child in node.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if !HIDDEN_TEXT_TAGS.contains(&child_element.value().name()) {
                collect_text(child_element, out);
            }
        }
    }
}
