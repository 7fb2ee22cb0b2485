//! Selector resolution for picked elements
//!
//! Used by the pagination picker: the element a user points at is turned into
//! a structural selector that is stored as `nextPageSelector`.

mod resolver;

pub use resolver::resolve_selector;

use scraper::{Html, Selector};

/// Resolves the structural selector of the first element matching `query`
///
/// Returns `Ok(None)` when nothing matches and `Err` with the parser message
/// when `query` is not a valid CSS selector.
pub fn resolve_first_match(document: &Html, query: &str) -> Result<Option<String>, String> {
    let selector = Selector::parse(query).map_err(|e| format!("{:?}", e))?;
    Ok(document.select(&selector).next().map(resolve_selector))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_first_match() {
        let html = Html::parse_document(
            r#"<div class="pager"><a>prev</a><a class="next">next</a></div>"#,
        );

        assert_eq!(
            resolve_first_match(&html, "a.next").unwrap().as_deref(),
            Some("body > div > a:nth-of-type(2)")
        );
        assert_eq!(resolve_first_match(&html, "button").unwrap(), None);
        assert!(resolve_first_match(&html, "a[").is_err());
    }
}
