//! Small extraction helpers over `scraper`.
//!
//! `scraper::Html` is not `Send`, so every helper here parses, extracts, and
//! drops the document synchronously; callers only ever hold plain strings
//! across an `.await`.

use crate::config::parse_selector;
use crate::error::Result;
use itertools::Itertools;
use scraper::{ElementRef, Html};
use url::Url;

/// Resolve an attribute value found in the document at `base`.
///
/// Empty values, fragment-only links and `javascript:` pseudo-links yield
/// `None`. Fragments are dropped so the same page is recognised however it
/// was linked.
pub fn resolve(base: &str, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') || value.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    let mut url = match Url::parse(base) {
        Ok(base) => base.join(value).ok()?,
        Err(_) => Url::parse(value).ok()?,
    };
    url.set_fragment(None);
    Some(url.to_string())
}

/// Visible text of an element with whitespace collapsed.
pub fn element_text(element: &ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Distinct resolved `attr` values of every `css` match, in document order.
pub fn attr_values(body: &str, base: &str, css: &str, attr: &str) -> Result<Vec<String>> {
    let selector = parse_selector(css)?;
    let document = Html::parse_document(body);
    Ok(document
        .select(&selector)
        .filter_map(|element| element.value().attr(attr).and_then(|v| resolve(base, v)))
        .unique()
        .collect())
}

/// First resolved `attr` value among the `css` matches.
pub fn first_attr(body: &str, base: &str, css: &str, attr: &str) -> Result<Option<String>> {
    let selector = parse_selector(css)?;
    let document = Html::parse_document(body);
    Ok(document
        .select(&selector)
        .find_map(|element| element.value().attr(attr).and_then(|v| resolve(base, v))))
}

/// A matched element reduced to the pieces strategies look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Raw (trimmed, unresolved) attribute value.
    pub value: String,
    pub text: String,
    /// Extra attribute requested by the caller, if present and non-empty.
    pub extra: Option<String>,
    pub disabled: bool,
    pub classes: Vec<String>,
}

/// Every `css` match with a non-empty `attr`, in document order.
pub fn candidates(body: &str, css: &str, attr: &str, extra_attr: Option<&str>) -> Result<Vec<Candidate>> {
    let selector = parse_selector(css)?;
    let document = Html::parse_document(body);
    Ok(document
        .select(&selector)
        .filter_map(|element| {
            let el = element.value();
            let value = el.attr(attr).map(str::trim).filter(|v| !v.is_empty())?;
            Some(Candidate {
                value: value.to_string(),
                text: element_text(&element),
                extra: extra_attr
                    .and_then(|a| el.attr(a))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
                disabled: el.attr("disabled").is_some() || el.attr("aria-disabled") == Some("true"),
                classes: el.classes().map(str::to_string).collect(),
            })
        })
        .collect())
}

/// First `css` match whether or not it carries `attr`.
///
/// Pagination controls are often rendered without an `href` once disabled,
/// so "matched but empty" has to be told apart from "not there".
pub fn first_candidate(body: &str, css: &str, attr: &str) -> Result<Option<Candidate>> {
    let selector = parse_selector(css)?;
    let document = Html::parse_document(body);
    Ok(document.select(&selector).next().map(|element| {
        let el = element.value();
        Candidate {
            value: el.attr(attr).map(str::trim).unwrap_or_default().to_string(),
            text: element_text(&element),
            extra: None,
            disabled: el.attr("disabled").is_some() || el.attr("aria-disabled") == Some("true"),
            classes: el.classes().map(str::to_string).collect(),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://epaper.example.com/viewer/page.aspx?pg=1";

    #[test]
    fn test_resolve_relative_and_protocol_relative() {
        assert_eq!(
            resolve(BASE, "../img/p1.jpg").as_deref(),
            Some("https://epaper.example.com/img/p1.jpg")
        );
        assert_eq!(
            resolve("http://epaper.example.com/", "//cdn.example.com/p1.jpg").as_deref(),
            Some("http://cdn.example.com/p1.jpg")
        );
        assert_eq!(
            resolve(BASE, "https://other.example.com/a.pdf#page=2").as_deref(),
            Some("https://other.example.com/a.pdf")
        );
    }

    #[test]
    fn test_resolve_ignores_empty_and_script_links() {
        assert_eq!(resolve(BASE, "   "), None);
        assert_eq!(resolve(BASE, "#"), None);
        assert_eq!(resolve(BASE, "javascript:void(0)"), None);
    }

    #[test]
    fn test_attr_values_dedupes_in_order() {
        let body = r#"<div class="pages">
            <img class="pg" src="/p/2.jpg"><img class="pg" src="/p/1.jpg">
            <img class="pg" src=" "><img class="pg" src="/p/2.jpg"><img class="pg">
        </div>"#;
        let urls = attr_values(body, BASE, "img.pg", "src").unwrap();
        assert_eq!(
            urls,
            vec![
                "https://epaper.example.com/p/2.jpg".to_string(),
                "https://epaper.example.com/p/1.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn test_first_attr_skips_empty_matches() {
        let body = r#"<img id="a" src=""><img id="b" src="big.jpg">"#;
        let url = first_attr(body, BASE, "img", "src").unwrap();
        assert_eq!(url.as_deref(), Some("https://epaper.example.com/viewer/big.jpg"));
        assert_eq!(first_attr(body, BASE, "video", "src").unwrap(), None);
    }

    #[test]
    fn test_candidates_carry_text_and_extra_attr() {
        let body = r#"<select id="ed">
            <option value="">Choose</option>
            <option value="101" title="Cuttack City">  Cuttack
              Edition </option>
        </select>"#;
        let found = candidates(body, "#ed option", "value", Some("title")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "101");
        assert_eq!(found[0].text, "Cuttack Edition");
        assert_eq!(found[0].extra.as_deref(), Some("Cuttack City"));
    }

    #[test]
    fn test_first_candidate_reports_disabled_controls() {
        let body = r#"<a class="next disabled" aria-disabled="true">Next</a>"#;
        let next = first_candidate(body, "a.next", "href").unwrap().unwrap();
        assert!(next.disabled);
        assert!(next.value.is_empty());
        assert!(next.classes.contains(&"disabled".to_string()));
        assert!(first_candidate(body, "a.prev", "href").unwrap().is_none());
    }
}
