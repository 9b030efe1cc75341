// src/portal/html.rs
// =============================================================================
// Small helpers shared by the markup extractors.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
// - Is built on html5ever, so broken markup still parses
//
// The portal's markup is loose and changes between pages, so everything
// here is forgiving: missing attributes give `None`, never a panic.
// =============================================================================

use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

// Parses a CSS selector.
// Our selectors are constants and known to be valid, so a failure here is a
// programmer error and panicking is fine.
pub fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

// Compiles a regex. Same reasoning as `selector`: patterns are constants.
pub fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap()
}

// Text of an element with every text node trimmed and glued together,
// like `"<a> Week <b>1</b> </a>"` -> `"Week1"`
pub fn stripped_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

// Same as `stripped_text` but one text node per line. Used for the free
// text of an entry so paragraphs don't run into each other.
pub fn text_lines(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// True if the element has the given class
pub fn has_class(element: ElementRef, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

// Resolves a possibly-relative href against the portal origin
//
// Examples (base = "https://bb.example.edu"):
//   "/webapps/x"        -> Some("https://bb.example.edu/webapps/x")
//   "https://other/y"   -> Some("https://other/y")
//   "javascript:void(0)"-> None (not HTTP)
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let url = match Url::parse(href) {
        Ok(url) => url,
        // Likely a relative URL, try joining with base
        Err(_) => base.join(href).ok()?,
    };

    if url.scheme() == "http" || url.scheme() == "https" {
        Some(url.to_string())
    } else {
        None
    }
}
