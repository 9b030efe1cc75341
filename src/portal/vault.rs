// src/portal/vault.rs
// =============================================================================
// Reads the "My Courses" widget into a term -> courses index.
//
// The portal loads the widget over AJAX. The reply is an XML envelope whose
// root element's text is the actual HTML, usually inside a CDATA block:
//
//   <?xml version="1.0"?>
//   <contents><![CDATA[ <h3 class="termHeading-coursefakeclass">...</h3> ... ]]></contents>
//
// So there are two parsing passes: quick-xml to unwrap the envelope, then
// scraper for the HTML inside.
//
// Inside the HTML every term is an <h3> heading whose anchor id names the
// <div> holding that term's courses:
//
//   <h3 class="termHeading-coursefakeclass">
//     <a id="afor_3_1termCourses__254_1">春季学期（Spring 2025）</a>
//   </h3>
//   <div id="_3_1termCourses__254_1"><ul><li>...course...</li></ul></div>
// =============================================================================

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use url::Url;

use super::html::{has_class, pattern, resolve_url, selector, stripped_text};
use super::model::{Announcement, Course, Term, VaultIndex};
use crate::error::CrawlError;
use crate::session::Session;

const TAB_ACTION_PATH: &str = "/webapps/portal/execute/tabs/tabAction";

// Module and tab ids of the course list widget on the portal's home tab.
// The module id also prefixes the ids of the per-term course containers.
const COURSE_MODULE_ID: &str = "_3_1";
const HOME_TAB_ID: &str = "_1_1";

// Links to announcements live in the same list items as courses
const ANNOUNCEMENT_MARKER: &str = "announcement";

/// Fetches and parses the course list. Any failure here is fatal: without
/// it we don't know what to crawl.
pub async fn list_courses(session: &Session) -> Result<VaultIndex, CrawlError> {
    info!("fetching course list");

    let url = session.client().absolute_url(TAB_ACTION_PATH)?;
    let page = session
        .client()
        .post_form(
            url.as_str(),
            &[
                ("action", "refreshAjaxModule"),
                ("modId", COURSE_MODULE_ID),
                ("tabId", HOME_TAB_ID),
                ("tab_tab_group_id", HOME_TAB_ID),
            ],
        )
        .await
        .map_err(|e| CrawlError::ListingParse(e.to_string()))?;

    let fragment = extract_envelope(&page.body)?;
    let vault = parse_listing(&fragment, &session.portal().base_url);

    let total: usize = vault.values().map(Vec::len).sum();
    info!(terms = vault.len(), courses = total, "course list loaded");
    Ok(vault)
}

// Returns the text content of the XML root element (CDATA included).
// Malformed XML, a missing root, or an empty body are all errors.
pub fn extract_envelope(xml: &str) -> Result<String, CrawlError> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut seen_child = false;
    let mut text = String::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            CrawlError::ListingParse(format!(
                "malformed XML at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(_) => {
                if depth == 0 {
                    if seen_root {
                        return Err(listing_error("more than one root element"));
                    }
                    seen_root = true;
                } else if depth == 1 {
                    seen_child = true;
                }
                depth += 1;
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| listing_error("unbalanced closing tag"))?;
            }
            Event::Empty(_) => {
                if depth == 0 {
                    if seen_root {
                        return Err(listing_error("more than one root element"));
                    }
                    seen_root = true;
                } else if depth == 1 {
                    seen_child = true;
                }
            }
            // Only the text before the root's first child counts, the same
            // as ElementTree's `root.text`
            Event::Text(t) => {
                if depth == 1 && !seen_child {
                    let unescaped = t
                        .unescape()
                        .map_err(|e| listing_error(&format!("bad entity: {}", e)))?;
                    text.push_str(&unescaped);
                } else if depth == 0 && !t.iter().all(u8::is_ascii_whitespace) {
                    return Err(listing_error("text outside the root element"));
                }
            }
            Event::CData(c) => {
                if depth == 1 && !seen_child {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(listing_error("no root element"));
    }
    if depth != 0 {
        return Err(listing_error("document ended inside an element"));
    }
    if text.trim().is_empty() {
        return Err(listing_error("course list envelope is empty"));
    }

    Ok(text)
}

fn listing_error(reason: &str) -> CrawlError {
    CrawlError::ListingParse(reason.to_string())
}

// Builds the term -> courses index from the widget's HTML
pub fn parse_listing(html: &str, base: &Url) -> VaultIndex {
    let document = Html::parse_fragment(html);
    let mut vault = VaultIndex::new();

    for heading in document.select(&selector("h3.termHeading-coursefakeclass")) {
        let term = Term::from_heading(&stripped_text(heading));
        if term.as_str() == Term::UNKNOWN {
            warn!(heading = %stripped_text(heading), "term heading not recognized");
        }

        let courses = heading
            .select(&selector("a[id]"))
            .next()
            .and_then(|a| a.value().id())
            .and_then(|id| container_id().find(id))
            .map(|m| format!("{}{}", COURSE_MODULE_ID, m.as_str()))
            .and_then(|id| find_by_id(&document, &id))
            .map(|container| parse_courses(container, base))
            .unwrap_or_default();

        debug!(term = %term, courses = courses.len(), "parsed term");

        if vault.insert(term.as_str(), courses).is_some() {
            debug!(term = %term, "term listed twice, keeping the later one");
        }
    }

    vault
}

// `termCourses__254_1` out of a heading anchor id
fn container_id() -> &'static Regex {
    static CONTAINER_ID: OnceLock<Regex> = OnceLock::new();
    CONTAINER_ID.get_or_init(|| pattern(r"termCourses__\d+_\d+"))
}

fn find_by_id<'a>(document: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    document
        .select(&selector("div[id]"))
        .find(|div| div.value().id() == Some(id))
}

fn parse_courses(container: ElementRef, base: &Url) -> Vec<Course> {
    let link_selector = selector("a[href]");
    let mut courses = Vec::new();

    for item in container.select(&selector("li")) {
        let Some(link) = item.select(&link_selector).next() else {
            continue;
        };
        let href = link.value().attr("href").unwrap_or_default().trim();
        if href.contains(ANNOUNCEMENT_MARKER) {
            continue;
        }
        let Some(url) = resolve_url(base, href) else {
            continue;
        };

        courses.push(Course {
            name: stripped_text(link),
            url,
            announcement: parse_announcement(item, base),
        });
    }

    courses
}

// Looks for the "Announcements: <a>..</a>" block under a course. When the
// block lists several announcements the last one wins.
fn parse_announcement(item: ElementRef, base: &Url) -> Option<Announcement> {
    let block = item.select(&selector("div.courseDataBlock")).next()?;
    let mut announcement = None;

    for link in block.select(&selector("a[href]")) {
        if inside_label(link) {
            continue;
        }
        let href = link.value().attr("href").unwrap_or_default().trim();
        if let Some(url) = resolve_url(base, href) {
            announcement = Some(Announcement {
                text: stripped_text(link),
                url,
            });
        }
    }

    announcement
}

// The block starts with a <span class="dataBlockLabel"> caption that isn't
// part of the announcement itself
fn inside_label(link: ElementRef) -> bool {
    link.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|el| el.value().name() == "span" && has_class(el, "dataBlockLabel"))
}
