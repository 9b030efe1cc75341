// src/portal/menu.rs
// =============================================================================
// Reads a course's left-hand content menu.
//
// The menu is a flat <ul>; category headers and links are siblings:
//
//   <ul id="courseMenuPalette_contents">
//     <li><a href="...">Home Page</a></li>        <- before any header: root
//     <li><h3>Course Content</h3></li>            <- opens a category
//     <li><a href="...">Lectures</a></li>         <- goes into "Course Content"
//     <li><a href="...">Announcements</a></li>
//   </ul>
// =============================================================================

use regex::Regex;
use scraper::Html;
use std::sync::OnceLock;
use tracing::{debug, warn};
use url::Url;

use super::html::{pattern, resolve_url, selector, stripped_text};
use super::model::{CategoryMenu, MenuLink};
use crate::error::CrawlError;
use crate::session::Session;

const ANNOUNCEMENTS_LABEL: &str = "Announcements";

/// Loads a course landing page and returns its content menu
pub async fn navigate(session: &Session, course_url: &str) -> Result<CategoryMenu, CrawlError> {
    let page = session
        .fetch_page(course_url)
        .await
        .map_err(|e| navigation_error(course_url, e))?;
    debug!(course = course_url, landed = %page.url, "course page loaded");

    parse_menu(&page.body, &session.portal().base_url).ok_or_else(|| CrawlError::Navigation {
        url: course_url.to_string(),
        reason: "course menu not found".to_string(),
    })
}

// Expired sessions keep their own variant; everything else becomes a
// navigation failure for this course
fn navigation_error(url: &str, error: CrawlError) -> CrawlError {
    match error {
        CrawlError::SessionExpired(_) => error,
        other => CrawlError::Navigation {
            url: url.to_string(),
            reason: other.to_string(),
        },
    }
}

// Returns None when the page has no content menu at all
pub fn parse_menu(html: &str, base: &Url) -> Option<CategoryMenu> {
    let document = Html::parse_document(html);
    let items = selector("ul#courseMenuPalette_contents > li");
    let heading = selector("h3");
    let link = selector("a[href]");

    // The menu itself needs to exist even if it's empty
    document
        .select(&selector("ul#courseMenuPalette_contents"))
        .next()?;

    let announcements_url = course_id(html).map(|id| announcements_url(base, &id));
    let mut menu = CategoryMenu::new();
    let mut current: Option<String> = None;

    for item in document.select(&items) {
        if let Some(header) = item.select(&heading).next() {
            let label = stripped_text(header);
            menu.open_category(label.clone());
            current = Some(label);
            continue;
        }

        let Some(anchor) = item.select(&link).next() else {
            continue;
        };
        let title = stripped_text(anchor);
        let href = anchor.value().attr("href").unwrap_or_default();

        // The menu's own Announcements href is unreliable, use the
        // canonical one built from the course id instead
        let url = match &announcements_url {
            Some(url) if title.contains(ANNOUNCEMENTS_LABEL) => Some(url.clone()),
            _ => resolve_url(base, href),
        };
        let Some(url) = url else {
            warn!(title = %title, href, "skipping menu link with unusable href");
            continue;
        };

        menu.add_link(current.as_deref(), MenuLink { title, url });
    }

    Some(menu)
}

// Pulls `course_id=_123_1` out of anywhere in the page
fn course_id(html: &str) -> Option<String> {
    static COURSE_ID: OnceLock<Regex> = OnceLock::new();
    COURSE_ID
        .get_or_init(|| pattern(r"course_id=(_\d+_\d+)"))
        .captures(html)
        .map(|caps| caps[1].to_string())
}

fn announcements_url(base: &Url, course_id: &str) -> String {
    format!(
        "{}/webapps/blackboard/execute/announcement?method=search&context=course_entry&course_id={}&handle=announcements_entry&mode=view",
        base.as_str().trim_end_matches('/'),
        course_id
    )
}
