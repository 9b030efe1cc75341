// src/portal/page.rs
// =============================================================================
// Reads the weekly entries off a content page.
//
// Each entry is a list item like:
//
//   <li class="clearfix liItem read">
//     <h3>Week 1</h3>
//     <div class="details">
//       <p>Read chapter 1.</p>
//       <ul class="attachments">
//         <li><a href="/bbcswebdav/pid-1/xid-1">slides.pdf</a></li>
//       </ul>
//     </div>
//   </li>
//
// Items without a heading are skipped. Anchors that are really UI controls
// (`href="#..."` toggles, "close" buttons) are not files.
// =============================================================================

use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

use super::html::{resolve_url, selector, stripped_text, text_lines};
use super::model::{ContentEntry, FileLink, KeyedList};
use crate::error::CrawlError;
use crate::session::Session;

const CLOSE_MARKER: &str = "close";

/// Loads a content page and returns its entries keyed by title
pub async fn extract_entries(
    session: &Session,
    page_url: &str,
) -> Result<KeyedList<ContentEntry>, CrawlError> {
    let page = session
        .fetch_page(page_url)
        .await
        .map_err(|e| match e {
            CrawlError::SessionExpired(_) => e,
            other => CrawlError::Extraction {
                url: page_url.to_string(),
                reason: other.to_string(),
            },
        })?;
    debug!(page = page_url, landed = %page.url, "content page loaded");

    Ok(parse_entries(&page.body, &session.portal().base_url))
}

// Entries in document order. A later entry with the same title replaces the
// earlier one.
pub fn parse_entries(html: &str, base: &Url) -> KeyedList<ContentEntry> {
    let document = Html::parse_document(html);
    let heading = selector("h3");
    let details = selector("div.details");
    let mut entries = KeyedList::new();

    for item in document.select(&selector("li.clearfix.liItem.read")) {
        let Some(title) = item.select(&heading).next().map(stripped_text) else {
            continue;
        };

        let text = item
            .select(&details)
            .next()
            .map(text_lines)
            .unwrap_or_default();

        let entry = ContentEntry {
            title: title.clone(),
            text,
            files: file_links(item, base),
        };

        if entries.insert(title, entry).is_some() {
            debug!("duplicate entry title on page, keeping the later one");
        }
    }

    entries
}

fn file_links(item: ElementRef, base: &Url) -> Vec<FileLink> {
    let link = selector("a[href]");
    let mut files = Vec::new();

    for file_item in item.select(&selector("li")) {
        let Some(anchor) = file_item.select(&link).next() else {
            continue;
        };
        let href = anchor.value().attr("href").unwrap_or_default().trim();
        if is_ui_control(href) {
            continue;
        }

        let name = stripped_text(anchor);
        if name.is_empty() {
            continue;
        }

        if let Some(url) = resolve_url(base, href) {
            files.push(FileLink { name, url });
        }
    }

    files
}

// In-page toggles and close buttons look like links but aren't content
fn is_ui_control(href: &str) -> bool {
    href.starts_with('#') || href.contains(CLOSE_MARKER)
}
