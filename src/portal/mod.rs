// src/portal/mod.rs
// =============================================================================
// Everything that understands the portal's markup.
//
// Submodules:
// - model: the records the content tree is made of
// - html: selector/text/URL helpers shared by the extractors
// - vault: the term -> course listing (XML-wrapped HTML from an AJAX call)
// - menu: a course's content menu (category -> links)
// - page: the weekly entries on a content page (text + files)
//
// Each extractor has an async entry point that takes `&Session` and a pure
// `parse_*` function that works on a string, so the parsing can be tested
// against fixture HTML without a server.
// =============================================================================

pub mod html;
mod menu;
mod model;
mod page;
mod vault;

pub use menu::navigate;
pub use model::{Course, KeyedList, VaultIndex};
pub use page::extract_entries;
pub use vault::list_courses;
