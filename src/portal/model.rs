// src/portal/model.rs
// =============================================================================
// The content tree as plain records.
//
//   VaultIndex   term code -> courses
//   CategoryMenu category label -> links (plus stray links at the root)
//   KeyedList<ContentEntry>  entry title -> text + files
//
// The portal's markup reuses labels freely (two "unknown" terms, two entries
// called "Week 1", several announcements per course). Wherever that happens
// the later value wins. `KeyedList` is where that rule lives, so it is a
// property of the type instead of an accident of a hash map.
// =============================================================================

use regex::Regex;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::sync::OnceLock;

use super::html::pattern;

/// An insertion-ordered list of `(key, value)` pairs where inserting an
/// existing key replaces its value but keeps its original position
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedList<V> {
    items: Vec<(String, V)>,
}

impl<V> KeyedList<V> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Inserts `value` under `key`; returns the value it replaced, if any
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.items.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.items.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.items.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.items.iter().map(|(_, v)| v)
    }
}

impl<V> Default for KeyedList<V> {
    fn default() -> Self {
        Self::new()
    }
}

// Serialized as a JSON object, keys in insertion order
impl<V: Serialize> Serialize for KeyedList<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.items.len()))?;
        for (key, value) in &self.items {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn term_heading() -> &'static Regex {
    static TERM_HEADING: OnceLock<Regex> = OnceLock::new();
    TERM_HEADING.get_or_init(|| pattern(r"（(Spring|Fall|Summer|Winter) (\d{4})）"))
}

/// Academic term code such as `25spring`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Term(String);

impl Term {
    pub const UNKNOWN: &'static str = "unknown";

    // Derives the code from a heading like "2024-2025 春季学期（Spring 2025）".
    // Headings without a recognizable season and year all become "unknown".
    pub fn from_heading(heading: &str) -> Self {
        match term_heading().captures(heading) {
            Some(caps) => {
                let season = caps[1].to_lowercase();
                // `\d` also matches non-ASCII digits, so count chars, not bytes
                let digits: Vec<char> = caps[2].chars().collect();
                let year: String = digits[digits.len() - 2..].iter().collect();
                Term(format!("{}{}", year, season))
            }
            None => Term(Self::UNKNOWN.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Announcement {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub name: String,
    pub url: String,
    /// Only the last announcement listed for the course is kept
    pub announcement: Option<Announcement>,
}

/// Term code -> courses, in the order the portal lists them
pub type VaultIndex = KeyedList<Vec<Course>>;

#[derive(Debug, Clone, PartialEq)]
pub struct MenuLink {
    pub title: String,
    pub url: String,
}

/// One top-level item of the course menu
#[derive(Debug, Clone, PartialEq)]
pub enum MenuNode {
    /// A category header and the links listed under it
    Category(Vec<MenuLink>),
    /// A link that appeared before any category header, stored bare
    Link(String),
}

/// A page reachable from the course menu
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuPage<'a> {
    pub category: Option<&'a str>,
    pub title: &'a str,
    pub url: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryMenu {
    nodes: KeyedList<MenuNode>,
}

impl CategoryMenu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new (empty) category. Reopening a label clears its links.
    pub fn open_category(&mut self, label: impl Into<String>) {
        self.nodes.insert(label, MenuNode::Category(Vec::new()));
    }

    /// Adds a link to `category`, or at the root when there is none yet
    pub fn add_link(&mut self, category: Option<&str>, link: MenuLink) {
        if let Some(label) = category {
            if let Some(MenuNode::Category(links)) = self.nodes.get_mut(label) {
                links.push(link);
                return;
            }
        }
        self.nodes.insert(link.title, MenuNode::Link(link.url));
    }

    #[cfg(test)]
    pub fn category(&self, label: &str) -> Option<&[MenuLink]> {
        match self.nodes.get(label) {
            Some(MenuNode::Category(links)) => Some(links.as_slice()),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn root_link(&self, title: &str) -> Option<&str> {
        match self.nodes.get(title) {
            Some(MenuNode::Link(url)) => Some(url.as_str()),
            _ => None,
        }
    }

    /// Every page in menu order, with the category it sits under
    pub fn pages(&self) -> Vec<MenuPage<'_>> {
        let mut pages = Vec::new();
        for (key, node) in self.nodes.iter() {
            match node {
                MenuNode::Category(links) => pages.extend(links.iter().map(|link| MenuPage {
                    category: Some(key),
                    title: &link.title,
                    url: &link.url,
                })),
                MenuNode::Link(url) => pages.push(MenuPage {
                    category: None,
                    title: key,
                    url,
                }),
            }
        }
        pages
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileLink {
    pub name: String,
    pub url: String,
}

/// One weekly/session block on a content page
#[derive(Debug, Clone, PartialEq)]
pub struct ContentEntry {
    pub title: String,
    pub text: String,
    pub files: Vec<FileLink>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_from_heading() {
        assert_eq!(Term::from_heading("2024-2025学年 春季学期（Spring 2025）").as_str(), "25spring");
        assert_eq!(Term::from_heading("（Fall 2019）").as_str(), "19fall");
        assert_eq!(Term::from_heading("（Summer 2031）").as_str(), "31summer");
        assert_eq!(Term::from_heading("（Winter 2000）").as_str(), "00winter");
    }

    #[test]
    fn test_term_year_with_non_ascii_digits() {
        assert_eq!(Term::from_heading("春季学期（Spring ２０２５）").as_str(), "２５spring");
        assert_eq!(Term::from_heading("（Fall ٢٠٢٥）").as_str(), "٢٥fall");
    }

    #[test]
    fn test_unrecognized_heading_is_unknown() {
        assert_eq!(Term::from_heading("Spring 2025").as_str(), "unknown");
        assert_eq!(Term::from_heading("（spring 2025）").as_str(), "unknown");
        assert_eq!(Term::from_heading("（Autumn 2025）").as_str(), "unknown");
        assert_eq!(Term::from_heading("").as_str(), "unknown");
    }

    #[test]
    fn test_keyed_list_later_value_wins_in_place() {
        let mut list = KeyedList::new();
        list.insert("a", 1);
        list.insert("b", 2);
        assert_eq!(list.insert("a", 3), Some(1));

        let items: Vec<_> = list.iter().collect();
        assert_eq!(items, vec![("a", &3), ("b", &2)]);
    }

    #[test]
    fn test_keyed_list_serializes_as_ordered_object() {
        let mut list = KeyedList::new();
        list.insert("z", 1);
        list.insert("a", 2);
        assert_eq!(serde_json::to_string(&list).unwrap(), r#"{"z":1,"a":2}"#);
    }

    #[test]
    fn test_menu_root_links_before_first_category() {
        let mut menu = CategoryMenu::new();
        let link = |t: &str| MenuLink {
            title: t.to_string(),
            url: format!("https://x/{}", t),
        };

        menu.add_link(None, link("Home"));
        menu.open_category("Materials");
        menu.add_link(Some("Materials"), link("Slides"));

        assert_eq!(menu.root_link("Home"), Some("https://x/Home"));
        assert_eq!(menu.category("Materials").unwrap().len(), 1);

        let pages = menu.pages();
        assert_eq!(pages[0].category, None);
        assert_eq!(pages[1].category, Some("Materials"));
        assert_eq!(pages[1].title, "Slides");
    }

    #[test]
    fn test_reopening_category_clears_links() {
        let mut menu = CategoryMenu::new();
        menu.open_category("Tools");
        menu.add_link(
            Some("Tools"),
            MenuLink {
                title: "Grades".into(),
                url: "https://x/g".into(),
            },
        );
        menu.open_category("Tools");
        assert_eq!(menu.category("Tools"), Some(&[][..]));
    }
}
