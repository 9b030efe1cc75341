// src/crawl/orchestrator.rs
// =============================================================================
// Walks the whole tree and mirrors it to disk.
//
// How it works:
// 1. Wipe and recreate the mirror root
// 2. Fetch the course list once (if this fails, nothing else can run)
// 3. For every requested term, for every course:
//      navigate the course menu -> for every page: extract its entries ->
//      for every entry: make its directory, save its text, download its files
// 4. Anything that fails below the term level is recorded and skipped; the
//    rest of the tree carries on
//
// Courses are the units of work. They run through a buffered stream so
// `--jobs N` crawls up to N courses at once, all sharing the one logged-in
// client. `buffered` (not `buffer_unordered`) yields results in course order,
// which keeps the report stable between runs.
//
// Courses whose names map to the same directory form one unit and are
// crawled one after the other in list order, so the later course wins the
// same way no matter how many jobs run.
// =============================================================================

use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{debug, info, info_span, Instrument};

use super::report::CrawlReport;
use crate::download::fetch;
use crate::error::CrawlError;
use crate::mirror::{sanitize_name, Mirror};
use crate::portal::{extract_entries, list_courses, navigate, Course, KeyedList};
use crate::session::Session;

pub struct Crawler<'a> {
    session: &'a Session,
    mirror: Mirror,
    jobs: usize,
}

impl<'a> Crawler<'a> {
    pub fn new(session: &'a Session, mirror: Mirror) -> Self {
        Self {
            session,
            mirror,
            jobs: 1,
        }
    }

    /// How many courses may be crawled at the same time (at least 1)
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    // Crawls the given terms. Only a failure to prepare the mirror root or
    // to read the course list is returned as an error; everything else ends
    // up in the report.
    pub async fn run(&self, terms: &[String]) -> Result<CrawlReport, CrawlError> {
        self.mirror.reset().await?;
        info!(root = %self.mirror.root().display(), "mirror root ready");

        let vault = list_courses(self.session).await?;
        let mut report = CrawlReport::default();

        for term in terms {
            let Some(courses) = vault.get(term) else {
                info!(term = %term, "term not in course list, skipping");
                report.skipped_terms.push(term.clone());
                continue;
            };

            let term_dir = match self.mirror.subdir(self.mirror.root(), term).await {
                Ok(dir) => dir,
                Err(e) => {
                    report.record(term, e);
                    continue;
                }
            };
            report.terms += 1;
            info!(term = %term, courses = courses.len(), "crawling term");

            let groups = group_by_dir(courses);
            let units = groups
                .values()
                .map(|group| self.crawl_group(term, &term_dir, group));
            let results: Vec<CrawlReport> = stream::iter(units).buffered(self.jobs).collect().await;

            for result in results {
                report.merge(result);
            }
            info!(term = %term, "term finished");
        }

        Ok(report)
    }

    async fn crawl_group(&self, term: &str, term_dir: &Path, group: &[&Course]) -> CrawlReport {
        let mut report = CrawlReport::default();
        for course in group {
            let span = info_span!("course", term = %term, course = %course.name);
            report.merge(self.crawl_course(term_dir, course).instrument(span).await);
        }
        report
    }

    async fn crawl_course(&self, term_dir: &Path, course: &Course) -> CrawlReport {
        let mut report = CrawlReport::default();

        let course_dir = match self.mirror.subdir(term_dir, &course.name).await {
            Ok(dir) => dir,
            Err(e) => {
                report.record(&course.name, e);
                return report;
            }
        };

        let menu = match navigate(self.session, &course.url).await {
            Ok(menu) => menu,
            Err(e) => {
                report.record(&course.url, e);
                return report;
            }
        };
        report.courses += 1;

        for page in menu.pages() {
            // Links listed before any category header sit directly under
            // the course
            let parent = match page.category {
                Some(label) => match self.mirror.subdir(&course_dir, label).await {
                    Ok(dir) => dir,
                    Err(e) => {
                        report.record(label, e);
                        continue;
                    }
                },
                None => course_dir.clone(),
            };

            let page_dir = match self.mirror.subdir(&parent, page.title).await {
                Ok(dir) => dir,
                Err(e) => {
                    report.record(page.title, e);
                    continue;
                }
            };

            self.crawl_page(&page_dir, page.url, &mut report).await;
        }

        info!(pages = report.pages, files = report.files, "course finished");
        report
    }

    async fn crawl_page(&self, page_dir: &Path, url: &str, report: &mut CrawlReport) {
        let entries = match extract_entries(self.session, url).await {
            Ok(entries) => entries,
            Err(e) => {
                report.record(url, e);
                return;
            }
        };
        report.pages += 1;

        for entry in entries.values() {
            let entry_dir = match self.mirror.subdir(page_dir, &entry.title).await {
                Ok(dir) => dir,
                Err(e) => {
                    report.record(&entry.title, e);
                    continue;
                }
            };
            report.entries += 1;

            match self.mirror.write_text(&entry_dir, &entry.text).await {
                Ok(Some(_)) => report.text_files += 1,
                Ok(None) => {}
                Err(e) => report.record(&entry.title, e),
            }

            for file in &entry.files {
                let dest = entry_dir.join(sanitize_name(&file.name));
                match fetch(self.session, &file.url, &dest).await {
                    Ok(download) => {
                        debug!(path = %download.path.display(), tls = ?download.tls, "saved file");
                        report.files += 1;
                        report.bytes += download.bytes;
                    }
                    Err(e) => report.record(&file.url, e),
                }
            }
        }
    }
}

// Courses keyed by the directory they mirror into, in first-seen order
fn group_by_dir(courses: &[Course]) -> KeyedList<Vec<&Course>> {
    let mut groups: KeyedList<Vec<&Course>> = KeyedList::new();
    for course in courses {
        let dir = sanitize_name(&course.name);
        if let Some(group) = groups.get_mut(&dir) {
            debug!(course = %course.name, dir = %dir, "course shares a directory with an earlier one");
            group.push(course);
        } else {
            groups.insert(dir, vec![course]);
        }
    }
    groups
}
