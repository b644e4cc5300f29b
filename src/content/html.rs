//! HTML page parser
//!
//! Extraction rules:
//! - Title: first `<h1>`, else the `<title>` text before the first `|`, else "Untitled"
//! - Main region: first match of the main-content selectors, falling back to `<body>`
//! - Sections: `<h2>`..`<h6>` in the main region, each owning the following
//!   siblings up to the next heading of the same or a higher level
//! - Breadcrumbs: link texts of the first breadcrumb container found
//! - Category: first breadcrumb, else the first path segment after the base path
//! - Tags: comma-separated `keywords` and `tags` meta values

use crate::content::{Page, PageParser, ParseError, Section};
use crate::url::CanonicalUrl;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::BTreeSet;

const MAIN_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    ".main-content",
    "#main-content",
    ".content",
    ".documentation-content",
    "body",
];

const BREADCRUMB_SELECTORS: &[&str] = &[
    "nav[aria-label='Breadcrumb']",
    ".breadcrumb",
    ".breadcrumbs",
    "[role='navigation'] ol",
];

const LAST_UPDATED_SELECTORS: &[&str] = &[
    "meta[property='article:modified_time']",
    "meta[name='last-modified']",
];

/// Elements whose text never belongs to page content
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "nav", "footer", "template"];

/// Elements that start a new line of extracted text
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "li", "ul", "ol", "table", "tr", "pre",
    "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "br", "dt", "dd", "figure",
];

/// Scraper-based implementation of [`PageParser`]
pub struct HtmlPageParser {
    base_path: String,
    main: Vec<Selector>,
    breadcrumbs: Vec<Selector>,
    last_updated: Vec<Selector>,
    h1: Selector,
    title: Selector,
    headings: Selector,
    links: Selector,
    list_items: Selector,
    keywords: Selector,
    tags: Selector,
}

fn compile(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|_| ParseError::InvalidSelector(selector.to_string()))
}

fn compile_all(selectors: &[&str]) -> Result<Vec<Selector>, ParseError> {
    selectors.iter().map(|s| compile(s)).collect()
}

impl HtmlPageParser {
    /// Creates a parser; `base_path` is used to infer categories from URLs
    pub fn new(base_path: impl Into<String>) -> Result<Self, ParseError> {
        Ok(Self {
            base_path: base_path.into(),
            main: compile_all(MAIN_SELECTORS)?,
            breadcrumbs: compile_all(BREADCRUMB_SELECTORS)?,
            last_updated: compile_all(LAST_UPDATED_SELECTORS)?,
            h1: compile("h1")?,
            title: compile("title")?,
            headings: compile("h2, h3, h4, h5, h6")?,
            links: compile("a")?,
            list_items: compile("li")?,
            keywords: compile("meta[name='keywords']")?,
            tags: compile("meta[name='tags']")?,
        })
    }

    fn extract_title(&self, document: &Html) -> String {
        if let Some(h1) = document.select(&self.h1).next() {
            let text = collapse_whitespace(&h1.text().collect::<String>());
            if !text.is_empty() {
                return text;
            }
        }

        if let Some(title) = document.select(&self.title).next() {
            let raw = title.text().collect::<String>();
            let text = collapse_whitespace(raw.split('|').next().unwrap_or_default());
            if !text.is_empty() {
                return text;
            }
        }

        "Untitled".to_string()
    }

    fn main_region<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        self.main
            .iter()
            .find_map(|selector| document.select(selector).next())
    }

    fn extract_sections(&self, main: ElementRef<'_>) -> Vec<Section> {
        let mut sections = Vec::new();

        for heading in main.select(&self.headings) {
            let level = match heading_level(heading.value().name()) {
                Some(level) => level,
                None => continue,
            };

            let title = collapse_whitespace(&heading.text().collect::<String>());
            if title.is_empty() {
                continue;
            }

            let mut raw = String::new();
            for sibling in heading.next_siblings() {
                match sibling.value() {
                    Node::Element(element) => {
                        if heading_level(element.name()).is_some_and(|l| l <= level) {
                            break;
                        }
                        if SKIPPED_ELEMENTS.contains(&element.name()) {
                            continue;
                        }
                        if let Some(sibling) = ElementRef::wrap(sibling) {
                            raw.push('\n');
                            collect_text(sibling, &mut raw);
                            raw.push('\n');
                        }
                    }
                    Node::Text(text) => raw.push_str(text),
                    _ => {}
                }
            }

            let anchor = heading
                .value()
                .attr("id")
                .or_else(|| heading.value().attr("name"))
                .map(str::to_string);

            sections.push(Section {
                title,
                level,
                content: tidy_lines(&raw),
                anchor,
            });
        }

        sections
    }

    fn extract_breadcrumbs(&self, document: &Html) -> Vec<String> {
        for selector in &self.breadcrumbs {
            if let Some(container) = document.select(selector).next() {
                let mut crumbs: Vec<String> = container
                    .select(&self.links)
                    .map(|link| collapse_whitespace(&link.text().collect::<String>()))
                    .filter(|text| !text.is_empty())
                    .collect();

                if crumbs.is_empty() {
                    crumbs = container
                        .select(&self.list_items)
                        .map(|item| collapse_whitespace(&item.text().collect::<String>()))
                        .filter(|text| !text.is_empty())
                        .collect();
                }

                return crumbs;
            }
        }
        Vec::new()
    }

    fn infer_category(&self, breadcrumbs: &[String], url: &CanonicalUrl) -> Option<String> {
        if let Some(first) = breadcrumbs.first() {
            return Some(first.clone());
        }

        let url = url.to_url().ok()?;
        let rest = url.path().strip_prefix(self.base_path.trim_end_matches('/'))?;
        rest.split('/')
            .find(|segment| !segment.is_empty())
            .map(str::to_string)
    }

    fn extract_tags(&self, document: &Html) -> BTreeSet<String> {
        [&self.keywords, &self.tags]
            .into_iter()
            .filter_map(|selector| document.select(selector).next())
            .filter_map(|meta| meta.value().attr("content"))
            .flat_map(|content| content.split(','))
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn extract_last_updated(&self, document: &Html) -> Option<DateTime<Utc>> {
        self.last_updated
            .iter()
            .filter_map(|selector| document.select(selector).next())
            .filter_map(|meta| meta.value().attr("content"))
            .find_map(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl PageParser for HtmlPageParser {
    fn parse(&self, body: &[u8], url: &CanonicalUrl) -> Result<Page, ParseError> {
        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);

        let main = self
            .main_region(&document)
            .ok_or_else(|| ParseError::NoMainContent(url.to_string()))?;

        let mut content = String::new();
        collect_text(main, &mut content);

        let breadcrumbs = self.extract_breadcrumbs(&document);
        let category = self.infer_category(&breadcrumbs, url);

        Ok(Page {
            url: url.clone(),
            title: self.extract_title(&document),
            content: tidy_lines(&content),
            sections: self.extract_sections(main),
            breadcrumbs,
            category,
            tags: self.extract_tags(&document),
            last_updated: self.extract_last_updated(&document),
            last_crawled: Utc::now(),
        })
    }
}

fn heading_level(name: &str) -> Option<u8> {
    let digit = name.strip_prefix('h')?;
    match digit.parse::<u8>() {
        Ok(level @ 1..=6) if digit.len() == 1 => Some(level),
        _ => None,
    }
}

/// Appends the visible text under `element`, one line per block element
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses whitespace within lines and drops empty lines
fn tidy_lines(text: &str) -> String {
    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
