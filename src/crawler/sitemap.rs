//! Sitemap reading
//!
//! A sitemap lists page URLs in `<url><loc>...</loc></url>` entries. The
//! document goes through the same HTML parser as pages: unknown elements
//! keep their text, and entities such as `&amp;` are decoded.

use scraper::{Html, Selector};
use url::Url;

/// Extracts every absolute HTTP(S) `<loc>` URL from a sitemap document
///
/// Entries that do not parse as URLs are dropped. Scope filtering is left
/// to the caller.
///
/// # Example
///
/// ```
/// use docs_ingest::crawler::extract_sitemap_urls;
///
/// let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
/// <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
///   <url><loc>https://docs.example.com/aws/en/guide</loc></url>
/// </urlset>"#;
/// let urls = extract_sitemap_urls(xml);
/// assert_eq!(urls[0].as_str(), "https://docs.example.com/aws/en/guide");
/// ```
pub fn extract_sitemap_urls(xml: &str) -> Vec<Url> {
    let document = Html::parse_document(xml);
    let selector = match Selector::parse("loc") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let text = element.text().collect::<String>();
            let url = Url::parse(text.trim()).ok()?;
            matches!(url.scheme(), "http" | "https").then_some(url)
        })
        .collect()
}
