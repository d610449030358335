use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use super::cleaner::{
    clean_text, parse_result_count, parse_stock_count, rating_from_class, trim_text,
};

// ── Errors ────────────────────────────────────────────────────────────────────

/// A listing page whose mandatory result count could not be read.
#[derive(Debug, Error, PartialEq)]
pub enum ListingError {
    #[error("result count indicator not found on listing page")]
    MissingResultCount,

    #[error("result count {0:?} is not a number")]
    InvalidResultCount(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("availability {0:?} has no parenthesised stock count")]
    UnparsableAvailability(String),
}

// ── Lookup helpers ────────────────────────────────────────────────────────────

fn select_first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(css).ok()?;
    scope.select(&sel).next()
}

fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(sel) => scope.select(&sel).collect(),
        Err(e) => {
            warn!("Bad selector {:?}: {:?}", css, e);
            Vec::new()
        }
    }
}

/// Field value: element text with the ends trimmed.
fn text_of(el: ElementRef<'_>) -> Option<String> {
    trim_text(&el.text().collect::<String>())
}

/// Navigation label: element text with whitespace runs collapsed.
fn label_of(el: ElementRef<'_>) -> Option<String> {
    clean_text(&el.text().collect::<String>())
}

// ── Home page ─────────────────────────────────────────────────────────────────

/// `(href, anchor text)` for every link in the sidebar, in document order.
/// `None` when the sidebar container itself is missing.
pub fn category_links(doc: &Html) -> Option<Vec<(String, Option<String>)>> {
    let sidebar = select_first(doc.root_element(), "div.side_categories")?;

    let links = select_all(sidebar, "a")
        .into_iter()
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some((href.to_string(), label_of(a)))
        })
        .collect();

    Some(links)
}

// ── Listing page ──────────────────────────────────────────────────────────────

/// Total number of products in the category (`<form class="form-horizontal"><strong>19</strong>`).
pub fn result_count(doc: &Html) -> Result<u32, ListingError> {
    let strong = select_first(doc.root_element(), "form.form-horizontal strong")
        .ok_or(ListingError::MissingResultCount)?;

    let raw = strong.text().collect::<String>();
    parse_result_count(&raw).ok_or_else(|| ListingError::InvalidResultCount(raw.trim().to_string()))
}

/// Category name shown above the listing, e.g. "Poetry".
pub fn listing_heading(doc: &Html) -> Option<String> {
    select_first(doc.root_element(), "div.page-header h1").and_then(label_of)
}

/// Raw `href` of every product entry heading, in page order.
pub fn product_links(doc: &Html) -> Vec<String> {
    let mut hrefs = Vec::new();

    for heading in select_all(doc.root_element(), "h3") {
        let href = select_first(heading, "a").and_then(|a| a.value().attr("href"));
        match href {
            Some(href) => hrefs.push(href.to_string()),
            None => warn!("Product heading without a link: {:?}", label_of(heading)),
        }
    }

    hrefs
}

// ── Product page ──────────────────────────────────────────────────────────────

pub fn title(doc: &Html) -> Option<String> {
    select_first(doc.root_element(), "h1").and_then(text_of)
}

/// `src` of the active carousel image, still relative.
pub fn image_src(doc: &Html) -> Option<String> {
    let active = select_first(doc.root_element(), "div.item.active")?;
    let img = select_first(active, "img")?;
    img.value().attr("src").map(str::to_string)
}

/// Paragraph following the `#product_description` header.
pub fn description(doc: &Html) -> Option<String> {
    let anchor = select_first(doc.root_element(), "#product_description")?;

    anchor
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "p")
        .and_then(text_of)
}

/// Key/value pairs of the product information table ("UPC", "Availability", ...).
pub fn info_table(doc: &Html) -> HashMap<String, String> {
    let mut info = HashMap::new();

    let Some(table) = select_first(doc.root_element(), "article.product_page table") else {
        debug!("No product information table");
        return info;
    };

    for row in select_all(table, "tr") {
        let key = select_first(row, "th").and_then(text_of);
        let value = select_first(row, "td").and_then(text_of);
        if let (Some(key), Some(value)) = (key, value) {
            info.insert(key, value);
        }
    }

    info
}

/// Third breadcrumb entry: Home › Books › <category> › <title>.
pub fn breadcrumb_category(doc: &Html) -> Option<String> {
    select_all(doc.root_element(), "ul.breadcrumb li")
        .into_iter()
        .nth(2)
        .and_then(text_of)
}

/// `None` when there is no rating indicator at all, `Some(0)` when the tier
/// is unknown.
pub fn rating(doc: &Html) -> Option<u8> {
    let indicator = select_first(doc.root_element(), "p.star-rating")?;

    let tier = indicator
        .value()
        .classes()
        .find(|c| *c != "star-rating")
        .map(rating_from_class)
        .unwrap_or(0);

    Some(tier)
}

/// Stock count from the availability text. An absent availability row is
/// `Ok(None)`; one without a parenthesised number is an error.
pub fn stock_count(availability: Option<&str>) -> Result<Option<u32>, ExtractError> {
    let Some(text) = availability else {
        return Ok(None);
    };

    parse_stock_count(text)
        .map(Some)
        .ok_or_else(|| ExtractError::UnparsableAvailability(text.to_string()))
}
