use serde::Serialize;
#[cfg(test)]
use serde::Deserialize;
use url::Url;

/// Value written in place of any field the product page did not provide.
pub const PLACEHOLDER: &str = "N/A";

// ── Catalogue references ──────────────────────────────────────────────────────

/// One category from the home page sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRef {
    pub url: Url,
    /// Sidebar anchor text, e.g. "Poetry".
    pub name: Option<String>,
}

impl CategoryRef {
    pub fn new(url: Url, name: Option<String>) -> Self {
        Self { url, name }
    }

    /// Last meaningful path segment, e.g. `poetry_23` for `.../poetry_23/index.html`.
    pub fn slug(&self) -> String {
        self.url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty() && *s != "index.html")
                    .last()
                    .unwrap_or_default()
                    .to_string()
            })
            .unwrap_or_default()
    }
}

/// Absolute location of one product detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef(pub Url);

impl ProductRef {
    pub fn url(&self) -> &Url {
        &self.0
    }
}

// ── Product record ────────────────────────────────────────────────────────────

/// Everything extracted from one product page. `None` means the page element
/// was missing; the placeholder is applied once, in [`ProductRecord::to_row`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub product_page_url: Url,
    pub upc: Option<String>,
    pub title: Option<String>,
    pub price_including_tax: Option<String>,
    pub price_excluding_tax: Option<String>,
    pub number_available: Option<u32>,
    pub product_description: Option<String>,
    pub category: Option<String>,
    /// 1..=5 for a known tier, 0 for an unknown one.
    pub review_rating: Option<u8>,
    pub image_url: Option<Url>,
}

/// CSV row; field order is the column order of the export files.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct ProductRow {
    pub product_page_url: String,
    #[serde(rename = "universal_product_code (upc)")]
    pub upc: String,
    pub title: String,
    pub price_including_tax: String,
    pub price_excluding_tax: String,
    pub number_available: String,
    pub product_description: String,
    pub category: String,
    pub review_rating: String,
    pub image_url: String,
}

fn or_placeholder<T: ToString>(value: Option<&T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

impl ProductRecord {
    pub fn to_row(&self) -> ProductRow {
        ProductRow {
            product_page_url: self.product_page_url.to_string(),
            upc: or_placeholder(self.upc.as_ref()),
            title: or_placeholder(self.title.as_ref()),
            price_including_tax: or_placeholder(self.price_including_tax.as_ref()),
            price_excluding_tax: or_placeholder(self.price_excluding_tax.as_ref()),
            number_available: or_placeholder(self.number_available.as_ref()),
            product_description: or_placeholder(self.product_description.as_ref()),
            category: or_placeholder(self.category.as_ref()),
            review_rating: or_placeholder(self.review_rating.as_ref()),
            image_url: or_placeholder(self.image_url.as_ref()),
        }
    }
}

// ── Export batch ──────────────────────────────────────────────────────────────

/// Records collected for one category. The label is bound at creation and
/// names the export file.
#[derive(Debug, Clone)]
pub struct ExportBatch {
    label: String,
    records: Vec<ProductRecord>,
}

impl ExportBatch {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            records: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn push(&mut self, record: ProductRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
