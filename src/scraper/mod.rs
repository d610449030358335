pub mod cleaner;
pub mod http_client;
pub mod parsers;

use crate::models::{CategoryRef, ProductRecord, ProductRef};
use crate::utils::Progress;
use async_trait::async_trait;
use scraper::Html;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

use self::cleaner::{page_count, strip_listing_prefix};
use self::http_client::FetchError;
use self::parsers::ListingError;

/// Path of the umbrella "Books" entry at the top of the sidebar.
pub const ALL_BOOKS_PATH: &str = "catalogue/category/books_1/index.html";

// ── Pages ─────────────────────────────────────────────────────────────────────

/// What kind of page is being fetched; only used in progress output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Home,
    Category,
    Product,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PageKind::Home => "home",
            PageKind::Category => "category",
            PageKind::Product => "product",
        };
        f.write_str(s)
    }
}

/// A fetched page. The body is parsed on demand so a `Page` can cross task
/// boundaries (`scraper::Html` is not `Send`).
#[derive(Debug, Clone)]
pub struct Page {
    url: Url,
    body: String,
}

impl Page {
    pub fn new(url: Url, body: String) -> Self {
        Self { url, body }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn document(&self) -> Html {
        Html::parse_document(self.body())
    }
}

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable page source: the HTTP client in production, an in-memory map in tests.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(
        &self,
        url: &Url,
        kind: PageKind,
        progress: Option<Progress>,
    ) -> Result<Page, FetchError>;
}

// ── Site layout ───────────────────────────────────────────────────────────────

/// Fixed locations of the catalogue, derived from the site root.
#[derive(Debug, Clone)]
pub struct CatalogueUrls {
    pub root: Url,
    pub catalogue: Url,
    pub categories: Url,
    pub all_books: Url,
}

impl CatalogueUrls {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let mut root = Url::parse(base_url)?;
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }

        Ok(Self {
            catalogue: root.join("catalogue/")?,
            categories: root.join("catalogue/category/")?,
            all_books: root.join(ALL_BOOKS_PATH)?,
            root,
        })
    }
}

/// Category URL with any trailing `index.html` removed, ending in `/`, so
/// `page-N.html` can be joined onto it.
pub fn listing_base(category_url: &Url) -> Url {
    let path = category_url.path();
    let trimmed = path.strip_suffix("index.html").unwrap_or(path);
    let new_path = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    let mut base = category_url.clone();
    base.set_path(&new_path);
    base.set_query(None);
    base.set_fragment(None);
    base
}

// ── Catalogue scraper ─────────────────────────────────────────────────────────

pub struct Catalogue {
    source: Arc<dyn PageSource>,
    urls: CatalogueUrls,
    page_size: u32,
}

impl Catalogue {
    pub fn new(source: Arc<dyn PageSource>, urls: CatalogueUrls, page_size: u32) -> Self {
        Self {
            source,
            urls,
            page_size,
        }
    }

    pub fn urls(&self) -> &CatalogueUrls {
        &self.urls
    }

    pub async fn fetch(
        &self,
        url: &Url,
        kind: PageKind,
        progress: Option<Progress>,
    ) -> Result<Page, FetchError> {
        self.source.fetch(url, kind, progress).await
    }

    /// Every category in the home page sidebar except the "Books" umbrella entry.
    /// Returns an empty list when the sidebar is missing.
    pub fn enumerate_categories(&self, home: &Page) -> Vec<CategoryRef> {
        let doc = home.document();

        let Some(links) = parsers::category_links(&doc) else {
            error!("Category sidebar not found on {}", home.url());
            return Vec::new();
        };

        let mut categories = Vec::new();
        for (href, name) in links {
            let url = match self.urls.root.join(&href) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Skipping category link {:?}: {}", href, e);
                    continue;
                }
            };
            if url == self.urls.all_books {
                continue;
            }
            categories.push(CategoryRef::new(url, name));
        }

        info!("{} categories found", categories.len());
        categories
    }

    /// Product locations across every page of a category, in page order then
    /// entry order. `first_page` is page 1, already fetched; pages 2..N are
    /// fetched here and a failed page is skipped.
    pub async fn enumerate_products(
        &self,
        first_page: &Page,
        category_url: &Url,
    ) -> Result<Vec<ProductRef>, ListingError> {
        let base = listing_base(category_url);

        let (total_results, first_links) = {
            let doc = first_page.document();
            (parsers::result_count(&doc)?, parsers::product_links(&doc))
        };

        let pages = page_count(total_results, self.page_size);
        debug!(
            "{}: {} results over {} page(s)",
            category_url, total_results, pages
        );

        let mut products = self.resolve_product_links(first_links);

        for n in 2..=pages {
            let page_url = match base.join(&format!("page-{}.html", n)) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Cannot build page {} of {}: {}", n, base, e);
                    continue;
                }
            };

            let page = match self.source.fetch(&page_url, PageKind::Category, None).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Skipping listing page {}: {}", n, e);
                    continue;
                }
            };

            let links = parsers::product_links(&page.document());
            products.extend(self.resolve_product_links(links));
        }

        Ok(products)
    }

    fn resolve_product_links(&self, hrefs: Vec<String>) -> Vec<ProductRef> {
        hrefs
            .into_iter()
            .filter_map(|href| match self.urls.catalogue.join(strip_listing_prefix(&href)) {
                Ok(url) => Some(ProductRef(url)),
                Err(e) => {
                    warn!("Skipping product link {:?}: {}", href, e);
                    None
                }
            })
            .collect()
    }

    /// Build the fixed-schema record for one product page. Never fails: any
    /// element that cannot be found leaves its field empty. The second value
    /// is the category the page itself reports.
    pub fn extract_product(&self, page: &Page) -> (ProductRecord, Option<String>) {
        let doc = page.document();
        let info = parsers::info_table(&doc);

        let number_available =
            match parsers::stock_count(info.get("Availability").map(String::as_str)) {
                Ok(count) => count,
                Err(e) => {
                    warn!("{}: {}", page.url(), e);
                    None
                }
            };

        let image_url = parsers::image_src(&doc).and_then(|src| match self.urls.root.join(&src) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("{}: bad image src {:?}: {}", page.url(), src, e);
                None
            }
        });

        let category = parsers::breadcrumb_category(&doc);

        let record = ProductRecord {
            product_page_url: page.url().clone(),
            upc: info.get("UPC").cloned(),
            title: parsers::title(&doc),
            price_including_tax: info.get("Price (incl. tax)").cloned(),
            price_excluding_tax: info.get("Price (excl. tax)").cloned(),
            number_available,
            product_description: parsers::description(&doc),
            category: category.clone(),
            review_rating: parsers::rating(&doc),
            image_url,
        };

        debug!("Extracted {:?} from {}", record.title, page.url());
        (record, category)
    }
}

// ── Test support ──────────────────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::models::PLACEHOLDER;
    use tokio_test::{assert_err, assert_ok};

    const BASE: &str = "https://books.toscrape.com/";
    const POETRY: &str = "https://books.toscrape.com/catalogue/category/books/poetry_23/index.html";

    fn catalogue(source: StubSource) -> (Catalogue, Arc<StubSource>) {
        let source = Arc::new(source);
        let urls = CatalogueUrls::new(BASE).unwrap();
        (Catalogue::new(source.clone(), urls, 20), source)
    }

    fn slugs(prefix: &str, range: std::ops::RangeInclusive<usize>) -> Vec<String> {
        range.map(|i| format!("{prefix}-{i}_{i}")).collect()
    }

    fn listing(heading: &str, count: &str, slugs: &[String]) -> String {
        let refs: Vec<&str> = slugs.iter().map(String::as_str).collect();
        category_page(heading, count, &refs)
    }

    #[test]
    fn catalogue_urls_from_root() {
        let urls = CatalogueUrls::new("http://127.0.0.1:8080").unwrap();
        assert_eq!(urls.root.as_str(), "http://127.0.0.1:8080/");
        assert_eq!(urls.catalogue.as_str(), "http://127.0.0.1:8080/catalogue/");
        assert_eq!(urls.categories.as_str(), "http://127.0.0.1:8080/catalogue/category/");
        assert_eq!(
            urls.all_books.as_str(),
            "http://127.0.0.1:8080/catalogue/category/books_1/index.html"
        );
    }

    #[test]
    fn listing_base_strips_index_page() {
        let url = Url::parse(POETRY).unwrap();
        assert_eq!(
            listing_base(&url).as_str(),
            "https://books.toscrape.com/catalogue/category/books/poetry_23/"
        );

        let bare = Url::parse("https://books.toscrape.com/catalogue/category/books/poetry_23").unwrap();
        assert_eq!(
            listing_base(&bare).as_str(),
            "https://books.toscrape.com/catalogue/category/books/poetry_23/"
        );
    }

    #[test]
    fn categories_exclude_umbrella_entry() {
        let (cat, _) = catalogue(StubSource::default());
        let home = Page::new(
            Url::parse(BASE).unwrap(),
            home_page(&[("Travel", "travel_2"), ("Poetry", "poetry_23")]),
        );

        let categories = cat.enumerate_categories(&home);
        assert_eq!(categories.len(), 2);
        assert_eq!(
            categories[0].url.as_str(),
            "https://books.toscrape.com/catalogue/category/books/travel_2/index.html"
        );
        assert_eq!(categories[0].name.as_deref(), Some("Travel"));
        assert_eq!(categories[1].url.as_str(), POETRY);
    }

    #[test]
    fn missing_sidebar_yields_no_categories() {
        let (cat, _) = catalogue(StubSource::default());
        let home = Page::new(Url::parse(BASE).unwrap(), "<html><body></body></html>".into());
        assert!(cat.enumerate_categories(&home).is_empty());
    }

    #[tokio::test]
    async fn single_page_listing_needs_no_fetch() {
        let (cat, source) = catalogue(StubSource::default());
        let first = Page::new(Url::parse(POETRY).unwrap(), listing("Poetry", "19", &slugs("poem", 1..=19)));

        let products = assert_ok!(cat.enumerate_products(&first, first.url()).await);
        assert_eq!(products.len(), 19);
        assert_eq!(
            products[0].url().as_str(),
            "https://books.toscrape.com/catalogue/poem-1_1/index.html"
        );
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn paginated_listing_fetches_remaining_pages_in_order() {
        let base = "https://books.toscrape.com/catalogue/category/books/mystery_3";
        let stub = StubSource::default()
            .with_page(&format!("{base}/page-2.html"), listing("Mystery", "45", &slugs("m", 21..=40)))
            .with_page(&format!("{base}/page-3.html"), listing("Mystery", "45", &slugs("m", 41..=45)));
        let (cat, source) = catalogue(stub);

        let first_url = Url::parse(&format!("{base}/index.html")).unwrap();
        let first = Page::new(first_url.clone(), listing("Mystery", "45", &slugs("m", 1..=20)));

        let products = assert_ok!(cat.enumerate_products(&first, &first_url).await);

        assert_eq!(
            source.requests(),
            vec![format!("{base}/page-2.html"), format!("{base}/page-3.html")]
        );
        assert_eq!(products.len(), 45);
        for (i, product) in products.iter().enumerate() {
            let n = i + 1;
            assert_eq!(
                product.url().as_str(),
                format!("https://books.toscrape.com/catalogue/m-{n}_{n}/index.html")
            );
        }
    }

    #[tokio::test]
    async fn failed_listing_page_is_skipped() {
        let base = "https://books.toscrape.com/catalogue/category/books/mystery_3";
        let stub = StubSource::default()
            .with_page(&format!("{base}/page-3.html"), listing("Mystery", "45", &slugs("m", 41..=45)));
        let (cat, source) = catalogue(stub);

        let first_url = Url::parse(&format!("{base}/index.html")).unwrap();
        let first = Page::new(first_url.clone(), listing("Mystery", "45", &slugs("m", 1..=20)));

        let products = assert_ok!(cat.enumerate_products(&first, &first_url).await);
        assert_eq!(source.requests().len(), 2);
        assert_eq!(products.len(), 25);
        assert_eq!(
            products[20].url().as_str(),
            "https://books.toscrape.com/catalogue/m-41_41/index.html"
        );
    }

    #[tokio::test]
    async fn page_boundaries() {
        for (count, extra_fetches) in [("0", 0), ("20", 0), ("21", 1)] {
            let (cat, source) = catalogue(StubSource::default());
            let first = Page::new(Url::parse(POETRY).unwrap(), listing("Poetry", count, &[]));
            assert_ok!(cat.enumerate_products(&first, first.url()).await);
            assert_eq!(source.requests().len(), extra_fetches, "count {}", count);
        }
    }

    #[tokio::test]
    async fn missing_result_count_is_an_error() {
        let (cat, _) = catalogue(StubSource::default());
        let first = Page::new(
            Url::parse(POETRY).unwrap(),
            "<html><body><h3><a href=\"../../../x_1/index.html\">x</a></h3></body></html>".into(),
        );
        let err = assert_err!(cat.enumerate_products(&first, first.url()).await);
        assert_eq!(err, ListingError::MissingResultCount);
    }

    fn product_url() -> Url {
        Url::parse("https://books.toscrape.com/catalogue/a-light-in-the-attic_1000/index.html").unwrap()
    }

    #[test]
    fn extracts_full_record() {
        let (cat, _) = catalogue(StubSource::default());
        let page = Page::new(product_url(), product_page(&ProductFixture::default()));

        let (record, category) = cat.extract_product(&page);
        assert_eq!(category.as_deref(), Some("Poetry"));
        assert_eq!(record.product_page_url, product_url());
        assert_eq!(record.upc.as_deref(), Some("a897fe39b1053632"));
        assert_eq!(record.title.as_deref(), Some("A Light in the Attic"));
        assert_eq!(record.price_including_tax.as_deref(), Some("£51.77"));
        assert_eq!(record.price_excluding_tax.as_deref(), Some("£51.77"));
        assert_eq!(record.number_available, Some(22));
        assert_eq!(record.category.as_deref(), Some("Poetry"));
        assert_eq!(record.review_rating, Some(3));
        assert_eq!(
            record.image_url.as_ref().map(Url::as_str),
            Some("https://books.toscrape.com/media/cache/fe/72/fe72f0532301ec28892ae79a629a293c.jpg")
        );
    }

    #[test]
    fn missing_description_still_yields_complete_record() {
        let (cat, _) = catalogue(StubSource::default());
        let fixture = ProductFixture {
            description: None,
            ..Default::default()
        };
        let page = Page::new(product_url(), product_page(&fixture));

        let (record, _) = cat.extract_product(&page);
        let row = record.to_row();
        assert_eq!(row.product_description, PLACEHOLDER);
        assert_eq!(row.title, "A Light in the Attic");
    }

    #[test]
    fn availability_cases() {
        let (cat, _) = catalogue(StubSource::default());

        let absent = ProductFixture {
            availability: None,
            ..Default::default()
        };
        let (record, _) = cat.extract_product(&Page::new(product_url(), product_page(&absent)));
        assert_eq!(record.number_available, None);

        let unparsable = ProductFixture {
            availability: Some("Out of stock"),
            ..Default::default()
        };
        let (record, _) = cat.extract_product(&Page::new(product_url(), product_page(&unparsable)));
        assert_eq!(record.number_available, None);
        assert_eq!(record.title.as_deref(), Some("A Light in the Attic"));
    }

    #[test]
    fn bare_page_is_all_placeholders() {
        let (cat, _) = catalogue(StubSource::default());
        let page = Page::new(product_url(), "<html><body><p>gone</p></body></html>".into());

        let (record, category) = cat.extract_product(&page);
        assert_eq!(category, None);
        let row = record.to_row();
        for field in [
            &row.upc,
            &row.title,
            &row.price_including_tax,
            &row.price_excluding_tax,
            &row.number_available,
            &row.product_description,
            &row.category,
            &row.review_rating,
            &row.image_url,
        ] {
            assert_eq!(field, PLACEHOLDER);
        }
    }
}
