//! Pipeline orchestrator: ties catalogue scraping → CSV export together.
//!
//! ## Run modes
//!
//! `Mode::FullCrawl` — home page → every sidebar category → every product,
//!   one overwritten CSV per category.
//! `Mode::Category(url)` — the same for one category listing.
//! `Mode::Product(url)` — one product page, appended to a per-title CSV.
//!
//! Per-category and per-product failures are logged and skipped; only a
//! missing home page or a rejected input URL ends the run with an error.

use crate::config::AppConfig;
use crate::export::CsvExporter;
use crate::models::{CategoryRef, ExportBatch, ProductRef, PLACEHOLDER};
use crate::scraper::http_client::HttpClient;
use crate::scraper::{Catalogue, CatalogueUrls, PageKind, PageSource};
use crate::utils::Progress;
use anyhow::{Context, Result};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    FullCrawl,
    Category(String),
    Product(String),
}

/// A single-target URL rejected before any request is made.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("{url:?} is not a category URL (expected it to start with {expected})")]
    NotACategory { url: String, expected: String },

    #[error("{url:?} is not a product URL (expected it to start with {expected})")]
    NotAProduct { url: String, expected: String },

    #[error("{url:?} is not a valid URL: {reason}")]
    Malformed { url: String, reason: String },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    pub categories_total: usize,
    pub categories_skipped: usize,
    pub products_found: usize,
    pub products_exported: usize,
    pub products_failed: usize,
    pub files_written: usize,
}

pub struct Pipeline {
    catalogue: Arc<Catalogue>,
    exporter: CsvExporter,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = HttpClient::new(&config.scraper).context("Failed to build scraper")?;
        Self::with_source(config, Arc::new(client))
    }

    pub fn with_source(config: &AppConfig, source: Arc<dyn PageSource>) -> Result<Self> {
        let urls = CatalogueUrls::new(&config.scraper.base_url)
            .with_context(|| format!("Invalid base_url {:?}", config.scraper.base_url))?;

        Ok(Self {
            catalogue: Arc::new(Catalogue::new(source, urls, config.scraper.page_size)),
            exporter: CsvExporter::new(&config.export.dir),
            concurrency: config.pipeline.concurrency.max(1),
        })
    }

    pub async fn run(&self, mode: Mode) -> Result<PipelineStats> {
        let stats = match mode {
            Mode::FullCrawl => self.run_full().await?,
            Mode::Category(url) => {
                let url = self.validate_category(&url)?;
                let mut stats = PipelineStats {
                    categories_total: 1,
                    ..Default::default()
                };
                self.crawl_category(&CategoryRef::new(url, None), &mut stats).await;
                stats
            }
            Mode::Product(url) => {
                let url = self.validate_product(&url)?;
                self.run_product(&url).await?
            }
        };

        info!(
            "=== Done: {} categories ({} skipped) | {} of {} products exported | {} failed | {} files ===",
            stats.categories_total,
            stats.categories_skipped,
            stats.products_exported,
            stats.products_found,
            stats.products_failed,
            stats.files_written,
        );
        info!("All files exported. You can find them in {:?}", self.exporter.dir());

        Ok(stats)
    }

    // ── Input validation ──────────────────────────────────────────────────────

    pub fn validate_category(&self, input: &str) -> Result<Url, InputError> {
        let expected = self.catalogue.urls().categories.as_str();
        if !input.starts_with(expected) {
            return Err(InputError::NotACategory {
                url: input.to_string(),
                expected: expected.to_string(),
            });
        }
        parse_input(input)
    }

    pub fn validate_product(&self, input: &str) -> Result<Url, InputError> {
        let expected = self.catalogue.urls().catalogue.as_str();
        if !input.starts_with(expected) {
            return Err(InputError::NotAProduct {
                url: input.to_string(),
                expected: expected.to_string(),
            });
        }
        parse_input(input)
    }

    // ── Full crawl ────────────────────────────────────────────────────────────

    async fn run_full(&self) -> Result<PipelineStats> {
        let root = self.catalogue.urls().root.clone();
        let home = self
            .catalogue
            .fetch(&root, PageKind::Home, None)
            .await
            .context("Could not fetch the home page; nothing to crawl")?;

        let categories = self.catalogue.enumerate_categories(&home);
        let mut stats = PipelineStats {
            categories_total: categories.len(),
            ..Default::default()
        };

        for (i, category) in categories.iter().enumerate() {
            info!("--- Category {}/{} ---", i + 1, categories.len());
            self.crawl_category(category, &mut stats).await;
        }

        Ok(stats)
    }

    // ── One category ──────────────────────────────────────────────────────────

    async fn crawl_category(&self, category: &CategoryRef, stats: &mut PipelineStats) {
        let first_page = match self
            .catalogue
            .fetch(&category.url, PageKind::Category, None)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                warn!("Skipping category {}: {}", category.url, e);
                stats.categories_skipped += 1;
                return;
            }
        };

        let products = match self
            .catalogue
            .enumerate_products(&first_page, &category.url)
            .await
        {
            Ok(products) => products,
            Err(e) => {
                warn!("Skipping category {}: {}", category.url, e);
                stats.categories_skipped += 1;
                return;
            }
        };

        if products.is_empty() {
            info!("No products found in {}", category.url);
            stats.categories_skipped += 1;
            return;
        }
        info!("{} products found in category", products.len());
        stats.products_found += products.len();

        let label = category
            .name
            .clone()
            .or_else(|| crate::scraper::parsers::listing_heading(&first_page.document()))
            .unwrap_or_else(|| category.slug());

        let mut batch = ExportBatch::new(label);
        self.collect_products(products, &mut batch, stats).await;

        match self.exporter.export_batch(&batch) {
            Ok(Some(_)) => {
                stats.files_written += 1;
                stats.products_exported += batch.len();
            }
            Ok(None) => {}
            Err(e) => error!("Export of {:?} failed: {:#}", batch.label(), e),
        }
    }

    /// Fetch and extract every product, at most `concurrency` at a time.
    /// Records land in the batch in listing order regardless of completion order.
    async fn collect_products(
        &self,
        products: Vec<ProductRef>,
        batch: &mut ExportBatch,
        stats: &mut PipelineStats,
    ) {
        let sem = Arc::new(Semaphore::new(self.concurrency));
        let total = products.len();
        let mut handles = Vec::with_capacity(total);

        for (i, product) in products.into_iter().enumerate() {
            let catalogue = Arc::clone(&self.catalogue);
            let sem = Arc::clone(&sem);
            let progress = Progress::new(i + 1, total);
            let url = product.url().clone();

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await?;
                let page = catalogue
                    .fetch(product.url(), PageKind::Product, Some(progress))
                    .await?;
                Ok::<_, anyhow::Error>(catalogue.extract_product(&page))
            });

            handles.push((url, handle));
        }

        for (url, handle) in handles {
            match handle.await {
                Ok(Ok((record, reported))) => {
                    if reported.as_deref() != Some(batch.label()) {
                        warn!(
                            "{} reports category {:?}, exporting under {:?}",
                            url,
                            reported.as_deref().unwrap_or(PLACEHOLDER),
                            batch.label()
                        );
                    }
                    batch.push(record);
                }
                Ok(Err(e)) => {
                    warn!("Skipping product {}: {:#}", url, e);
                    stats.products_failed += 1;
                }
                Err(e) => {
                    error!("Task panic for {}: {}", url, e);
                    stats.products_failed += 1;
                }
            }
        }
    }

    // ── One product ───────────────────────────────────────────────────────────

    async fn run_product(&self, url: &Url) -> Result<PipelineStats> {
        let page = self
            .catalogue
            .fetch(url, PageKind::Product, None)
            .await
            .with_context(|| format!("Could not fetch product page {}", url))?;

        let (record, _) = self.catalogue.extract_product(&page);
        let label = record.title.clone().unwrap_or_else(|| PLACEHOLDER.to_string());
        self.exporter.append_record(&record, &label)?;

        Ok(PipelineStats {
            products_found: 1,
            products_exported: 1,
            files_written: 1,
            ..Default::default()
        })
    }
}

fn parse_input(input: &str) -> Result<Url, InputError> {
    Url::parse(input).map_err(|e| InputError::Malformed {
        url: input.to_string(),
        reason: e.to_string(),
    })
}
