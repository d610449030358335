use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    /// Site root; every catalogue, category and media URL is resolved against it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Products shown per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Export configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_dir")]
    pub dir: PathBuf,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Product pages fetched at once within one category. 1 keeps the crawl sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://books.toscrape.com/".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_user_agent() -> String {
    "bookscrape/0.1 (catalogue export)".to_string()
}
fn default_page_size() -> u32 {
    20
}
fn default_export_dir() -> PathBuf {
    PathBuf::from("export")
}
fn default_concurrency() -> usize {
    1
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            page_size: default_page_size(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: default_export_dir(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

/// `BOOKSCRAPE_<SECTION>__<KEY>`, e.g. `BOOKSCRAPE_SCRAPER__TIMEOUT_SECS=5`.
fn environment() -> config::Environment {
    config::Environment::with_prefix("BOOKSCRAPE")
        .prefix_separator("_")
        .separator("__")
}

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(environment())
            .build()
            .context("Failed to assemble configuration sources")?;

        cfg.try_deserialize()
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_site_constants() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.scraper.base_url, "https://books.toscrape.com/");
        assert_eq!(cfg.scraper.timeout_secs, 10);
        assert_eq!(cfg.scraper.page_size, 20);
        assert_eq!(cfg.export.dir, PathBuf::from("export"));
        assert_eq!(cfg.pipeline.concurrency, 1);
    }

    #[test]
    fn partial_sections_fall_back_to_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[scraper]\ntimeout_secs = 3\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.scraper.timeout_secs, 3);
        assert_eq!(cfg.scraper.page_size, 20);
        assert_eq!(cfg.export.dir, PathBuf::from("export"));
    }

    #[test]
    fn env_overrides_use_single_underscore_after_prefix() {
        let vars = config::Map::from([
            ("BOOKSCRAPE_SCRAPER__TIMEOUT_SECS".to_string(), "5".to_string()),
            ("BOOKSCRAPE_EXPORT__DIR".to_string(), "out".to_string()),
        ]);

        let cfg: AppConfig = config::Config::builder()
            .add_source(environment().source(Some(vars)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.scraper.timeout_secs, 5);
        assert_eq!(cfg.export.dir, PathBuf::from("out"));
        assert_eq!(cfg.scraper.page_size, 20);
    }
}
