mod config;
mod export;
mod models;
mod pipeline;
mod scraper;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::pipeline::{Mode, Pipeline};

#[derive(Parser)]
#[command(name = "bookscrape", about = "Catalogue crawler and CSV exporter", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl every category from the home page, one CSV per category
    Crawl,

    /// Crawl a single category listing
    Category {
        /// Category URL, e.g. https://books.toscrape.com/catalogue/category/books/poetry_23/index.html
        url: String,
    },

    /// Extract a single product page and append it to a per-title CSV
    Product {
        /// Product URL, e.g. https://books.toscrape.com/catalogue/a-light-in-the-attic_1000/index.html
        url: String,
    },
}

impl From<Command> for Mode {
    fn from(command: Command) -> Self {
        match command {
            Command::Crawl => Mode::FullCrawl,
            Command::Category { url } => Mode::Category(url),
            Command::Product { url } => Mode::Product(url),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "bookscrape=info,warn",
        1 => "bookscrape=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    info!("Exporting to {:?}", config.export.dir);

    let mode = Mode::from(cli.command);
    let _t = utils::Timer::start(format!("{:?}", mode));
    Pipeline::new(&config)?.run(mode).await?;

    Ok(())
}
