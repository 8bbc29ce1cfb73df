// Minimal crawl runner: seeds from argv, archive to ./sitescan.tar.
//
// The library is the product; this binary exists so a crawl can be
// kicked off without writing a driver. Scope defaults to the seeds
// themselves.

use std::sync::Arc;

use anyhow::Result;
use sitescan::{Crawler, CrawlerOptions, HttpScraper, LogEvents, SqliteArchive};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let seeds: Vec<String> = std::env::args().skip(1).collect();
    if seeds.is_empty() {
        eprintln!("usage: sitescan <seed-url> [<seed-url>...]");
        std::process::exit(2);
    }

    let options = CrawlerOptions::builder()
        .seeds(seeds.clone())
        .scope(seeds.clone())
        .parallels(4)
        .build()?;

    let archive = Arc::new(SqliteArchive::create("sitescan.tar").await?);
    archive
        .set_manifest(&seeds, &serde_json::to_value(&options)?)
        .await?;

    let crawler = Crawler::new(
        options,
        Arc::new(HttpScraper::new()?),
        archive,
        Arc::new(LogEvents),
    )?;

    let summary = crawler.run().await?;
    println!(
        "{} pages, {} resources, {} errors in {:.1}s",
        summary.pages,
        summary.resources,
        summary.errors,
        summary.duration.as_secs_f64()
    );
    Ok(())
}
