//! Crawl configuration.

mod builder;
mod types;

pub use builder::{CrawlerOptionsBuilder, WithSeeds};
pub use types::CrawlerOptions;
