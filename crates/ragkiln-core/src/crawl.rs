//! The crawler boundary. Consumed only through this contract:
//! `Crawler.Crawl(url, maxPages) -> {pages, outputDir}`. The HTML/Markdown
//! fetcher and BFS link walker themselves are an external collaborator and
//! are not implemented by this crate.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// One crawled page, as delivered to `TopicExtractor`.
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub url: String,
    pub markdown: String,
}

/// The result of a full crawl invocation.
#[derive(Debug, Clone)]
pub struct CrawlOutput {
    pub pages: Vec<CrawledPage>,
    pub output_dir: PathBuf,
}

impl CrawlOutput {
    pub fn pages_crawled(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("crawl transport error: {0}")]
    Transport(String),
    #[error("crawl cancelled")]
    Cancelled,
}

#[async_trait]
pub trait Crawler: Send + Sync {
    async fn crawl(&self, url: &str, max_pages: usize) -> Result<CrawlOutput, CrawlError>;
}

/// A crawler that replays a fixed set of pages, used so the rest of the
/// pipeline is testable without a real HTTP/BFS fetcher. This is
/// the only `Crawler` implementation this core ships.
pub struct StaticCrawler {
    pages: Vec<CrawledPage>,
    output_dir: PathBuf,
}

impl StaticCrawler {
    pub fn new(pages: Vec<CrawledPage>, output_dir: PathBuf) -> Self {
        Self { pages, output_dir }
    }
}

#[async_trait]
impl Crawler for StaticCrawler {
    async fn crawl(&self, _url: &str, max_pages: usize) -> Result<CrawlOutput, CrawlError> {
        let pages = self.pages.iter().take(max_pages).cloned().collect();
        Ok(CrawlOutput {
            pages,
            output_dir: self.output_dir.clone(),
        })
    }
}
