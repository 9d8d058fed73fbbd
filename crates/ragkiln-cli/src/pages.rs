//! Loads a fixed page set from disk to drive [`ragkiln_core::StaticCrawler`].
//!
//! The real HTML/Markdown fetcher and BFS link walker are outside this
//! repository's scope; this is the operator-facing stand-in that feeds the
//! same `Crawler` contract, so `ragkiln ingest` is runnable without one.

use std::path::Path;

use ragkiln_core::CrawledPage;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PageFile {
    url: String,
    markdown: String,
}

pub fn load_pages(path: &Path) -> anyhow::Result<Vec<CrawledPage>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read pages file {}: {e}", path.display()))?;
    let raw: Vec<PageFile> = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("failed to parse pages file {}: {e}", path.display()))?;
    Ok(raw
        .into_iter()
        .map(|p| CrawledPage {
            url: p.url,
            markdown: p.markdown,
        })
        .collect())
}
