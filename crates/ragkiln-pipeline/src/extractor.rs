//! TopicExtractor: crawled page -> deduplicated `Topic`s.

use std::collections::BTreeSet;

use ragkiln_core::{CrawledPage, Topic};
use ragkiln_llm::{LlmClient, LlmProvider};
use serde::Deserialize;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::levenshtein::ratio;

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub max_prefix_chars: usize,
    pub skip_patterns: Vec<String>,
    pub dedup_title_ratio: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_prefix_chars: 4000,
            skip_patterns: vec![
                ".xml".to_string(),
                "opensearch".to_string(),
                ".rss".to_string(),
                "sitemap".to_string(),
            ],
            dedup_title_ratio: 0.9,
        }
    }
}

/// One row of the JSON array the LLM is prompted to return.
#[derive(Debug, Deserialize)]
struct RawTopic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    category: String,
}

impl RawTopic {
    fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.summary.trim().is_empty() && !self.content.trim().is_empty()
    }
}

pub fn should_skip(url: &str, skip_patterns: &[String]) -> bool {
    let lower = url.to_lowercase();
    skip_patterns.iter().any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn build_prompt(page: &CrawledPage, max_prefix_chars: usize) -> String {
    let prefix: String = page.markdown.chars().take(max_prefix_chars).collect();
    format!(
        "Extract the distinct documentation topics covered by the page below. \
         Return a JSON array of objects with fields title, summary, content, keywords \
         (array of strings), and category. Only include topics that are actually \
         covered by this page's content.\n\nURL: {}\n\n---\n{}",
        page.url, prefix
    )
}

/// Extracts 0..N topics from a single crawled page.
///
/// Non-content URLs are filtered before any LLM call is made. Malformed
/// JSON is recovered leniently by `LlmClient::generate`; if recovery still
/// fails, this returns an empty list and logs a warning rather than
/// propagating an error, per the non-fatal validation-failure rule (§7).
#[instrument(skip(page, llm_client, config), fields(url = %page.url))]
pub async fn extract_topics<P: LlmProvider>(
    page: &CrawledPage,
    llm_client: &LlmClient<P>,
    config: &ExtractorConfig,
) -> Vec<Topic> {
    if should_skip(&page.url, &config.skip_patterns) {
        return Vec::new();
    }

    let prompt = build_prompt(page, config.max_prefix_chars);
    let value = match llm_client
        .generate(&prompt, ragkiln_llm::chat::ResponseShape::JsonArray)
        .await
    {
        Ok(value) => value,
        Err(error) => {
            warn!(?error, "topic extraction LLM call failed");
            return Vec::new();
        }
    };

    let raw_topics: Vec<RawTopic> = match parse_topics(value) {
        Some(topics) => topics,
        None => {
            warn!("topic extraction response did not match the expected shape");
            return Vec::new();
        }
    };

    let topics: Vec<Topic> = raw_topics
        .into_iter()
        .filter(RawTopic::is_valid)
        .map(|raw| Topic {
            title: raw.title,
            summary: raw.summary,
            content: raw.content,
            keywords: raw.keywords.into_iter().collect::<BTreeSet<_>>(),
            category: raw.category,
            source_url: page.url.clone(),
            embedding: None,
        })
        .collect();

    dedup_topics(topics, config.dedup_title_ratio)
}

fn parse_topics(value: Value) -> Option<Vec<RawTopic>> {
    serde_json::from_value(value).ok()
}

/// Coalesces topics whose normalized titles are near-duplicates
/// (Levenshtein ratio >= `threshold`), concatenating distinct content.
/// O(N^2) is acceptable since a single page yields a small N.
fn dedup_topics(topics: Vec<Topic>, threshold: f64) -> Vec<Topic> {
    let mut merged: Vec<Topic> = Vec::new();
    'outer: for topic in topics {
        let normalized = topic.normalized_title();
        for existing in merged.iter_mut() {
            if ratio(&existing.normalized_title(), &normalized) >= threshold {
                if !existing.content.contains(&topic.content) {
                    existing.content.push_str("\n\n");
                    existing.content.push_str(&topic.content);
                }
                existing.keywords.extend(topic.keywords);
                continue 'outer;
            }
        }
        merged.push(topic);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragkiln_llm::mock::MockLlmProvider;
    use std::time::Duration;

    fn client_with_responses(responses: Vec<String>) -> LlmClient<MockLlmProvider> {
        LlmClient::new(
            MockLlmProvider::new(responses),
            Duration::ZERO,
            ragkiln_llm::RetryConfig::default(),
        )
    }

    #[test]
    fn skip_patterns_match_case_insensitively() {
        let patterns = vec!["sitemap".to_string(), ".xml".to_string()];
        assert!(should_skip("https://docs.example.com/Sitemap.XML", &patterns));
        assert!(!should_skip("https://docs.example.com/guide", &patterns));
    }

    #[tokio::test]
    async fn skipped_urls_never_call_the_llm() {
        let client = client_with_responses(vec!["[]".to_string()]);
        let page = CrawledPage {
            url: "https://docs.example.com/sitemap.xml".to_string(),
            markdown: "irrelevant".to_string(),
        };
        let topics = extract_topics(&page, &client, &ExtractorConfig::default()).await;
        assert!(topics.is_empty());
    }

    #[tokio::test]
    async fn extracts_valid_topics_and_drops_incomplete_ones() {
        let client = client_with_responses(vec![r#"[
            {"title": "Alpha", "summary": "about alpha", "content": "alpha body", "keywords": ["a"], "category": "guide"},
            {"title": "", "summary": "missing title", "content": "x"}
        ]"#
        .to_string()]);
        let page = CrawledPage {
            url: "https://docs.example.com/alpha".to_string(),
            markdown: "# Alpha\nalpha body".to_string(),
        };
        let topics = extract_topics(&page, &client, &ExtractorConfig::default()).await;
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].title, "Alpha");
    }

    #[tokio::test]
    async fn near_duplicate_titles_within_a_page_are_coalesced() {
        let client = client_with_responses(vec![r#"[
            {"title": "Getting Started", "summary": "s1", "content": "first half"},
            {"title": "Getting Started!", "summary": "s2", "content": "second half"}
        ]"#
        .to_string()]);
        let page = CrawledPage {
            url: "https://docs.example.com/start".to_string(),
            markdown: "irrelevant".to_string(),
        };
        let topics = extract_topics(&page, &client, &ExtractorConfig::default()).await;
        assert_eq!(topics.len(), 1);
        assert!(topics[0].content.contains("first half"));
        assert!(topics[0].content.contains("second half"));
    }

    #[tokio::test]
    async fn unrecoverable_response_yields_an_empty_list_not_an_error() {
        let client = client_with_responses(vec!["not json at all, sorry".to_string()]);
        let page = CrawledPage {
            url: "https://docs.example.com/x".to_string(),
            markdown: "irrelevant".to_string(),
        };
        let topics = extract_topics(&page, &client, &ExtractorConfig::default()).await;
        assert!(topics.is_empty());
    }
}
