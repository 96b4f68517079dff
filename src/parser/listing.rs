//! Listing page parser
//!
//! Turns one rendered listing snapshot into [`NewsRecord`]s. Each card is
//! extracted independently: a malformed card is logged and skipped, and a
//! page without any card yields an empty list.

use chrono::NaiveDateTime;
use scraper::{ElementRef, Html};

use crate::config::SelectorConfig;
use crate::models::NewsRecord;
use crate::parser::selectors::ListingSelectors;
use crate::parser::time::TimeResolver;
use crate::utils::error::ParseError;
use crate::utils::{is_on_domain, normalize_whitespace, truncate_text};

/// Parser for card-based listing pages
#[derive(Debug, Clone)]
pub struct ListingParser {
    selectors: ListingSelectors,
    domain: String,
    resolver: TimeResolver,
}

impl ListingParser {
    /// Build a parser from selector configuration
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidSelector` if a configured selector does not parse
    pub fn new(config: &SelectorConfig) -> Result<Self, ParseError> {
        Ok(Self {
            selectors: ListingSelectors::from_config(config)?,
            domain: config.domain.clone(),
            resolver: TimeResolver::new(),
        })
    }

    /// Parse a page snapshot; times are resolved against `now`
    pub fn parse(&self, markup: &str, now: NaiveDateTime) -> Vec<NewsRecord> {
        let document = Html::parse_document(markup);
        let cards: Vec<ElementRef> = document.select(&self.selectors.card).collect();

        if cards.is_empty() {
            tracing::error!(error = %ParseError::NoCards, "No listing cards found, check the card selector");
            return Vec::new();
        }

        let mut records = Vec::with_capacity(cards.len());
        let mut skipped = 0usize;
        let mut foreign = 0usize;

        for (index, card) in cards.into_iter().enumerate() {
            match self.extract_card(card, now) {
                Ok(record) if is_on_domain(&record.url, &self.domain) => records.push(record),
                Ok(record) => {
                    foreign += 1;
                    tracing::debug!(
                        url = %record.url,
                        headline = %truncate_text(&record.headline, 40),
                        "Dropping off-domain entry"
                    );
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(index, error = %e, "Failed to parse listing card");
                }
            }
        }

        tracing::info!(
            extracted = records.len(),
            skipped,
            foreign,
            "Parsed listing page"
        );

        records
    }

    fn extract_card(&self, card: ElementRef, now: NaiveDateTime) -> Result<NewsRecord, ParseError> {
        let anchor = card
            .select(&self.selectors.headline)
            .next()
            .ok_or(ParseError::HeadlineNotFound)?;

        let href = anchor
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(ParseError::MissingHref)?;

        let url = if href.starts_with("//") {
            format!("https:{href}")
        } else {
            href.to_string()
        };

        let raw_time = card
            .select(&self.selectors.time)
            .next()
            .map(text_of)
            .unwrap_or_default();

        let summary = card
            .select(&self.selectors.summary)
            .next()
            .map(text_of)
            .unwrap_or_default();

        let tags = card
            .select(&self.selectors.tags)
            .map(text_of)
            .filter(|t| !t.is_empty())
            .collect();

        Ok(NewsRecord {
            headline: text_of(anchor),
            url,
            time: self.resolver.resolve(&raw_time, now),
            summary,
            tags,
        })
    }
}

fn text_of(element: ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TIME_FORMAT;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-04-09 19:32:00", TIME_FORMAT).unwrap()
    }

    fn parser() -> ListingParser {
        ListingParser::new(&SelectorConfig::default()).unwrap()
    }

    fn page(cards: &str) -> String {
        format!(
            r#"<html><body><div class="feed-card-content">{cards}</div></body></html>"#
        )
    }

    const FULL_CARD: &str = r##"
        <div class="feed-card-item">
            <h2><a href="https://news.sina.com.cn/c/2025-04-09/doc-1.shtml" target="_blank">
                国务院发布  新规
            </a></h2>
            <a class="feed-card-txt-summary" href="#">摘要内容</a>
            <div class="feed-card-time">3小时前</div>
            <div class="feed-card-tags"><a>政策</a><a> 经济 </a></div>
        </div>"##;

    #[test]
    fn test_parse_full_card() {
        let records = parser().parse(&page(FULL_CARD), now());
        assert_eq!(records.len(), 1);

        let r = &records[0];
        assert_eq!(r.headline, "国务院发布 新规");
        assert_eq!(r.url, "https://news.sina.com.cn/c/2025-04-09/doc-1.shtml");
        assert_eq!(r.time_string(), "2025-04-09 16:32:00");
        assert_eq!(r.summary, "摘要内容");
        assert_eq!(r.tags, vec!["政策", "经济"]);
    }

    #[test]
    fn test_no_cards_returns_empty() {
        let records = parser().parse("<html><body><p>loading</p></body></html>", now());
        assert!(records.is_empty());
    }

    #[test]
    fn test_optional_fields_default_empty() {
        let card = r#"<div class="feed-card-item">
            <h2><a href="https://news.sina.com.cn/a.shtml">标题</a></h2>
        </div>"#;
        let records = parser().parse(&page(card), now());
        assert_eq!(records.len(), 1);
        assert!(records[0].time.is_none());
        assert!(records[0].summary.is_empty());
        assert!(records[0].tags.is_empty());
    }

    #[test]
    fn test_malformed_cards_skipped() {
        let cards = format!(
            r#"{FULL_CARD}
            <div class="feed-card-item"><h2>没有链接</h2></div>
            <div class="feed-card-item"><h2><a>无href</a></h2></div>"#
        );
        let records = parser().parse(&page(&cards), now());
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_off_domain_urls_dropped() {
        let cards = r#"
            <div class="feed-card-item"><h2><a href="https://finance.sina.com.cn/x.shtml">留下</a></h2></div>
            <div class="feed-card-item"><h2><a href="https://www.example.com/sina.com.cn">丢弃</a></h2></div>"#;
        let records = parser().parse(&page(cards), now());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].headline, "留下");
    }

    #[test]
    fn test_protocol_relative_url() {
        let card = r#"<div class="feed-card-item"><h2><a href="//news.sina.com.cn/b.shtml">标题</a></h2></div>"#;
        let records = parser().parse(&page(card), now());
        assert_eq!(records[0].url, "https://news.sina.com.cn/b.shtml");
    }

    #[test]
    fn test_custom_domain() {
        let config = SelectorConfig {
            domain: String::from("example.com"),
            ..SelectorConfig::default()
        };
        let parser = ListingParser::new(&config).unwrap();
        let card = r#"<div class="feed-card-item"><h2><a href="https://example.com/1">Hi</a></h2></div>"#;
        assert_eq!(parser.parse(&page(card), now()).len(), 1);
    }
}
