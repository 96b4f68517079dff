//! Integration tests for the paginating crawler driven by a scripted renderer

mod common;

use std::time::Duration;

use common::{at, card, fixed_now, listing, ScriptedRenderer};
use sinafeed::config::Config;
use sinafeed::crawler::ListCrawler;
use sinafeed::models::StopReason;
use tokio::time::Instant;

fn crawler() -> ListCrawler {
    ListCrawler::new(&Config::default())
        .unwrap()
        .with_clock(fixed_now)
}

fn cutoff() -> chrono::NaiveDateTime {
    at(2025, 3, 1, 0, 0)
}

/// Page k's last record is the first one older than the cutoff
#[tokio::test(start_paused = true)]
async fn test_cutoff_returns_pages_up_to_k() {
    let pages = vec![
        listing(&[card("1", Some("5分钟前")), card("2", Some("今天08:00"))], true),
        listing(&[card("3", Some("昨天 23:10")), card("4", Some("3月2日 10:00"))], true),
        listing(&[card("5", Some("3月1日 09:00")), card("6", Some("2月27日 18:00"))], true),
        listing(&[card("7", Some("2月20日 08:00"))], true),
    ];
    let mut renderer = ScriptedRenderer::new(pages);
    let calls = renderer.calls.clone();

    let outcome = crawler()
        .crawl(&mut renderer, "https://news.sina.com.cn/china/", cutoff())
        .await;

    assert_eq!(outcome.stop, StopReason::CutoffReached);
    assert_eq!(outcome.pages, 3);
    let urls: Vec<_> = outcome.records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls.len(), 6);
    assert!(urls[5].ends_with("/6.shtml"));
    // page 4 is never requested
    assert_eq!(calls.clicks(), 2);
    assert_eq!(calls.closes(), 1);
}

/// An older entry in the middle of a page does not stop the crawl
#[tokio::test(start_paused = true)]
async fn test_only_last_record_decides_cutoff() {
    let pages = vec![
        listing(&[card("1", Some("2025-01-01 08:00")), card("2", Some("1小时前"))], false),
    ];
    let mut renderer = ScriptedRenderer::new(pages);

    let outcome = crawler().crawl(&mut renderer, "seed", cutoff()).await;

    assert_eq!(outcome.stop, StopReason::PaginationExhausted);
    assert_eq!(outcome.records.len(), 2);
}

/// A last card without a time counts as older than any cutoff
#[tokio::test(start_paused = true)]
async fn test_missing_time_on_last_card_stops() {
    let pages = vec![
        listing(&[card("1", Some("1小时前")), card("2", None)], true),
        listing(&[card("3", Some("2小时前"))], true),
    ];
    let mut renderer = ScriptedRenderer::new(pages);
    let calls = renderer.calls.clone();

    let outcome = crawler().crawl(&mut renderer, "seed", cutoff()).await;

    assert_eq!(outcome.stop, StopReason::CutoffReached);
    assert_eq!(outcome.records.len(), 2);
    assert!(outcome.records[1].time.is_none());
    assert_eq!(calls.clicks(), 0);
}

/// A next control that does not change the page stops the crawl
#[tokio::test(start_paused = true)]
async fn test_identical_page_is_no_progress() {
    let pages = vec![listing(&[card("1", Some("1小时前"))], true)];
    let mut renderer = ScriptedRenderer::new(pages);
    renderer.stuck = true;
    let calls = renderer.calls.clone();

    let outcome = crawler().crawl(&mut renderer, "seed", cutoff()).await;

    assert_eq!(outcome.stop, StopReason::NoProgress);
    assert_eq!(outcome.pages, 1);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(calls.clicks(), 1);
    assert_eq!(calls.closes(), 1);
}

/// The seed page never renders: the crawl gives up after the load bound
#[tokio::test(start_paused = true)]
async fn test_load_timeout_is_bounded() {
    let mut renderer = ScriptedRenderer::new(vec![listing(&[], false)]);
    renderer.never_loads = true;
    let calls = renderer.calls.clone();
    let start = Instant::now();

    let outcome = crawler().crawl(&mut renderer, "seed", cutoff()).await;

    assert_eq!(outcome.stop, StopReason::LoadTimeout);
    assert!(!outcome.is_success());
    assert!(outcome.records.is_empty());
    assert_eq!(start.elapsed(), Duration::from_secs(20));
    assert_eq!(calls.closes(), 1);
}

/// The seed page loads but never shows a card
#[tokio::test(start_paused = true)]
async fn test_empty_listing_times_out() {
    let mut renderer = ScriptedRenderer::new(vec![listing(&[], true)]);
    let start = Instant::now();

    let outcome = crawler().crawl(&mut renderer, "seed", cutoff()).await;

    assert_eq!(outcome.stop, StopReason::LoadTimeout);
    assert_eq!(start.elapsed(), Duration::from_secs(20));
}

/// Close failures are logged, never surfaced
#[tokio::test(start_paused = true)]
async fn test_close_failure_keeps_records() {
    let mut renderer = ScriptedRenderer::new(vec![listing(&[card("1", Some("1小时前"))], false)]);
    renderer.fail_close = true;
    let calls = renderer.calls.clone();

    let outcome = crawler().crawl(&mut renderer, "seed", cutoff()).await;

    assert_eq!(outcome.stop, StopReason::PaginationExhausted);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(calls.closes(), 1);
}

/// Waiting for a missing next control costs exactly the next-page bound
#[tokio::test(start_paused = true)]
async fn test_missing_next_control_waits_its_bound() {
    let mut renderer = ScriptedRenderer::new(vec![listing(&[card("1", Some("1小时前"))], false)]);
    let start = Instant::now();

    let outcome = crawler().crawl(&mut renderer, "seed", cutoff()).await;

    assert_eq!(outcome.stop, StopReason::PaginationExhausted);
    assert_eq!(start.elapsed(), Duration::from_secs(5));
}
