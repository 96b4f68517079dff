//! Common test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sinafeed::crawler::{Launcher, Renderer};
use sinafeed::models::NewsRecord;
use sinafeed::utils::error::RenderError;

/// `2025-04-09 19:32:00`, the reference "now" for listing fixtures
pub fn fixed_now() -> NaiveDateTime {
    at(2025, 4, 9, 19, 32)
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

/// One listing card; `time` of `None` leaves out the time element
pub fn card(id: &str, time: Option<&str>) -> String {
    let time = time
        .map(|t| format!(r#"<div class="feed-card-time">{t}</div>"#))
        .unwrap_or_default();
    format!(
        r#"<div class="feed-card-item">
            <h2><a href="https://news.sina.com.cn/c/{id}.shtml">标题{id}</a></h2>
            <a class="feed-card-txt-summary">摘要{id}</a>
            {time}
            <div class="feed-card-tags"><a>国内</a></div>
        </div>"#
    )
}

/// A listing page with the given cards and, optionally, a next-page link
pub fn listing(cards: &[String], has_next: bool) -> String {
    let next = if has_next {
        r#"<span class="pagebox_next"><a href="?page=next">下一页</a></span>"#
    } else {
        ""
    };
    format!(
        r#"<html><body><div class="feed-card-content">{}</div><div class="feed-card-page">{next}</div></body></html>"#,
        cards.concat()
    )
}

/// Shared counters so tests can inspect a session after the crawl consumed it
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub loads: Arc<AtomicUsize>,
    pub clicks: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl CallLog {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn clicks(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Renderer that serves a fixed sequence of pages
///
/// A click advances to the next page, or stays put when `stuck` is set.
pub struct ScriptedRenderer {
    pages: Vec<String>,
    index: usize,
    loaded: bool,
    pub stuck: bool,
    pub never_loads: bool,
    pub fail_close: bool,
    pub calls: CallLog,
}

impl ScriptedRenderer {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            index: 0,
            loaded: false,
            stuck: false,
            never_loads: false,
            fail_close: false,
            calls: CallLog::default(),
        }
    }

    fn current(&self) -> Result<&str, RenderError> {
        if !self.loaded || self.pages.is_empty() {
            return Err(RenderError::NoPage);
        }
        Ok(&self.pages[self.index])
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn load(&mut self, _url: &str) -> Result<(), RenderError> {
        self.calls.loads.fetch_add(1, Ordering::SeqCst);
        if self.never_loads {
            std::future::pending::<()>().await;
        }
        self.loaded = true;
        Ok(())
    }

    async fn current_markup(&mut self) -> Result<String, RenderError> {
        self.current().map(str::to_string)
    }

    async fn has_element(&mut self, _selector: &str) -> Result<bool, RenderError> {
        Ok(self
            .current()
            .map(|p| p.contains("feed-card-item"))
            .unwrap_or(false))
    }

    async fn is_clickable(&mut self, _selector: &str) -> Result<bool, RenderError> {
        Ok(self
            .current()
            .map(|p| p.contains("pagebox_next"))
            .unwrap_or(false))
    }

    async fn click(&mut self, selector: &str) -> Result<(), RenderError> {
        self.calls.clicks.fetch_add(1, Ordering::SeqCst);
        if self.stuck {
            return Ok(());
        }
        if self.index + 1 >= self.pages.len() {
            return Err(RenderError::NotClickable(selector.to_string()));
        }
        self.index += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(RenderError::Browser(String::from("already gone")));
        }
        Ok(())
    }
}

/// Launcher handing out scripted sessions, one page list per launch
pub struct ScriptedLauncher {
    scripts: std::sync::Mutex<Vec<Option<Vec<String>>>>,
    pub calls: CallLog,
}

impl ScriptedLauncher {
    /// `None` entries make the matching launch fail
    pub fn new(scripts: Vec<Option<Vec<String>>>) -> Self {
        Self {
            scripts: std::sync::Mutex::new(scripts.into_iter().rev().collect()),
            calls: CallLog::default(),
        }
    }
}

#[async_trait]
impl Launcher for ScriptedLauncher {
    type Session = ScriptedRenderer;

    async fn launch(&self) -> Result<ScriptedRenderer, RenderError> {
        let next = self.scripts.lock().unwrap().pop().flatten();
        match next {
            Some(pages) => {
                let mut renderer = ScriptedRenderer::new(pages);
                renderer.calls = self.calls.clone();
                Ok(renderer)
            }
            None => Err(RenderError::Browser(String::from("launch failed"))),
        }
    }
}

/// Record with a fixed time, for storage fixtures
pub fn record(url: &str, time: NaiveDateTime) -> NewsRecord {
    NewsRecord {
        headline: format!("标题 {url}"),
        url: url.to_string(),
        time: Some(time),
        summary: format!("摘要 {url}"),
        tags: vec![String::from("国内")],
    }
}
