//! Headless Chrome rendering sessions
//!
//! Used for listing pages that only populate their cards from JavaScript.
//! Each session owns its own browser process; `close` shuts the browser down
//! and stops the CDP handler task.

use std::path::PathBuf;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::config::RendererConfig;
use crate::crawler::render::{Launcher, Renderer};
use crate::utils::error::RenderError;

fn browser_err(e: impl std::fmt::Display) -> RenderError {
    RenderError::Browser(e.to_string())
}

/// Quote a selector as a single-quoted JavaScript string literal
fn js_string(raw: &str) -> String {
    let escaped = raw
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n");
    format!("'{escaped}'")
}

/// One browser plus one tab
pub struct ChromeRenderer {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    page: Option<Page>,
}

impl ChromeRenderer {
    fn page(&self) -> Result<&Page, RenderError> {
        self.page.as_ref().ok_or(RenderError::NoPage)
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn load(&mut self, url: &str) -> Result<(), RenderError> {
        let browser = self.browser.as_ref().ok_or(RenderError::NoPage)?;

        if self.page.is_none() {
            self.page = Some(browser.new_page("about:blank").await.map_err(browser_err)?);
        }

        tracing::debug!(url, "Navigating");
        self.page()?.goto(url).await.map_err(browser_err)?;
        Ok(())
    }

    async fn current_markup(&mut self) -> Result<String, RenderError> {
        self.page()?.content().await.map_err(browser_err)
    }

    async fn has_element(&mut self, selector: &str) -> Result<bool, RenderError> {
        Ok(self.page()?.find_element(selector).await.is_ok())
    }

    async fn is_clickable(&mut self, selector: &str) -> Result<bool, RenderError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); \
             if (!el || el.disabled || el.classList.contains('disabled')) return false; \
             const r = el.getBoundingClientRect(); return r.width > 0 && r.height > 0; }})()",
            js_string(selector)
        );

        self.page()?
            .evaluate(script)
            .await
            .map_err(browser_err)?
            .into_value::<bool>()
            .map_err(browser_err)
    }

    async fn click(&mut self, selector: &str) -> Result<(), RenderError> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|_| RenderError::ElementNotFound(selector.to_string()))?;

        element
            .click()
            .await
            .map_err(|e| RenderError::NotClickable(format!("{selector}: {e}")))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        let mut result = Ok(());

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!(error = %e, "Page close failed");
            }
        }

        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                result = Err(browser_err(e));
            }
            let _ = browser.wait().await;
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }

        result
    }
}

/// Launcher for [`ChromeRenderer`] sessions
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    headless: bool,
    executable: Option<PathBuf>,
}

impl ChromeLauncher {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            headless: config.headless,
            executable: config.executable.clone(),
        }
    }
}

#[async_trait]
impl Launcher for ChromeLauncher {
    type Session = ChromeRenderer;

    async fn launch(&self) -> Result<ChromeRenderer, RenderError> {
        let mut builder = BrowserConfig::builder();
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(RenderError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(browser_err)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::debug!(headless = self.headless, "Browser launched");

        Ok(ChromeRenderer {
            browser: Some(browser),
            handler: Some(handler),
            page: None,
        })
    }
}
