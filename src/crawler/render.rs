//! Rendering sessions
//!
//! A [`Renderer`] is one scoped page session: the crawler loads a seed URL,
//! polls for elements, clicks the next-page control and closes the session
//! when it is done. [`Launcher`]s create one fresh session per source.
//!
//! [`HttpRenderer`] is the static implementation: markup comes straight from
//! the server and "clicking" a control follows its `href`.

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::config::HttpConfig;
use crate::crawler::fetcher::SinaFetcher;
use crate::utils::error::RenderError;

/// One page session driven by the crawler
#[async_trait]
pub trait Renderer: Send {
    /// Navigate to `url`
    async fn load(&mut self, url: &str) -> Result<(), RenderError>;

    /// Markup of the page as currently rendered
    async fn current_markup(&mut self) -> Result<String, RenderError>;

    /// Whether any element matches `selector`
    async fn has_element(&mut self, selector: &str) -> Result<bool, RenderError>;

    /// Whether the first element matching `selector` can be activated
    async fn is_clickable(&mut self, selector: &str) -> Result<bool, RenderError>;

    /// Activate the first element matching `selector`
    async fn click(&mut self, selector: &str) -> Result<(), RenderError>;

    /// Release the session
    async fn close(&mut self) -> Result<(), RenderError>;
}

/// Factory for fresh rendering sessions
#[async_trait]
pub trait Launcher: Send + Sync {
    type Session: Renderer;

    async fn launch(&self) -> Result<Self::Session, RenderError>;
}

/// Static renderer backed by [`SinaFetcher`]
pub struct HttpRenderer {
    fetcher: SinaFetcher,
    current_url: Option<String>,
    markup: Option<String>,
    closed: bool,
}

impl HttpRenderer {
    pub fn new(fetcher: SinaFetcher) -> Self {
        Self {
            fetcher,
            current_url: None,
            markup: None,
            closed: false,
        }
    }

    fn page(&self) -> Result<&str, RenderError> {
        if self.closed {
            return Err(RenderError::NoPage);
        }
        self.markup.as_deref().ok_or(RenderError::NoPage)
    }

    async fn navigate(&mut self, url: &str, referer: Option<String>) -> Result<(), RenderError> {
        if self.closed {
            return Err(RenderError::NoPage);
        }

        let full_url = self.fetcher.full_url(url);
        tracing::debug!(url = %full_url, "Loading page");

        let body = self.fetcher.fetch(&full_url, referer.as_deref()).await?;
        self.current_url = Some(full_url);
        self.markup = Some(body);
        Ok(())
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn load(&mut self, url: &str) -> Result<(), RenderError> {
        self.navigate(url, None).await
    }

    async fn current_markup(&mut self) -> Result<String, RenderError> {
        self.page().map(str::to_string)
    }

    async fn has_element(&mut self, selector: &str) -> Result<bool, RenderError> {
        let markup = self.page()?;
        let selector = compile(selector)?;
        Ok(Html::parse_document(markup).select(&selector).next().is_some())
    }

    async fn is_clickable(&mut self, selector: &str) -> Result<bool, RenderError> {
        Ok(link_target(self.page()?, selector)?.is_some())
    }

    async fn click(&mut self, selector: &str) -> Result<(), RenderError> {
        let href = link_target(self.page()?, selector)?
            .ok_or_else(|| RenderError::NotClickable(selector.to_string()))?;

        let base = self.current_url.clone().ok_or(RenderError::NoPage)?;
        let target = Url::parse(&base)
            .and_then(|b| b.join(&href))
            .map_err(|e| RenderError::NotClickable(format!("{selector}: {e}")))?;

        self.navigate(target.as_str(), Some(base)).await
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.closed = true;
        self.markup = None;
        self.current_url = None;
        Ok(())
    }
}

/// Launcher for [`HttpRenderer`] sessions
#[derive(Debug, Clone)]
pub struct HttpLauncher {
    config: HttpConfig,
    base_url: Option<String>,
}

impl HttpLauncher {
    pub fn new(config: HttpConfig) -> Self {
        Self {
            config,
            base_url: None,
        }
    }

    /// Resolve relative seed URLs against `base_url`
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }
}

#[async_trait]
impl Launcher for HttpLauncher {
    type Session = HttpRenderer;

    async fn launch(&self) -> Result<HttpRenderer, RenderError> {
        let fetcher = match &self.base_url {
            Some(base) => SinaFetcher::with_base_url(base, &self.config)?,
            None => SinaFetcher::new(&self.config)?,
        };
        Ok(HttpRenderer::new(fetcher))
    }
}

fn compile(selector: &str) -> Result<Selector, RenderError> {
    Selector::parse(selector).map_err(|_| RenderError::InvalidSelector(selector.to_string()))
}

/// Followable `href` of the first element matching `selector`
///
/// Anchors without a target, fragment-only links and `javascript:` links
/// are treated as inert, as are elements marked disabled.
fn link_target(markup: &str, selector: &str) -> Result<Option<String>, RenderError> {
    let selector = compile(selector)?;
    let document = Html::parse_document(markup);

    let Some(element) = document.select(&selector).next() else {
        return Ok(None);
    };

    let value = element.value();
    if value.attr("disabled").is_some() || value.classes().any(|c| c == "disabled") {
        return Ok(None);
    }

    Ok(value
        .attr("href")
        .map(str::trim)
        .filter(|h| !h.is_empty() && !h.starts_with('#') && !h.starts_with("javascript:"))
        .map(str::to_string))
}
