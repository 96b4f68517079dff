//! Bounded condition waits
//!
//! Every suspension point in a crawl is a poll-until-predicate loop with a
//! hard deadline on the tokio clock, so tests can drive it with a paused
//! clock instead of real sleeps.

use std::time::Duration;

use tokio::time::Instant;

use crate::crawler::render::Renderer;
use crate::utils::error::RenderError;

/// What a wait is polling for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition<'a> {
    /// At least one element matches the selector
    Present(&'a str),
    /// The first matching element can be clicked
    Clickable(&'a str),
    /// The rendered markup differs from the given snapshot
    Changed(&'a str),
}

impl Condition<'_> {
    fn describe(&self) -> String {
        match self {
            Self::Present(s) => format!("element `{s}`"),
            Self::Clickable(s) => format!("clickable `{s}`"),
            Self::Changed(_) => String::from("page change"),
        }
    }

    async fn holds<R: Renderer + ?Sized>(&self, renderer: &mut R) -> Result<bool, RenderError> {
        match *self {
            Self::Present(s) => renderer.has_element(s).await,
            Self::Clickable(s) => renderer.is_clickable(s).await,
            Self::Changed(previous) => Ok(renderer.current_markup().await? != previous),
        }
    }
}

/// Poll `condition` every `interval` until it holds or `timeout` elapses
///
/// The condition is always checked at least once, and once more at the
/// deadline, so a zero-length remainder never skips the final look.
///
/// # Errors
///
/// Returns `RenderError::Timeout` when the deadline passes, or the
/// renderer's own error if a poll fails
pub async fn wait_for<R: Renderer + ?Sized>(
    renderer: &mut R,
    condition: Condition<'_>,
    timeout: Duration,
    interval: Duration,
) -> Result<(), RenderError> {
    let start = Instant::now();
    let deadline = start + timeout;

    loop {
        if condition.holds(renderer).await? {
            tracing::trace!(
                condition = %condition.describe(),
                elapsed_ms = start.elapsed().as_millis(),
                "Condition met"
            );
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(RenderError::Timeout {
                what: condition.describe(),
                waited_ms: now.duration_since(start).as_millis(),
            });
        }

        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}
