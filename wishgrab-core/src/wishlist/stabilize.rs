use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::browser::{BrowserResult, PageHandle};
use crate::config::StabilizeSection;

/// The page operations the reveal loop needs. The live implementation
/// drives a [`PageHandle`]; scripted fakes stand in elsewhere.
#[async_trait]
pub trait RevealSurface {
    async fn scroll_to_bottom(&mut self) -> BrowserResult<()>;
    async fn content_height(&mut self) -> BrowserResult<u64>;
    async fn reveal_control_visible(&mut self) -> BrowserResult<bool>;
    async fn activate_reveal_control(&mut self) -> BrowserResult<()>;
    async fn settle(&mut self, interval: Duration) -> BrowserResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizeOutcome {
    pub iterations: u32,
    pub final_height: u64,
}

/// Reveals all lazily-loaded listing content: scroll, settle, measure,
/// activate the reveal control when visible, until the scrollable
/// height stops growing for `patience` consecutive iterations. Any
/// height change resets the counter, transient flicker included.
pub struct Stabilizer {
    config: StabilizeSection,
}

impl Stabilizer {
    pub fn new(config: StabilizeSection) -> Self {
        Self { config }
    }

    /// When `single_pass` is set (a result limit was requested), one
    /// reveal pass runs and the loop ends, whatever the height did.
    pub async fn run<S: RevealSurface>(
        &self,
        surface: &mut S,
        single_pass: bool,
    ) -> BrowserResult<StabilizeOutcome> {
        let settle = Duration::from_millis(self.config.settle_ms);
        let reveal_settle = Duration::from_millis(self.config.reveal_settle_ms);
        let mut iterations = 0u32;
        let mut last_height: Option<u64> = None;
        let mut no_growth = 0u32;

        loop {
            surface.scroll_to_bottom().await?;
            surface.settle(settle).await?;
            let height = surface.content_height().await?;
            if surface.reveal_control_visible().await? {
                surface.activate_reveal_control().await?;
                surface.settle(reveal_settle).await?;
            }
            iterations += 1;
            trace!(iterations, height, "reveal iteration");

            if single_pass {
                debug!(height, "single reveal pass complete");
                return Ok(StabilizeOutcome {
                    iterations,
                    final_height: height,
                });
            }

            match last_height {
                Some(previous) if previous == height => no_growth += 1,
                _ => no_growth = 0,
            }
            last_height = Some(height);

            if no_growth >= self.config.patience {
                debug!(iterations, height, "listing height stable");
                return Ok(StabilizeOutcome {
                    iterations,
                    final_height: height,
                });
            }
        }
    }
}

/// [`RevealSurface`] over a live page.
pub struct PageRevealSurface<'a> {
    page: &'a PageHandle,
    reveal_control: &'a str,
}

impl<'a> PageRevealSurface<'a> {
    pub fn new(page: &'a PageHandle, reveal_control: &'a str) -> Self {
        Self {
            page,
            reveal_control,
        }
    }

    fn control_script(&self, body: &str) -> String {
        format!(
            r#"(() => {{ const el = document.querySelector("{selector}"); {body} }})()"#,
            selector = self.reveal_control.replace('\\', "\\\\").replace('"', "\\\""),
            body = body,
        )
    }
}

#[async_trait]
impl RevealSurface for PageRevealSurface<'_> {
    async fn scroll_to_bottom(&mut self) -> BrowserResult<()> {
        self.page
            .evaluate::<bool>(
                "(() => { window.scrollTo(0, document.documentElement.scrollHeight); return true; })()",
            )
            .await?;
        Ok(())
    }

    async fn content_height(&mut self) -> BrowserResult<u64> {
        self.page
            .evaluate::<u64>("document.documentElement.scrollHeight")
            .await
    }

    async fn reveal_control_visible(&mut self) -> BrowserResult<bool> {
        self.page
            .evaluate::<bool>(&self.control_script("return !!(el && el.offsetParent !== null);"))
            .await
    }

    async fn activate_reveal_control(&mut self) -> BrowserResult<()> {
        self.page
            .evaluate::<bool>(&self.control_script("if (el) el.click(); return !!el;"))
            .await?;
        Ok(())
    }

    async fn settle(&mut self, interval: Duration) -> BrowserResult<()> {
        tokio::time::sleep(interval).await;
        Ok(())
    }
}
