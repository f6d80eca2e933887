use std::sync::{Arc, Mutex};
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::task::AbortHandle;
use tracing::{trace, warn};

use super::error::{BrowserError, BrowserResult};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Readiness condition a navigation waits for. Listing pages want the
/// network to go quiet before the reveal loop starts; detail pages only
/// need the initial document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    NetworkIdle,
    DomContentLoaded,
}

/// Resource classes that can be aborted before they load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    Image,
    Stylesheet,
    Font,
    Media,
}

impl ResourceClass {
    fn as_cdp(self) -> ResourceType {
        match self {
            ResourceClass::Image => ResourceType::Image,
            ResourceClass::Stylesheet => ResourceType::Stylesheet,
            ResourceClass::Font => ResourceType::Font,
            ResourceClass::Media => ResourceType::Media,
        }
    }
}

/// One short-lived browsing context under the shared session. Cheap to
/// clone; every opener must call [`PageHandle::close`] when done (or go
/// through `SessionManager::with_page`, which does it on every path).
#[derive(Debug, Clone)]
pub struct PageHandle {
    page: Page,
    blockers: Arc<Mutex<Vec<AbortHandle>>>,
}

impl PageHandle {
    pub(crate) fn new(page: Page) -> Self {
        Self {
            page,
            blockers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) async fn set_user_agent(&self, user_agent: &str) -> BrowserResult<()> {
        let params = SetUserAgentOverrideParams::builder()
            .user_agent(user_agent)
            .build()
            .map_err(BrowserError::Configuration)?;
        self.page.set_user_agent(params).await?;
        Ok(())
    }

    pub async fn navigate(
        &self,
        url: &str,
        readiness: Readiness,
        limit: Duration,
    ) -> BrowserResult<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Configuration)?;
        let load = async {
            self.page.goto(params).await?;
            if readiness == Readiness::NetworkIdle {
                self.page.wait_for_navigation().await?;
            }
            Ok::<(), BrowserError>(())
        };
        tokio::time::timeout(limit, load)
            .await
            .map_err(|_| BrowserError::Timeout(format!("navigation to {url}")))??;
        trace!(url = %url, ?readiness, "navigation complete");
        Ok(())
    }

    /// Run a script in the page and deserialize its completion value.
    pub async fn evaluate<T: DeserializeOwned>(&self, script: &str) -> BrowserResult<T> {
        self.page
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|err| {
                BrowserError::Extraction(format!("failed to decode evaluation payload: {err}"))
            })
    }

    /// Poll for a selector until it matches or the limit elapses.
    pub async fn wait_for_selector(&self, selector: &str, limit: Duration) -> BrowserResult<()> {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!("selector {selector}")));
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    /// Abort requests for the given resource classes before they load.
    /// Must be called before navigating to the target URL.
    pub async fn block_resources(&self, classes: &[ResourceClass]) -> BrowserResult<()> {
        let patterns = classes
            .iter()
            .map(|class| {
                RequestPattern::builder()
                    .resource_type(class.as_cdp())
                    .build()
            })
            .collect::<Vec<_>>();
        if patterns.is_empty() {
            return Ok(());
        }

        // Listener first, then enable, so no paused request slips past.
        let mut paused = self.page.event_listener::<EventRequestPaused>().await?;
        let enable = EnableParams::builder().patterns(patterns).build();
        self.page.execute(enable).await?;

        let page = self.page.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let params =
                    FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
                let _ = page.execute(params).await;
            }
        });
        self.blockers.lock().unwrap().push(task.abort_handle());
        Ok(())
    }

    /// Release the browsing context. Close failures are logged and
    /// swallowed so teardown never masks the operation's own result.
    pub async fn close(&self) {
        for blocker in self.blockers.lock().unwrap().drain(..) {
            blocker.abort();
        }
        if let Err(err) = self.page.clone().close().await {
            warn!(error = %err, "failed to close page");
        }
    }
}
