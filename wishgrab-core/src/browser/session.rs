use std::future::Future;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ChromiumSection, IdentitySection};

use super::error::{BrowserError, BrowserResult};
use super::page::PageHandle;

/// Owns the process-wide Chromium instance. At most one instance is
/// ever live: `open_page` launches it lazily, subsequent calls reuse
/// it, and `shutdown` closes it at most once.
pub struct SessionManager {
    chromium: ChromiumSection,
    identity: IdentitySection,
    slot: Mutex<Option<SharedSession>>,
}

struct SharedSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl SessionManager {
    pub fn new(chromium: ChromiumSection, identity: IdentitySection) -> Self {
        Self {
            chromium,
            identity,
            slot: Mutex::new(None),
        }
    }

    /// Open a fresh browsing context under the shared session,
    /// launching the session first if none is live yet.
    pub async fn open_page(&self) -> BrowserResult<PageHandle> {
        let mut guard = self.slot.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        let Some(session) = guard.as_ref() else {
            return Err(BrowserError::Unexpected(
                "session slot empty after launch".to_string(),
            ));
        };
        let params = CreateTargetParams::new("about:blank");
        let page = session.browser.new_page(params).await?;
        drop(guard);

        let handle = PageHandle::new(page);
        handle.set_user_agent(&self.identity.user_agent).await?;
        Ok(handle)
    }

    /// Scoped page acquisition: the context is closed on every exit
    /// path, so contexts never leak under the shared session.
    pub async fn with_page<T, F, Fut>(&self, f: F) -> BrowserResult<T>
    where
        F: FnOnce(PageHandle) -> Fut,
        Fut: Future<Output = BrowserResult<T>>,
    {
        let page = self.open_page().await?;
        let result = f(page.clone()).await;
        page.close().await;
        result
    }

    /// Close the shared session if one is live. Safe to call when none
    /// exists; close failures are logged, never retried.
    pub async fn shutdown(&self) {
        let mut guard = self.slot.lock().await;
        let Some(session) = guard.take() else {
            return;
        };
        info!("shutting down chromium instance");
        let SharedSession {
            mut browser,
            handler_task,
        } = session;
        if let Err(err) = browser.close().await {
            warn!(error = %err, "failed to close browser gracefully");
        }
        if let Err(err) = handler_task.await {
            warn!(error = %err, "browser handler join error");
        }
    }

    async fn launch(&self) -> BrowserResult<SharedSession> {
        let config = self.build_chromium_config()?;
        info!(
            headless = self.chromium.headless,
            sandbox = self.chromium.sandbox,
            "launching chromium instance"
        );
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "chromium handler reported error");
                }
            }
        });

        Ok(SharedSession {
            browser,
            handler_task,
        })
    }

    fn build_chromium_config(&self) -> BrowserResult<ChromiumConfig> {
        let mut builder = ChromiumConfig::builder()
            .request_timeout(Duration::from_secs(self.chromium.request_timeout_seconds));

        if let Some(path) = &self.chromium.executable_path {
            builder = builder.chrome_executable(path);
        }
        if !self.chromium.headless {
            builder = builder.with_head();
        }
        if !self.chromium.sandbox {
            builder = builder.no_sandbox();
        }

        let mut args = vec![format!("--user-agent={}", self.identity.user_agent)];
        if self.chromium.disable_gpu {
            args.push("--disable-gpu".into());
        }
        if self.chromium.disable_dev_shm {
            args.push("--disable-dev-shm-usage".into());
        }
        args.push("--no-first-run".into());
        builder = builder.args(args);

        builder.build().map_err(BrowserError::Configuration)
    }
}
