use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::browser::{BrowserError, BrowserResult, Readiness, SessionManager};
use crate::config::WishgrabConfig;

use super::batch::BatchScheduler;
use super::detail::DetailFetcher;
use super::extract::ListingExtractor;
use super::records::{DetailRecord, EnrichedRecord, ListingRecord};
use super::stabilize::{PageRevealSurface, Stabilizer};

/// The three scraping operations, wired over one shared session:
/// listing fetch, listing fetch with batch enrichment, and standalone
/// detail fetch.
pub struct WishlistScraper {
    session: Arc<SessionManager>,
    config: WishgrabConfig,
    extractor: ListingExtractor,
    stabilizer: Stabilizer,
    detail: Arc<DetailFetcher>,
}

impl WishlistScraper {
    pub fn new(session: Arc<SessionManager>, config: WishgrabConfig) -> BrowserResult<Self> {
        let extractor = ListingExtractor::new(config.listing.clone())?;
        let stabilizer = Stabilizer::new(config.stabilize.clone());
        let detail = Arc::new(DetailFetcher::new(
            Arc::clone(&session),
            config.detail.clone(),
        ));
        Ok(Self {
            session,
            config,
            extractor,
            stabilizer,
            detail,
        })
    }

    pub async fn fetch_listing(
        &self,
        url: &str,
        limit: Option<usize>,
    ) -> BrowserResult<Vec<ListingRecord>> {
        info!(url = %url, ?limit, "fetching listing");
        let nav_timeout = Duration::from_millis(self.config.listing.nav_timeout_ms);
        let marker_timeout = Duration::from_millis(self.config.stabilize.marker_timeout_ms);
        let single_pass = limit.is_some_and(|n| n > 0);

        let records = self
            .session
            .with_page(|page| async move {
                page.navigate(url, Readiness::NetworkIdle, nav_timeout)
                    .await?;

                let mut surface =
                    PageRevealSurface::new(&page, &self.config.listing.reveal_control);
                let outcome = self.stabilizer.run(&mut surface, single_pass).await?;
                debug!(
                    iterations = outcome.iterations,
                    height = outcome.final_height,
                    "listing stabilized"
                );

                match page
                    .wait_for_selector(&self.config.listing.item_marker, marker_timeout)
                    .await
                {
                    Ok(()) => {}
                    Err(BrowserError::Timeout(_)) => {
                        return Err(BrowserError::NoItems(format!(
                            "no element matched {} at {url}",
                            self.config.listing.item_marker
                        )));
                    }
                    Err(err) => return Err(err),
                }

                self.extractor.extract(&page, limit).await
            })
            .await?;

        info!(records = records.len(), "listing extracted");
        Ok(records)
    }

    /// Listing fetch followed by batch enrichment. Listing-phase
    /// failures fail the whole call; per-item detail failures were
    /// already absorbed into empty outcomes.
    pub async fn fetch_listing_enriched(
        &self,
        url: &str,
        limit: Option<usize>,
    ) -> BrowserResult<Vec<EnrichedRecord>> {
        let records = self.fetch_listing(url, limit).await?;
        let scheduler = BatchScheduler::new(Arc::clone(&self.detail), self.config.batch.clone());
        let enriched = scheduler.enrich(records).await;
        info!(
            enriched = enriched.iter().filter(|r| r.detail.is_some()).count(),
            total = enriched.len(),
            "batch enrichment complete"
        );
        Ok(enriched)
    }

    pub async fn fetch_detail(&self, external_id: &str) -> BrowserResult<DetailRecord> {
        self.detail.fetch_record(external_id).await
    }
}
