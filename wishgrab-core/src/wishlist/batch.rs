use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::sleep;
use tracing::debug;

use crate::config::BatchSection;

use super::detail::DetailSource;
use super::records::{DetailOutcome, EnrichedRecord, ListingRecord};

/// Enriches an ordered record sequence without overwhelming the shared
/// session or the remote origin: fixed-size windows run concurrently,
/// with a pacing delay between windows and a short pause after each
/// item. Output order always equals input order; item failures were
/// already absorbed by the [`DetailSource`], so enrichment itself
/// cannot fail.
pub struct BatchScheduler<S> {
    source: Arc<S>,
    config: BatchSection,
}

impl<S: DetailSource> BatchScheduler<S> {
    pub fn new(source: Arc<S>, config: BatchSection) -> Self {
        Self { source, config }
    }

    pub async fn enrich(&self, records: Vec<ListingRecord>) -> Vec<EnrichedRecord> {
        let window_size = self.config.window_size.max(1);
        let window_pacing = Duration::from_millis(self.config.window_pacing_ms);
        let total_windows = records.len().div_ceil(window_size);
        debug!(
            records = records.len(),
            windows = total_windows,
            window_size,
            "enriching listing records"
        );

        let mut enriched = Vec::with_capacity(records.len());
        for (index, window) in records.chunks(window_size).enumerate() {
            let fetches = window.iter().map(|record| self.enrich_one(record.clone()));
            let mut batch = join_all(fetches).await;
            enriched.append(&mut batch);
            if index + 1 < total_windows {
                sleep(window_pacing).await;
            }
        }
        enriched
    }

    async fn enrich_one(&self, record: ListingRecord) -> EnrichedRecord {
        let Some(external_id) = record.external_id.clone() else {
            return EnrichedRecord::merged(record, DetailOutcome::Empty);
        };
        let outcome = self.source.fetch(&external_id).await;
        sleep(Duration::from_millis(self.config.item_pause_ms)).await;
        EnrichedRecord::merged(record, outcome)
    }
}
