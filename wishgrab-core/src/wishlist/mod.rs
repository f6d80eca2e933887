mod batch;
mod detail;
mod extract;
mod records;
mod scraper;
mod stabilize;

pub use batch::BatchScheduler;
pub use detail::{DetailFetcher, DetailSource};
pub use extract::{ListingExtractor, RawListingItem};
pub use records::{DetailOutcome, DetailRecord, EnrichedRecord, ListingRecord};
pub use scraper::WishlistScraper;
pub use stabilize::{PageRevealSurface, RevealSurface, StabilizeOutcome, Stabilizer};
