use serde::{Deserialize, Serialize};

/// One listed item as it appears on the listing page. Only the item
/// identifier is mandatory; extraction drops items without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub item_id: String,
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub price: Option<String>,
    pub shipping_note: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Per-item enrichment scraped from the detail page. Every field is
/// independently optional; absence is a valid terminal state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_image_url: Option<String>,
    pub additional_image_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
}

/// Outcome of one best-effort detail fetch. Batch enrichment never
/// sees an error for a single item, only `Empty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailOutcome {
    Fetched(DetailRecord),
    Empty,
}

impl DetailOutcome {
    pub fn into_record(self) -> Option<DetailRecord> {
        match self {
            DetailOutcome::Fetched(record) => Some(record),
            DetailOutcome::Empty => None,
        }
    }
}

/// Shallow merge of a listing record and its detail enrichment. Both
/// halves are flattened on serialization in listing-then-detail order,
/// so detail fields win on the one colliding key (`title`) while
/// absent detail fields leave the listing values untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub listing: ListingRecord,
    #[serde(flatten)]
    pub detail: Option<DetailRecord>,
}

impl EnrichedRecord {
    pub fn merged(listing: ListingRecord, outcome: DetailOutcome) -> Self {
        Self {
            listing,
            detail: outcome.into_record(),
        }
    }
}
