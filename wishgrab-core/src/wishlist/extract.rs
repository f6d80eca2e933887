use regex::Regex;
use serde::Deserialize;

use crate::browser::{BrowserError, BrowserResult, PageHandle};
use crate::config::ListingSection;

use super::records::ListingRecord;

/// Per-item sub-fields as read from the document, before any
/// synthesis. Every field is what one DOM lookup produced, or null.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawListingItem {
    pub item_id: Option<String>,
    pub metadata_blob: Option<String>,
    pub title: Option<String>,
    pub price_whole: Option<String>,
    pub price_fraction: Option<String>,
    pub price_symbol: Option<String>,
    pub shipping: Option<String>,
    pub thumbnail: Option<String>,
}

/// Maps revealed listing items to [`ListingRecord`]s. One in-page pass
/// collects the raw sub-fields; synthesis and filtering happen on the
/// Rust side.
pub struct ListingExtractor {
    selectors: ListingSection,
    external_id: Regex,
}

impl ListingExtractor {
    pub fn new(selectors: ListingSection) -> BrowserResult<Self> {
        let external_id = Regex::new(&selectors.external_id_pattern).map_err(|err| {
            BrowserError::Configuration(format!("invalid external id pattern: {err}"))
        })?;
        Ok(Self {
            selectors,
            external_id,
        })
    }

    pub async fn extract(
        &self,
        page: &PageHandle,
        limit: Option<usize>,
    ) -> BrowserResult<Vec<ListingRecord>> {
        let raw: Vec<RawListingItem> = page.evaluate(&self.collection_script(limit)).await?;
        Ok(self.build_records(raw, limit))
    }

    /// Candidates are truncated to the first N in document order
    /// before any per-field synthesis; items lacking the mandatory
    /// identifier are dropped afterwards.
    pub fn build_records(
        &self,
        raw: Vec<RawListingItem>,
        limit: Option<usize>,
    ) -> Vec<ListingRecord> {
        let take = limit.filter(|n| *n > 0).unwrap_or(usize::MAX);
        raw.into_iter()
            .take(take)
            .filter_map(|item| self.build_record(item))
            .collect()
    }

    fn build_record(&self, item: RawListingItem) -> Option<ListingRecord> {
        let item_id = item
            .item_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())?;
        let external_id = item
            .metadata_blob
            .as_deref()
            .and_then(|blob| self.recover_external_id(blob));
        Some(ListingRecord {
            item_id,
            external_id,
            title: item
                .title
                .map(|title| title.trim().to_string())
                .filter(|title| !title.is_empty()),
            price: synthesize_price(
                item.price_whole.as_deref(),
                item.price_fraction.as_deref(),
                item.price_symbol.as_deref(),
                &self.selectors.fallback_currency,
            ),
            shipping_note: item
                .shipping
                .as_deref()
                .map(collapse_whitespace)
                .filter(|note| !note.is_empty()),
            thumbnail_url: item.thumbnail.filter(|src| !src.is_empty()),
        })
    }

    /// The reposition attribute holds a JSON blob whose
    /// `itemExternalId` field embeds the catalog code. Any parse or
    /// pattern failure leaves the field absent; it never fails the
    /// record.
    fn recover_external_id(&self, blob: &str) -> Option<String> {
        let params: serde_json::Value = serde_json::from_str(blob).ok()?;
        let embedded = params.get("itemExternalId")?.as_str()?;
        self.external_id
            .captures(embedded)?
            .get(1)
            .map(|code| code.as_str().to_string())
    }

    fn collection_script(&self, limit: Option<usize>) -> String {
        let selectors = &self.selectors;
        let limit = limit.unwrap_or(0);
        format!(
            r#"
(() => {{
    const text = (item, selector) => {{
        const el = item.querySelector(selector);
        return el && el.textContent ? el.textContent.trim() : null;
    }};
    const items = Array.from(document.querySelectorAll("{item_marker}"));
    const limited = {limit} > 0 ? items.slice(0, {limit}) : items;
    return limited.map((item) => {{
        const thumb = item.querySelector("{thumbnail}");
        return {{
            itemId: item.getAttribute("{id_attribute}"),
            metadataBlob: item.getAttribute("{metadata_attribute}"),
            title: text(item, "{title}"),
            priceWhole: text(item, "{price_whole}"),
            priceFraction: text(item, "{price_fraction}"),
            priceSymbol: text(item, "{price_symbol}"),
            shipping: text(item, "{shipping}"),
            thumbnail: thumb && thumb.src ? thumb.src : null
        }};
    }});
}})()
"#,
            item_marker = escape_js(&selectors.item_marker),
            limit = limit,
            thumbnail = escape_js(&selectors.thumbnail_selector),
            id_attribute = escape_js(&selectors.id_attribute),
            metadata_attribute = escape_js(&selectors.metadata_attribute),
            title = escape_js(&selectors.title_selectors.join(", ")),
            price_whole = escape_js(&selectors.price_whole_selector),
            price_fraction = escape_js(&selectors.price_fraction_selector),
            price_symbol = escape_js(&selectors.price_symbol_selector),
            shipping = escape_js(&selectors.shipping_selector),
        )
    }
}

/// Synthesize one formatted price from its sub-fields. Either numeric
/// sub-field alone is enough; both absent means no price at all.
fn synthesize_price(
    whole: Option<&str>,
    fraction: Option<&str>,
    symbol: Option<&str>,
    fallback_currency: &str,
) -> Option<String> {
    if whole.is_none() && fraction.is_none() {
        return None;
    }
    let whole = whole
        .map(|raw| raw.trim().replace(',', ""))
        .filter(|raw| !raw.is_empty())
        .unwrap_or_else(|| "0".to_string());
    let fraction = fraction
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .unwrap_or("00");
    let symbol = symbol
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .unwrap_or(fallback_currency);
    Some(format!("{symbol}{whole}.{fraction}"))
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_js(input: &str) -> String {
    input.replace('\\', "\\\\").replace('"', "\\\"")
}
