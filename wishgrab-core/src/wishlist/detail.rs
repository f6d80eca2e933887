use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::browser::{BrowserResult, Readiness, SessionManager};
use crate::config::DetailSection;

use super::records::{DetailOutcome, DetailRecord};

/// One best-effort detail lookup per external identifier. The batch
/// scheduler only sees [`DetailOutcome`]; errors never cross this
/// boundary for a single item.
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch(&self, external_id: &str) -> DetailOutcome;
}

/// Raw field candidates as one in-page pass produced them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawDetailPayload {
    title: Option<String>,
    current_price: Option<String>,
    original_price: Option<String>,
    rating: Option<String>,
    rating_count: Option<String>,
    availability: Option<String>,
    description: Option<String>,
    features: Vec<String>,
    main_image: Option<String>,
    additional_images: Vec<String>,
    manufacturer: Option<String>,
    category: Option<String>,
    dimensions: Option<String>,
    weight: Option<String>,
}

/// Loads a detail page and extracts a [`DetailRecord`]. Every
/// multi-source field is an ordered candidate list tried in priority
/// order inside the page; normalization happens here.
pub struct DetailFetcher {
    session: Arc<SessionManager>,
    config: DetailSection,
}

impl DetailFetcher {
    pub fn new(session: Arc<SessionManager>, config: DetailSection) -> Self {
        Self { session, config }
    }

    pub fn detail_url(&self, external_id: &str) -> String {
        format!(
            "{}/-/en/dp/{}",
            self.config.base_url.trim_end_matches('/'),
            external_id
        )
    }

    /// Standalone detail fetch: navigation and extraction failures
    /// propagate to the caller.
    pub async fn fetch_record(&self, external_id: &str) -> BrowserResult<DetailRecord> {
        let url = self.detail_url(external_id);
        info!(external_id = %external_id, "fetching detail page");
        let nav_timeout = Duration::from_millis(self.config.nav_timeout_ms);
        let marker_timeout = Duration::from_millis(self.config.marker_timeout_ms);
        let script = self.extraction_script();

        let raw = self
            .session
            .with_page(|page| async move {
                page.block_resources(&self.config.blocked_resources).await?;
                page.navigate(&url, Readiness::DomContentLoaded, nav_timeout)
                    .await?;
                if let Err(err) = page
                    .wait_for_selector(&self.config.marker, marker_timeout)
                    .await
                {
                    debug!(error = %err, "detail markers missing, extracting anyway");
                }
                page.evaluate::<RawDetailPayload>(&script).await
            })
            .await?;

        Ok(self.normalize(raw))
    }

    fn normalize(&self, raw: RawDetailPayload) -> DetailRecord {
        let features = clean_features(raw.features, &self.config.boilerplate_marker);
        let description = raw
            .description
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .or_else(|| {
                if features.is_empty() {
                    None
                } else {
                    Some(features.join(" | "))
                }
            });
        DetailRecord {
            title: non_empty(raw.title),
            current_price: raw
                .current_price
                .as_deref()
                .and_then(|price| retain_price_chars(price, &self.config.currency_symbols)),
            original_price: non_empty(raw.original_price),
            rating: raw.rating.as_deref().and_then(retain_decimal),
            rating_count: raw.rating_count.as_deref().and_then(retain_digits),
            availability: non_empty(raw.availability),
            description,
            features,
            main_image_url: non_empty(raw.main_image),
            additional_image_urls: clean_images(
                raw.additional_images,
                &self.config.decoration_marker,
            ),
            manufacturer: non_empty(raw.manufacturer),
            category: non_empty(raw.category),
            dimensions: non_empty(raw.dimensions),
            weight: non_empty(raw.weight),
        }
    }

    fn extraction_script(&self) -> String {
        let config = &self.config;
        format!(
            r#"
(() => {{
    const text = (selector) => {{
        const el = document.querySelector(selector);
        return el && el.textContent ? el.textContent.trim() : null;
    }};
    const first = (selectors) => {{
        for (const selector of selectors) {{
            const value = text(selector);
            if (value) return value;
        }}
        return null;
    }};
    const firstSrc = (selectors) => {{
        for (const selector of selectors) {{
            const el = document.querySelector(selector);
            if (el && el.src) return el.src;
        }}
        return null;
    }};
    const features = Array.from(document.querySelectorAll({features}))
        .map((el) => (el.textContent || '').trim())
        .filter((value) => value.length > 0);
    const additionalImages = Array.from(document.querySelectorAll({gallery}))
        .map((img) => img.src || null)
        .filter((src) => !!src);
    return {{
        title: first({title}),
        currentPrice: first({price}),
        originalPrice: first({original_price}),
        rating: first({rating}),
        ratingCount: first({rating_count}),
        availability: first({availability}),
        description: first({description}),
        features,
        mainImage: firstSrc({main_image}),
        additionalImages,
        manufacturer: first({manufacturer}),
        category: first({category}),
        dimensions: first({dimensions}),
        weight: first({weight})
    }};
}})()
"#,
            features = js_string(&config.feature_selector),
            gallery = js_string(&config.image_gallery_selector),
            title = js_list(&config.title_selectors),
            price = js_list(&config.price_selectors),
            original_price = js_list(&config.original_price_selectors),
            rating = js_list(&config.rating_selectors),
            rating_count = js_list(&config.rating_count_selectors),
            availability = js_list(&config.availability_selectors),
            description = js_list(&config.description_selectors),
            main_image = js_list(&config.main_image_selectors),
            manufacturer = js_list(&config.manufacturer_selectors),
            category = js_list(&config.category_selectors),
            dimensions = js_list(&config.dimensions_selectors),
            weight = js_list(&config.weight_selectors),
        )
    }
}

#[async_trait]
impl DetailSource for DetailFetcher {
    async fn fetch(&self, external_id: &str) -> DetailOutcome {
        match self.fetch_record(external_id).await {
            Ok(record) => DetailOutcome::Fetched(record),
            Err(err) => {
                warn!(
                    external_id = %external_id,
                    error = %err,
                    "detail fetch failed, continuing with listing fields"
                );
                DetailOutcome::Empty
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Keep digits, separators, and currency symbols; drop everything else.
fn retain_price_chars(raw: &str, symbols: &str) -> Option<String> {
    let kept = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || symbols.contains(*c))
        .collect::<String>();
    let kept = kept.trim().to_string();
    (!kept.is_empty()).then_some(kept)
}

fn retain_decimal(raw: &str) -> Option<String> {
    let kept = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect::<String>();
    (!kept.is_empty()).then_some(kept)
}

fn retain_digits(raw: &str) -> Option<String> {
    let kept = raw
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>();
    (!kept.is_empty()).then_some(kept)
}

fn clean_features(features: Vec<String>, boilerplate_marker: &str) -> Vec<String> {
    features
        .into_iter()
        .map(|feature| feature.trim().to_string())
        .filter(|feature| !feature.is_empty() && !feature.contains(boilerplate_marker))
        .collect()
}

fn clean_images(images: Vec<String>, decoration_marker: &str) -> Vec<String> {
    images
        .into_iter()
        .filter(|src| !src.is_empty() && !src.contains(decoration_marker))
        .collect()
}

fn js_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn js_list(values: &[String]) -> String {
    let quoted = values
        .iter()
        .map(|value| js_string(value))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{quoted}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_stripping_keeps_digits_separators_and_symbol() {
        assert_eq!(
            retain_price_chars("Price: €1.299,95 incl VAT", "€"),
            Some("€1.299,95".to_string())
        );
        assert_eq!(retain_price_chars("unavailable", "€"), None);
    }

    #[test]
    fn rating_stripping_keeps_decimal() {
        assert_eq!(retain_decimal("4.6 stars"), Some("4.6".to_string()));
        assert_eq!(retain_decimal("no rating"), None);
    }

    #[test]
    fn rating_count_stripping_keeps_digits_only() {
        assert_eq!(retain_digits("12,345 ratings"), Some("12345".to_string()));
        assert_eq!(retain_digits("none"), None);
    }

    #[test]
    fn features_drop_empties_and_boilerplate() {
        let cleaned = clean_features(
            vec![
                "  Solid build ".into(),
                "".into(),
                "   ".into(),
                "Hide details".into(),
                "2-year warranty".into(),
            ],
            "Hide",
        );
        assert_eq!(cleaned, vec!["Solid build", "2-year warranty"]);
    }

    #[test]
    fn decorative_images_are_filtered() {
        let cleaned = clean_images(
            vec![
                "https://img.example/1.jpg".into(),
                "https://img.example/sprite-overlay.png".into(),
                "".into(),
            ],
            "sprite",
        );
        assert_eq!(cleaned, vec!["https://img.example/1.jpg"]);
    }

    #[test]
    fn description_falls_back_to_joined_features() {
        let fetcher_config = crate::config::DetailSection::default();
        let session = Arc::new(SessionManager::new(
            crate::config::ChromiumSection::default(),
            crate::config::IdentitySection::default(),
        ));
        let fetcher = DetailFetcher::new(session, fetcher_config);
        let raw = RawDetailPayload {
            features: vec!["First".into(), "Second".into(), "Hide details".into()],
            ..RawDetailPayload::default()
        };
        let record = fetcher.normalize(raw);
        assert_eq!(record.description.as_deref(), Some("First | Second"));
        assert_eq!(record.features, vec!["First", "Second"]);
    }

    #[test]
    fn explicit_description_beats_feature_join() {
        let session = Arc::new(SessionManager::new(
            crate::config::ChromiumSection::default(),
            crate::config::IdentitySection::default(),
        ));
        let fetcher = DetailFetcher::new(session, crate::config::DetailSection::default());
        let raw = RawDetailPayload {
            description: Some("  A proper description.  ".into()),
            features: vec!["First".into()],
            ..RawDetailPayload::default()
        };
        let record = fetcher.normalize(raw);
        assert_eq!(record.description.as_deref(), Some("A proper description."));
    }

    #[test]
    fn detail_url_is_deterministic() {
        let session = Arc::new(SessionManager::new(
            crate::config::ChromiumSection::default(),
            crate::config::IdentitySection::default(),
        ));
        let fetcher = DetailFetcher::new(session, crate::config::DetailSection::default());
        assert_eq!(
            fetcher.detail_url("B08XYZ1234"),
            "https://www.amazon.de/-/en/dp/B08XYZ1234"
        );
        assert_eq!(
            fetcher.detail_url("B08XYZ1234"),
            fetcher.detail_url("B08XYZ1234")
        );
    }

    #[test]
    fn extraction_script_lists_price_fallbacks_in_order() {
        let session = Arc::new(SessionManager::new(
            crate::config::ChromiumSection::default(),
            crate::config::IdentitySection::default(),
        ));
        let fetcher = DetailFetcher::new(session, crate::config::DetailSection::default());
        let script = fetcher.extraction_script();
        let offscreen = script.find(".a-price .a-offscreen").expect("first fallback");
        let whole = script.find(".a-price-whole").expect("last fallback");
        assert!(offscreen < whole);
    }
}
