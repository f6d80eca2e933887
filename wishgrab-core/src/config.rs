use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::browser::ResourceClass;
use crate::error::{ConfigError, Result};

/// Full daemon configuration. Every section carries serde defaults so
/// the daemon can start without a config file and a partial file only
/// needs to name the sections it overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct WishgrabConfig {
    pub server: ServerSection,
    pub chromium: ChromiumSection,
    pub identity: IdentitySection,
    pub stabilize: StabilizeSection,
    pub listing: ListingSection,
    pub detail: DetailSection,
    pub batch: BatchSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumSection {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub disable_dev_shm: bool,
    pub request_timeout_seconds: u64,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: true,
            sandbox: false,
            disable_gpu: true,
            disable_dev_shm: true,
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    pub user_agent: String,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StabilizeSection {
    pub settle_ms: u64,
    pub reveal_settle_ms: u64,
    pub patience: u32,
    pub marker_timeout_ms: u64,
}

impl Default for StabilizeSection {
    fn default() -> Self {
        Self {
            settle_ms: 1000,
            reveal_settle_ms: 2000,
            patience: 3,
            marker_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingSection {
    pub nav_timeout_ms: u64,
    pub item_marker: String,
    pub id_attribute: String,
    pub metadata_attribute: String,
    pub external_id_pattern: String,
    pub title_selectors: Vec<String>,
    pub price_whole_selector: String,
    pub price_fraction_selector: String,
    pub price_symbol_selector: String,
    pub shipping_selector: String,
    pub thumbnail_selector: String,
    pub reveal_control: String,
    pub fallback_currency: String,
}

impl Default for ListingSection {
    fn default() -> Self {
        Self {
            nav_timeout_ms: 30_000,
            item_marker: "li[data-id]".to_string(),
            id_attribute: "data-itemid".to_string(),
            metadata_attribute: "data-reposition-action-params".to_string(),
            external_id_pattern: "ASIN:([A-Z0-9]+)".to_string(),
            title_selectors: vec![
                "h2".to_string(),
                "h3".to_string(),
                "[class*='a-text-normal']".to_string(),
            ],
            price_whole_selector: ".a-price-whole".to_string(),
            price_fraction_selector: ".a-price-fraction".to_string(),
            price_symbol_selector: ".a-price-symbol".to_string(),
            shipping_selector: "[class*='a-color-secondary']".to_string(),
            thumbnail_selector: "img".to_string(),
            reveal_control: "#wl-see-more, input[name='showMoreUrl']".to_string(),
            fallback_currency: "€".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetailSection {
    pub base_url: String,
    pub nav_timeout_ms: u64,
    pub marker: String,
    pub marker_timeout_ms: u64,
    pub blocked_resources: Vec<ResourceClass>,
    pub title_selectors: Vec<String>,
    pub price_selectors: Vec<String>,
    pub original_price_selectors: Vec<String>,
    pub rating_selectors: Vec<String>,
    pub rating_count_selectors: Vec<String>,
    pub availability_selectors: Vec<String>,
    pub description_selectors: Vec<String>,
    pub feature_selector: String,
    pub image_gallery_selector: String,
    pub main_image_selectors: Vec<String>,
    pub manufacturer_selectors: Vec<String>,
    pub category_selectors: Vec<String>,
    pub dimensions_selectors: Vec<String>,
    pub weight_selectors: Vec<String>,
    pub boilerplate_marker: String,
    pub decoration_marker: String,
    pub currency_symbols: String,
}

impl Default for DetailSection {
    fn default() -> Self {
        Self {
            base_url: "https://www.amazon.de".to_string(),
            nav_timeout_ms: 30_000,
            marker: "#productTitle, #price, .a-price".to_string(),
            marker_timeout_ms: 10_000,
            blocked_resources: vec![
                ResourceClass::Image,
                ResourceClass::Stylesheet,
                ResourceClass::Font,
                ResourceClass::Media,
            ],
            title_selectors: vec!["#productTitle".to_string()],
            price_selectors: vec![
                ".a-price .a-offscreen".to_string(),
                "#price_inside_buybox".to_string(),
                "#priceblock_ourprice".to_string(),
                "#priceblock_dealprice".to_string(),
                ".a-price-whole".to_string(),
            ],
            original_price_selectors: vec![".basisPrice .a-text-price".to_string()],
            rating_selectors: vec!["#acrPopover".to_string(), ".a-icon-star".to_string()],
            rating_count_selectors: vec!["#acrCustomerReviewText".to_string()],
            availability_selectors: vec!["#availability".to_string()],
            description_selectors: vec![
                "#productDescription p".to_string(),
                "#bookDescription_feature_div".to_string(),
            ],
            feature_selector: "#feature-bullets li span".to_string(),
            image_gallery_selector: "#altImages img".to_string(),
            main_image_selectors: vec!["#landingImage".to_string(), "#imgBlkFront".to_string()],
            manufacturer_selectors: vec!["#bylineInfo".to_string()],
            category_selectors: vec!["#wayfinding-breadcrumbs_feature_div".to_string()],
            dimensions_selectors: vec![
                "#productDetails_detailBullets_sections1 tr:nth-child(1) td".to_string(),
            ],
            weight_selectors: vec![
                "#productDetails_detailBullets_sections1 tr:nth-child(2) td".to_string(),
            ],
            boilerplate_marker: "Hide".to_string(),
            decoration_marker: "sprite".to_string(),
            currency_symbols: "€".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    pub window_size: usize,
    pub window_pacing_ms: u64,
    pub item_pause_ms: u64,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            window_size: 2,
            window_pacing_ms: 1500,
            item_pause_ms: 500,
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<WishgrabConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn load_fixture_config() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../configs");
        let config = load_config(dir.join("wishgrab.toml")).expect("fixture should parse");
        assert_eq!(config.batch.window_size, 2);
        assert_eq!(config.stabilize.patience, 3);
        assert_eq!(config.listing.item_marker, "li[data-id]");
        assert!(config.detail.price_selectors.len() >= 5);
    }

    #[test]
    fn defaults_cover_every_section() {
        let config = WishgrabConfig::default();
        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert!(config.chromium.headless);
        assert!(!config.chromium.sandbox);
        assert_eq!(config.listing.fallback_currency, "€");
        assert_eq!(config.detail.blocked_resources.len(), 4);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[batch]\nwindow_size = 4").expect("write");
        let config = load_config(file.path()).expect("partial config should parse");
        assert_eq!(config.batch.window_size, 4);
        assert_eq!(config.batch.window_pacing_ms, 1500);
        assert_eq!(config.stabilize.patience, 3);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config("/nonexistent/wishgrab.toml").expect_err("should fail");
        assert!(err.to_string().contains("/nonexistent/wishgrab.toml"));
    }
}
