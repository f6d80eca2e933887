pub mod browser;
pub mod config;
pub mod error;
pub mod wishlist;

pub use config::{load_config, WishgrabConfig};
pub use error::{ConfigError, Result};
