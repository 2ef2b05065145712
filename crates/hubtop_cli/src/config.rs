//! Configuration file support for hubtop.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `HUBTOP_`, e.g., `HUBTOP_CRAWL__TOP`)
//! 3. Local config file (./hubtop.toml)
//! 4. XDG config file (~/.config/hubtop/config.toml)
//! 5. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [crawl]
//! top = 25          # quota for the by-pulls and by-stars listings
//! latest = 10       # quota for the most-recently-updated listing
//! settle_ms = 500   # wait after page load for late-arriving payloads
//! max_pages = 50    # hard page ceiling per listing
//! user_agent = "hubtop/0.1"
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Crawl defaults.
    pub crawl: CrawlConfig,
}

/// Default crawl options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Quota for the by-pulls and by-stars listings (shared value).
    pub top: usize,
    /// Quota for the most-recently-updated listing.
    pub latest: usize,
    /// Settle delay after page load, in milliseconds.
    pub settle_ms: u64,
    /// Hard page ceiling per listing.
    pub max_pages: u32,
    /// User agent presented by the navigation driver.
    pub user_agent: Option<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            top: 25,
            latest: 10,
            settle_ms: 500,
            max_pages: 50,
            user_agent: None,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/hubtop/config.toml)
    /// 3. Local config file (./hubtop.toml)
    /// 4. Environment variables with HUBTOP_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", "hubtop") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        // Local config file (higher priority than XDG)
        let local_config = PathBuf::from("hubtop.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./hubtop.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // HUBTOP_ prefixed environment variables. Section and key are
        // joined with a double underscore so that multi-word keys like
        // settle_ms survive the split: HUBTOP_CRAWL__SETTLE_MS -> crawl.settle_ms
        builder = builder.add_source(
            Environment::with_prefix("HUBTOP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }
}
