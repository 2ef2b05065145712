//! Hubtop - a resilient crawler for ranked Docker Hub image listings.
//!
//! The crawler walks the Hub search pages for three sort orders (pulls,
//! stars, recency) and normalizes whatever it can observe - structured
//! search payloads of unknown shape, or the rendered markup as a
//! degraded fallback - into one canonical record set.
//!
//! # Features
//!
//! - `http-driver` (default) - Enables the reqwest-backed [`PageDriver`]
//!   implementation and the [`crawl_top_images`] convenience entry point.
//!
//! # Example
//!
//! ```ignore
//! use hubtop::{CrawlOptions, crawl_top_images};
//!
//! let options = CrawlOptions {
//!     top_quota: 25,
//!     latest_quota: 10,
//!     ..CrawlOptions::default()
//! };
//! let report = crawl_top_images(&options, None).await?;
//! println!("{} images by pulls", report.top_by_pulls.len());
//! ```

pub mod crawl;
pub mod driver;
pub mod extract;
pub mod record;

#[cfg(feature = "http-driver")]
pub use crawl::crawl_top_images;
pub use crawl::{
    CrawlError, CrawlOptions, CrawlProgress, CrawlProgressCallback, SortOrder, TopImagesReport,
    crawl_top_images_with_driver, fetch_sorted, search_url,
};
pub use driver::{DriverError, PageDriver, ResponseEvent, ResponseSubscription};
pub use record::{HUB_ORIGIN, RepoRecord};
