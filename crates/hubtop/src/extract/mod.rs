//! Dual-path extraction: structured payloads first, rendered markup as
//! the degraded fallback.

pub mod markup;
pub mod structured;

pub use markup::extract_from_markup;
pub use structured::extract_records;
