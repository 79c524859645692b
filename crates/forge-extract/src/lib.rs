//! Forge Structured Extraction
//!
//! Generative models wrap the record they were asked for in commentary,
//! sometimes preceded by an echo of the requested schema. This crate scans
//! the raw text for balanced `{ ... }` spans, parses each one, drops template
//! echoes and returns the first candidate a caller-supplied predicate accepts.
//!
//! # Example
//!
//! ```rust,ignore
//! use forge_extract::Extractor;
//!
//! let extractor = Extractor::new()
//!     .with_sentinel_field("name")
//!     .with_placeholder("Generated Project");
//!
//! let record = extractor.extract(raw, |map| map.contains_key("files"))?;
//! println!("found record at bytes {:?}", record.source_span);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod extractor;
mod scan;

pub use extractor::{extract, ExtractedRecord, ExtractionFailure, Extractor, Record};
pub use scan::scan_spans;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
