//! wikistream: streaming Wikimedia dump to JSON Lines converter
//!
//! A bounded, concurrent pipeline:
//! - Streaming XML parsing of plain or bzip2-compressed page dumps
//! - Namespace filtering before any record is queued
//! - A pool of transform workers encoding pages as JSON records
//! - A single writer appending one record per line
//! - Cooperative shutdown that drains both queues before exiting

pub mod config;
pub mod import;

pub use config::Config;
pub use import::{ImportCoordinator, ImportCoordinatorBuilder, ImportError, ImportReport};
