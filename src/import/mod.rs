//! Streaming conversion of Wikimedia page dumps into JSON Lines
//!
//! # Example Usage
//!
//! ```no_run
//! use wikistream::import::ImportCoordinatorBuilder;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = ImportCoordinatorBuilder::new()
//!     .with_paths("enwiki-latest-pages-articles.xml.bz2", "articles.jsonl")
//!     .with_workers(4)
//!     .build()?;
//!
//! let report = coordinator.run().await?;
//! println!("{}", report.summary_line());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  intake   ┌──────────────────┐  outtake  ┌──────────────┐
//! │  DumpParser  │ ────────▶ │ TransformWorker  │ ────────▶ │ RecordWriter │
//! │  (blocking)  │  bounded  │   x N (async)    │  bounded  │   (single)   │
//! │ - bz2 / XML  │           │ - RecordEncoder  │           │ - owns sink  │
//! │ - filter     │           │                  │           │              │
//! └──────────────┘           └──────────────────┘           └──────────────┘
//!         │                            │                            │
//!         └──────────── ImportProgress / ShutdownSignal ────────────┘
//!                                      │
//!                               StatusMonitor
//! ```

pub mod coordinator;
pub mod filter;
pub mod progress;
pub mod record;
pub mod shutdown;
pub mod source;
pub mod wikimedia;
pub mod worker;
pub mod writer;

// Re-export main types
pub use coordinator::{ImportCoordinator, ImportCoordinatorBuilder, ImportReport};
pub use filter::{AnyNamespace, MainNamespace, NamespaceAllowlist, NamespaceFilter};
pub use progress::{ImportProgress, ImportStats, StatusMonitor};
pub use record::{JsonLinesEncoder, Record, RecordEncoder};
pub use shutdown::{ShutdownSignal, ShutdownState};
pub use source::{DumpFormat, ImportError, InputLocation, OutputLocation, PageUnit};
pub use wikimedia::{DumpParser, PageReader};
pub use worker::TransformWorker;
pub use writer::{open_sink, RecordWriter, Sink};
