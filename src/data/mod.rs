/// Data layer: record store, ingestion, filtering and statistics.
///
/// Architecture:
/// ```text
///   export text (`;`-delimited)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  split lines/fields → GradeLine
///   └──────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ RecordStore  │  RecordKey → StudentRecord, catalogs
///   └─────────────┘
///        │
///        ├──────────────────┐
///        ▼                  ▼
///   ┌──────────┐      ┌──────────┐
///   │  filter   │      │  stats    │
///   └──────────┘      └──────────┘
///   rows + headers     pass-rate / mean sheets
/// ```

pub mod error;
pub mod filter;
pub mod grade;
pub mod loader;
pub mod model;
pub mod stats;

pub use error::DataError;
pub use filter::{apply_filter, FilterResult, FilterSelection, Selector};
pub use loader::{ingest, ingest_with_progress, LoadReport, Progress};
pub use model::{RecordKey, RecordStore, Sidecar, StudentRecord};
pub use stats::{aggregate, StatisticsReport, StatisticsSheet};
