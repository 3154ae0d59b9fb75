use thiserror::Error;

/// Recoverable, user-facing failures of the grade engine.
///
/// Malformed lines and unparsable grades never surface here; they are
/// counted or treated as missing values instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    /// Ingestion finished but produced no records at all.
    #[error("no valid records found after processing ({skipped} line(s) skipped)")]
    NoValidRecords { skipped: usize },

    /// No record passed the statistics inclusion policy.
    #[error("no statistics generated: load Bac/Ord or ESO/Final data")]
    NoStatistics,
}
