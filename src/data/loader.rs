use super::error::DataError;
use super::model::{GradeLine, RecordKey, RecordStore, Sidecar};

// ---------------------------------------------------------------------------
// Export layout
// ---------------------------------------------------------------------------

/// Field separator of the export.
pub const DELIMITER: char = ';';

/// Lines with fewer fields than this are skipped.
pub const MIN_FIELDS: usize = 17;

/// Progress is reported every this many lines (and on the last line).
pub const PROGRESS_INTERVAL: usize = 500;

/// Characters of a skipped line shown in its diagnostic.
const PREVIEW_CHARS: usize = 120;

// Zero-based column positions inside a data line.
const COL_COURSE: usize = 0;
const COL_GROUP: usize = 1;
const COL_EVALUATION: usize = 2;
const COL_GRADE: usize = 4;
const COL_SUBJECT: usize = 8;
const COL_STUDENT: usize = 9;
const COL_MEASURE: usize = 11;
const COL_EXEMPTION: usize = 12;
const COL_REPEAT: usize = 13;
const COL_PENDING: usize = 16;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    /// Distinct (course, group, evaluation, student) records in the store.
    pub records: usize,
    /// Data lines applied to the store.
    pub lines_applied: usize,
    /// Lines ignored because they had too few fields.
    pub skipped: usize,
}

/// Position of an ingestion in progress, handed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Zero-based index of the line just applied (header excluded).
    pub line: usize,
    /// Lines to process (header excluded).
    pub total: usize,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.line as f64 / self.total as f64 * 100.0
        }
    }
}

/// Parse an export into `store`.
///
/// See [`ingest_with_progress`]; this variant reports no progress.
pub fn ingest(store: &mut RecordStore, text: &str) -> Result<LoadReport, DataError> {
    ingest_with_progress(store, text, |_| {})
}

/// Parse an export into `store`, calling `on_progress` periodically.
///
/// * Whatever `store` held before is dropped; a load never merges into a
///   previous one.
/// * Lines are separated by `\n`; a first line containing `;` is a header
///   and is discarded.
/// * Blank lines are ignored silently.
/// * Lines with fewer than [`MIN_FIELDS`] fields are counted as skipped and
///   logged; processing continues.
/// * The subject catalog is finalised once all lines are applied.
///
/// Returns [`DataError::NoValidRecords`] when the store ends up empty.
pub fn ingest_with_progress<F>(
    store: &mut RecordStore,
    text: &str,
    mut on_progress: F,
) -> Result<LoadReport, DataError>
where
    F: FnMut(Progress),
{
    store.clear();
    let mut lines: Vec<&str> = text.split('\n').collect();

    let header_offset = if lines.first().is_some_and(|l| l.contains(DELIMITER)) {
        log::debug!("First line looks like a header, discarding it");
        lines.remove(0);
        1
    } else {
        0
    };

    let total = lines.len();
    log::debug!("Lines to process (header excluded): {total}");

    let mut report = LoadReport::default();

    for (i, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let fields = split_fields(line);
        if fields.len() < MIN_FIELDS {
            log::warn!(
                "Skipping line {}: insufficient fields ({} < {MIN_FIELDS}). Content: \"{}...\"",
                i + 1 + header_offset,
                fields.len(),
                preview(line)
            );
            report.skipped += 1;
            continue;
        }

        store.add_line(grade_line(&fields));
        report.lines_applied += 1;

        if i % PROGRESS_INTERVAL == 0 || i + 1 == total {
            on_progress(Progress { line: i, total });
        }
    }

    store.finalize_subjects();
    report.records = store.len();

    if store.is_empty() {
        log::warn!("No valid records found after processing");
        return Err(DataError::NoValidRecords {
            skipped: report.skipped,
        });
    }

    log::info!(
        "Loaded {} records from {} lines ({} skipped), {} subjects",
        report.records,
        report.lines_applied,
        report.skipped,
        store.subjects().len()
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Line parsing helpers
// ---------------------------------------------------------------------------

/// Split a line on `;`, trimming each field and stripping one surrounding
/// double quote from each end. Quoted delimiters are not supported.
fn split_fields(line: &str) -> Vec<&str> {
    line.split(DELIMITER).map(unquote).collect()
}

fn unquote(field: &str) -> &str {
    let field = field.trim();
    let field = field.strip_prefix('"').unwrap_or(field);
    field.strip_suffix('"').unwrap_or(field)
}

fn grade_line(fields: &[&str]) -> GradeLine {
    let field = |idx: usize| fields.get(idx).copied().unwrap_or("").to_string();

    GradeLine {
        key: RecordKey::new(
            field(COL_COURSE),
            field(COL_GROUP),
            field(COL_EVALUATION),
            field(COL_STUDENT),
        ),
        subject: field(COL_SUBJECT),
        grade: field(COL_GRADE),
        sidecar: Sidecar {
            measure: field(COL_MEASURE),
            exemption: field(COL_EXEMPTION),
            repeat_count: field(COL_REPEAT),
            pending_subjects: field(COL_PENDING),
        },
    }
}

fn preview(line: &str) -> String {
    line.chars().take(PREVIEW_CHARS).collect()
}
