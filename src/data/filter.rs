use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use super::grade::{format_number, is_failing, parse_grade, LOW_AVERAGE_THRESHOLD};
use super::model::{normalize_for_sort, RecordKey, RecordStore, Sidecar, StudentRecord};

// ---------------------------------------------------------------------------
// Selector: one axis of the (course, group, evaluation) filter
// ---------------------------------------------------------------------------

/// "No constraint" label for the course and group selectors.
pub const ALL_LABEL: &str = "Todos";
/// "No constraint" label for the evaluation selector.
pub const ALL_LABEL_FEMININE: &str = "Todas";

/// A selector value: everything, or exactly one label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Selector {
    #[default]
    All,
    Only(String),
}

impl Selector {
    /// Interpret a selector label; `all_label` means [`Selector::All`].
    ///
    /// Each axis has its own "all" entry, so the other one is an ordinary
    /// label here.
    pub fn parse(label: &str, all_label: &str) -> Self {
        if label == all_label {
            Selector::All
        } else {
            Selector::Only(label.to_string())
        }
    }

    /// Course or group selector ("Todos" means all).
    pub fn course_or_group(label: &str) -> Self {
        Self::parse(label, ALL_LABEL)
    }

    /// Evaluation selector ("Todas" means all).
    pub fn evaluation(label: &str) -> Self {
        Self::parse(label, ALL_LABEL_FEMININE)
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Selector::All => true,
            Selector::Only(wanted) => wanted == value,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selector::All)
    }
}

/// The three-axis filter applied to the record store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct FilterSelection {
    pub course: Selector,
    pub group: Selector,
    pub evaluation: Selector,
}

impl FilterSelection {
    /// Build a selection from selector labels as shown to the user.
    pub fn new(course: &str, group: &str, evaluation: &str) -> Self {
        Self {
            course: Selector::course_or_group(course),
            group: Selector::course_or_group(group),
            evaluation: Selector::evaluation(evaluation),
        }
    }

    pub fn matches(&self, key: &RecordKey) -> bool {
        self.course.matches(&key.course)
            && self.group.matches(&key.group)
            && self.evaluation.matches(&key.evaluation)
    }
}

// ---------------------------------------------------------------------------
// Table shape: columns, cells, rows
// ---------------------------------------------------------------------------

/// A column of the filtered table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Column {
    Student,
    Course,
    Group,
    Evaluation,
    Subject(String),
    Measure,
    Exemption,
    Repeat,
    Pending,
    FailCount,
    Average,
}

impl Column {
    pub fn label(&self) -> &str {
        match self {
            Column::Student => "Nome",
            Column::Course => "Curso",
            Column::Group => "Grupo",
            Column::Evaluation => "Avaliación",
            Column::Subject(name) => name.as_str(),
            Column::Measure => "Medida",
            Column::Exemption => "Exvalren",
            Column::Repeat => "Repite",
            Column::Pending => "Pendentes",
            Column::FailCount => "Suspensas",
            Column::Average => "Media",
        }
    }
}

impl Serialize for Column {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Display text of a table cell plus the flags renderers style it by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub text: String,
    /// Subject grade below the pass mark.
    pub failing: bool,
    pub bold: bool,
    /// Average column of a row whose average is below the low threshold.
    pub low_average: bool,
    pub left_aligned: bool,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// One student row of the filtered table with its computed fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub key: RecordKey,
    /// Parsed grade per visible subject; `None` means no value.
    pub grades: BTreeMap<String, Option<f64>>,
    /// Mean of the parsed visible grades; `None` when there are none.
    pub average: Option<f64>,
    /// Parsed visible grades below the pass mark.
    pub fail_count: usize,
    pub low_average: bool,
    pub sidecar: Sidecar,
    #[serde(skip)]
    sort_name: String,
}

impl Row {
    fn build(key: &RecordKey, record: &StudentRecord, subjects: &[String]) -> Self {
        let mut grades = BTreeMap::new();
        let mut sum = 0.0;
        let mut count = 0usize;
        let mut fail_count = 0usize;

        for subject in subjects {
            let parsed = record.grade_text(subject).and_then(parse_grade);
            if let Some(grade) = parsed {
                sum += grade;
                count += 1;
                if is_failing(grade) {
                    fail_count += 1;
                }
            }
            grades.insert(subject.clone(), parsed);
        }

        let average = (count > 0).then(|| sum / count as f64);

        Row {
            key: key.clone(),
            grades,
            average,
            fail_count,
            low_average: average.is_some_and(|avg| avg < LOW_AVERAGE_THRESHOLD),
            sidecar: record.sidecar.clone(),
            sort_name: normalize_for_sort(&key.student),
        }
    }

    /// The cell this row shows under `column`.
    pub fn cell(&self, column: &Column) -> Cell {
        match column {
            Column::Student => Cell {
                text: self.key.student.clone(),
                bold: true,
                left_aligned: true,
                ..Cell::default()
            },
            Column::Course => Cell::plain(&self.key.course),
            Column::Group => Cell::plain(&self.key.group),
            Column::Evaluation => Cell::plain(&self.key.evaluation),
            Column::Subject(name) => {
                let grade = self.grades.get(name).copied().flatten();
                Cell {
                    text: format_number(grade),
                    failing: grade.is_some_and(is_failing),
                    ..Cell::default()
                }
            }
            Column::Measure => Cell::plain(&self.sidecar.measure),
            Column::Exemption => Cell::plain(&self.sidecar.exemption),
            Column::Repeat => Cell::plain(self.sidecar.repeat_label()),
            Column::Pending => Cell::plain(&self.sidecar.pending_subjects),
            Column::FailCount => Cell::plain(self.fail_count.to_string()),
            Column::Average => Cell {
                text: format_number(self.average),
                bold: true,
                low_average: self.low_average,
                ..Cell::default()
            },
        }
    }
}

/// Rows and headers produced for one selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterResult {
    pub selection: FilterSelection,
    pub headers: Vec<Column>,
    /// Visible subjects, in catalog order.
    pub subjects: Vec<String>,
    pub rows: Vec<Row>,
}

/// Headers and cell matrix ready for a renderer or exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl FilterResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn header_labels(&self) -> Vec<&str> {
        self.headers.iter().map(Column::label).collect()
    }

    pub fn table(&self) -> Table {
        Table {
            headers: self.headers.iter().map(|c| c.label().to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| self.headers.iter().map(|c| row.cell(c)).collect())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

const INFO_COLUMNS: [Column; 4] = [
    Column::Measure,
    Column::Exemption,
    Column::Repeat,
    Column::Pending,
];

/// Select, compute and order the rows matching `selection`.
///
/// Only subjects with at least one non-blank grade among the selected
/// records become visible, and row averages and fail counts are computed
/// over those subjects only. An empty selection yields no rows and no
/// headers. The store is never modified.
pub fn apply_filter(store: &RecordStore, selection: &FilterSelection) -> FilterResult {
    log::debug!("Applying filter {selection:?}");

    let selected: Vec<(&RecordKey, &StudentRecord)> = store
        .records()
        .filter(|(key, _)| selection.matches(key))
        .collect();

    log::debug!("Records matching the filter: {}", selected.len());

    if selected.is_empty() {
        return FilterResult {
            selection: selection.clone(),
            headers: Vec::new(),
            subjects: Vec::new(),
            rows: Vec::new(),
        };
    }

    let subjects: Vec<String> = store
        .subjects()
        .iter()
        .filter(|subject| selected.iter().any(|(_, rec)| rec.has_grade(subject)))
        .cloned()
        .collect();

    log::debug!("Visible subjects: {subjects:?}");

    let mut rows: Vec<Row> = selected
        .iter()
        .map(|(key, record)| Row::build(key, record, &subjects))
        .collect();

    rows.sort_by(|a, b| {
        a.sort_name
            .cmp(&b.sort_name)
            .then_with(|| a.key.cmp(&b.key))
    });

    let headers = visible_headers(selection, &subjects, &rows);
    log::debug!("Visible headers: {headers:?}");

    FilterResult {
        selection: selection.clone(),
        headers,
        subjects,
        rows,
    }
}

fn visible_headers(selection: &FilterSelection, subjects: &[String], rows: &[Row]) -> Vec<Column> {
    let mut headers = vec![Column::Student];

    if selection.course.is_all() {
        headers.push(Column::Course);
    }
    if selection.group.is_all() {
        headers.push(Column::Group);
    }
    if selection.evaluation.is_all() {
        headers.push(Column::Evaluation);
    }

    headers.extend(subjects.iter().cloned().map(Column::Subject));

    for column in INFO_COLUMNS {
        let has_data = rows
            .iter()
            .any(|row| !row.cell(&column).text.trim().is_empty());
        if has_data {
            headers.push(column);
        }
    }

    if !rows.is_empty() {
        headers.push(Column::FailCount);
        headers.push(Column::Average);
    }

    headers
}
