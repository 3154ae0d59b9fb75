use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

use super::grade::parse_grade;

// ---------------------------------------------------------------------------
// RecordKey – the composite (course, group, evaluation, student) identity
// ---------------------------------------------------------------------------

/// Identity of one student's results in one evaluation period.
///
/// Every lookup, merge and sort goes through this type; there is no
/// string-joined key anywhere else in the crate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RecordKey {
    pub course: String,
    pub group: String,
    pub evaluation: String,
    pub student: String,
}

impl RecordKey {
    pub fn new(
        course: impl Into<String>,
        group: impl Into<String>,
        evaluation: impl Into<String>,
        student: impl Into<String>,
    ) -> Self {
        Self {
            course: course.into(),
            group: group.into(),
            evaluation: evaluation.into(),
            student: student.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {} / {}",
            self.course, self.group, self.evaluation, self.student
        )
    }
}

// ---------------------------------------------------------------------------
// Sidecar – per-key descriptive fields copied verbatim from the export
// ---------------------------------------------------------------------------

/// Opaque per-student fields. Only the first line seen for a key sets them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sidecar {
    /// Support measure ("Medida").
    pub measure: String,
    /// Exemption / validation / waiver flag ("Ex/Val/Ren").
    pub exemption: String,
    /// Number of times the year was repeated, as exported.
    pub repeat_count: String,
    /// Subjects pending from previous years.
    pub pending_subjects: String,
}

impl Sidecar {
    /// Display text for the repeat column: `"0"` and blank mean "no".
    pub fn repeat_label(&self) -> &'static str {
        match self.repeat_count.as_str() {
            "" | "0" => "",
            _ => "Si",
        }
    }
}

// ---------------------------------------------------------------------------
// GradeLine / StudentRecord
// ---------------------------------------------------------------------------

/// One parsed line of the export: a single subject grade plus its context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeLine {
    pub key: RecordKey,
    pub subject: String,
    /// Grade text exactly as exported (comma decimals preserved).
    pub grade: String,
    pub sidecar: Sidecar,
}

/// All subject grades merged under one [`RecordKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentRecord {
    /// subject → raw grade text.
    pub grades: BTreeMap<String, String>,
    pub sidecar: Sidecar,
}

impl StudentRecord {
    /// Raw grade text for `subject`, if the subject was ever recorded.
    pub fn grade_text(&self, subject: &str) -> Option<&str> {
        self.grades.get(subject).map(String::as_str)
    }

    /// Whether a non-blank grade text exists for `subject`.
    pub fn has_grade(&self, subject: &str) -> bool {
        self.grade_text(subject)
            .is_some_and(|text| !text.trim().is_empty())
    }

    /// Numeric grade for `subject`; `None` when absent or unparsable.
    pub fn parsed_grade(&self, subject: &str) -> Option<f64> {
        self.grade_text(subject).and_then(parse_grade)
    }
}

// ---------------------------------------------------------------------------
// RecordStore – every ingested record plus derived catalogs
// ---------------------------------------------------------------------------

/// Owns all loaded records and the selector catalogs derived from them.
///
/// Lifecycle: `new` → `add_line` for each valid line in file order →
/// `finalize_subjects` once → read-only until the next `clear`.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: BTreeMap<RecordKey, StudentRecord>,
    /// Subject names seen so far (non-blank), pending finalisation.
    seen_subjects: BTreeSet<String>,
    /// Sorted, deduplicated subject catalog. Empty until finalised.
    subjects: Vec<String>,
    finalized: bool,
    courses: BTreeSet<String>,
    groups: BTreeSet<String>,
    evaluations: BTreeSet<String>,
    groups_by_course: BTreeMap<String, BTreeSet<String>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every record and catalog, returning to the freshly created state.
    pub fn clear(&mut self) {
        *self = Self::default();
        log::debug!("Record store cleared");
    }

    /// Merge one export line into the store.
    ///
    /// A line whose key already exists adds (or overwrites) its subject
    /// grade; the sidecar fields of the first line for a key are kept.
    /// Adding a line reopens the subject catalog until the next
    /// [`finalize_subjects`](Self::finalize_subjects).
    pub(crate) fn add_line(&mut self, line: GradeLine) {
        let GradeLine {
            key,
            subject,
            grade,
            sidecar,
        } = line;
        if self.finalized {
            self.finalized = false;
            self.subjects.clear();
        }

        self.courses.insert(key.course.clone());
        self.groups.insert(key.group.clone());
        self.evaluations.insert(key.evaluation.clone());
        self.groups_by_course
            .entry(key.course.clone())
            .or_default()
            .insert(key.group.clone());

        let record = self
            .records
            .entry(key)
            .or_insert_with(|| StudentRecord {
                grades: BTreeMap::new(),
                sidecar,
            });

        if !subject.trim().is_empty() {
            self.seen_subjects.insert(subject.clone());
            record.grades.insert(subject, grade);
        }
    }

    /// Freeze the subject catalog after ingestion.
    pub fn finalize_subjects(&mut self) {
        self.subjects = self.seen_subjects.iter().cloned().collect();
        self.finalized = true;
        log::debug!("Subjects finalised: {:?}", self.subjects);
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of distinct record keys.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &RecordKey) -> Option<&StudentRecord> {
        self.records.get(key)
    }

    /// Records in key order.
    pub fn records(&self) -> impl Iterator<Item = (&RecordKey, &StudentRecord)> {
        self.records.iter()
    }

    /// Sorted subject catalog (empty before [`finalize_subjects`](Self::finalize_subjects)).
    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    /// Courses ordered by [`course_rank`], ties lexicographically.
    pub fn courses(&self) -> Vec<String> {
        let mut courses: Vec<String> = self.courses.iter().cloned().collect();
        sort_courses(&mut courses);
        courses
    }

    /// Evaluation labels, sorted.
    pub fn evaluations(&self) -> Vec<String> {
        self.evaluations.iter().cloned().collect()
    }

    /// Every group label, sorted.
    pub fn groups(&self) -> Vec<String> {
        self.groups.iter().cloned().collect()
    }

    /// Groups recorded under `course`, sorted. Unknown course → empty.
    pub fn groups_for_course(&self, course: &str) -> Vec<String> {
        self.groups_by_course
            .get(course)
            .map(|groups| groups.iter().cloned().collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Course ranking
// ---------------------------------------------------------------------------

/// Stage token for compulsory secondary education.
pub const COMPULSORY_STAGE: &str = "ESO";
/// Stage token for upper secondary (Bacharelato).
pub const UPPER_STAGE: &str = "BAC";

const COMPULSORY_BAND: u64 = 100;
const UPPER_BAND: u64 = 200;

/// `<number> [º|ª] <stage>`, e.g. "1º ESO", "2 Bac".
static COURSE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9]+)\s*(º|ª)?\s*(ESO|BAC)").unwrap()
});

/// Ordering weight of a course label: the leading year plus a stage band.
///
/// Labels that do not match the pattern rank 0 and so sort before every
/// recognised course.
pub fn course_rank(course: &str) -> u64 {
    let Some(caps) = COURSE_PATTERN.captures(course) else {
        return 0;
    };
    let Ok(year) = caps[1].parse::<u64>() else {
        return 0;
    };
    let stage = &caps[3];
    let band = if stage.eq_ignore_ascii_case(UPPER_STAGE) {
        UPPER_BAND
    } else if stage.eq_ignore_ascii_case(COMPULSORY_STAGE) {
        COMPULSORY_BAND
    } else {
        return 0;
    };
    year.saturating_add(band)
}

/// Sort course labels by rank, then lexicographically.
pub fn sort_courses(courses: &mut [String]) {
    courses.sort_by(|a, b| {
        course_rank(a)
            .cmp(&course_rank(b))
            .then_with(|| a.cmp(b))
    });
}

// ---------------------------------------------------------------------------
// Name normalisation
// ---------------------------------------------------------------------------

/// Accent- and case-insensitive sort key for a student name.
pub fn normalize_for_sort(name: &str) -> String {
    name.nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(student: &str, subject: &str, grade: &str, measure: &str) -> GradeLine {
        GradeLine {
            key: RecordKey::new("1º ESO", "A", "Final", student),
            subject: subject.to_string(),
            grade: grade.to_string(),
            sidecar: Sidecar {
                measure: measure.to_string(),
                ..Sidecar::default()
            },
        }
    }

    #[test]
    fn same_key_merges_and_keeps_first_sidecar() {
        let mut store = RecordStore::new();
        store.add_line(line("Ana", "Math", "7", "PT"));
        store.add_line(line("Ana", "Art", "5,5", "AL"));
        store.finalize_subjects();

        assert_eq!(store.len(), 1);
        let rec = store
            .get(&RecordKey::new("1º ESO", "A", "Final", "Ana"))
            .unwrap();
        assert_eq!(rec.grade_text("Math"), Some("7"));
        assert_eq!(rec.grade_text("Art"), Some("5,5"));
        assert_eq!(rec.sidecar.measure, "PT");
    }

    #[test]
    fn later_line_overwrites_subject_grade() {
        let mut store = RecordStore::new();
        store.add_line(line("Ana", "Math", "3", ""));
        store.add_line(line("Ana", "Math", "6", ""));
        let rec = store
            .get(&RecordKey::new("1º ESO", "A", "Final", "Ana"))
            .unwrap();
        assert_eq!(rec.parsed_grade("Math"), Some(6.0));
    }

    #[test]
    fn subject_catalog_is_sorted_union() {
        let mut store = RecordStore::new();
        store.add_line(line("Ana", "Math", "7", ""));
        store.add_line(line("Ana", "Art", "7", ""));
        store.add_line(line("Bea", "Art", "6", ""));
        store.add_line(line("Bea", "PE", "", ""));
        store.add_line(line("Bea", "  ", "9", ""));
        assert!(store.subjects().is_empty());
        store.finalize_subjects();
        assert_eq!(store.subjects(), ["Art", "Math", "PE"]);
        assert!(store.is_finalized());
    }

    #[test]
    fn adding_after_finalize_reopens_catalog() {
        let mut store = RecordStore::new();
        store.add_line(line("Ana", "Math", "7", ""));
        store.finalize_subjects();
        assert_eq!(store.subjects(), ["Math"]);

        store.add_line(line("Bea", "PE", "6", ""));
        assert!(!store.is_finalized());
        assert!(store.subjects().is_empty());

        store.finalize_subjects();
        assert_eq!(store.subjects(), ["Math", "PE"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn blank_subject_still_creates_record() {
        let mut store = RecordStore::new();
        store.add_line(line("Ana", "", "7", "PT"));
        store.finalize_subjects();
        assert_eq!(store.len(), 1);
        assert!(store.subjects().is_empty());
    }

    #[test]
    fn groups_are_scoped_by_course() {
        let mut store = RecordStore::new();
        let mut l = line("Ana", "Math", "7", "");
        store.add_line(l.clone());
        l.key = RecordKey::new("2º Bac", "B", "Ord", "Ana");
        store.add_line(l.clone());
        l.key = RecordKey::new("2º Bac", "C", "Ord", "Ana");
        store.add_line(l);

        assert_eq!(store.groups_for_course("2º Bac"), ["B", "C"]);
        assert_eq!(store.groups_for_course("1º ESO"), ["A"]);
        assert!(store.groups_for_course("3º ESO").is_empty());
        assert_eq!(store.groups(), ["A", "B", "C"]);
        assert_eq!(store.courses(), ["1º ESO", "2º Bac"]);
    }

    #[test]
    fn clear_resets_everything() {
        let mut store = RecordStore::new();
        store.add_line(line("Ana", "Math", "7", ""));
        store.finalize_subjects();
        store.clear();
        assert!(store.is_empty());
        assert!(store.subjects().is_empty());
        assert!(store.courses().is_empty());
        assert!(!store.is_finalized());
    }

    #[test]
    fn course_rank_bands() {
        assert_eq!(course_rank("1º ESO"), 101);
        assert_eq!(course_rank("4ª eso"), 104);
        assert_eq!(course_rank("2 BAC"), 202);
        assert_eq!(course_rank("1º Bacharelato"), 201);
        assert_eq!(course_rank("FP Básica"), 0);
    }

    #[test]
    fn unmatched_courses_sort_first() {
        let mut courses = vec![
            "2º Bac".to_string(),
            "1º ESO".to_string(),
            "Ciclo".to_string(),
            "4º ESO".to_string(),
            "1º Bac".to_string(),
        ];
        sort_courses(&mut courses);
        assert_eq!(courses, ["Ciclo", "1º ESO", "4º ESO", "1º Bac", "2º Bac"]);
    }

    #[test]
    fn normalizes_accents_and_case() {
        assert_eq!(normalize_for_sort("Álvarez Núñez, Íria"), "alvarez nunez, iria");
        assert_eq!(normalize_for_sort("ÓSCAR"), "oscar");
    }

    #[test]
    fn repeat_label_hides_zero() {
        let mut sidecar = Sidecar::default();
        assert_eq!(sidecar.repeat_label(), "");
        sidecar.repeat_count = "0".into();
        assert_eq!(sidecar.repeat_label(), "");
        sidecar.repeat_count = "1".into();
        assert_eq!(sidecar.repeat_label(), "Si");
    }
}
