use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::grade::{format_number, format_percent, is_failing, mean, parse_grade, pass_rate};
use super::model::{course_rank, RecordKey, RecordStore};

// ---------------------------------------------------------------------------
// Inclusion policy
// ---------------------------------------------------------------------------

/// Course marker for upper secondary courses.
pub const UPPER_COURSE_MARKER: &str = "Bac";
/// The only evaluation counted for upper secondary courses.
pub const UPPER_EVALUATION: &str = "Ord";
/// Course marker for compulsory secondary courses.
pub const COMPULSORY_COURSE_MARKER: &str = "ESO";
/// The only evaluation counted for compulsory secondary courses.
pub const COMPULSORY_EVALUATION: &str = "Final";

/// Whether a record takes part in statistics.
///
/// Markers are matched as case-sensitive substrings of the course label.
pub fn is_eligible(key: &RecordKey) -> bool {
    (key.course.contains(UPPER_COURSE_MARKER) && key.evaluation == UPPER_EVALUATION)
        || (key.course.contains(COMPULSORY_COURSE_MARKER)
            && key.evaluation == COMPULSORY_EVALUATION)
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Pass rate and mean over one set of parsed grades.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SubjectStat {
    /// Parsed grades counted.
    pub graded: usize,
    /// Grades at or above the pass mark.
    pub passed: usize,
    /// `passed / graded × 100`; `None` without grades.
    pub pass_rate: Option<f64>,
    /// `None` without grades.
    pub mean: Option<f64>,
}

impl SubjectStat {
    fn from_grades(grades: &[f64]) -> Self {
        Self {
            graded: grades.len(),
            passed: grades.iter().filter(|&&g| !is_failing(g)).count(),
            pass_rate: pass_rate(grades),
            mean: mean(grades),
        }
    }
}

/// Statistics of one group within a course sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub group: String,
    /// Distinct students contributing records.
    pub students: usize,
    pub by_subject: BTreeMap<String, SubjectStat>,
    /// Pooled over every grade of the group: total passes / total grades.
    pub pass_rate: Option<f64>,
    /// Pooled over every grade of the group: total sum / total grades.
    pub mean: Option<f64>,
}

/// Course-level rollup of a sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseSummary {
    /// Per subject, pooled across all groups of the course.
    pub by_subject: BTreeMap<String, SubjectStat>,
    /// Mean of the per-subject pass rates above (not pooled).
    pub pass_rate: Option<f64>,
    /// Mean of the per-subject means above (not pooled).
    pub mean: Option<f64>,
}

/// Statistics for one (course, evaluation) combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSheet {
    pub course: String,
    pub evaluation: String,
    /// Subjects with at least one parsed grade in this sheet, catalog order.
    pub subjects: Vec<String>,
    /// Groups in lexicographic order.
    pub groups: Vec<GroupStats>,
    pub summary: CourseSummary,
}

/// A titled text table rendered from a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub summary: Vec<String>,
}

const PASS_RATE_TITLE: &str = "PORCENTAXE DE APROBADOS EN XUÑO POR MATERIAS E NIVEL";
const MEAN_TITLE: &str = "MEDIA DE CADA MATERIA POR GRUPO";
const MAX_SHEET_NAME: usize = 31;

impl StatisticsSheet {
    /// Spreadsheet-safe name: `<course with underscores>_<evaluation>`,
    /// at most 31 characters.
    pub fn name(&self) -> String {
        format!("{}_{}", self.course.replace(' ', "_"), self.evaluation)
            .chars()
            .take(MAX_SHEET_NAME)
            .collect()
    }

    /// Pass-rate matrix: one row per group, one column per subject.
    pub fn pass_rate_table(&self) -> SheetTable {
        self.table(
            PASS_RATE_TITLE,
            "% Aprobados Grupo",
            "% Aprobados Curso",
            |stat| format_percent(stat.pass_rate),
            |group| format_percent(group.pass_rate),
            format_percent(self.summary.pass_rate),
        )
    }

    /// Mean matrix: one row per group, one column per subject.
    pub fn mean_table(&self) -> SheetTable {
        self.table(
            MEAN_TITLE,
            "Media Grupo",
            "Media Curso",
            |stat| format_number(stat.mean),
            |group| format_number(group.mean),
            format_number(self.summary.mean),
        )
    }

    fn table(
        &self,
        title: &str,
        group_total: &str,
        course_label: &str,
        subject_cell: impl Fn(&SubjectStat) -> String,
        group_cell: impl Fn(&GroupStats) -> String,
        course_total: String,
    ) -> SheetTable {
        let cell = |stats: &BTreeMap<String, SubjectStat>, subject: &String| {
            stats.get(subject).map(&subject_cell).unwrap_or_default()
        };

        let mut headers = Vec::with_capacity(self.subjects.len() + 2);
        headers.push("Grupos".to_string());
        headers.extend(self.subjects.iter().cloned());
        headers.push(group_total.to_string());

        let rows = self
            .groups
            .iter()
            .map(|group| {
                let mut row = vec![group.group.clone()];
                row.extend(self.subjects.iter().map(|s| cell(&group.by_subject, s)));
                row.push(group_cell(group));
                row
            })
            .collect();

        let mut summary = vec![course_label.to_string()];
        summary.extend(self.subjects.iter().map(|s| cell(&self.summary.by_subject, s)));
        summary.push(course_total);

        SheetTable {
            title: title.to_string(),
            headers,
            rows,
            summary,
        }
    }
}

/// Every statistics sheet, ordered by course rank then evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsReport {
    pub sheets: Vec<StatisticsSheet>,
}

impl StatisticsReport {
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct GroupAccumulator {
    grades: BTreeMap<String, Vec<f64>>,
    students: BTreeSet<String>,
}

type SheetKey = (String, String);

/// Build pass-rate and mean tables for every eligible (course, evaluation).
///
/// Records failing [`is_eligible`] are ignored. Combinations without any
/// eligible group produce no sheet. Never fails: an empty report means there
/// was nothing to summarise.
pub fn aggregate(store: &RecordStore) -> StatisticsReport {
    let mut sheets: BTreeMap<SheetKey, BTreeMap<String, GroupAccumulator>> = BTreeMap::new();

    for (key, record) in store.records().filter(|(key, _)| is_eligible(key)) {
        let group = sheets
            .entry((key.course.clone(), key.evaluation.clone()))
            .or_default()
            .entry(key.group.clone())
            .or_default();
        group.students.insert(key.student.clone());

        for (subject, text) in &record.grades {
            if let Some(grade) = parse_grade(text) {
                group.grades.entry(subject.clone()).or_default().push(grade);
            }
        }
    }

    let mut keys: Vec<SheetKey> = sheets.keys().cloned().collect();
    keys.sort_by(|(course_a, eval_a), (course_b, eval_b)| {
        course_rank(course_a)
            .cmp(&course_rank(course_b))
            .then_with(|| course_a.cmp(course_b))
            .then_with(|| eval_a.cmp(eval_b))
    });

    let mut report = StatisticsReport::default();
    for key in keys {
        let Some(groups) = sheets.remove(&key) else {
            continue;
        };
        if groups.is_empty() {
            continue;
        }
        let (course, evaluation) = key;
        report
            .sheets
            .push(build_sheet(course, evaluation, groups, store.subjects()));
    }

    log::debug!("Statistics generated for {} course sheet(s)", report.len());
    report
}

fn build_sheet(
    course: String,
    evaluation: String,
    groups: BTreeMap<String, GroupAccumulator>,
    catalog: &[String],
) -> StatisticsSheet {
    let subjects: Vec<String> = catalog
        .iter()
        .filter(|subject| groups.values().any(|g| g.grades.contains_key(*subject)))
        .cloned()
        .collect();

    let group_stats = groups
        .iter()
        .map(|(name, acc)| {
            let by_subject = subjects
                .iter()
                .filter_map(|s| {
                    acc.grades
                        .get(s)
                        .map(|grades| (s.clone(), SubjectStat::from_grades(grades)))
                })
                .collect();
            let pooled: Vec<f64> = subjects
                .iter()
                .filter_map(|s| acc.grades.get(s))
                .flatten()
                .copied()
                .collect();
            GroupStats {
                group: name.clone(),
                students: acc.students.len(),
                by_subject,
                pass_rate: pass_rate(&pooled),
                mean: mean(&pooled),
            }
        })
        .collect();

    let by_subject: BTreeMap<String, SubjectStat> = subjects
        .iter()
        .map(|s| {
            let pooled: Vec<f64> = groups
                .values()
                .filter_map(|g| g.grades.get(s))
                .flatten()
                .copied()
                .collect();
            (s.clone(), SubjectStat::from_grades(&pooled))
        })
        .collect();

    let subject_rates: Vec<f64> = by_subject.values().filter_map(|s| s.pass_rate).collect();
    let subject_means: Vec<f64> = by_subject.values().filter_map(|s| s.mean).collect();

    StatisticsSheet {
        course,
        evaluation,
        subjects,
        groups: group_stats,
        summary: CourseSummary {
            pass_rate: mean(&subject_rates),
            mean: mean(&subject_means),
            by_subject,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{GradeLine, Sidecar};

    fn add(
        store: &mut RecordStore,
        course: &str,
        eval: &str,
        group: &str,
        student: &str,
        subject: &str,
        grade: &str,
    ) {
        store.add_line(GradeLine {
            key: RecordKey::new(course, group, eval, student),
            subject: subject.into(),
            grade: grade.into(),
            sidecar: Sidecar::default(),
        });
    }

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn eligibility_policy() {
        assert!(is_eligible(&RecordKey::new("2º Bac", "A", "Ord", "x")));
        assert!(is_eligible(&RecordKey::new("1º ESO", "A", "Final", "x")));
        assert!(!is_eligible(&RecordKey::new("1º ESO", "A", "Ord", "x")));
        assert!(!is_eligible(&RecordKey::new("2º Bac", "A", "Final", "x")));
        assert!(!is_eligible(&RecordKey::new("2º BAC", "A", "Ord", "x")));
    }

    #[test]
    fn group_rollup_is_pooled_course_rollup_is_averaged() {
        let mut store = RecordStore::new();
        add(&mut store, "1º ESO", "Final", "A", "Ana", "Math", "6");
        add(&mut store, "1º ESO", "Final", "A", "Ana", "Art", "7");
        add(&mut store, "1º ESO", "Final", "A", "Bea", "Art", "3");
        store.finalize_subjects();

        let report = aggregate(&store);
        assert_eq!(report.len(), 1);
        let sheet = &report.sheets[0];
        let group = &sheet.groups[0];

        assert!(close(group.by_subject["Math"].pass_rate, 100.0));
        assert!(close(group.by_subject["Art"].pass_rate, 50.0));
        assert!(close(group.pass_rate, 200.0 / 3.0));
        assert!(close(sheet.summary.pass_rate, 75.0));

        assert!(close(group.mean, 16.0 / 3.0));
        assert!(close(sheet.summary.mean, 5.5));
        assert_eq!(group.students, 2);
    }

    #[test]
    fn unparsable_grades_are_not_counted() {
        let mut store = RecordStore::new();
        add(&mut store, "1º ESO", "Final", "A", "Ana", "Math", "NP");
        add(&mut store, "1º ESO", "Final", "A", "Bea", "Math", "");
        add(&mut store, "1º ESO", "Final", "A", "Bea", "Art", "5");
        store.finalize_subjects();

        let report = aggregate(&store);
        let sheet = &report.sheets[0];
        assert_eq!(sheet.subjects, ["Art"]);
        assert_eq!(sheet.groups[0].by_subject.get("Math"), None);
        assert_eq!(sheet.groups[0].students, 2);
    }

    #[test]
    fn sheets_follow_course_rank() {
        let mut store = RecordStore::new();
        add(&mut store, "1º Bac", "Ord", "B", "Ana", "Math", "6");
        add(&mut store, "3º ESO", "Final", "A", "Bea", "Math", "6");
        add(&mut store, "1º ESO", "Final", "A", "Caio", "Math", "6");
        add(&mut store, "1º ESO", "Ord", "A", "Caio", "Math", "6");
        store.finalize_subjects();

        let report = aggregate(&store);
        let names: Vec<String> = report.sheets.iter().map(StatisticsSheet::name).collect();
        assert_eq!(names, ["1º_ESO_Final", "3º_ESO_Final", "1º_Bac_Ord"]);
    }

    #[test]
    fn empty_store_gives_empty_report() {
        let mut store = RecordStore::new();
        add(&mut store, "1º ESO", "1ª Av", "A", "Ana", "Math", "6");
        store.finalize_subjects();
        assert!(aggregate(&store).is_empty());
    }

    #[test]
    fn renders_tables_with_summary_rows() {
        let mut store = RecordStore::new();
        add(&mut store, "1º ESO", "Final", "A", "Ana", "Math", "6");
        add(&mut store, "1º ESO", "Final", "B", "Bea", "Math", "4");
        add(&mut store, "1º ESO", "Final", "B", "Bea", "Art", "7,5");
        store.finalize_subjects();

        let sheet = &aggregate(&store).sheets[0];
        let pass = sheet.pass_rate_table();
        assert_eq!(pass.headers, ["Grupos", "Art", "Math", "% Aprobados Grupo"]);
        assert_eq!(pass.rows[0], ["A", "", "100%", "100%"]);
        assert_eq!(pass.rows[1], ["B", "100%", "0%", "50%"]);
        assert_eq!(pass.summary, ["% Aprobados Curso", "100%", "50%", "75%"]);

        let means = sheet.mean_table();
        assert_eq!(means.headers.last().map(String::as_str), Some("Media Grupo"));
        assert_eq!(means.rows[1], ["B", "7.50", "4", "5.75"]);
        assert_eq!(means.summary, ["Media Curso", "7.50", "5", "6.25"]);
    }

    #[test]
    fn long_sheet_names_are_truncated() {
        let sheet = StatisticsSheet {
            course: "1º Bacharelato Ciencias e Tecnoloxía".into(),
            evaluation: "Ord".into(),
            subjects: Vec::new(),
            groups: Vec::new(),
            summary: CourseSummary {
                by_subject: BTreeMap::new(),
                pass_rate: None,
                mean: None,
            },
        };
        assert_eq!(sheet.name().chars().count(), 31);
        assert!(sheet.name().starts_with("1º_Bacharelato_Ciencias"));
    }
}
