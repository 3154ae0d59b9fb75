use grade_lens::data::{aggregate, apply_filter, ingest, FilterSelection, RecordStore};

fn line(
    course: &str,
    eval: &str,
    group: &str,
    student: &str,
    subject: &str,
    grade: &str,
) -> String {
    format!("{course};{group};{eval};;{grade};;;;{subject};{student};;;;;;;")
}

fn load(lines: &[String]) -> RecordStore {
    let text = format!("Curso;Grupo;Avaliación\n{}", lines.join("\n"));
    let mut store = RecordStore::new();
    ingest(&mut store, &text).unwrap();
    store
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("value present");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn pooled_group_rollup_diverges_from_course_average() {
    let store = load(&[
        line("1º ESO", "Final", "A", "Ana", "Math", "9"),
        line("1º ESO", "Final", "A", "Ana", "Art", "7,5"),
        line("1º ESO", "Final", "A", "Bea", "Art", "2"),
    ]);
    let report = aggregate(&store);
    let sheet = &report.sheets[0];
    let group = &sheet.groups[0];

    assert_close(group.by_subject["Math"].pass_rate, 100.0);
    assert_close(group.by_subject["Art"].pass_rate, 50.0);
    assert_close(group.pass_rate, 200.0 / 3.0);
    assert_close(sheet.summary.pass_rate, 75.0);
    assert_eq!(sheet.pass_rate_table().rows[0].last().unwrap(), "66.67%");
    assert_eq!(sheet.pass_rate_table().summary.last().unwrap(), "75%");
}

#[test]
fn course_rollup_pools_subjects_across_groups() {
    let store = load(&[
        line("2º Bac", "Ord", "A", "Ana", "Math", "10"),
        line("2º Bac", "Ord", "B", "Bea", "Math", "4"),
        line("2º Bac", "Ord", "B", "Caio", "Math", "6"),
    ]);
    let sheet = &aggregate(&store).sheets[0];

    assert_eq!(sheet.groups.len(), 2);
    assert_close(sheet.summary.by_subject["Math"].pass_rate, 200.0 / 3.0);
    assert_close(sheet.summary.by_subject["Math"].mean, 20.0 / 3.0);
    assert_eq!(sheet.summary.by_subject["Math"].graded, 3);
    assert_close(sheet.groups[1].mean, 5.0);
    assert_close(sheet.groups[1].pass_rate, 50.0);
}

#[test]
fn ineligible_records_stay_visible_in_table() {
    let store = load(&[
        line("1º ESO", "Ord", "A", "Ana", "Math", "9"),
        line("1º ESO", "Final", "A", "Bea", "Math", "3"),
    ]);

    let report = aggregate(&store);
    assert_eq!(report.len(), 1);
    let group = &report.sheets[0].groups[0];
    assert_eq!(group.students, 1);
    assert_close(group.pass_rate, 0.0);

    let table = apply_filter(&store, &FilterSelection::new("Todos", "Todos", "Ord"));
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].key.student, "Ana");
}

#[test]
fn sheets_ordered_by_rank_then_evaluation_and_groups_sorted() {
    let store = load(&[
        line("2º Bac", "Ord", "B", "Ana", "Math", "5"),
        line("2º Bac", "Ord", "A", "Bea", "Math", "5"),
        line("4º ESO", "Final", "C", "Caio", "Math", "5"),
        line("Ciclo ESO", "Final", "A", "Dani", "Math", "5"),
    ]);
    let report = aggregate(&store);
    let courses: Vec<&str> = report.sheets.iter().map(|s| s.course.as_str()).collect();
    assert_eq!(courses, ["Ciclo ESO", "4º ESO", "2º Bac"]);

    let groups: Vec<&str> = report.sheets[2].groups.iter().map(|g| g.group.as_str()).collect();
    assert_eq!(groups, ["A", "B"]);
}

#[test]
fn no_eligible_data_gives_empty_report() {
    let store = load(&[line("1º ESO", "2ª Av", "A", "Ana", "Math", "5")]);
    assert!(aggregate(&store).is_empty());
}
