use crate::data::filter::{ALL_LABEL, ALL_LABEL_FEMININE};
use crate::data::{
    aggregate, apply_filter, ingest_with_progress, DataError, FilterResult, FilterSelection,
    LoadReport, Progress, RecordStore, Selector, StatisticsReport,
};

// ---------------------------------------------------------------------------
// Status line
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Success,
    Warning,
}

/// Message shown to the user after a load or a statistics request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    fn success(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Success,
            text: text.into(),
        }
    }

    fn warning(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warning,
            text: text.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

/// The full viewer state, independent of rendering.
///
/// Owns the record store and keeps the selectors and the filtered table in
/// step with it. A load always clears the previous data first.
#[derive(Debug, Default)]
pub struct ViewerState {
    /// Loaded records (empty until a load succeeds).
    pub store: RecordStore,

    /// Current (course, group, evaluation) selection.
    pub selection: FilterSelection,

    /// Selector entries, each starting with its "all" label.
    pub course_options: Vec<String>,
    pub group_options: Vec<String>,
    pub evaluation_options: Vec<String>,

    /// Table for the current selection (cached).
    pub current: Option<FilterResult>,

    /// Status / warning message for the user.
    pub status: Option<StatusMessage>,

    /// Whether a load is in progress; filter controls stay disabled meanwhile.
    pub loading: bool,
}

impl ViewerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether data is loaded and the filter controls are usable.
    pub fn has_data(&self) -> bool {
        !self.loading && !self.store.is_empty()
    }

    /// Replace all state with the contents of `text`.
    pub fn load(&mut self, text: &str) -> Result<LoadReport, DataError> {
        self.load_with_progress(text, |_| {})
    }

    /// Like [`load`](Self::load), reporting ingestion progress.
    pub fn load_with_progress<F>(
        &mut self,
        text: &str,
        on_progress: F,
    ) -> Result<LoadReport, DataError>
    where
        F: FnMut(Progress),
    {
        self.store.clear();
        self.selection = FilterSelection::default();
        self.course_options.clear();
        self.group_options.clear();
        self.evaluation_options.clear();
        self.current = None;
        self.status = None;
        self.loading = true;

        let result = ingest_with_progress(&mut self.store, text, on_progress);
        self.loading = false;

        match result {
            Ok(report) => {
                self.populate_selectors();
                self.refilter();
                self.status = Some(if report.skipped > 0 {
                    StatusMessage::warning(format!(
                        "Data loaded. Warning: {} line(s) were ignored due to an invalid format.",
                        report.skipped
                    ))
                } else {
                    StatusMessage::success("Data loaded.")
                });
                Ok(report)
            }
            Err(err) => {
                log::warn!("Load failed: {err}");
                self.status = Some(StatusMessage::warning(err.to_string()));
                Err(err)
            }
        }
    }

    fn populate_selectors(&mut self) {
        self.course_options = std::iter::once(ALL_LABEL.to_string())
            .chain(self.store.courses())
            .collect();
        self.evaluation_options = std::iter::once(ALL_LABEL_FEMININE.to_string())
            .chain(self.store.evaluations())
            .collect();
        self.rebuild_group_options();
    }

    /// Group entries for the selected course (all groups when unconstrained).
    fn rebuild_group_options(&mut self) {
        let groups = match &self.selection.course {
            Selector::All => self.store.groups(),
            Selector::Only(course) => self.store.groups_for_course(course),
        };
        self.group_options = std::iter::once(ALL_LABEL.to_string())
            .chain(groups)
            .collect();
        log::debug!(
            "Group options for {:?}: {:?}",
            self.selection.course,
            self.group_options
        );
    }

    /// Select a course; resets the group to "Todos" and rebuilds its entries.
    pub fn set_course(&mut self, label: &str) {
        self.selection.course = Selector::course_or_group(label);
        self.selection.group = Selector::All;
        self.rebuild_group_options();
        self.refilter();
    }

    pub fn set_group(&mut self, label: &str) {
        self.selection.group = Selector::course_or_group(label);
        self.refilter();
    }

    pub fn set_evaluation(&mut self, label: &str) {
        self.selection.evaluation = Selector::evaluation(label);
        self.refilter();
    }

    /// Recompute the cached table after a selection change.
    pub fn refilter(&mut self) {
        if self.has_data() {
            self.current = Some(apply_filter(&self.store, &self.selection));
        }
    }

    /// Statistics over the whole store, independent of the selection.
    pub fn statistics(&mut self) -> Result<StatisticsReport, DataError> {
        let report = aggregate(&self.store);
        if report.is_empty() {
            self.status = Some(StatusMessage::warning(DataError::NoStatistics.to_string()));
            return Err(DataError::NoStatistics);
        }
        Ok(report)
    }
}
