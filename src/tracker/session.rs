use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    classify::{normalize_language_label, ProjectClassifier},
    config::TrackerSettings,
    ledger::{
        snapshot::{build_rows, StatsSnapshot, StatusLine},
        Category, Ledgers, UNKNOWN_CATEGORY,
    },
    utils::{clock::elapsed_ms, time::date_key},
};

use super::{
    activity::ActivityTracker,
    signals::{ActivitySignal, WorkspaceFolder},
};

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub active: bool,
    /// Milliseconds attributed to the current project during this tick.
    pub attributed_ms: f64,
    /// The ledgers are due to be persisted.
    pub persist_due: bool,
    pub status: StatusLine,
}

/// All mutable state of a running tracker: the ledgers, the working total of the day in
/// progress and the activity tracker. Only the accumulation loop owns it.
///
/// The working total `today_ms` belongs to `(current project, today_key)` and may be ahead of
/// the ledger. It is written into the ledger on day rollover, on project switch, on every
/// persist and on shutdown.
pub struct TrackerSession {
    ledgers: Ledgers,
    activity: ActivityTracker,
    classifier: Box<dyn ProjectClassifier>,
    project_frameworks: HashMap<String, Vec<String>>,
    settings: TrackerSettings,
    today_key: String,
    today_ms: f64,
    last_tick_at: DateTime<Utc>,
    last_persist_at: DateTime<Utc>,
}

impl TrackerSession {
    pub fn new(
        ledgers: Ledgers,
        classifier: Box<dyn ProjectClassifier>,
        settings: TrackerSettings,
        folders: Vec<WorkspaceFolder>,
        now: DateTime<Utc>,
    ) -> Self {
        let activity = ActivityTracker::new(now, folders);
        let today_key = date_key(now);
        let today_ms = activity
            .current_project()
            .map_or(0., |project| ledgers.day_total(project, &today_key));
        let mut session = Self {
            ledgers,
            activity,
            classifier,
            project_frameworks: HashMap::new(),
            settings,
            today_key,
            today_ms,
            last_tick_at: now,
            last_persist_at: now,
        };
        session.refresh_frameworks();
        session
    }

    pub fn ledgers(&self) -> &Ledgers {
        &self.ledgers
    }

    pub fn today_key(&self) -> &str {
        &self.today_key
    }

    pub fn today_ms(&self) -> f64 {
        self.today_ms
    }

    pub fn current_project(&self) -> Option<&str> {
        self.activity.current_project()
    }

    /// Advances the session to `now`. Handles day rollover, attributes the time since the last
    /// tick when active and reports whether the persist interval elapsed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let current_key = date_key(now);
        if current_key != self.today_key {
            info!("Day changed from {} to {current_key}", self.today_key);
            self.flush_working_total();
            self.today_key = current_key;
            self.today_ms = self.ledger_total_for_current();
        }

        let active = self
            .activity
            .is_active(now, self.settings.idle_threshold_ms);
        let delta = elapsed_ms(self.last_tick_at, now);
        let mut attributed_ms = 0.;

        if active {
            if let Some(project) = self.activity.current_project().map(str::to_owned) {
                self.attribute(&project, delta);
                attributed_ms = delta;
            }
        }
        self.last_tick_at = now;

        let persist_due =
            elapsed_ms(self.last_persist_at, now) >= self.settings.persist_interval_ms as f64;
        if persist_due {
            self.flush_working_total();
            self.last_persist_at = now;
        }

        TickOutcome {
            active,
            attributed_ms,
            persist_due,
            status: StatusLine::new(self.today_ms, active),
        }
    }

    fn attribute(&mut self, project: &str, delta: f64) {
        self.today_ms += delta;

        let language = normalize_language_label(self.activity.current_language());
        self.ledgers
            .add_category_ms(Category::Language, project, &self.today_key, &language, delta);

        let frameworks = self
            .project_frameworks
            .get(project)
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| vec![UNKNOWN_CATEGORY.to_owned()]);
        let share = delta / frameworks.len() as f64;
        for framework in &frameworks {
            self.ledgers
                .add_category_ms(Category::Framework, project, &self.today_key, framework, share);
        }
    }

    /// Applies an activity signal received at `now`.
    pub fn handle_signal(&mut self, signal: ActivitySignal, now: DateTime<Utc>) {
        let previous_project = self.activity.current_project().map(str::to_owned);
        match signal {
            ActivitySignal::DocumentChanged { uri, language }
            | ActivitySignal::EditorFocusChanged { uri, language } => {
                self.activity.update_context(uri, language);
                self.activity.record_activity(now);
            }
            ActivitySignal::SelectionChanged
            | ActivitySignal::WindowFocusGained
            | ActivitySignal::TerminalActivated => self.activity.record_activity(now),
            ActivitySignal::WorkspaceFoldersChanged { folders } => {
                self.activity.update_folders(folders);
                self.refresh_frameworks();
            }
        }
        self.switch_project(previous_project);
    }

    /// Moves the working total over when the current project changed.
    fn switch_project(&mut self, previous_project: Option<String>) {
        if previous_project.as_deref() == self.activity.current_project() {
            return;
        }
        if let Some(previous) = previous_project {
            self.ledgers
                .set_day_total(&previous, &self.today_key, self.today_ms);
        }
        self.today_ms = self.ledger_total_for_current();
        debug!(
            "Switched project to {:?} with {}ms today",
            self.activity.current_project(),
            self.today_ms
        );
    }

    fn refresh_frameworks(&mut self) {
        self.project_frameworks = self
            .activity
            .folders()
            .iter()
            .map(|folder| (folder.name.clone(), self.classifier.classify(&folder.path)))
            .collect();
        debug!("Detected frameworks {:?}", self.project_frameworks);
    }

    fn ledger_total_for_current(&self) -> f64 {
        self.activity
            .current_project()
            .map_or(0., |project| self.ledgers.day_total(project, &self.today_key))
    }

    /// Writes the working total into the primary ledger. Without a project there is nothing
    /// to write to.
    pub fn flush_working_total(&mut self) {
        if let Some(project) = self.activity.current_project() {
            self.ledgers
                .set_day_total(project, &self.today_key, self.today_ms);
        }
    }

    /// Flushes the working total and returns a copy of the ledgers for persisting.
    pub fn persist_snapshot(&mut self) -> Ledgers {
        self.flush_working_total();
        self.ledgers.clone()
    }

    /// Removes `(project, date)` from every ledger. Deleting the day in progress also zeroes the
    /// working total so it doesn't write the deleted time back.
    pub fn apply_deletion(&mut self, project: &str, date: &str) {
        self.ledgers.delete_entry(project, date);
        if self.activity.current_project() == Some(project) && date == self.today_key {
            self.today_ms = 0.;
        }
    }

    pub fn reset_all(&mut self) {
        info!("Resetting all recorded time");
        self.ledgers.reset_all();
        self.today_ms = 0.;
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            rows: build_rows(
                &self.ledgers.history,
                &self.today_key,
                self.today_ms,
                self.activity.current_project(),
            ),
            language_history: self.ledgers.language_history.clone(),
            framework_history: self.ledgers.framework_history.clone(),
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> StatusLine {
        StatusLine::new(
            self.today_ms,
            self.activity.is_active(now, self.settings.idle_threshold_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use crate::classify::MockProjectClassifier;

    use super::*;

    const TODAY: &str = "2026-01-01";

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    fn demo_folder() -> WorkspaceFolder {
        WorkspaceFolder {
            name: "demo".into(),
            path: "/code/demo".into(),
        }
    }

    fn classifier(frameworks: &[&str]) -> Box<dyn ProjectClassifier> {
        let frameworks = frameworks.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        let mut classifier = MockProjectClassifier::new();
        classifier
            .expect_classify()
            .returning(move |_| frameworks.clone());
        Box::new(classifier)
    }

    fn session(ledgers: Ledgers, frameworks: &[&str], now: DateTime<Utc>) -> TrackerSession {
        TrackerSession::new(
            ledgers,
            classifier(frameworks),
            TrackerSettings::default(),
            vec![demo_folder()],
            now,
        )
    }

    fn edit(session: &mut TrackerSession, language: &str, now: DateTime<Utc>) {
        session.handle_signal(
            ActivitySignal::DocumentChanged {
                uri: Some("/code/demo/main.py".into()),
                language: Some(language.into()),
            },
            now,
        );
    }

    fn ticks(session: &mut TrackerSession, from: DateTime<Utc>, count: i64) -> DateTime<Utc> {
        let mut now = from;
        for _ in 0..count {
            now += Duration::milliseconds(1000);
            session.tick(now);
        }
        now
    }

    #[test]
    fn three_active_ticks_fill_all_ledgers() {
        let mut session = session(Ledgers::default(), &["Django"], start());
        edit(&mut session, "python", start());

        ticks(&mut session, start(), 3);
        session.flush_working_total();

        let ledgers = session.ledgers();
        assert_eq!(ledgers.day_total("demo", TODAY), 3000.);
        assert_eq!(
            ledgers.category_ms(Category::Language, "demo", TODAY, "Python"),
            3000.
        );
        assert_eq!(
            ledgers.category_ms(Category::Framework, "demo", TODAY, "Django"),
            3000.
        );
    }

    #[test]
    fn tick_time_is_split_evenly_across_frameworks() {
        let mut session = session(Ledgers::default(), &["React", "Vite"], start());
        edit(&mut session, "typescriptreact", start());

        ticks(&mut session, start(), 1);

        let ledgers = session.ledgers();
        assert_eq!(
            ledgers.category_ms(Category::Framework, "demo", TODAY, "React"),
            500.
        );
        assert_eq!(
            ledgers.category_ms(Category::Framework, "demo", TODAY, "Vite"),
            500.
        );
        assert_eq!(
            ledgers.category_ms(Category::Language, "demo", TODAY, "TypeScript"),
            1000.
        );
    }

    #[test]
    fn category_deltas_sum_to_primary_delta() {
        let mut session = session(Ledgers::default(), &["Astro", "Vite", "Express"], start());
        edit(&mut session, "javascript", start());

        let mut now = start();
        for step in [700, 1000, 1300, 999] {
            now += Duration::milliseconds(step);
            let language_before = sum_categories(session.ledgers(), Category::Language);
            let framework_before = sum_categories(session.ledgers(), Category::Framework);

            let outcome = session.tick(now);

            let language_delta =
                sum_categories(session.ledgers(), Category::Language) - language_before;
            let framework_delta =
                sum_categories(session.ledgers(), Category::Framework) - framework_before;
            assert_eq!(outcome.attributed_ms, step as f64);
            assert!((language_delta - outcome.attributed_ms).abs() < 1e-6);
            assert!((framework_delta - outcome.attributed_ms).abs() < 1e-6);
        }
        assert_eq!(session.today_ms(), 3999.);
    }

    fn sum_categories(ledgers: &Ledgers, category: Category) -> f64 {
        ledgers
            .category(category)
            .values()
            .flat_map(|days| days.values())
            .flat_map(|labels| labels.values())
            .sum()
    }

    #[test]
    fn undetected_frameworks_count_as_unknown() {
        let mut session = session(Ledgers::default(), &[], start());
        edit(&mut session, "rust", start());

        ticks(&mut session, start(), 2);

        assert_eq!(
            session
                .ledgers()
                .category_ms(Category::Framework, "demo", TODAY, "Unknown"),
            2000.
        );
    }

    #[test]
    fn idle_ticks_attribute_nothing() {
        let mut session = session(Ledgers::default(), &["Django"], start());
        edit(&mut session, "python", start());

        let idle_from = start() + Duration::milliseconds(60_000);
        let outcome = session.tick(idle_from + Duration::milliseconds(1000));

        assert!(!outcome.active);
        assert_eq!(outcome.attributed_ms, 0.);
        assert_eq!(session.today_ms(), 0.);
        assert!(!outcome.status.active);
    }

    #[test]
    fn no_workspace_suppresses_accumulation() {
        let mut session = TrackerSession::new(
            Ledgers::default(),
            Box::new(MockProjectClassifier::new()),
            TrackerSettings::default(),
            vec![],
            start(),
        );
        session.handle_signal(ActivitySignal::SelectionChanged, start());

        let outcome = session.tick(start() + Duration::milliseconds(1000));

        assert!(!outcome.active);
        assert!(session.ledgers().is_empty());
    }

    #[test]
    fn day_rollover_flushes_once_and_resumes_from_ledger() {
        let before_midnight = Utc.with_ymd_and_hms(2026, 1, 1, 23, 59, 58).unwrap();
        let mut ledgers = Ledgers::default();
        ledgers.set_day_total("demo", "2026-01-02", 5000.);
        let mut session = session(ledgers, &["Django"], before_midnight);
        edit(&mut session, "python", before_midnight);

        let now = ticks(&mut session, before_midnight, 2);
        assert_eq!(session.today_key(), "2026-01-02");
        assert_eq!(session.ledgers().day_total("demo", "2026-01-01"), 1000.);
        assert_eq!(session.today_ms(), 6000.);

        ticks(&mut session, now, 1);
        session.flush_working_total();
        assert_eq!(session.ledgers().day_total("demo", "2026-01-01"), 1000.);
        assert_eq!(session.ledgers().day_total("demo", "2026-01-02"), 7000.);
    }

    #[test]
    fn persist_is_due_on_interval() {
        let mut session = session(Ledgers::default(), &["Django"], start());
        edit(&mut session, "python", start());

        let mut due = vec![];
        let mut now = start();
        for _ in 0..30 {
            now += Duration::milliseconds(1000);
            due.push(session.tick(now).persist_due);
        }

        assert_eq!(due.iter().filter(|v| **v).count(), 2);
        assert!(due[14] && due[29]);
        assert_eq!(session.ledgers().day_total("demo", TODAY), 30000.);
    }

    #[test]
    fn switching_project_keeps_unflushed_time() {
        let other = WorkspaceFolder {
            name: "other".into(),
            path: "/code/other".into(),
        };
        let mut classifier = MockProjectClassifier::new();
        classifier.expect_classify().returning(|_| vec![]);
        let mut session = TrackerSession::new(
            Ledgers::default(),
            Box::new(classifier),
            TrackerSettings::default(),
            vec![demo_folder(), other],
            start(),
        );
        edit(&mut session, "python", start());
        let now = ticks(&mut session, start(), 2);

        session.handle_signal(
            ActivitySignal::EditorFocusChanged {
                uri: Some("/code/other/lib.rs".into()),
                language: Some("rust".into()),
            },
            now,
        );
        assert_eq!(session.current_project(), Some("other"));
        assert_eq!(session.today_ms(), 0.);
        assert_eq!(session.ledgers().day_total("demo", TODAY), 2000.);

        ticks(&mut session, now, 1);
        assert_eq!(session.today_ms(), 1000.);
        assert_eq!(
            session
                .ledgers()
                .category_ms(Category::Language, "other", TODAY, "Rust"),
            1000.
        );
    }

    #[test]
    fn fractional_tick_spacing_is_fully_attributed() {
        let mut session = session(Ledgers::default(), &["Django"], start());
        let spacing = Duration::microseconds(1_000_900);
        let mut now = start();
        for _ in 0..1000 {
            session.handle_signal(ActivitySignal::SelectionChanged, now);
            now += spacing;
            session.tick(now);
        }

        let elapsed = elapsed_ms(start(), now);
        assert_eq!(elapsed, 1_000_900.);
        assert!((session.today_ms() - elapsed).abs() < 1e-6);
        assert!(
            (session
                .ledgers()
                .category_ms(Category::Framework, "demo", TODAY, "Django")
                - elapsed)
                .abs()
                < 1e-6
        );
    }

    #[test]
    fn file_uri_document_picks_containing_folder() -> anyhow::Result<()> {
        let first = WorkspaceFolder {
            name: "first".into(),
            path: "/code/first".into(),
        };
        let second = WorkspaceFolder {
            name: "second".into(),
            path: "/code/second".into(),
        };
        let mut classifier = MockProjectClassifier::new();
        classifier.expect_classify().returning(|_| vec![]);
        let mut session = TrackerSession::new(
            Ledgers::default(),
            Box::new(classifier),
            TrackerSettings::default(),
            vec![first, second],
            start(),
        );
        assert_eq!(session.current_project(), Some("first"));

        let signal = serde_json::from_str::<ActivitySignal>(
            r#"{"type":"document_changed","uri":"file:///code/second/a.rs","language":"rust"}"#,
        )?;
        session.handle_signal(signal, start());
        ticks(&mut session, start(), 1);

        assert_eq!(session.current_project(), Some("second"));
        assert_eq!(session.today_ms(), 1000.);
        assert_eq!(session.ledgers().day_total("first", TODAY), 0.);
        Ok(())
    }

    #[test]
    fn closing_last_folder_stops_accumulation_without_losing_time() {
        let mut session = session(Ledgers::default(), &["Django"], start());
        edit(&mut session, "python", start());
        let now = ticks(&mut session, start(), 2);

        session.handle_signal(ActivitySignal::WorkspaceFoldersChanged { folders: vec![] }, now);
        ticks(&mut session, now, 2);

        assert_eq!(session.current_project(), None);
        assert_eq!(session.ledgers().day_total("demo", TODAY), 2000.);
    }

    #[test]
    fn deleting_today_resets_working_total() {
        let mut session = session(Ledgers::default(), &["Django"], start());
        edit(&mut session, "python", start());
        let now = ticks(&mut session, start(), 3);
        session.flush_working_total();

        session.apply_deletion("demo", TODAY);

        assert_eq!(session.today_ms(), 0.);
        assert!(session.ledgers().is_empty());
        let row = &session.stats().rows[0];
        assert_eq!((row.project.as_str(), row.ms), ("demo", 0.));

        ticks(&mut session, now, 1);
        assert_eq!(session.today_ms(), 1000.);
    }

    #[test]
    fn deleting_only_date_prunes_project_everywhere() {
        let mut ledgers = Ledgers::default();
        ledgers.set_day_total("demo", "2025-12-31", 100.);
        ledgers.add_category_ms(Category::Language, "demo", "2025-12-31", "Go", 100.);
        ledgers.add_category_ms(Category::Framework, "demo", "2025-12-31", "Unknown", 100.);
        let mut session = session(ledgers, &[], start());

        session.apply_deletion("demo", "2025-12-31");
        session.apply_deletion("demo", "2025-12-31");
        session.apply_deletion("ghost", "1999-01-01");

        assert!(session.ledgers().is_empty());
    }

    #[test]
    fn reset_clears_ledgers_and_working_total() {
        let mut session = session(Ledgers::default(), &["Django"], start());
        edit(&mut session, "python", start());
        ticks(&mut session, start(), 3);

        session.reset_all();

        assert!(session.ledgers().is_empty());
        assert_eq!(session.today_ms(), 0.);
        assert_eq!(session.persist_snapshot().day_total("demo", TODAY), 0.);
    }

    #[test]
    fn stats_include_live_working_total() {
        let mut ledgers = Ledgers::default();
        ledgers.set_day_total("demo", "2025-12-31", 100.);
        let mut session = session(ledgers, &["Django"], start());
        edit(&mut session, "python", start());
        ticks(&mut session, start(), 2);

        let stats = session.stats();

        assert_eq!(stats.rows.len(), 2);
        assert_eq!(stats.rows[0].date, TODAY);
        assert_eq!(stats.rows[0].ms, 2000.);
        assert_eq!(session.ledgers().day_total("demo", TODAY), 0.);
        assert_eq!(stats.language_history["demo"][TODAY]["Python"], 2000.);
    }
}
