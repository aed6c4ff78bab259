// SPDX-License-Identifier: MIT
//! Settings draft controller — the autosave state machine behind the
//! course-settings wizard step.
//!
//! The controller owns the authoritative in-memory draft for the lifetime of
//! the step. Edits mark the section dirty and re-arm a single debounce timer;
//! the timer persists the draft through the primary store, falling back to
//! the file path once on failure. Leaving the step commits unconditionally
//! and never blocks on a failed save — forward progress beats strict
//! durability everywhere in this flow.
//!
//! Per-section states: `Clean` (draft == last persisted), `Dirty` (edited
//! since), `Persisting` (debounced write in flight). Teardown cancels the
//! timer and any readiness wait; a stale timer observing a bumped generation
//! does nothing.

use super::{CourseSettings, COURSE_SETTINGS_KEY, COURSE_SETTINGS_SECTION};
use crate::dirty::DirtyTracker;
use crate::events::EventBroadcaster;
use crate::project::{ProjectId, ProjectRegistry};
use crate::storage::ContentStore;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistState {
    Clean,
    Dirty,
    Persisting,
}

struct Inner {
    draft: CourseSettings,
    last_persisted: Option<CourseSettings>,
    state: PersistState,
    /// Bumped on every (re)arm and on teardown; a sleeping timer that wakes
    /// to a different generation is stale and must not persist.
    timer_generation: u64,
    debounce_task: Option<JoinHandle<()>>,
    closed: bool,
}

pub struct SettingsController {
    inner: Mutex<Inner>,
    store: Arc<dyn ContentStore>,
    fallback: Arc<dyn ContentStore>,
    dirty: Arc<DirtyTracker>,
    projects: Arc<ProjectRegistry>,
    broadcaster: EventBroadcaster,
    debounce: Duration,
    readiness_wait: Duration,
}

impl SettingsController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ContentStore>,
        fallback: Arc<dyn ContentStore>,
        dirty: Arc<DirtyTracker>,
        projects: Arc<ProjectRegistry>,
        broadcaster: EventBroadcaster,
        debounce: Duration,
        readiness_wait: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                draft: CourseSettings::default(),
                last_persisted: None,
                state: PersistState::Clean,
                timer_generation: 0,
                debounce_task: None,
                closed: false,
            }),
            store,
            fallback,
            dirty,
            projects,
            broadcaster,
            debounce,
            readiness_wait,
        })
    }

    /// Snapshot of the current draft.
    pub fn draft(&self) -> CourseSettings {
        self.lock().draft.clone()
    }

    pub fn state(&self) -> PersistState {
        self.lock().state
    }

    /// Called once when the settings step becomes active.
    ///
    /// Waits (bounded) for a project to become available — the shell may still
    /// be resolving one when the step renders — then loads the stored draft.
    /// Budget exhaustion is soft: the step shows defaults and the author can
    /// start editing right away.
    pub async fn initialize(&self) {
        match self.projects.wait_until_ready(self.readiness_wait).await {
            Some(project_id) => self.load(&project_id).await,
            None => {
                warn!("no project became available — settings step starts from defaults");
            }
        }
    }

    /// Load the stored draft for `project_id`.
    ///
    /// An absent record leaves the draft untouched. A stored record replaces
    /// the draft only while it still equals the defaults — edits made before
    /// the project resolved are never clobbered. A failed read logs and
    /// resets to defaults; nothing propagates to the caller.
    pub async fn load(&self, project_id: &ProjectId) {
        match self.store.get_content(project_id, COURSE_SETTINGS_KEY).await {
            Ok(Some(value)) => match serde_json::from_value::<CourseSettings>(value) {
                Ok(mut stored) => {
                    stored.clamp_ranges();
                    let mut inner = self.lock();
                    if inner.draft.is_default() {
                        inner.draft = stored.clone();
                        inner.last_persisted = Some(stored);
                        inner.state = PersistState::Clean;
                    } else {
                        debug!(project_id = %project_id, "draft already edited — keeping in-memory edits");
                    }
                }
                Err(e) => {
                    warn!(project_id = %project_id, err = %e, "stored settings unreadable — using defaults");
                    self.reset_after_failed_load();
                }
            },
            Ok(None) => {
                debug!(project_id = %project_id, "no stored settings — keeping current draft");
            }
            Err(e) => {
                warn!(project_id = %project_id, err = %e, "settings read failed — using defaults");
                self.reset_after_failed_load();
            }
        }
    }

    /// Apply a pure mutation to the draft.
    ///
    /// Clamps ranges, marks the section dirty, and re-arms the debounce
    /// timer. At most one timer is pending at any moment.
    pub fn update(self: &Arc<Self>, mutate: impl FnOnce(&mut CourseSettings)) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        mutate(&mut inner.draft);
        inner.draft.clamp_ranges();
        inner.state = PersistState::Dirty;
        self.dirty.mark_dirty(COURSE_SETTINGS_SECTION);
        self.arm_debounce(&mut inner);
    }

    /// Replace the whole draft with the compiled-in defaults.
    pub fn reset_to_defaults(self: &Arc<Self>) {
        self.update(|draft| *draft = CourseSettings::default());
    }

    /// Persist the draft now if there is anything to persist.
    ///
    /// Skips when the section is already clean, when no project is open, or
    /// when the draft equals the compiled-in defaults (defaults are treated
    /// as "nothing to save"; `commit_before_advance` is the durability
    /// backstop for that case). Failures leave the section dirty and are not
    /// surfaced.
    pub async fn auto_persist(&self) {
        let generation = self.lock().timer_generation;
        self.persist_debounced(generation).await;
    }

    /// One unconditional persist attempt, then hand back the draft.
    ///
    /// Called when the author proceeds to the next step. Errors are swallowed
    /// — navigation is never blocked by a save failure — and the section is
    /// optimistically marked clean either way.
    pub async fn commit_before_advance(&self) -> CourseSettings {
        let snapshot = {
            let mut inner = self.lock();
            inner.timer_generation += 1;
            if let Some(task) = inner.debounce_task.take() {
                task.abort();
            }
            inner.draft.clone()
        };

        if let Some(project_id) = self.projects.current() {
            if let Some(via) = self.persist_with_fallback(&project_id, &snapshot).await {
                let mut inner = self.lock();
                inner.last_persisted = Some(snapshot.clone());
                drop(inner);
                self.broadcaster.broadcast(
                    "settings.persisted",
                    serde_json::json!({ "projectId": project_id.as_str(), "via": via }),
                );
            }
        } else {
            debug!("no project open — commit keeps the draft in memory only");
        }

        self.lock().state = PersistState::Clean;
        self.dirty.reset_dirty(COURSE_SETTINGS_SECTION);
        snapshot
    }

    /// Commit, then hand a copy of the draft to the next wizard step.
    /// The callback is invoked exactly once per advance.
    pub async fn advance(&self, next: impl FnOnce(CourseSettings)) -> CourseSettings {
        let settings = self.commit_before_advance().await;
        next(settings.clone());
        settings
    }

    /// Tear the controller down: cancel the pending timer and reset the
    /// section flag. No final persist — whatever was committed stays.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.timer_generation += 1;
        if let Some(task) = inner.debounce_task.take() {
            task.abort();
        }
        drop(inner);
        self.dirty.reset_dirty(COURSE_SETTINGS_SECTION);
    }

    // ─── Internals ────────────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn reset_after_failed_load(&self) {
        let mut inner = self.lock();
        inner.draft = CourseSettings::default();
        inner.last_persisted = None;
        inner.state = PersistState::Clean;
        drop(inner);
        self.dirty.reset_dirty(COURSE_SETTINGS_SECTION);
    }

    fn arm_debounce(self: &Arc<Self>, inner: &mut Inner) {
        inner.timer_generation += 1;
        let generation = inner.timer_generation;
        if let Some(task) = inner.debounce_task.take() {
            task.abort();
        }
        let weak = Arc::downgrade(self);
        let delay = self.debounce;
        inner.debounce_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(controller) = weak.upgrade() {
                controller.persist_debounced(generation).await;
            }
        }));
    }

    async fn persist_debounced(&self, generation: u64) {
        let (project_id, snapshot) = {
            let mut inner = self.lock();
            if inner.closed || inner.timer_generation != generation {
                return;
            }
            if inner.state == PersistState::Clean
                || inner.last_persisted.as_ref() == Some(&inner.draft)
            {
                debug!("nothing changed since last persist — skipping");
                return;
            }
            if inner.draft.is_default() {
                debug!("draft equals defaults — skipping autosave");
                return;
            }
            let Some(project_id) = self.projects.current() else {
                debug!("no project open — skipping autosave");
                return;
            };
            inner.state = PersistState::Persisting;
            (project_id, inner.draft.clone())
        };

        let via = self.persist_with_fallback(&project_id, &snapshot).await;

        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        match via {
            Some(via) => {
                // An edit may have landed while the write was in flight; only
                // the unchanged draft becomes clean.
                let unchanged = inner.draft == snapshot;
                inner.last_persisted = Some(snapshot);
                inner.state = if unchanged {
                    PersistState::Clean
                } else {
                    PersistState::Dirty
                };
                drop(inner);
                if unchanged {
                    self.dirty.reset_dirty(COURSE_SETTINGS_SECTION);
                }
                self.broadcaster.broadcast(
                    "settings.persisted",
                    serde_json::json!({ "projectId": project_id.as_str(), "via": via }),
                );
            }
            None => {
                inner.state = PersistState::Dirty;
            }
        }
    }

    /// Try the primary store, then the file path once. Returns which path
    /// landed the write, or `None` when both failed (section stays dirty).
    async fn persist_with_fallback(
        &self,
        project_id: &ProjectId,
        snapshot: &CourseSettings,
    ) -> Option<&'static str> {
        let value = match serde_json::to_value(snapshot) {
            Ok(value) => value,
            Err(e) => {
                warn!(err = %e, "settings draft not serializable — dropping persist");
                return None;
            }
        };

        match self
            .store
            .save_content(project_id, COURSE_SETTINGS_KEY, &value)
            .await
        {
            Ok(()) => Some("primary"),
            Err(primary_err) => {
                warn!(project_id = %project_id, err = %primary_err, "primary settings write failed — trying file path");
                match self
                    .fallback
                    .save_content(project_id, COURSE_SETTINGS_KEY, &value)
                    .await
                {
                    Ok(()) => Some("fallback"),
                    Err(fallback_err) => {
                        warn!(project_id = %project_id, err = %fallback_err, "settings write abandoned — section stays dirty");
                        None
                    }
                }
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockStore {
        saves: Mutex<Vec<Value>>,
        gets: Mutex<Vec<String>>,
        stored: Mutex<Option<Value>>,
        fail_get: AtomicBool,
        fail_save: AtomicBool,
    }

    impl MockStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                saves: Mutex::new(Vec::new()),
                gets: Mutex::new(Vec::new()),
                stored: Mutex::new(None),
                fail_get: AtomicBool::new(false),
                fail_save: AtomicBool::new(false),
            })
        }

        fn with_stored(value: Value) -> Arc<Self> {
            let store = Self::new();
            *store.stored.lock().unwrap() = Some(value);
            store
        }

        fn save_count(&self) -> usize {
            self.saves.lock().unwrap().len()
        }

        fn last_saved(&self) -> Value {
            self.saves.lock().unwrap().last().cloned().unwrap()
        }

        fn get_count(&self) -> usize {
            self.gets.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ContentStore for MockStore {
        async fn get_content(
            &self,
            _project_id: &ProjectId,
            key: &str,
        ) -> Result<Option<Value>, crate::error::StoreError> {
            self.gets.lock().unwrap().push(key.to_string());
            if self.fail_get.load(Ordering::Relaxed) {
                return Err(crate::error::StoreError::Unavailable("mock down".into()));
            }
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn save_content(
            &self,
            _project_id: &ProjectId,
            key: &str,
            value: &Value,
        ) -> Result<(), crate::error::StoreError> {
            if self.fail_save.load(Ordering::Relaxed) {
                return Err(crate::error::StoreError::write(key, "mock down"));
            }
            self.saves.lock().unwrap().push(value.clone());
            *self.stored.lock().unwrap() = Some(value.clone());
            Ok(())
        }
    }

    struct Harness {
        controller: Arc<SettingsController>,
        primary: Arc<MockStore>,
        fallback: Arc<MockStore>,
        projects: Arc<ProjectRegistry>,
        dirty: Arc<DirtyTracker>,
    }

    fn harness_with(primary: Arc<MockStore>) -> Harness {
        let broadcaster = EventBroadcaster::new();
        let fallback = MockStore::new();
        let dirty = Arc::new(DirtyTracker::new(broadcaster.clone()));
        let projects = Arc::new(ProjectRegistry::new(broadcaster.clone()));
        let controller = SettingsController::new(
            primary.clone(),
            fallback.clone(),
            dirty.clone(),
            projects.clone(),
            broadcaster,
            Duration::from_millis(1000),
            Duration::from_secs(12),
        );
        Harness {
            controller,
            primary,
            fallback,
            projects,
            dirty,
        }
    }

    fn harness() -> Harness {
        harness_with(MockStore::new())
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_without_project_keeps_defaults() {
        let h = harness();
        h.controller.initialize().await;
        assert!(h.controller.draft().is_default());
        // load was never attempted
        assert_eq!(h.primary.get_count(), 0);
    }

    #[tokio::test]
    async fn initialize_loads_stored_draft() {
        let h = harness_with(MockStore::with_stored(
            serde_json::json!({"navigationMode": "linear", "passMark": 60}),
        ));
        h.projects.open_new("Course");
        h.controller.initialize().await;

        let draft = h.controller.draft();
        assert_eq!(draft.navigation_mode, super::super::NavigationMode::Linear);
        assert_eq!(draft.pass_mark, 60);
        assert_eq!(h.controller.state(), PersistState::Clean);
    }

    #[tokio::test]
    async fn stored_out_of_range_values_are_repaired_on_load() {
        let h = harness_with(MockStore::with_stored(
            serde_json::json!({"passMark": 250, "sessionTimeoutMinutes": 1}),
        ));
        h.projects.open_new("Course");
        h.controller.initialize().await;

        let draft = h.controller.draft();
        assert_eq!(draft.pass_mark, 100);
        assert_eq!(draft.session_timeout_minutes, 5);
    }

    #[tokio::test]
    async fn failed_read_falls_back_to_defaults() {
        let h = harness();
        h.primary.fail_get.store(true, Ordering::Relaxed);
        h.projects.open_new("Course");
        h.controller.initialize().await;
        assert!(h.controller.draft().is_default());
        assert_eq!(h.controller.state(), PersistState::Clean);
    }

    #[tokio::test]
    async fn load_does_not_clobber_early_edits() {
        let h = harness_with(MockStore::with_stored(serde_json::json!({"passMark": 60})));
        // The author edits before the project id resolves
        h.controller.update(|s| s.pass_mark = 77);
        h.projects.open_new("Course");
        h.controller.load(&h.projects.current().unwrap()).await;
        assert_eq!(h.controller.draft().pass_mark, 77);
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_resolves_late_project() {
        let h = harness_with(MockStore::with_stored(serde_json::json!({"passMark": 65})));
        let controller = h.controller.clone();
        let init = tokio::spawn(async move { controller.initialize().await });
        tokio::time::sleep(Duration::from_secs(3)).await;
        h.projects.open_new("Late Course");
        init.await.unwrap();
        assert_eq!(h.controller.draft().pass_mark, 65);
    }

    #[tokio::test(start_paused = true)]
    async fn update_marks_dirty_then_debounce_persists() {
        let h = harness();
        h.projects.open_new("Course");

        h.controller.update(|s| s.pass_mark = 90);
        assert!(h.dirty.is_dirty("courseSettings"));
        assert_eq!(h.controller.state(), PersistState::Dirty);
        assert_eq!(h.primary.save_count(), 0);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(h.primary.save_count(), 1);
        assert_eq!(h.primary.last_saved()["passMark"], 90);
        assert!(!h.dirty.is_dirty("courseSettings"));
        assert_eq!(h.controller.state(), PersistState::Clean);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_updates_persists_once() {
        let h = harness();
        h.projects.open_new("Course");

        for i in 1..=20 {
            h.controller.update(move |s| s.time_limit_minutes = i);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(h.primary.save_count(), 1);
        assert_eq!(h.primary.last_saved()["timeLimitMinutes"], 20);
    }

    #[tokio::test]
    async fn auto_persist_skips_when_draft_equals_defaults() {
        let h = harness();
        h.projects.open_new("Course");
        h.controller.reset_to_defaults();
        assert!(h.dirty.is_dirty("courseSettings"));

        h.controller.auto_persist().await;
        assert_eq!(h.primary.save_count(), 0);
        // Restored-to-defaults state is never autosaved; the flag stays set
        assert!(h.dirty.is_dirty("courseSettings"));
    }

    #[tokio::test]
    async fn auto_persist_twice_writes_once() {
        let h = harness();
        h.projects.open_new("Course");
        h.controller.update(|s| s.show_progress = false);

        h.controller.auto_persist().await;
        h.controller.auto_persist().await;
        assert_eq!(h.primary.save_count(), 1);
    }

    #[tokio::test]
    async fn auto_persist_without_project_is_noop() {
        let h = harness();
        h.controller.update(|s| s.pass_mark = 90);
        h.controller.auto_persist().await;
        assert_eq!(h.primary.save_count(), 0);
        assert!(h.dirty.is_dirty("courseSettings"));
    }

    #[tokio::test]
    async fn write_failure_retries_via_fallback() {
        let h = harness();
        h.projects.open_new("Course");
        h.primary.fail_save.store(true, Ordering::Relaxed);

        h.controller.update(|s| s.pass_mark = 90);
        h.controller.auto_persist().await;

        assert_eq!(h.primary.save_count(), 0);
        assert_eq!(h.fallback.save_count(), 1);
        assert!(!h.dirty.is_dirty("courseSettings"));
        assert_eq!(h.controller.state(), PersistState::Clean);
    }

    #[tokio::test]
    async fn both_paths_failing_leaves_section_dirty() {
        let h = harness();
        h.projects.open_new("Course");
        h.primary.fail_save.store(true, Ordering::Relaxed);
        h.fallback.fail_save.store(true, Ordering::Relaxed);

        h.controller.update(|s| s.pass_mark = 90);
        h.controller.auto_persist().await;

        assert!(h.dirty.is_dirty("courseSettings"));
        assert_eq!(h.controller.state(), PersistState::Dirty);
        // The draft itself is untouched by the failure
        assert_eq!(h.controller.draft().pass_mark, 90);
    }

    #[tokio::test]
    async fn commit_persists_clamped_value() {
        let h = harness();
        h.projects.open_new("Course");

        h.controller.update(|s| s.pass_mark = 150);
        assert_eq!(h.controller.draft().pass_mark, 100);

        let committed = h.controller.commit_before_advance().await;
        assert_eq!(committed.pass_mark, 100);
        assert_eq!(h.primary.last_saved()["passMark"], 100);
    }

    #[tokio::test]
    async fn commit_bypasses_defaults_skip() {
        let h = harness();
        h.projects.open_new("Course");
        // Untouched defaults still get one unconditional write on advance
        h.controller.commit_before_advance().await;
        assert_eq!(h.primary.save_count(), 1);
        assert_eq!(h.primary.last_saved()["passMark"], 80);
    }

    #[tokio::test]
    async fn commit_returns_draft_even_when_stores_fail() {
        let h = harness();
        h.projects.open_new("Course");
        h.primary.fail_save.store(true, Ordering::Relaxed);
        h.fallback.fail_save.store(true, Ordering::Relaxed);

        h.controller.update(|s| s.pass_mark = 91);
        let committed = h.controller.commit_before_advance().await;

        assert_eq!(committed.pass_mark, 91);
        // Optimistic: navigation proceeds and the section reads clean
        assert_eq!(h.controller.state(), PersistState::Clean);
        assert!(!h.dirty.is_dirty("courseSettings"));
    }

    #[tokio::test]
    async fn commit_without_project_returns_draft() {
        let h = harness();
        h.controller.update(|s| s.pass_mark = 64);
        let committed = h.controller.commit_before_advance().await;
        assert_eq!(committed.pass_mark, 64);
        assert_eq!(h.primary.save_count(), 0);
    }

    #[tokio::test]
    async fn advance_hands_final_draft_to_callback_once() {
        let h = harness();
        h.projects.open_new("Course");
        h.controller.update(|s| s.pass_mark = 85);
        h.controller.update(|s| s.show_outline = false);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        h.controller
            .advance(move |settings| seen2.lock().unwrap().push(settings))
            .await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].pass_mark, 85);
        assert!(!seen[0].show_outline);
    }

    #[tokio::test]
    async fn reset_to_defaults_restores_and_marks_dirty() {
        let h = harness();
        h.projects.open_new("Course");
        h.controller.update(|s| s.pass_mark = 99);
        h.controller.auto_persist().await;
        assert!(!h.dirty.is_dirty("courseSettings"));

        h.controller.reset_to_defaults();
        assert!(h.controller.draft().is_default());
        assert!(h.dirty.is_dirty("courseSettings"));
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_pending_debounce() {
        let h = harness();
        h.projects.open_new("Course");
        h.controller.update(|s| s.pass_mark = 90);

        h.controller.close();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(h.primary.save_count(), 0);
        // Teardown resets the section flag without persisting
        assert!(!h.dirty.is_dirty("courseSettings"));
    }

    #[tokio::test]
    async fn updates_after_close_are_ignored() {
        let h = harness();
        h.projects.open_new("Course");
        h.controller.close();
        h.controller.update(|s| s.pass_mark = 90);
        assert!(h.controller.draft().is_default());
    }

    #[tokio::test]
    async fn persisted_event_is_emitted() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        let primary = MockStore::new();
        let dirty = Arc::new(DirtyTracker::new(broadcaster.clone()));
        let projects = Arc::new(ProjectRegistry::new(broadcaster.clone()));
        let controller = SettingsController::new(
            primary,
            MockStore::new(),
            dirty,
            projects.clone(),
            broadcaster,
            Duration::from_millis(1000),
            Duration::from_secs(12),
        );
        let pid = projects.open_new("Course");

        controller.update(|s| s.pass_mark = 90);
        controller.auto_persist().await;

        loop {
            let ev = rx.recv().await.unwrap();
            if ev.event == "settings.persisted" {
                assert_eq!(ev.params["projectId"], pid.as_str());
                assert_eq!(ev.params["via"], "primary");
                break;
            }
        }
    }
}
