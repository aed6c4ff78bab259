// SPDX-License-Identifier: MIT
//! Current-project registry.
//!
//! Owns the "which project is open" state and exposes readiness as an
//! awaitable future with a bounded timeout, so consumers do not each roll
//! their own polling loop. Wizard steps call [`ProjectRegistry::wait_until_ready`]
//! once during initialization; exceeding the budget is soft — the caller
//! proceeds with defaults.

use super::ProjectId;
use crate::events::EventBroadcaster;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

pub struct ProjectRegistry {
    current: watch::Sender<Option<ProjectId>>,
    broadcaster: EventBroadcaster,
}

impl ProjectRegistry {
    pub fn new(broadcaster: EventBroadcaster) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current,
            broadcaster,
        }
    }

    /// Open a brand-new project. Returns its freshly minted id.
    pub fn open_new(&self, name: &str) -> ProjectId {
        let id = ProjectId::generate();
        self.set_current(Some(id.clone()), name);
        id
    }

    /// Make an existing project the current one.
    pub fn open(&self, id: ProjectId, name: &str) {
        self.set_current(Some(id), name);
    }

    /// Close the current project. Persistence becomes a no-op until the next open.
    pub fn close(&self) {
        let previous = self.current.borrow().clone();
        if let Some(id) = previous {
            self.current.send_replace(None);
            info!(project_id = %id, "project closed");
            self.broadcaster.broadcast(
                "project.closed",
                serde_json::json!({ "projectId": id.as_str() }),
            );
        }
    }

    pub fn current(&self) -> Option<ProjectId> {
        self.current.borrow().clone()
    }

    /// Wait until a project is open, up to `max_wait`.
    ///
    /// Returns the project id as soon as one is available — immediately if a
    /// project is already open. Returns `None` when the budget elapses; this
    /// is an expected outcome, not an error, and callers fall back to
    /// defaults.
    pub async fn wait_until_ready(&self, max_wait: Duration) -> Option<ProjectId> {
        if let Some(id) = self.current() {
            return Some(id);
        }
        let mut rx = self.current.subscribe();
        let result = match tokio::time::timeout(max_wait, rx.wait_for(|p| p.is_some())).await {
            Ok(Ok(guard)) => guard.clone(),
            // Sender dropped or budget elapsed — settle on defaults
            _ => {
                debug!(max_wait_ms = max_wait.as_millis() as u64, "readiness budget elapsed");
                None
            }
        };
        result
    }

    fn set_current(&self, id: Option<ProjectId>, name: &str) {
        if let Some(ref id) = id {
            info!(project_id = %id, name, "project opened");
            self.broadcaster.broadcast(
                "project.opened",
                serde_json::json!({ "projectId": id.as_str(), "name": name }),
            );
        }
        self.current.send_replace(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn registry() -> ProjectRegistry {
        ProjectRegistry::new(EventBroadcaster::new())
    }

    #[tokio::test]
    async fn current_is_none_until_open() {
        let r = registry();
        assert!(r.current().is_none());
        let id = r.open_new("Course");
        assert_eq!(r.current(), Some(id));
        r.close();
        assert!(r.current().is_none());
    }

    #[tokio::test]
    async fn ready_immediately_when_already_open() {
        let r = registry();
        let id = r.open_new("Course");
        let got = r.wait_until_ready(Duration::from_millis(1)).await;
        assert_eq!(got, Some(id));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_resolves_when_project_opens_late() {
        let r = Arc::new(registry());
        let r2 = r.clone();
        let waiter = tokio::spawn(async move {
            r2.wait_until_ready(Duration::from_secs(12)).await
        });
        tokio::time::sleep(Duration::from_secs(3)).await;
        let id = r.open_new("Late Course");
        assert_eq!(waiter.await.unwrap(), Some(id));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_gives_up_after_budget() {
        let r = registry();
        let got = r.wait_until_ready(Duration::from_secs(12)).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn close_emits_event() {
        let b = EventBroadcaster::new();
        let mut rx = b.subscribe();
        let r = ProjectRegistry::new(b);
        let id = r.open_new("Course");
        r.close();
        let opened = rx.recv().await.unwrap();
        assert_eq!(opened.event, "project.opened");
        let closed = rx.recv().await.unwrap();
        assert_eq!(closed.event, "project.closed");
        assert_eq!(closed.params["projectId"], id.as_str());
    }
}
