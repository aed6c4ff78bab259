// SPDX-License-Identifier: MIT
//! Dirty tracking for wizard form sections.
//!
//! Each step of the authoring wizard registers edits against a named section
//! ("courseSettings", "media", …). A section is dirty when its in-memory
//! state differs from the last successfully persisted state. The tracker is
//! shared across steps; the aggregate drives the shell's unsaved-changes
//! indicator.

use crate::events::EventBroadcaster;
use std::collections::HashMap;
use std::sync::Mutex;

pub struct DirtyTracker {
    sections: Mutex<HashMap<String, bool>>,
    broadcaster: EventBroadcaster,
}

impl DirtyTracker {
    pub fn new(broadcaster: EventBroadcaster) -> Self {
        Self {
            sections: Mutex::new(HashMap::new()),
            broadcaster,
        }
    }

    /// Mark a section dirty. Idempotent — repeated marks emit one event.
    pub fn mark_dirty(&self, section: &str) {
        self.set(section, true);
    }

    /// Clear a section's dirty flag. Idempotent.
    pub fn reset_dirty(&self, section: &str) {
        self.set(section, false);
    }

    pub fn is_dirty(&self, section: &str) -> bool {
        self.sections
            .lock()
            .map(|s| s.get(section).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    /// True when any section has unpersisted edits.
    pub fn any_dirty(&self) -> bool {
        self.sections
            .lock()
            .map(|s| s.values().any(|d| *d))
            .unwrap_or(false)
    }

    fn set(&self, section: &str, dirty: bool) {
        let changed = {
            let mut sections = match self.sections.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let prev = sections.insert(section.to_string(), dirty);
            prev.unwrap_or(false) != dirty
        };
        // Only actual transitions are announced
        if changed {
            self.broadcaster.broadcast(
                "dirty.changed",
                serde_json::json!({ "section": section, "dirty": dirty }),
            );
        }
    }
}
