// SPDX-License-Identifier: MIT
//! Course settings — the draft record edited on the settings step.
//!
//! A flat record of independently editable fields. Persisted wholesale under
//! the `"courseSettings"` content key, camelCase on the wire because the
//! web-view shell reads the same record. Out-of-range numeric values are
//! clamped on every mutation and on load — a stored record is repaired, not
//! rejected.

pub mod controller;
pub mod migration;

use serde::{Deserialize, Serialize};

pub use controller::SettingsController;

/// Content key the draft is persisted under.
pub const COURSE_SETTINGS_KEY: &str = "courseSettings";

/// Dirty-tracker section name for the settings step.
pub const COURSE_SETTINGS_SECTION: &str = "courseSettings";

pub const MAX_PASS_MARK: u8 = 100;
pub const MAX_TIME_LIMIT_MINUTES: u32 = 600;
pub const MAX_RETAKE_DELAY_HOURS: u32 = 720;
pub const SESSION_TIMEOUT_RANGE_MINUTES: (u32, u32) = (5, 120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationMode {
    /// Pages must be visited in order.
    Linear,
    /// The learner may jump to any page.
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionCriteria {
    ViewAll,
    ViewAndPass,
    PassAssessment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSize {
    Small,
    Medium,
    Large,
}

/// The settings draft. All fields have fixed defaults; there are no required
/// relationships between fields beyond range clamping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseSettings {
    // Learning control
    pub navigation_mode: NavigationMode,
    pub allow_retake: bool,
    pub require_audio_completion: bool,
    pub auto_advance: bool,

    // Assessment
    pub pass_mark: u8,
    pub completion_criteria: CompletionCriteria,
    pub retake_delay_hours: u32,

    // Interface
    pub show_progress: bool,
    pub show_outline: bool,
    pub confirm_exit: bool,
    pub font_size: FontSize,

    // Timing
    /// 0 = no time limit.
    pub time_limit_minutes: u32,
    pub session_timeout_minutes: u32,

    // Accessibility
    pub keyboard_navigation: bool,
    pub printable: bool,
}

impl Default for CourseSettings {
    fn default() -> Self {
        Self {
            navigation_mode: NavigationMode::Free,
            allow_retake: true,
            require_audio_completion: false,
            auto_advance: false,
            pass_mark: 80,
            completion_criteria: CompletionCriteria::ViewAndPass,
            retake_delay_hours: 0,
            show_progress: true,
            show_outline: true,
            confirm_exit: true,
            font_size: FontSize::Medium,
            time_limit_minutes: 0,
            session_timeout_minutes: 30,
            keyboard_navigation: true,
            printable: false,
        }
    }
}

impl CourseSettings {
    /// Clamp every numeric field into its documented range.
    pub fn clamp_ranges(&mut self) {
        self.pass_mark = self.pass_mark.min(MAX_PASS_MARK);
        self.time_limit_minutes = self.time_limit_minutes.min(MAX_TIME_LIMIT_MINUTES);
        self.retake_delay_hours = self.retake_delay_hours.min(MAX_RETAKE_DELAY_HOURS);
        let (lo, hi) = SESSION_TIMEOUT_RANGE_MINUTES;
        self.session_timeout_minutes = self.session_timeout_minutes.clamp(lo, hi);
    }

    /// True when the record equals the compiled-in defaults.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}
