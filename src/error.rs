// SPDX-License-Identifier: MIT
//! Error taxonomy for the persistence layer.
//!
//! Every variant here degrades locally — a failed read falls back to
//! defaults, a failed write leaves the section dirty. Nothing in this
//! taxonomy is ever surfaced as a blocking dialog or stops step navigation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached at all (pool gone, disk gone).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A read completed abnormally (corrupt row, deserialization failure).
    #[error("failed to read '{key}': {reason}")]
    ReadFailed { key: String, reason: String },

    /// A write was attempted and did not land.
    #[error("failed to write '{key}': {reason}")]
    WriteFailed { key: String, reason: String },

    /// No project is open. Expected state, not a fault — callers no-op.
    #[error("no project open")]
    NoProjectOpen,
}

impl StoreError {
    pub fn read(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::ReadFailed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::WriteFailed {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}
