// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transient warning banner for rejected user edits.

use std::time::{Duration, Instant};

/// A warning shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Text of the warning
    pub message: String,
    /// When the warning disappears
    pub expires_at: Instant,
}

/// Holds at most one warning, which expires on its own.
///
/// Raising a new warning replaces the current one.
#[derive(Debug, Clone)]
pub struct WarningBanner {
    lifetime: Duration,
    current: Option<Warning>,
}

impl WarningBanner {
    /// Banner whose warnings live for `lifetime`
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            current: None,
        }
    }

    /// Show a warning starting now
    pub fn raise(&mut self, message: impl Into<String>) {
        self.raise_at(message, Instant::now());
    }

    /// Show a warning starting at `now`
    pub fn raise_at(&mut self, message: impl Into<String>, now: Instant) {
        let message = message.into();
        tracing::warn!(%message, "Edit rejected");
        self.current = Some(Warning {
            message,
            expires_at: now + self.lifetime,
        });
    }

    /// The warning visible right now
    pub fn active(&self) -> Option<&Warning> {
        self.active_at(Instant::now())
    }

    /// The warning visible at `now`
    pub fn active_at(&self, now: Instant) -> Option<&Warning> {
        self.current.as_ref().filter(|w| now < w.expires_at)
    }

    /// Hide the warning
    pub fn clear(&mut self) {
        self.current = None;
    }
}

impl Default for WarningBanner {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::settings::DEFAULT_WARNING_LIFETIME_MS))
    }
}
