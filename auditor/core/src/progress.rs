//! Progress Presentation
//!
//! Maps the latest progress event to something drawable. Streaming transports
//! provide a percent; the polling strategy cannot, so its in-flight state is
//! shown as indeterminate.
//!
//! The presenter's only state is a memo of the last event, used to suppress
//! redundant redraws. A percent lower than the previous one is drawn as-is
//! and flagged as a display anomaly; it is not an error.

use serde::{Deserialize, Serialize};

use crate::events::ProgressEvent;

/// Width used by [`ProgressDisplay::render_bar`] callers that do not care
pub const DEFAULT_BAR_WIDTH: usize = 24;

/// Phase of the display
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressPhase {
    /// In flight without a known percent (polling)
    Indeterminate,
    /// In flight with a known percent below 100
    InFlight,
    /// Reached 100
    Complete,
}

/// Drawable progress state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressDisplay {
    /// Clamped percent, `None` when indeterminate
    pub percent: Option<u8>,
    /// Step description
    pub message: String,
    /// Display phase
    pub phase: ProgressPhase,
    /// Percent went backwards relative to the previous event
    pub regressed: bool,
}

impl ProgressDisplay {
    /// Glyph for the phase
    #[must_use]
    pub fn glyph(&self) -> &'static str {
        match self.phase {
            ProgressPhase::Indeterminate => "…",
            ProgressPhase::InFlight => "⏳",
            ProgressPhase::Complete => "✅",
        }
    }

    /// Single-line text rendering, e.g. `⏳ [██████░░░░] 60% Analyzing security...`
    #[must_use]
    pub fn render_bar(&self, width: usize) -> String {
        let bar = match self.percent {
            Some(percent) => {
                let filled = usize::from(percent) * width / 100;
                format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
            }
            None => "·".repeat(width),
        };
        let label = self
            .percent
            .map(|p| format!(" {p:>3}%"))
            .unwrap_or_default();
        format!("{} [{bar}]{label} {}", self.glyph(), self.message)
            .trim_end()
            .to_string()
    }
}

/// Turns progress events into displays
#[derive(Debug, Default)]
pub struct ProgressPresenter {
    last: Option<ProgressEvent>,
}

impl ProgressPresenter {
    /// Create a presenter with no memo
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Present a progress event
    ///
    /// Returns `None` when the event is identical to the previous one.
    pub fn present(&mut self, event: &ProgressEvent) -> Option<ProgressDisplay> {
        if self.last.as_ref() == Some(event) {
            return None;
        }

        let percent = clamp_percent(event.percent);
        let regressed = self
            .last
            .as_ref()
            .is_some_and(|last| clamp_percent(last.percent) > percent);
        let phase = if percent >= 100 {
            ProgressPhase::Complete
        } else {
            ProgressPhase::InFlight
        };

        self.last = Some(event.clone());
        Some(ProgressDisplay {
            percent: Some(percent),
            message: event.message.clone(),
            phase,
            regressed,
        })
    }

    /// Indeterminate display for strategies that report no percent
    pub fn indeterminate(&mut self, message: impl Into<String>) -> ProgressDisplay {
        self.last = None;
        ProgressDisplay {
            percent: None,
            message: message.into(),
            phase: ProgressPhase::Indeterminate,
            regressed: false,
        }
    }

    /// Forget the memoized event
    pub fn reset(&mut self) {
        self.last = None;
    }
}

fn clamp_percent(percent: i64) -> u8 {
    // Lossless: the value is clamped into 0..=100 first
    u8::try_from(percent.clamp(0, 100)).unwrap_or(100)
}
