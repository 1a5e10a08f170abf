//! Session Updates
//!
//! Messages sent from the driver to the surface. The surface holds no audit
//! logic: it disables or enables its submit control, redraws progress, shows
//! notices and renders the stored report when told to.

use serde::{Deserialize, Serialize};

use crate::progress::ProgressDisplay;
use crate::session::{AttemptId, SessionState};
use crate::transport::TransportStrategy;

/// Notification severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Informational
    Info,
    /// Something degraded but the attempt continues
    Warning,
    /// The attempt failed; blocking notification
    Error,
}

/// Messages from the driver to the surface
#[derive(Clone, Debug, PartialEq)]
pub enum SessionUpdate {
    /// The session moved to a new state
    StateChanged {
        /// Attempt the transition belongs to
        attempt: AttemptId,
        /// New state
        state: SessionState,
    },

    /// Enable or disable the submit control
    SubmitEnabled(bool),

    /// Redraw the progress display
    Progress {
        /// Attempt the progress belongs to
        attempt: AttemptId,
        /// What to draw
        display: ProgressDisplay,
    },

    /// Remove any progress display
    ProgressCleared,

    /// Strategy serving the attempt (reported when an attempt starts)
    TransportSelected {
        /// Attempt being served
        attempt: AttemptId,
        /// Strategy in use
        strategy: TransportStrategy,
    },

    /// A report is stored and ready to render
    ReportReady {
        /// Attempt that produced the report
        attempt: AttemptId,
    },

    /// User-visible notice
    Notice {
        /// Severity
        level: NotifyLevel,
        /// Message text
        message: String,
    },
}

impl SessionUpdate {
    /// Create an error notice
    pub fn error(message: impl Into<String>) -> Self {
        Self::Notice {
            level: NotifyLevel::Error,
            message: message.into(),
        }
    }

    /// Create a warning notice
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Notice {
            level: NotifyLevel::Warning,
            message: message.into(),
        }
    }
}
