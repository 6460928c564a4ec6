use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};

/// Lifecycle state of a debug session.
///
/// The happy path is `inactive → initializing → running ⇄ stopped →
/// terminated → inactive`; `error` is reached when the backend rejects a
/// launch or fails underneath a live session, and is terminal until the
/// next launch. Backend `state` events are authoritative and adopted
/// verbatim.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionState {
    #[default]
    Inactive,
    Initializing,
    Running,
    Stopped,
    Terminated,
    Error,
}

impl SessionState {
    /// States from which a new `launch` may start.
    pub fn accepts_launch(self) -> bool {
        matches!(
            self,
            SessionState::Inactive | SessionState::Terminated | SessionState::Error
        )
    }

    /// Whether a session exists at all (anything but `inactive`).
    pub fn is_active(self) -> bool {
        self != SessionState::Inactive
    }

    /// Whether the debuggee is paused and inspectable.
    pub fn is_stopped(self) -> bool {
        self == SessionState::Stopped
    }
}
