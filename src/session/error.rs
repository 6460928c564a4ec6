use crate::backend::protocol::FrameId;
use crate::session::state::SessionState;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- command gating --------------------------------------------
    #[error("`{command}` is not available while the session is {state}")]
    CommandNotAvailable {
        command: &'static str,
        state: SessionState,
    },
    #[error("a resume command is already awaiting a backend event")]
    ResumeInFlight,
    #[error("a debug session is already active")]
    SessionActive,
    #[error("no active thread to address the command to")]
    NoActiveThread,

    // --------------------------------- lookups ---------------------------------------------------
    #[error("frame {0} does not belong to the current stop")]
    FrameNotFound(FrameId),
    #[error("no watch expression at index {0}")]
    WatchNotFound(usize),

    // --------------------------------- transport -------------------------------------------------
    #[error("backend channel is closed")]
    BackendClosed,
}
