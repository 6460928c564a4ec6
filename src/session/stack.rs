use crate::backend::protocol::{FrameId, Scope, StackFrame};

/// Call stack of the current stop and the scopes of the selected frame.
///
/// Frames live exactly one stop: a resume clears them, the next stop
/// replaces them. The scope list always describes the selected frame and is
/// emptied while a reselection is in flight; variable subtrees resolved for
/// other frames stay in the reference cache because references are scoped
/// to the whole stop, not to one frame.
#[derive(Debug, Default)]
pub struct StackView {
    frames: Vec<StackFrame>,
    selected: Option<FrameId>,
    scopes: Vec<Scope>,
}

impl StackView {
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    pub fn selected_frame(&self) -> Option<FrameId> {
        self.selected
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub(crate) fn contains(&self, frame: FrameId) -> bool {
        self.frames.iter().any(|f| f.id == frame)
    }

    /// Install the frame list of a fresh stop. Selection and scopes belong
    /// to the previous list and are dropped with it.
    pub(crate) fn set_frames(&mut self, frames: Vec<StackFrame>) {
        self.frames = frames;
        self.selected = None;
        self.scopes.clear();
    }

    /// Select a frame; its scopes are unknown until the backend answers.
    pub(crate) fn select(&mut self, frame: FrameId) {
        self.selected = Some(frame);
        self.scopes.clear();
    }

    /// Install scopes fetched for `frame`. Returns false (and changes
    /// nothing) when the selection moved on while the fetch was in flight.
    pub(crate) fn set_scopes(&mut self, frame: FrameId, scopes: Vec<Scope>) -> bool {
        if self.selected != Some(frame) {
            return false;
        }
        self.scopes = scopes;
        true
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
        self.selected = None;
        self.scopes.clear();
    }
}
