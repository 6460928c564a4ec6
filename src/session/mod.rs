//! Session state machine and command dispatch.
//!
//! [`SessionController`] is the single mutator of the engine: UI commands
//! flow down through it into the backend, and backend responses and push
//! events are pumped back through [`SessionController::process`] in arrival
//! order, then fanned out to the stack view, variable tree, watch engine
//! and console. Commands are gated on the current state and never change it
//! optimistically; the backend's events are the only source of truth.
//!
//! The load-bearing concurrency control is the stop generation: every
//! cache-mutating request is tagged with the generation current at issue
//! time, and a response whose generation no longer matches is silently
//! dropped. That is what keeps a slow `variables` answer from resurrecting
//! a reference that died when execution resumed.

pub mod error;
pub mod stack;
pub mod state;

use std::sync::mpsc;

use indexmap::IndexMap;
use itertools::Itertools;

use crate::backend::protocol::{
    EvaluateContext, Event, FrameId, LaunchConfig, OutputCategory, Scope, StackFrame, StopReason,
    ThreadId, VarRef, Variable,
};
use crate::backend::{
    BackendClient, BackendMessage, Request, RequestSeq, ResponseBody, ResponseEnvelope,
};
use crate::console::{Console, ConsoleCategory, ConsoleEntry};
use crate::variable::{Generation, VariableTree};
use crate::watch::{WatchEngine, WatchExpression, WatchValue};
use crate::{ss_debug, ss_error, ss_info, ss_warn};
use error::Error;
use stack::StackView;
use state::SessionState;

/// Observer interface for the presentation layer.
///
/// The controller reports session milestones through this trait. A failing
/// stop hook is logged and never disturbs the session itself.
pub trait SessionHook {
    fn on_state_transition(&self, from: SessionState, to: SessionState);
    fn on_stopped(&self, reason: StopReason, thread: ThreadId) -> anyhow::Result<()>;
    fn on_console(&self, entry: &ConsoleEntry);
    fn on_terminated(&self);
}

/// Hook that ignores every notification.
#[derive(Debug, Default)]
pub struct NopHook;

impl SessionHook for NopHook {
    fn on_state_transition(&self, _: SessionState, _: SessionState) {}

    fn on_stopped(&self, _: StopReason, _: ThreadId) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_console(&self, _: &ConsoleEntry) {}

    fn on_terminated(&self) {}
}

/// Continuation of an outstanding backend request. Cache-mutating kinds
/// carry the stop generation they were issued under.
#[derive(Debug)]
enum Pending {
    Launch,
    /// A resume-class command (`continue`/`step*`): a rejection must clear
    /// the resume latch so the user can retry.
    Resume(&'static str),
    /// Any other fire-and-forget command, by protocol name.
    Command(&'static str),
    StackTrace {
        generation: Generation,
    },
    Scopes {
        generation: Generation,
        frame: FrameId,
        auto_expand: bool,
    },
    Variables {
        generation: Generation,
        reference: VarRef,
    },
    WatchEvaluate {
        generation: Generation,
        epoch: u64,
        index: usize,
    },
    ReplEvaluate,
}

/// The debug session: one per debug attempt, owning all client-side state.
pub struct SessionController<H: SessionHook = NopHook> {
    client: BackendClient,
    hook: H,
    state: SessionState,
    active_thread: Option<ThreadId>,
    launch_config: Option<LaunchConfig>,
    stack: StackView,
    tree: VariableTree,
    watches: WatchEngine,
    console: Console,
    pending: IndexMap<RequestSeq, Pending>,
    resume_in_flight: bool,
    stale_drops: u64,
}

impl SessionController<NopHook> {
    /// Controller without a presentation hook.
    pub fn new(client: BackendClient) -> Self {
        Self::with_hook(client, NopHook)
    }
}

impl<H: SessionHook> SessionController<H> {
    pub fn with_hook(client: BackendClient, hook: H) -> Self {
        Self {
            client,
            hook,
            state: SessionState::default(),
            active_thread: None,
            launch_config: None,
            stack: StackView::default(),
            tree: VariableTree::default(),
            watches: WatchEngine::default(),
            console: Console::default(),
            pending: IndexMap::new(),
            resume_in_flight: false,
            stale_drops: 0,
        }
    }

    /// Replace the transcript with one of the given capacity. Intended for
    /// construction time; an existing transcript is discarded.
    pub fn with_console_capacity(mut self, capacity: usize) -> Self {
        self.console = Console::with_capacity(capacity);
        self
    }

    // --------------------------------- upward interface ------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn active_thread(&self) -> Option<ThreadId> {
        self.active_thread
    }

    pub fn launch_config(&self) -> Option<&LaunchConfig> {
        self.launch_config.as_ref()
    }

    pub fn stack_frames(&self) -> &[StackFrame] {
        self.stack.frames()
    }

    pub fn selected_frame(&self) -> Option<FrameId> {
        self.stack.selected_frame()
    }

    pub fn scopes(&self) -> &[Scope] {
        self.stack.scopes()
    }

    /// Resolved children of `reference` within the current stop, if any.
    pub fn variables(&self, reference: VarRef) -> Option<&[Variable]> {
        self.tree.children(reference)
    }

    pub fn is_expanded(&self, reference: VarRef) -> bool {
        self.tree.is_expanded(reference)
    }

    pub fn watches(&self) -> &[WatchExpression] {
        self.watches.expressions()
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Number of backend responses dropped because their stop generation
    /// had already been invalidated.
    pub fn stale_drops(&self) -> u64 {
        self.stale_drops
    }

    // --------------------------------- commands --------------------------------------------------

    /// Start a new debug session.
    ///
    /// Only allowed while no session is active; a live session must be
    /// terminated first. All state derived from a previous session (stack,
    /// variables, transcript, watch values) is reset before the backend
    /// call goes out. Watch expressions themselves persist.
    pub fn launch(&mut self, config: LaunchConfig) -> Result<(), Error> {
        if !self.state.accepts_launch() {
            return Err(Error::SessionActive);
        }

        self.reset_derived_state();
        let cwd = config.cwd.clone();
        self.launch_config = Some(config.clone());
        let seq = self.client.send(Request::Launch { config, cwd })?;
        self.pending.insert(seq, Pending::Launch);
        self.transition(SessionState::Initializing);
        Ok(())
    }

    /// Ask the backend to tear the session down. Allowed in every state
    /// except `inactive`; the actual cleanup happens when the `terminated`
    /// event arrives.
    pub fn terminate(&mut self) -> Result<(), Error> {
        if !self.state.is_active() {
            return Err(Error::CommandNotAvailable {
                command: "terminate",
                state: self.state,
            });
        }
        let seq = self.client.send(Request::Terminate)?;
        self.pending.insert(seq, Pending::Command("terminate"));
        Ok(())
    }

    /// Restart the debuggee within the same session. Execution is about to
    /// resume, so every reference of the current stop dies now.
    pub fn restart(&mut self) -> Result<(), Error> {
        if !self.state.is_active() {
            return Err(Error::CommandNotAvailable {
                command: "restart",
                state: self.state,
            });
        }
        self.invalidate_for_resume();
        self.push_console(ConsoleCategory::Info, "Restarting debug session");
        let seq = self.client.send(Request::Restart)?;
        self.pending.insert(seq, Pending::Command("restart"));
        Ok(())
    }

    /// Resume the debuggee (`continue` request).
    pub fn resume(&mut self) -> Result<(), Error> {
        self.resume_command("continue", |thread| Request::Continue { thread })
    }

    pub fn step_over(&mut self) -> Result<(), Error> {
        self.resume_command("stepOver", |thread| Request::StepOver { thread })
    }

    pub fn step_into(&mut self) -> Result<(), Error> {
        self.resume_command("stepInto", |thread| Request::StepInto { thread })
    }

    pub fn step_out(&mut self) -> Result<(), Error> {
        self.resume_command("stepOut", |thread| Request::StepOut { thread })
    }

    /// Interrupt a running debuggee.
    pub fn pause(&mut self) -> Result<(), Error> {
        if self.state != SessionState::Running {
            return Err(Error::CommandNotAvailable {
                command: "pause",
                state: self.state,
            });
        }
        let thread = self.active_thread.ok_or(Error::NoActiveThread)?;
        let seq = self.client.send(Request::Pause { thread })?;
        self.pending.insert(seq, Pending::Command("pause"));
        Ok(())
    }

    /// Select a frame of the current stop: re-fetches its scopes and
    /// re-evaluates the watches in its context. The variable cache is left
    /// alone, references are valid for the whole stop.
    pub fn select_frame(&mut self, frame: FrameId) -> Result<(), Error> {
        if !self.state.is_stopped() {
            return Err(Error::CommandNotAvailable {
                command: "selectFrame",
                state: self.state,
            });
        }
        if !self.stack.contains(frame) {
            return Err(Error::FrameNotFound(frame));
        }
        self.stack.select(frame);
        self.issue_scopes(frame, false)?;
        self.refresh_watches()
    }

    /// Expand a node of the variable tree. Idempotent: a reference that is
    /// cached or already being fetched issues no second backend call.
    pub fn expand(&mut self, reference: VarRef) -> Result<(), Error> {
        if !reference.has_children() {
            return Ok(());
        }
        if !self.state.is_stopped() {
            return Err(Error::CommandNotAvailable {
                command: "expand",
                state: self.state,
            });
        }
        self.tree.mark_expanded(reference);
        if !self.tree.needs_fetch(reference) {
            return Ok(());
        }
        self.issue_variables(reference)
    }

    /// Collapse a node. View state only; the cached children stay, so
    /// re-expanding is free.
    pub fn collapse(&mut self, reference: VarRef) {
        self.tree.collapse(reference);
    }

    /// Append a watch expression. Expressions persist across stops and
    /// sessions; while stopped, all watches are re-evaluated right away.
    pub fn add_watch(&mut self, text: impl Into<String>) -> Result<usize, Error> {
        let index = self.watches.add(text.into());
        self.refresh_watches()?;
        Ok(index)
    }

    pub fn remove_watch(&mut self, index: usize) -> Result<(), Error> {
        self.watches
            .remove(index)
            .ok_or(Error::WatchNotFound(index))?;
        self.refresh_watches()
    }

    /// Submit a REPL expression. The `input` entry is transcribed
    /// immediately so the transcript shows the command even while the
    /// evaluation is still on the wire.
    pub fn submit(&mut self, expression: impl Into<String>) -> Result<(), Error> {
        if !self.state.is_stopped() {
            return Err(Error::CommandNotAvailable {
                command: "evaluate",
                state: self.state,
            });
        }
        let expression = expression.into();
        self.push_console(ConsoleCategory::Input, expression.clone());
        let frame = self.stack.selected_frame();
        let seq = self.client.send(Request::Evaluate {
            expression,
            frame,
            context: EvaluateContext::Repl,
        })?;
        self.pending.insert(seq, Pending::ReplEvaluate);
        Ok(())
    }

    // --------------------------------- message ingestion -----------------------------------------

    /// Feed one backend message into the session. Messages must be
    /// processed in arrival order; this is the only mutation entry point
    /// besides the command methods.
    pub fn process(&mut self, message: BackendMessage) {
        match message {
            BackendMessage::Event(event) => self.handle_event(event),
            BackendMessage::Response(response) => self.handle_response(response),
        }
    }

    /// Drain every message currently queued on `receiver`.
    pub fn pump(&mut self, receiver: &mpsc::Receiver<BackendMessage>) {
        while let Ok(message) = receiver.try_recv() {
            self.process(message);
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::State { state, thread_id } => self.on_state_event(state, thread_id),
            Event::Stopped {
                reason,
                thread_id,
                description,
            } => self.on_stopped_event(reason, thread_id, description),
            Event::Output { category, output } | Event::Exited { category, output } => {
                self.on_output_event(category, output)
            }
            Event::Terminated => self.on_terminated_event(),
        }
    }

    fn on_state_event(&mut self, state: SessionState, thread: Option<ThreadId>) {
        if let Some(thread) = thread {
            self.active_thread = Some(thread);
        }
        self.resume_in_flight = false;
        self.transition(state);
    }

    fn on_stopped_event(
        &mut self,
        reason: StopReason,
        thread: ThreadId,
        description: Option<String>,
    ) {
        self.resume_in_flight = false;
        self.active_thread = Some(thread);
        // a stop begins a fresh generation even when no client command
        // caused it (breakpoint hit, stop-on-entry, attach)
        self.tree.invalidate_all();
        self.stack.clear();
        self.transition(SessionState::Stopped);

        let marker = match &description {
            Some(description) => format!("Stopped: {reason} ({description})"),
            None => format!("Stopped: {reason}"),
        };
        self.push_console(ConsoleCategory::Info, marker);
        if let Err(e) = self.hook.on_stopped(reason, thread) {
            ss_error!(target: "session", "stop hook failed: {e}");
        }

        if let Err(e) = self.issue_stack_trace(thread) {
            ss_warn!(target: "session", "stack trace request failed: {e}");
        }
    }

    fn on_output_event(&mut self, category: OutputCategory, output: String) {
        let text = output.trim_end_matches(['\r', '\n']).to_string();
        self.push_console(category.into(), text);
    }

    fn on_terminated_event(&mut self) {
        self.tree.invalidate_all();
        self.stack.clear();
        self.watches.mark_unavailable();
        self.active_thread = None;
        self.resume_in_flight = false;
        self.push_console(ConsoleCategory::Info, "Debug session terminated");
        self.transition(SessionState::Inactive);
        self.hook.on_terminated();
    }

    fn handle_response(&mut self, response: ResponseEnvelope) {
        let Some(pending) = self.pending.swap_remove(&response.request_seq) else {
            ss_debug!(
                target: "session",
                "dropping response to unknown request {}",
                response.request_seq
            );
            return;
        };

        match pending {
            Pending::Launch => self.on_launch_response(response.result),
            Pending::Resume(name) => self.on_resume_response(name, response.result),
            Pending::Command(name) => self.on_command_response(name, response.result),
            Pending::StackTrace { generation } => {
                self.on_stack_trace_response(generation, response.result)
            }
            Pending::Scopes {
                generation,
                frame,
                auto_expand,
            } => self.on_scopes_response(generation, frame, auto_expand, response.result),
            Pending::Variables {
                generation,
                reference,
            } => self.on_variables_response(generation, reference, response.result),
            Pending::WatchEvaluate {
                generation,
                epoch,
                index,
            } => self.on_watch_response(generation, epoch, index, response.result),
            Pending::ReplEvaluate => self.on_repl_response(response.result),
        }
    }

    fn on_launch_response(&mut self, result: Result<ResponseBody, String>) {
        match result {
            Ok(_) => ss_info!(target: "session", "launch accepted by backend"),
            Err(message) => {
                self.push_console(ConsoleCategory::Stderr, format!("launch failed: {message}"));
                self.transition(SessionState::Error);
            }
        }
    }

    fn on_resume_response(&mut self, name: &'static str, result: Result<ResponseBody, String>) {
        match result {
            // the state change arrives as a backend event, nothing to do
            Ok(_) => {}
            Err(message) => {
                self.resume_in_flight = false;
                self.push_console(ConsoleCategory::Stderr, format!("{name} failed: {message}"));
            }
        }
    }

    fn on_command_response(&mut self, name: &'static str, result: Result<ResponseBody, String>) {
        if let Err(message) = result {
            self.push_console(ConsoleCategory::Stderr, format!("{name} failed: {message}"));
        }
    }

    fn on_stack_trace_response(
        &mut self,
        generation: Generation,
        result: Result<ResponseBody, String>,
    ) {
        if self.is_stale(generation) {
            return;
        }
        match result {
            Ok(ResponseBody::StackTrace(frames)) => {
                self.stack.set_frames(frames);
                let Some(frame) = self.stack.frames().first().map(|f| f.id) else {
                    return;
                };
                self.stack.select(frame);
                if let Err(e) = self.issue_scopes(frame, true) {
                    ss_warn!(target: "session", "scopes request failed: {e}");
                }
                if let Err(e) = self.refresh_watches() {
                    ss_warn!(target: "session", "watch refresh failed: {e}");
                }
            }
            Ok(body) => ss_warn!(
                target: "session",
                "stackTrace answered with mismatched body: {body:?}"
            ),
            // the stack panel stays empty, the session stays stopped
            Err(message) => {
                ss_warn!(target: "session", "stack trace fetch failed: {message}")
            }
        }
    }

    fn on_scopes_response(
        &mut self,
        generation: Generation,
        frame: FrameId,
        auto_expand: bool,
        result: Result<ResponseBody, String>,
    ) {
        if self.is_stale(generation) {
            return;
        }
        match result {
            Ok(ResponseBody::Scopes(scopes)) => {
                if !self.stack.set_scopes(frame, scopes) {
                    ss_debug!(
                        target: "session",
                        "dropping scopes for frame {frame}, selection moved on"
                    );
                    return;
                }
                if !auto_expand {
                    return;
                }
                if let Some(reference) = auto_expand_target(self.stack.scopes()) {
                    if let Err(e) = self.expand(reference) {
                        ss_warn!(target: "session", "auto-expand failed: {e}");
                    }
                }
            }
            Ok(body) => ss_warn!(
                target: "session",
                "scopes answered with mismatched body: {body:?}"
            ),
            Err(message) => {
                ss_warn!(
                    target: "session",
                    "scopes fetch for frame {frame} failed: {message}"
                )
            }
        }
    }

    fn on_variables_response(
        &mut self,
        generation: Generation,
        reference: VarRef,
        result: Result<ResponseBody, String>,
    ) {
        if self.is_stale(generation) {
            // the tree was cleared with this generation, nothing to undo
            return;
        }
        match result {
            Ok(ResponseBody::Variables(variables)) => self.tree.resolve(reference, variables),
            Ok(body) => ss_warn!(
                target: "session",
                "variables answered with mismatched body: {body:?}"
            ),
            Err(message) => {
                self.tree.abort_fetch(reference);
                ss_warn!(
                    target: "session",
                    "variables fetch for {reference} failed: {message}"
                );
            }
        }
    }

    fn on_watch_response(
        &mut self,
        generation: Generation,
        epoch: u64,
        index: usize,
        result: Result<ResponseBody, String>,
    ) {
        if self.is_stale(generation) {
            return;
        }
        let value = match result {
            Ok(ResponseBody::Evaluate(evaluated)) => WatchValue::Value {
                rendered: evaluated.result,
                reference: evaluated.variables_reference,
            },
            Ok(body) => {
                ss_warn!(
                    target: "session",
                    "watch evaluate answered with mismatched body: {body:?}"
                );
                return;
            }
            Err(message) => WatchValue::Error(message),
        };
        if !self.watches.apply(index, epoch, value) {
            ss_debug!(
                target: "session",
                "dropping watch result from a superseded refresh"
            );
        }
    }

    fn on_repl_response(&mut self, result: Result<ResponseBody, String>) {
        // the transcript is a log: results are appended on arrival, even if
        // execution resumed since the submission
        match result {
            Ok(ResponseBody::Evaluate(evaluated)) => {
                self.push_console(ConsoleCategory::Stdout, evaluated.result);
            }
            Ok(body) => ss_warn!(
                target: "session",
                "evaluate answered with mismatched body: {body:?}"
            ),
            Err(message) => self.push_console(ConsoleCategory::Stderr, message),
        }
    }

    // --------------------------------- internals -------------------------------------------------

    fn resume_command(
        &mut self,
        name: &'static str,
        make: impl FnOnce(ThreadId) -> Request,
    ) -> Result<(), Error> {
        if !self.state.is_stopped() {
            return Err(Error::CommandNotAvailable {
                command: name,
                state: self.state,
            });
        }
        if self.resume_in_flight {
            return Err(Error::ResumeInFlight);
        }
        let thread = self.active_thread.ok_or(Error::NoActiveThread)?;
        self.invalidate_for_resume();
        let seq = self.client.send(make(thread))?;
        self.pending.insert(seq, Pending::Resume(name));
        self.resume_in_flight = true;
        Ok(())
    }

    /// Execution is about to resume: every reference of the current stop
    /// dies, centrally and immediately. In-flight responses die with it via
    /// the generation check.
    fn invalidate_for_resume(&mut self) {
        self.tree.invalidate_all();
        self.stack.clear();
        self.watches.mark_unavailable();
    }

    fn reset_derived_state(&mut self) {
        self.tree.invalidate_all();
        self.stack.clear();
        self.watches.mark_unavailable();
        self.console.clear();
        self.pending.clear();
        self.launch_config = None;
        self.active_thread = None;
        self.resume_in_flight = false;
    }

    fn issue_stack_trace(&mut self, thread: ThreadId) -> Result<(), Error> {
        let seq = self.client.send(Request::StackTrace { thread })?;
        self.pending.insert(
            seq,
            Pending::StackTrace {
                generation: self.tree.generation(),
            },
        );
        Ok(())
    }

    fn issue_scopes(&mut self, frame: FrameId, auto_expand: bool) -> Result<(), Error> {
        let seq = self.client.send(Request::Scopes { frame })?;
        self.pending.insert(
            seq,
            Pending::Scopes {
                generation: self.tree.generation(),
                frame,
                auto_expand,
            },
        );
        Ok(())
    }

    fn issue_variables(&mut self, reference: VarRef) -> Result<(), Error> {
        let seq = self.client.send(Request::Variables { reference })?;
        self.pending.insert(
            seq,
            Pending::Variables {
                generation: self.tree.generation(),
                reference,
            },
        );
        self.tree.begin_fetch(reference);
        Ok(())
    }

    /// Re-evaluate every watch against the selected frame. Without a
    /// stopped debuggee (or a frame to evaluate in) the values fall back to
    /// the "not available" placeholder and no backend calls are made.
    fn refresh_watches(&mut self) -> Result<(), Error> {
        let frame = match self.stack.selected_frame() {
            Some(frame) if self.state.is_stopped() => frame,
            _ => {
                self.watches.mark_unavailable();
                return Ok(());
            }
        };
        let epoch = self.watches.begin_refresh();
        for index in 0..self.watches.len() {
            let expression = self.watches.expressions()[index].text().to_string();
            let seq = self.client.send(Request::Evaluate {
                expression,
                frame: Some(frame),
                context: EvaluateContext::Watch,
            })?;
            self.pending.insert(
                seq,
                Pending::WatchEvaluate {
                    generation: self.tree.generation(),
                    epoch,
                    index,
                },
            );
        }
        Ok(())
    }

    fn is_stale(&mut self, generation: Generation) -> bool {
        if generation == self.tree.generation() {
            return false;
        }
        self.stale_drops += 1;
        ss_debug!(
            target: "session",
            "dropping response from stale generation {generation}"
        );
        true
    }

    fn push_console(&mut self, category: ConsoleCategory, text: impl Into<String>) {
        self.console.push(category, text);
        if let Some(entry) = self.console.last() {
            self.hook.on_console(entry);
        }
    }

    fn transition(&mut self, to: SessionState) {
        if self.state == to {
            return;
        }
        let from = std::mem::replace(&mut self.state, to);
        ss_debug!(target: "session", "session state: {from} -> {to}");
        self.hook.on_state_transition(from, to);
    }
}

/// The scope opened by default on a stop: `Local`/`Locals` when the
/// backend marks it cheap, otherwise the first non-expensive scope.
fn auto_expand_target(scopes: &[Scope]) -> Option<VarRef> {
    scopes
        .iter()
        .filter(|scope| !scope.expensive && scope.variables_reference.has_children())
        .find_or_first(|scope| {
            scope.name.eq_ignore_ascii_case("local") || scope.name.eq_ignore_ascii_case("locals")
        })
        .map(|scope| scope.variables_reference)
}
