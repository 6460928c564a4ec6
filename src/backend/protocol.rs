//! Data model of the debug backend protocol.
//!
//! Everything here is issued by the backend and consumed read-only by the
//! engine. Identifier types are opaque: the engine never interprets their
//! numeric value, it only passes them back to the backend. Their lifetime
//! is another matter entirely, see [`VarRef`].

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use strum_macros::{Display, EnumString};

use crate::session::state::SessionState;

/// Identifier of a debuggee execution thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub i64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a stack frame, meaningful only for the lifetime of the
/// current stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub i64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle naming a resolvable set of child variables (a "variables
/// reference").
///
/// `VarRef::NONE` (zero) marks a leaf with no children. Any positive value
/// can be resolved through the reference cache. A reference is valid only
/// until the next resume: the instant execution continues every handle dies,
/// even if the backend reuses the same number afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarRef(pub i64);

impl VarRef {
    pub const NONE: VarRef = VarRef(0);

    /// Whether this reference can be expanded into children.
    pub fn has_children(self) -> bool {
        self.0 > 0
    }
}

impl Default for VarRef {
    fn default() -> Self {
        VarRef::NONE
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single frame of the call stack of a stopped thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    pub id: FrameId,
    pub name: String,
    #[serde(default, rename = "sourcePath")]
    pub source_path: Option<PathBuf>,
    pub line: u32,
    pub column: u32,
}

/// A named group of variables visible at a stack frame (e.g. `Locals`).
///
/// `expensive` scopes are costly for the backend to materialize and are
/// never auto-expanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    pub name: String,
    #[serde(rename = "variablesReference")]
    pub variables_reference: VarRef,
    #[serde(default)]
    pub expensive: bool,
}

/// A resolved variable, possibly itself expandable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: String,
    #[serde(default, rename = "type")]
    pub r#type: Option<String>,
    #[serde(default, rename = "variablesReference")]
    pub variables_reference: VarRef,
}

/// Outcome of an `evaluate` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateResult {
    pub result: String,
    #[serde(default, rename = "type")]
    pub r#type: Option<String>,
    #[serde(default, rename = "variablesReference")]
    pub variables_reference: VarRef,
}

/// Why the debuggee stopped. Reasons this engine has no special handling
/// for collapse into `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StopReason {
    Breakpoint,
    Step,
    Pause,
    Entry,
    Exception,
    Unknown,
}

impl<'de> Deserialize<'de> for StopReason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(StopReason::Unknown))
    }
}

/// Category attached to backend `output` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputCategory {
    Console,
    Stdout,
    Stderr,
    Important,
    Unknown,
}

impl<'de> Deserialize<'de> for OutputCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(OutputCategory::Unknown))
    }
}

/// Which surface an expression is evaluated for. The backend may relax
/// side-effect or formatting rules depending on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EvaluateContext {
    Watch,
    Repl,
}

/// How a session acquires its debuggee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestKind {
    Launch,
    Attach,
}

/// Launch configuration, produced elsewhere and consumed read-only.
///
/// Adapter-specific fields that the engine has no opinion about are kept
/// verbatim in `additional` and handed to the backend untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    #[serde(rename = "type")]
    pub adapter: String,
    pub request: RequestKind,
    pub name: String,
    #[serde(default)]
    pub program: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default, rename = "stopOnEntry")]
    pub stop_on_entry: bool,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

/// Push events emitted by the backend.
///
/// A closed union: adding an event kind is a compile-time-checked change in
/// every handler. Events must be processed in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Event {
    /// Authoritative session state report. The engine adopts it verbatim,
    /// it never predicts `running`/`stopped` on its own.
    State {
        state: SessionState,
        #[serde(default, rename = "threadId")]
        thread_id: Option<ThreadId>,
    },
    /// The debuggee halted; starts the stack/scopes/variables fetch
    /// sequence.
    Stopped {
        reason: StopReason,
        #[serde(rename = "threadId")]
        thread_id: ThreadId,
        #[serde(default)]
        description: Option<String>,
    },
    /// Asynchronous debuggee output.
    Output {
        category: OutputCategory,
        output: String,
    },
    /// Debuggee exit notice; carried like `Output` and handled identically.
    Exited {
        category: OutputCategory,
        output: String,
    },
    /// The debug session is gone.
    Terminated,
}
