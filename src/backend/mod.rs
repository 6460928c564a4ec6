//! Contract of the external debug backend service.
//!
//! The backend is the adapter that actually controls the debuggee: it
//! spawns or attaches to the process, sets breakpoints, steps and evaluates
//! expressions. This engine only consumes it. Requests flow out through
//! [`BackendClient`] as [`RequestEnvelope`]s over an mpsc channel; the host
//! pumps matched responses and unsolicited push events back into the
//! session controller as [`BackendMessage`]s, strictly in arrival order.

pub mod protocol;

use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc;

use serde::{Deserialize, Serialize};

use crate::session::error::Error;
use protocol::{
    EvaluateContext, EvaluateResult, Event, FrameId, LaunchConfig, Scope, StackFrame, ThreadId,
    VarRef, Variable,
};

/// Monotonically increasing sequence number allocated per request, used to
/// match a response to the request that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestSeq(u64);

impl fmt::Display for RequestSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requests understood by the backend, one variant per protocol operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Request {
    Launch {
        config: LaunchConfig,
        cwd: Option<PathBuf>,
    },
    Terminate,
    Restart,
    Continue {
        thread: ThreadId,
    },
    Pause {
        thread: ThreadId,
    },
    StepOver {
        thread: ThreadId,
    },
    StepInto {
        thread: ThreadId,
    },
    StepOut {
        thread: ThreadId,
    },
    StackTrace {
        thread: ThreadId,
    },
    Scopes {
        frame: FrameId,
    },
    Variables {
        reference: VarRef,
    },
    Evaluate {
        expression: String,
        frame: Option<FrameId>,
        context: EvaluateContext,
    },
}

impl Request {
    /// Protocol name of the operation, for logs and transcripts.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Launch { .. } => "launch",
            Request::Terminate => "terminate",
            Request::Restart => "restart",
            Request::Continue { .. } => "continue",
            Request::Pause { .. } => "pause",
            Request::StepOver { .. } => "stepOver",
            Request::StepInto { .. } => "stepInto",
            Request::StepOut { .. } => "stepOut",
            Request::StackTrace { .. } => "stackTrace",
            Request::Scopes { .. } => "scopes",
            Request::Variables { .. } => "variables",
            Request::Evaluate { .. } => "evaluate",
        }
    }
}

/// A request together with its sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub seq: RequestSeq,
    pub request: Request,
}

/// Successful payloads of backend responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseBody {
    /// Plain acknowledgement of a fire-and-forget command.
    Ack,
    StackTrace(Vec<StackFrame>),
    Scopes(Vec<Scope>),
    Variables(Vec<Variable>),
    Evaluate(EvaluateResult),
}

/// A backend answer to one request. Rejections carry the backend's
/// human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "requestSeq")]
    pub request_seq: RequestSeq,
    pub result: Result<ResponseBody, String>,
}

/// Everything the backend sends upward, multiplexed on one channel so the
/// engine observes it in arrival order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BackendMessage {
    Response(ResponseEnvelope),
    Event(Event),
}

/// Client half of the backend request channel.
///
/// Allocates sequence numbers and hands envelopes to whatever transport the
/// host wired up (a debug adapter process, a socket, a test double).
#[derive(Debug)]
pub struct BackendClient {
    sender: mpsc::Sender<RequestEnvelope>,
    next_seq: u64,
}

impl BackendClient {
    pub fn new(sender: mpsc::Sender<RequestEnvelope>) -> Self {
        Self {
            sender,
            next_seq: 1,
        }
    }

    /// Create a client together with the receiving half of its channel.
    pub fn channel() -> (Self, mpsc::Receiver<RequestEnvelope>) {
        let (sender, receiver) = mpsc::channel();
        (Self::new(sender), receiver)
    }

    /// Send a request to the backend, returning the allocated sequence
    /// number so the caller can recognize the response.
    pub fn send(&mut self, request: Request) -> Result<RequestSeq, Error> {
        let seq = RequestSeq(self.next_seq);
        self.next_seq += 1;
        self.sender
            .send(RequestEnvelope { seq, request })
            .map_err(|_| Error::BackendClosed)?;
        Ok(seq)
    }
}
