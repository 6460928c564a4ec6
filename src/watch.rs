//! Watch expressions: a user-ordered list re-evaluated against the
//! selected frame on every stop.
//!
//! Expressions outlive stops and whole sessions; their values never do. A
//! failed evaluation is rendered inline for that expression alone, so one
//! malformed watch cannot block the rest. Every refresh carries an epoch:
//! answers from a superseded refresh are dropped instead of misfiled.

use crate::backend::protocol::VarRef;

/// Value of a watch expression at the current stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchValue {
    /// No stopped debuggee to evaluate against.
    Unavailable,
    /// Evaluation requested, the answer is still outstanding.
    Pending,
    /// Successful evaluation; `reference` allows expanding a structured
    /// result through the reference cache.
    Value { rendered: String, reference: VarRef },
    /// Evaluation failed; the message renders in place of a value.
    Error(String),
}

#[derive(Debug, Clone)]
pub struct WatchExpression {
    text: String,
    value: WatchValue,
}

impl WatchExpression {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> &WatchValue {
        &self.value
    }
}

#[derive(Debug, Default)]
pub struct WatchEngine {
    expressions: Vec<WatchExpression>,
    epoch: u64,
}

impl WatchEngine {
    pub fn expressions(&self) -> &[WatchExpression] {
        &self.expressions
    }

    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// Append an expression, initially without a value. Returns its index.
    pub(crate) fn add(&mut self, text: String) -> usize {
        self.expressions.push(WatchExpression {
            text,
            value: WatchValue::Unavailable,
        });
        self.expressions.len() - 1
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<WatchExpression> {
        if index < self.expressions.len() {
            Some(self.expressions.remove(index))
        } else {
            None
        }
    }

    /// Start a refresh: every value becomes pending and answers are only
    /// accepted under the returned epoch.
    pub(crate) fn begin_refresh(&mut self) -> u64 {
        self.epoch += 1;
        for expression in &mut self.expressions {
            expression.value = WatchValue::Pending;
        }
        self.epoch
    }

    /// No evaluation context exists (session not stopped); park every
    /// value on the placeholder and orphan outstanding answers.
    pub(crate) fn mark_unavailable(&mut self) {
        self.epoch += 1;
        for expression in &mut self.expressions {
            expression.value = WatchValue::Unavailable;
        }
    }

    /// Record an answer. Returns false when the answer belongs to a
    /// superseded refresh (or a since-removed expression) and was dropped.
    pub(crate) fn apply(&mut self, index: usize, epoch: u64, value: WatchValue) -> bool {
        if epoch != self.epoch {
            return false;
        }
        match self.expressions.get_mut(index) {
            Some(expression) => {
                expression.value = value;
                true
            }
            None => false,
        }
    }
}
