//! Debug console transcript: an append-only log of debuggee output, REPL
//! input and evaluation results, interleaved strictly by arrival order.
//!
//! The transcript is a bounded ring so week-long sessions cannot grow it
//! without limit; once full, the oldest entries fall off the front.

use std::collections::VecDeque;

use strum_macros::Display;

use crate::backend::protocol::OutputCategory;

/// Default number of retained transcript entries.
pub const DEFAULT_TRANSCRIPT_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConsoleCategory {
    Stdout,
    Stderr,
    Info,
    Input,
}

impl From<OutputCategory> for ConsoleCategory {
    fn from(category: OutputCategory) -> Self {
        match category {
            OutputCategory::Stdout => ConsoleCategory::Stdout,
            OutputCategory::Stderr => ConsoleCategory::Stderr,
            OutputCategory::Console | OutputCategory::Important | OutputCategory::Unknown => {
                ConsoleCategory::Info
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleEntry {
    pub category: ConsoleCategory,
    pub text: String,
}

#[derive(Debug)]
pub struct Console {
    entries: VecDeque<ConsoleEntry>,
    capacity: usize,
}

impl Console {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConsoleEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ConsoleEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn push(&mut self, category: ConsoleCategory, text: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(ConsoleEntry {
            category,
            text: text.into(),
        });
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TRANSCRIPT_CAPACITY)
    }
}
