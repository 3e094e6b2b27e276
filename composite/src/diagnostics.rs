//! Warning channel for non-fatal authoring errors
//!
//! Missing states, missing triggers and refused transitions are not errors
//! that stop the runtime. They are logged through `tracing` and kept in a
//! bounded in-memory log so hosts and tests can inspect what went wrong.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use tracing::warn;

/// A recorded warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Tick during which the warning was reported
    pub tick: u64,
    pub message: String,
}

/// Bounded log of reported warnings
#[derive(Debug)]
pub struct Diagnostics {
    source: String,
    capacity: usize,
    tick: Cell<u64>,
    warnings: RefCell<VecDeque<Warning>>,
}

impl Diagnostics {
    /// Create a log keeping at most `capacity` warnings, oldest dropped first
    pub fn new(source: impl Into<String>, capacity: usize) -> Self {
        Self {
            source: source.into(),
            capacity,
            tick: Cell::new(0),
            warnings: RefCell::new(VecDeque::new()),
        }
    }

    /// Log and record a warning
    pub fn report(&self, message: impl Into<String>) {
        let message = message.into();
        let tick = self.tick.get();
        warn!(source = %self.source, tick, "{message}");

        if self.capacity == 0 {
            return;
        }
        let mut warnings = self.warnings.borrow_mut();
        while warnings.len() >= self.capacity {
            warnings.pop_front();
        }
        warnings.push_back(Warning { tick, message });
    }

    pub(crate) fn set_tick(&self, tick: u64) {
        self.tick.set(tick);
    }

    /// All recorded warnings, oldest first
    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.borrow().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<Warning> {
        self.warnings.borrow().back().cloned()
    }

    /// Whether any recorded warning contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.warnings
            .borrow()
            .iter()
            .any(|warning| warning.message.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.warnings.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.warnings.borrow_mut().clear();
    }
}
