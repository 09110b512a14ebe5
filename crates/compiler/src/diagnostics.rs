//! Sink for observer errors.
//!
//! Observer failures never abort a compile or a `set`; they are logged
//! and collected here so callers can inspect them afterwards. Only the
//! most recent errors are kept. Older ones are counted and dropped.

use crate::error::ObserverError;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Errors kept by [`Diagnostics::new`].
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug)]
struct Sink {
    errors: RefCell<VecDeque<ObserverError>>,
    capacity: usize,
    reported: Cell<usize>,
}

/// Shared per compiled program. Clones refer to the same list.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    sink: Rc<Sink>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Diagnostics {
            sink: Rc::new(Sink {
                errors: RefCell::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
                capacity,
                reported: Cell::new(0),
            }),
        }
    }

    pub fn report(&self, error: ObserverError) {
        tracing::warn!("{}", error);
        let sink = &self.sink;
        sink.reported.set(sink.reported.get().saturating_add(1));
        if sink.capacity == 0 {
            return;
        }
        let mut errors = sink.errors.borrow_mut();
        if errors.len() == sink.capacity {
            errors.pop_front();
        }
        errors.push_back(error);
    }

    /// Kept errors, oldest first.
    pub fn errors(&self) -> Vec<ObserverError> {
        self.sink.errors.borrow().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sink.errors.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sink.errors.borrow().is_empty()
    }

    /// Every error reported since the last [`clear`](Self::clear),
    /// including dropped ones.
    pub fn reported(&self) -> usize {
        self.sink.reported.get()
    }

    pub fn dropped(&self) -> usize {
        self.reported() - self.len()
    }

    pub fn clear(&self) {
        self.sink.errors.borrow_mut().clear();
        self.sink.reported.set(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn released(listener: &str) -> ObserverError {
        ObserverError::Released {
            listener: listener.to_string(),
        }
    }

    #[test]
    fn test_clones_share_errors() {
        let diagnostics = Diagnostics::new();
        let other = diagnostics.clone();
        other.report(released("f"));
        assert_eq!(diagnostics.len(), 1);
        diagnostics.clear();
        assert!(other.is_empty());
        assert_eq!(other.reported(), 0);
    }

    #[test]
    fn test_keeps_most_recent_errors() {
        let diagnostics = Diagnostics::with_capacity(3);
        for i in 0..10 {
            diagnostics.report(released(&format!("f{}", i)));
        }
        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics.reported(), 10);
        assert_eq!(diagnostics.dropped(), 7);
        assert_eq!(
            diagnostics.errors(),
            vec![released("f7"), released("f8"), released("f9")]
        );
    }

    #[test]
    fn test_zero_capacity_only_counts() {
        let diagnostics = Diagnostics::with_capacity(0);
        diagnostics.report(released("f"));
        assert!(diagnostics.is_empty());
        assert_eq!(diagnostics.reported(), 1);
    }
}
