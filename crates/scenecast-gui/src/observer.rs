//! Ordered observer lists and failure-isolating dispatch

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Host-supplied callback
pub type Observer<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Callbacks registered for one event kind, in registration order
pub struct ObserverList<E> {
    entries: Vec<Observer<E>>,
}

impl<E> ObserverList<E> {
    /// Create empty list
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Register a callback at the end of the list
    pub fn push<F>(&mut self, callback: F)
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.entries.push(Arc::new(callback));
    }

    /// Number of registered callbacks
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no callbacks are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cheap copy of the current callbacks
    ///
    /// Taken under the state lock so the callbacks can run after it is
    /// released.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Observer<E>> {
        self.entries.clone()
    }
}

impl<E> Default for ObserverList<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ObserverList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Outcome of running one event through its observers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Callbacks that ran (successfully or not)
    pub invoked: usize,
    /// Callbacks that returned an error or panicked
    pub failures: Vec<String>,
}

impl DispatchReport {
    /// `true` if every callback succeeded
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: Self) {
        self.invoked += other.invoked;
        self.failures.extend(other.failures);
    }
}

/// Run `event` through `observers` in order
///
/// A callback that errors or panics is logged and recorded; the remaining
/// callbacks still run.
pub fn dispatch<E>(observers: &[Observer<E>], event: &E) -> DispatchReport {
    let mut report = DispatchReport::default();
    for (index, observer) in observers.iter().enumerate() {
        report.invoked += 1;
        match catch_unwind(AssertUnwindSafe(|| observer(event))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(observer = index, error = %err, "observer returned an error");
                report.failures.push(format!("{err:#}"));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(observer = index, panic = %message, "observer panicked");
                report.failures.push(format!("panic: {message}"));
            }
        }
    }
    report
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn dispatch_runs_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut list: ObserverList<u32> = ObserverList::new();
        for tag in 0..3 {
            let seen = Arc::clone(&seen);
            list.push(move |event: &u32| {
                seen.lock().push((tag, *event));
                Ok(())
            });
        }

        let report = dispatch(&list.snapshot(), &7);

        assert_eq!(report.invoked, 3);
        assert!(report.is_clean());
        assert_eq!(*seen.lock(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn failures_do_not_stop_later_observers() {
        let reached = Arc::new(Mutex::new(false));
        let mut list: ObserverList<()> = ObserverList::new();
        list.push(|_: &()| anyhow::bail!("first failed"));
        list.push(|_: &()| panic!("second panicked"));
        {
            let reached = Arc::clone(&reached);
            list.push(move |_: &()| {
                *reached.lock() = true;
                Ok(())
            });
        }

        let report = dispatch(&list.snapshot(), &());

        assert_eq!(report.invoked, 3);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0], "first failed");
        assert_eq!(report.failures[1], "panic: second panicked");
        assert!(*reached.lock());
    }

    #[test]
    fn report_merge() {
        let mut a = DispatchReport {
            invoked: 1,
            failures: vec![],
        };
        a.merge(DispatchReport {
            invoked: 2,
            failures: vec!["x".into()],
        });
        assert_eq!(a.invoked, 3);
        assert!(!a.is_clean());
    }
}
