//! Two-phase notification fan-out.
//!
//! [`NotificationDispatcher::dispatch`] runs one notification in three
//! phases:
//!
//! 1. **Fine-grained**: the primary consumer is told about every item
//!    directly downstream of the changed identifier.
//! 2. **Coarse-grained**: if the changed identifier is instance-level, the
//!    primary consumer is also told about every item downstream of its
//!    class, skipping items already notified and the changed identifier
//!    itself.
//! 3. **Observers**: every generic observer is notified exactly once.
//!
//! Listeners may call back into the registry and start a nested dispatch.
//! The dispatcher tracks the nesting depth, optionally enforces a maximum,
//! and hands responsibility for elapsed time to the [`TimingRecorder`] frame
//! of whoever is currently running.

use crate::config::TraceLevel;
use crate::domain::{ComponentKind, MetadataId};
use crate::error::{Error, Result};
use crate::listener::MetadataListener;
use crate::registry::Registry;
use crate::timing::{TimingRecorder, TimingStatistic};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Outcome of one [`Registry::notify_downstream`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// The identifier that changed
    pub upstream: MetadataId,

    /// Downstream items handed to the primary consumer, in call order.
    ///
    /// Filled even when no primary consumer is registered, in which case no
    /// callback actually ran.
    pub affected: Vec<MetadataId>,

    /// How many of `affected` came from the coarse-grained phase
    pub coarse: usize,

    /// Number of generic observers notified
    pub observers_notified: usize,

    /// Nesting depth this call ran at (1 for a top-level call)
    pub depth: usize,

    /// Wall-clock duration of the call, nested dispatches included
    pub elapsed: Duration,
}

/// Walks the graph and invokes listeners; owns depth and timing state.
#[derive(Debug)]
pub struct NotificationDispatcher {
    depth: Cell<usize>,
    max_depth: Option<usize>,
    timing: RefCell<TimingRecorder>,
}

impl NotificationDispatcher {
    /// Create a dispatcher. `max_depth` of `None` leaves recursion unbounded
    /// apart from the host stack.
    #[must_use]
    pub fn new(max_depth: Option<usize>) -> Self {
        Self {
            depth: Cell::new(0),
            max_depth,
            timing: RefCell::new(TimingRecorder::new()),
        }
    }

    /// Current nesting depth; 0 when no dispatch is running.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Configured maximum nesting depth.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Sorted snapshot of accumulated timing statistics.
    #[must_use]
    pub fn timings(&self) -> Vec<TimingStatistic> {
        self.timing.borrow().snapshot()
    }

    /// Number of completed top-level dispatches since the last reset.
    #[must_use]
    pub fn cascades(&self) -> u64 {
        self.timing.borrow().cascades()
    }

    /// Discard accumulated timing statistics.
    pub fn reset_timings(&self) {
        self.timing.borrow_mut().reset();
    }

    /// Notify everything downstream of `upstream`.
    ///
    /// # Errors
    ///
    /// - [`Error::MaxDepthExceeded`] if this call would nest deeper than the
    ///   configured limit; nothing is notified in that case
    /// - [`Error::InvalidIdentifier`] if the scheme cannot classify `upstream`;
    ///   checked before any listener runs
    /// - any error returned by a listener, unchanged
    pub(crate) fn dispatch(
        &self,
        registry: &Registry,
        upstream: &MetadataId,
    ) -> Result<DispatchReport> {
        let frame = DispatchFrame::open(self, upstream)?;
        let started = Instant::now();
        let level = registry.trace();
        let primary = registry.primary_listener();

        let scheme = registry.scheme();
        let class = if scheme.is_class_level(upstream) {
            None
        } else {
            Some(scheme.class_of(upstream)?)
        };

        let mut affected = Vec::new();
        let mut seen = BTreeSet::new();

        for downstream in registry.get_downstream(upstream) {
            seen.insert(downstream.clone());
            self.notify_primary(registry, primary.as_deref(), upstream, &downstream, level)?;
            affected.push(downstream);
        }
        let direct = affected.len();

        if let Some(class) = class {
            for downstream in registry.get_downstream(&class) {
                if downstream == *upstream || !seen.insert(downstream.clone()) {
                    continue;
                }
                self.notify_primary(registry, primary.as_deref(), upstream, &downstream, level)?;
                affected.push(downstream);
            }
        }

        let observers = registry.observers();
        for observer in &observers {
            if level.enables(TraceLevel::Verbose) {
                trace!(%upstream, observer = %observer.component_kind(), "notifying observer");
            }
            self.invoke(registry, observer.as_ref(), upstream, None)?;
        }

        let report = DispatchReport {
            upstream: upstream.clone(),
            coarse: affected.len() - direct,
            affected,
            observers_notified: observers.len(),
            depth: frame.depth,
            elapsed: started.elapsed(),
        };

        if level.enables(TraceLevel::Summary) {
            debug!(
                %upstream,
                depth = report.depth,
                affected = report.affected.len(),
                coarse = report.coarse,
                observers = report.observers_notified,
                elapsed_us = u64::try_from(report.elapsed.as_micros()).unwrap_or(u64::MAX),
                "notified downstream"
            );
        }

        Ok(report)
    }

    fn notify_primary(
        &self,
        registry: &Registry,
        primary: Option<&dyn MetadataListener>,
        upstream: &MetadataId,
        downstream: &MetadataId,
        level: TraceLevel,
    ) -> Result<()> {
        if level.enables(TraceLevel::Verbose) {
            trace!(%upstream, %downstream, "invalidating downstream item");
        }
        match primary {
            Some(listener) => self.invoke(registry, listener, upstream, Some(downstream)),
            None => Ok(()),
        }
    }

    fn invoke(
        &self,
        registry: &Registry,
        listener: &dyn MetadataListener,
        upstream: &MetadataId,
        downstream: Option<&MetadataId>,
    ) -> Result<()> {
        let _frame = ListenerFrame::open(&self.timing, listener.component_kind());
        listener.notify(registry, upstream, downstream)
    }
}

/// One level of dispatch nesting. Dropping it unwinds depth and timing, on
/// error and panic paths too.
struct DispatchFrame<'a> {
    dispatcher: &'a NotificationDispatcher,
    depth: usize,
}

impl<'a> DispatchFrame<'a> {
    fn open(dispatcher: &'a NotificationDispatcher, upstream: &MetadataId) -> Result<Self> {
        let depth = dispatcher.depth.get() + 1;
        if let Some(limit) = dispatcher.max_depth
            && depth > limit
        {
            return Err(Error::MaxDepthExceeded {
                upstream: upstream.clone(),
                limit,
            });
        }

        dispatcher.depth.set(depth);
        dispatcher
            .timing
            .borrow_mut()
            .enter(ComponentKind::DISPATCHER);

        Ok(Self { dispatcher, depth })
    }
}

impl Drop for DispatchFrame<'_> {
    fn drop(&mut self) {
        let mut timing = self.dispatcher.timing.borrow_mut();
        timing.exit();
        self.dispatcher.depth.set(self.depth - 1);
        if self.depth == 1 {
            timing.finish_cascade();
        }
    }
}

/// Timing frame for the duration of one listener callback.
struct ListenerFrame<'a> {
    timing: &'a RefCell<TimingRecorder>,
}

impl<'a> ListenerFrame<'a> {
    fn open(timing: &'a RefCell<TimingRecorder>, kind: ComponentKind) -> Self {
        timing.borrow_mut().enter(kind);
        Self { timing }
    }
}

impl Drop for ListenerFrame<'_> {
    fn drop(&mut self) {
        self.timing.borrow_mut().exit();
    }
}
