//! The registry facade.
//!
//! A [`Registry`] owns the dependency graph, the listener set and the
//! notification dispatcher. Create one at process start and hand a reference
//! (or an `Rc`) to every collaborator that declares dependencies or reports
//! changes.
//!
//! # Threading
//!
//! The registry is single-threaded by contract. It uses `Cell`/`RefCell` for
//! interior mutability so that listeners can mutate the graph and re-enter
//! [`Registry::notify_downstream`] from inside a callback, and it is neither
//! `Send` nor `Sync`. No internal borrow is held while a listener runs.
//!
//! # Example
//!
//! ```
//! use metadeps::{DelimitedScheme, MetadataId, Registry};
//!
//! let registry = Registry::new(DelimitedScheme::default());
//! let schema = MetadataId::new("schema:users")?;
//! let report = MetadataId::new("report:monthly")?;
//!
//! registry.register_dependency(&schema, &report)?;
//! assert!(registry.get_downstream(&schema).contains(&report));
//!
//! let outcome = registry.notify_downstream(&schema)?;
//! assert_eq!(outcome.affected, vec![report]);
//! # Ok::<(), metadeps::Error>(())
//! ```

use crate::config::{RegistryConfig, TraceLevel};
use crate::dispatch::{DispatchReport, NotificationDispatcher};
use crate::domain::MetadataId;
use crate::error::{Error, Result};
use crate::graph::{DependencyGraph, GraphSnapshot};
use crate::listener::{Added, ListenerSet, MetadataListener};
use crate::scheme::{DelimitedScheme, IdentifierScheme};
use crate::timing::TimingStatistic;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Dependency registry and notification entry point.
pub struct Registry {
    graph: RefCell<DependencyGraph>,
    listeners: RefCell<ListenerSet>,
    dispatcher: NotificationDispatcher,
    scheme: Box<dyn IdentifierScheme>,
    trace: Cell<TraceLevel>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("graph", &self.graph)
            .field("listeners", &self.listeners)
            .field("dispatcher", &self.dispatcher)
            .field("scheme", &"<dyn IdentifierScheme>")
            .field("trace", &self.trace.get())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(DelimitedScheme::default())
    }
}

impl Registry {
    /// Create a registry with default configuration.
    pub fn new(scheme: impl IdentifierScheme + 'static) -> Self {
        let config = RegistryConfig::default();
        Self::build(Box::new(scheme), &config)
    }

    /// Create a registry with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn with_config(
        scheme: impl IdentifierScheme + 'static,
        config: &RegistryConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(Box::new(scheme), config))
    }

    /// Create a registry using a [`DelimitedScheme`] built from the
    /// configured separator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        Self::with_config(DelimitedScheme::new(config.instance_separator), config)
    }

    fn build(scheme: Box<dyn IdentifierScheme>, config: &RegistryConfig) -> Self {
        Self {
            graph: RefCell::new(DependencyGraph::new()),
            listeners: RefCell::new(ListenerSet::default()),
            dispatcher: NotificationDispatcher::new(config.max_notification_depth),
            scheme,
            trace: Cell::new(config.trace),
        }
    }

    // ========== Dependency Graph ==========

    /// Record that `downstream` depends on `upstream`.
    ///
    /// Registering an existing edge is a no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidIdentifier`] if the scheme cannot classify either
    ///   identifier
    /// - [`Error::SelfDependency`] if `upstream == downstream`
    /// - [`Error::CircularDependency`] if the edge would close a cycle
    pub fn register_dependency(&self, upstream: &MetadataId, downstream: &MetadataId) -> Result<()> {
        let result = self
            .check_classifiable(upstream)
            .and_then(|()| self.check_classifiable(downstream))
            .and_then(|()| {
                self.graph
                    .borrow_mut()
                    .register_dependency(upstream, downstream)
            });

        match &result {
            Ok(()) if self.traces(TraceLevel::Verbose) => {
                trace!(%upstream, %downstream, "registered dependency");
            }
            Err(Error::CircularDependency { .. }) => {
                warn!(%upstream, %downstream, "rejected dependency that would close a cycle");
            }
            Err(e) if self.traces(TraceLevel::Summary) => {
                debug!(%upstream, %downstream, error = %e, "rejected dependency");
            }
            _ => {}
        }

        result
    }

    fn check_classifiable(&self, id: &MetadataId) -> Result<()> {
        if !self.scheme.is_class_level(id) {
            self.scheme.class_of(id)?;
        }
        Ok(())
    }

    /// Check whether `upstream -> downstream` could be registered without
    /// closing a cycle.
    #[must_use]
    pub fn is_valid_dependency(&self, upstream: &MetadataId, downstream: &MetadataId) -> bool {
        self.graph
            .borrow()
            .is_valid_dependency(upstream, downstream)
    }

    /// Remove one edge. Returns `true` if it existed.
    pub fn deregister_dependency(&self, upstream: &MetadataId, downstream: &MetadataId) -> bool {
        let removed = self
            .graph
            .borrow_mut()
            .deregister_dependency(upstream, downstream);

        if removed && self.traces(TraceLevel::Verbose) {
            trace!(%upstream, %downstream, "deregistered dependency");
        }
        removed
    }

    /// Remove every edge whose downstream is `downstream`, typically when
    /// that item is discarded. Returns the number of edges removed.
    pub fn deregister_dependencies(&self, downstream: &MetadataId) -> usize {
        let removed = self.graph.borrow_mut().deregister_dependencies(downstream);

        if removed > 0 && self.traces(TraceLevel::Verbose) {
            trace!(%downstream, removed, "deregistered all upstream dependencies");
        }
        removed
    }

    /// Snapshot of the items that directly depend on `upstream`.
    #[must_use]
    pub fn get_downstream(&self, upstream: &MetadataId) -> BTreeSet<MetadataId> {
        self.graph.borrow().get_downstream(upstream)
    }

    /// Snapshot of the items `downstream` directly depends on.
    #[must_use]
    pub fn get_upstream(&self, downstream: &MetadataId) -> BTreeSet<MetadataId> {
        self.graph.borrow().get_upstream(downstream)
    }

    /// Every item transitively affected by a change to `upstream`, with its
    /// distance. Follows explicit edges only.
    #[must_use]
    pub fn affected_by(
        &self,
        upstream: &MetadataId,
        max_depth: Option<usize>,
    ) -> Vec<(MetadataId, usize)> {
        self.graph
            .borrow()
            .transitive_downstream(upstream, max_depth)
    }

    /// Serializable dump of all edges.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        self.graph.borrow().snapshot()
    }

    /// Identifiers ordered upstream-first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CycleDetected`] if the graph contains a cycle.
    pub fn topological_order(&self) -> Result<Vec<MetadataId>> {
        self.graph.borrow().topological_order()
    }

    /// Verify the graph's internal mirror invariant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GraphInconsistency`] on the first mismatch.
    pub fn check_consistency(&self) -> Result<()> {
        self.graph.borrow().check_consistency()
    }

    // ========== Notification ==========

    /// Notify every item downstream of `upstream` that it changed.
    ///
    /// May be called from inside a listener callback; the nested call runs to
    /// completion before the outer one continues.
    ///
    /// # Errors
    ///
    /// - [`Error::MaxDepthExceeded`] if nesting exceeds the configured limit
    /// - [`Error::InvalidIdentifier`] if the scheme cannot classify `upstream`
    /// - any error returned by a listener, unchanged
    pub fn notify_downstream(&self, upstream: &MetadataId) -> Result<DispatchReport> {
        self.dispatcher.dispatch(self, upstream)
    }

    /// Current re-entrant nesting depth; 0 outside of any notification.
    #[must_use]
    pub fn notification_depth(&self) -> usize {
        self.dispatcher.depth()
    }

    /// The dispatcher, for diagnostics.
    #[must_use]
    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// The identifier scheme in use.
    #[must_use]
    pub fn scheme(&self) -> &dyn IdentifierScheme {
        self.scheme.as_ref()
    }

    // ========== Listeners ==========

    /// Register a listener.
    ///
    /// A listener reporting [`MetadataListener::is_primary`] takes the
    /// primary slot; any other joins the observer set. Adding a listener that
    /// is already registered is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicatePrimaryListener`] if a different primary
    /// consumer is already registered.
    pub fn add_notification_listener(&self, listener: Rc<dyn MetadataListener>) -> Result<()> {
        let kind = listener.component_kind();
        let added = self.listeners.borrow_mut().add(listener);

        match &added {
            Ok(Added::Primary) if self.traces(TraceLevel::Summary) => {
                debug!(%kind, "registered primary listener");
            }
            Ok(Added::Observer) if self.traces(TraceLevel::Summary) => {
                debug!(%kind, "registered observer");
            }
            Err(e) => warn!(error = %e, "listener registration refused"),
            _ => {}
        }

        added.map(|_| ())
    }

    /// Remove a listener from whichever slot holds it. Returns `true` if it
    /// was registered.
    pub fn remove_notification_listener<L: MetadataListener + ?Sized>(
        &self,
        listener: &Rc<L>,
    ) -> bool {
        let removed = self.listeners.borrow_mut().remove(listener);

        if removed && self.traces(TraceLevel::Summary) {
            debug!(kind = %listener.component_kind(), "removed listener");
        }
        removed
    }

    /// Returns `true` if a primary consumer is registered.
    #[must_use]
    pub fn has_primary_listener(&self) -> bool {
        self.listeners.borrow().primary().is_some()
    }

    /// Number of registered generic observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.listeners.borrow().observer_count()
    }

    pub(crate) fn primary_listener(&self) -> Option<Rc<dyn MetadataListener>> {
        self.listeners.borrow().primary()
    }

    pub(crate) fn observers(&self) -> Vec<Rc<dyn MetadataListener>> {
        self.listeners.borrow().observers()
    }

    // ========== Diagnostics ==========

    /// Adjust diagnostic verbosity. Has no functional effect.
    pub fn set_trace(&self, level: TraceLevel) {
        self.trace.set(level);
    }

    /// Current diagnostic verbosity.
    #[must_use]
    pub fn trace(&self) -> TraceLevel {
        self.trace.get()
    }

    fn traces(&self, level: TraceLevel) -> bool {
        self.trace.get().enables(level)
    }

    /// Sorted snapshot of accumulated timing statistics, longest first.
    #[must_use]
    pub fn get_timings(&self) -> Vec<TimingStatistic> {
        self.dispatcher.timings()
    }

    /// Discard accumulated timing statistics.
    pub fn reset_timings(&self) {
        self.dispatcher.reset_timings();
    }
}
