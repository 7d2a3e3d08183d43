//! Notification listeners.
//!
//! Two kinds of listener receive notifications:
//!
//! - the **primary consumer**, at most one per registry, which is told about
//!   every individual downstream item that must be invalidated;
//! - **generic observers**, any number, which are told once per
//!   notification that something upstream changed.

use crate::domain::{ComponentKind, MetadataId};
use crate::error::{Error, Result};
use crate::registry::Registry;
use std::rc::Rc;

/// Receiver of change notifications.
///
/// Callbacks take `&self`: the registry may call back into the same listener
/// while it is still handling an outer notification, so listeners keep their
/// mutable state behind `Cell`/`RefCell`.
pub trait MetadataListener {
    /// Label under which time spent in this listener is recorded.
    fn component_kind(&self) -> ComponentKind;

    /// Whether this listener claims the primary consumer slot.
    fn is_primary(&self) -> bool {
        false
    }

    /// Handle a notification that `upstream` changed.
    ///
    /// The primary consumer receives `Some(downstream)` naming the item to
    /// invalidate; generic observers receive `None`. Handling must be
    /// idempotent. The listener may register or deregister dependencies on
    /// `registry`, or call [`Registry::notify_downstream`] again.
    ///
    /// # Errors
    ///
    /// Any error returned here aborts the notification and is returned,
    /// unchanged, to the caller of [`Registry::notify_downstream`].
    fn notify(
        &self,
        registry: &Registry,
        upstream: &MetadataId,
        downstream: Option<&MetadataId>,
    ) -> Result<()>;
}

/// One primary slot plus an insertion-ordered set of observers.
///
/// Listener identity is the `Rc` allocation, not the value.
#[derive(Default)]
pub(crate) struct ListenerSet {
    primary: Option<Rc<dyn MetadataListener>>,
    observers: Vec<Rc<dyn MetadataListener>>,
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("primary", &self.primary.as_ref().map(|l| l.component_kind()))
            .field(
                "observers",
                &self
                    .observers
                    .iter()
                    .map(|l| l.component_kind())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// What [`ListenerSet::add`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Added {
    Primary,
    Observer,
    AlreadyPresent,
}

fn same_listener<L: MetadataListener + ?Sized>(
    a: &Rc<L>,
    b: &Rc<dyn MetadataListener>,
) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

impl ListenerSet {
    pub(crate) fn add(&mut self, listener: Rc<dyn MetadataListener>) -> Result<Added> {
        if listener.is_primary() {
            return match &self.primary {
                Some(existing) if same_listener(&listener, existing) => Ok(Added::AlreadyPresent),
                Some(existing) => Err(Error::DuplicatePrimaryListener {
                    existing: existing.component_kind(),
                    rejected: listener.component_kind(),
                }),
                None => {
                    self.primary = Some(listener);
                    Ok(Added::Primary)
                }
            };
        }

        if self.observers.iter().any(|o| same_listener(&listener, o)) {
            return Ok(Added::AlreadyPresent);
        }
        self.observers.push(listener);
        Ok(Added::Observer)
    }

    /// Remove `listener` from whichever slot holds it. Returns `true` if found.
    pub(crate) fn remove<L: MetadataListener + ?Sized>(&mut self, listener: &Rc<L>) -> bool {
        if self
            .primary
            .as_ref()
            .is_some_and(|primary| same_listener(listener, primary))
        {
            self.primary = None;
            return true;
        }

        let before = self.observers.len();
        self.observers.retain(|o| !same_listener(listener, o));
        self.observers.len() != before
    }

    pub(crate) fn primary(&self) -> Option<Rc<dyn MetadataListener>> {
        self.primary.clone()
    }

    /// Snapshot of the observers, safe to iterate while listeners change.
    pub(crate) fn observers(&self) -> Vec<Rc<dyn MetadataListener>> {
        self.observers.clone()
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.observers.len()
    }
}
