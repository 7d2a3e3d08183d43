//! Metadeps - dependency tracking and invalidation fan-out for derived
//! metadata items.
//!
//! Derived, cacheable metadata items form a dependency graph. When an item
//! changes, every item that depends on it must be invalidated and recomputed.
//! This crate keeps that graph acyclic and delivers the change notifications;
//! computing the items themselves is left to the registered listeners.
//!
//! # Components
//!
//! - [`DependencyGraph`]: mirrored upstream/downstream adjacency with cycle
//!   rejection
//! - [`NotificationDispatcher`]: fine-grained then coarse-grained fan-out,
//!   followed by generic observers, with re-entrant nesting
//! - [`TimingRecorder`]: exclusive time per responsible component across
//!   nested dispatches
//! - [`Registry`]: the facade owning all of the above plus the listeners
//!
//! # Example
//!
//! ```
//! use metadeps::{ComponentKind, MetadataId, MetadataListener, Registry, Result};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! #[derive(Default)]
//! struct Cache {
//!     stale: RefCell<Vec<MetadataId>>,
//! }
//!
//! impl MetadataListener for Cache {
//!     fn component_kind(&self) -> ComponentKind {
//!         "cache".into()
//!     }
//!
//!     fn is_primary(&self) -> bool {
//!         true
//!     }
//!
//!     fn notify(
//!         &self,
//!         _registry: &Registry,
//!         _upstream: &MetadataId,
//!         downstream: Option<&MetadataId>,
//!     ) -> Result<()> {
//!         if let Some(item) = downstream {
//!             self.stale.borrow_mut().push(item.clone());
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let registry = Registry::default();
//! let cache = Rc::new(Cache::default());
//! registry.add_notification_listener(cache.clone())?;
//!
//! let source = MetadataId::new("source:main")?;
//! let outline = MetadataId::new("outline:main")?;
//! registry.register_dependency(&source, &outline)?;
//!
//! registry.notify_downstream(&source)?;
//! assert_eq!(*cache.stale.borrow(), vec![outline]);
//! # Ok::<(), metadeps::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod graph;
pub mod listener;
pub mod registry;
pub mod scheme;
pub mod timing;

pub use config::{RegistryConfig, TraceLevel};
pub use dispatch::{DispatchReport, NotificationDispatcher};
pub use domain::{ComponentKind, DependencyEdge, MetadataId};
pub use error::{Error, Result};
pub use graph::{DependencyGraph, GraphSnapshot};
pub use listener::MetadataListener;
pub use registry::Registry;
pub use scheme::{DelimitedScheme, IdentifierScheme};
pub use timing::{TimingRecorder, TimingStatistic};
