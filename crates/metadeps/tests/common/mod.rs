//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use metadeps::{ComponentKind, MetadataId, MetadataListener, Registry, Result};
use std::cell::RefCell;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once per test binary.
///
/// Controlled via `RUST_LOG`, e.g. `RUST_LOG=metadeps=trace cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("metadeps=warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Parse an identifier, panicking on invalid input.
pub fn id(s: &str) -> MetadataId {
    MetadataId::new(s).expect("valid identifier")
}

/// Callback a [`Recording`] listener runs after recording a call.
pub type Hook = Box<dyn Fn(&Registry, &MetadataId, Option<&MetadataId>) -> Result<()>>;

/// Listener that records every notification it receives.
pub struct Recording {
    kind: &'static str,
    primary: bool,
    calls: RefCell<Vec<(MetadataId, Option<MetadataId>)>>,
    hook: Option<Hook>,
}

impl Recording {
    /// A primary consumer labelled `kind`
    pub fn primary(kind: &'static str) -> Rc<Self> {
        Rc::new(Self::new(kind, true, None))
    }

    /// A generic observer labelled `kind`
    pub fn observer(kind: &'static str) -> Rc<Self> {
        Rc::new(Self::new(kind, false, None))
    }

    /// A listener that runs `hook` after recording each call
    pub fn with_hook(
        kind: &'static str,
        primary: bool,
        hook: impl Fn(&Registry, &MetadataId, Option<&MetadataId>) -> Result<()> + 'static,
    ) -> Rc<Self> {
        Rc::new(Self::new(kind, primary, Some(Box::new(hook))))
    }

    fn new(kind: &'static str, primary: bool, hook: Option<Hook>) -> Self {
        Self {
            kind,
            primary,
            calls: RefCell::new(Vec::new()),
            hook,
        }
    }

    /// All recorded `(upstream, downstream)` pairs in call order
    pub fn calls(&self) -> Vec<(MetadataId, Option<MetadataId>)> {
        self.calls.borrow().clone()
    }

    /// Downstream identifiers received, in call order
    pub fn downstreams(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|(_, down)| down.as_ref().map(ToString::to_string))
            .collect()
    }

    /// Number of calls received
    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl MetadataListener for Recording {
    fn component_kind(&self) -> ComponentKind {
        self.kind.into()
    }

    fn is_primary(&self) -> bool {
        self.primary
    }

    fn notify(
        &self,
        registry: &Registry,
        upstream: &MetadataId,
        downstream: Option<&MetadataId>,
    ) -> Result<()> {
        self.calls
            .borrow_mut()
            .push((upstream.clone(), downstream.cloned()));
        match &self.hook {
            Some(hook) => hook(registry, upstream, downstream),
            None => Ok(()),
        }
    }
}
