//! Class-level / instance-level identifier classification.
//!
//! The registry never interprets identifiers itself. The host supplies an
//! [`IdentifierScheme`] that answers two questions: is this identifier
//! class-level, and which class produced this instance.

use crate::domain::MetadataId;
use crate::error::{Error, Result};

/// Default separator between a class and an instance name.
pub const DEFAULT_SEPARATOR: char = ':';

/// Classification of identifiers supplied by the surrounding system.
///
/// Implementations must be pure: the same identifier always yields the same
/// answer, and every instance-level identifier maps to exactly one class.
pub trait IdentifierScheme {
    /// Returns `true` if `id` names a provider rather than a specific item.
    fn is_class_level(&self, id: &MetadataId) -> bool;

    /// The class-level identifier of the provider that produced `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentifier`] if `id` is malformed under this
    /// scheme.
    fn class_of(&self, id: &MetadataId) -> Result<MetadataId>;
}

/// Scheme where instances are written `class<sep>instance`.
///
/// With the default `':'` separator, `"parser:src/lib.rs"` is an instance of
/// class `"parser"`, and `"parser"` alone is class-level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedScheme {
    separator: char,
}

impl DelimitedScheme {
    /// Create a scheme using `separator` between class and instance
    #[must_use]
    pub fn new(separator: char) -> Self {
        Self { separator }
    }

    /// The separator in use.
    #[must_use]
    pub fn separator(&self) -> char {
        self.separator
    }
}

impl Default for DelimitedScheme {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl IdentifierScheme for DelimitedScheme {
    fn is_class_level(&self, id: &MetadataId) -> bool {
        !id.as_str().contains(self.separator)
    }

    fn class_of(&self, id: &MetadataId) -> Result<MetadataId> {
        match id.as_str().split_once(self.separator) {
            None => Ok(id.clone()),
            Some((class, _)) => MetadataId::new(class).map_err(|_| {
                Error::invalid_identifier(
                    id.as_str(),
                    format!("no class name before '{}'", self.separator),
                )
            }),
        }
    }
}
