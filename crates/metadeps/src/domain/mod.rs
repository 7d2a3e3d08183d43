//! Domain types for dependency tracking.
//!
//! This module contains the identifier and label types shared by the graph,
//! the dispatcher and the registry.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Identifier of a metadata item.
///
/// Identifiers are opaque to this crate apart from the
/// [`IdentifierScheme`](crate::IdentifierScheme) supplied by the host, which
/// decides whether an identifier is class-level or instance-level.
///
/// A `MetadataId` is validated once, on construction, so every graph
/// operation that takes one can rely on it being well formed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MetadataId(String);

impl MetadataId {
    /// Create a new identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentifier`] if the value is empty, blank,
    /// padded with whitespace, or contains control characters.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_identifier(&id)?;
        Ok(Self(id))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_identifier(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::invalid_identifier(id, "identifier cannot be blank"));
    }

    if id.trim() != id {
        return Err(Error::invalid_identifier(
            id,
            "identifier cannot start or end with whitespace",
        ));
    }

    if id.chars().any(char::is_control) {
        return Err(Error::invalid_identifier(
            id,
            "identifier cannot contain control characters",
        ));
    }

    Ok(())
}

impl fmt::Display for MetadataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for MetadataId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for MetadataId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for MetadataId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for MetadataId {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl From<MetadataId> for String {
    fn from(id: MetadataId) -> Self {
        id.0
    }
}

/// Label a listener reports for timing attribution.
///
/// Each listener names the component it belongs to (for example `"builder"`
/// or `"indexer"`); elapsed time spent inside its callbacks is accumulated
/// under that label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ComponentKind(Cow<'static, str>);

impl ComponentKind {
    /// Label for time spent in the dispatcher's own bookkeeping.
    pub const DISPATCHER: ComponentKind = ComponentKind(Cow::Borrowed("dispatcher"));

    /// Create a new component label
    pub fn new(kind: impl Into<Cow<'static, str>>) -> Self {
        Self(kind.into())
    }

    /// Borrow the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&'static str> for ComponentKind {
    fn from(s: &'static str) -> Self {
        Self(Cow::Borrowed(s))
    }
}

impl From<String> for ComponentKind {
    fn from(s: String) -> Self {
        Self(Cow::Owned(s))
    }
}

/// A directed upstream -> downstream relation.
///
/// The downstream item depends on the upstream item and must be invalidated
/// whenever the upstream item changes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// The item being depended upon
    pub upstream: MetadataId,

    /// The item that depends on `upstream`
    pub downstream: MetadataId,
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.upstream, self.downstream)
    }
}

/// Parse an identifier in unit tests.
#[cfg(test)]
pub(crate) fn id(s: &str) -> MetadataId {
    MetadataId::new(s).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::simple("parser")]
    #[case::instance("parser:src/lib.rs")]
    #[case::inner_space("build script")]
    #[case::unicode("métadonnée")]
    fn test_metadata_id_valid(#[case] value: &str) {
        let id = MetadataId::new(value).unwrap();
        assert_eq!(id.as_str(), value);
    }

    #[rstest]
    #[case::empty("", "blank")]
    #[case::spaces("   ", "blank")]
    #[case::tab_only("\t", "blank")]
    #[case::leading(" parser", "whitespace")]
    #[case::trailing("parser ", "whitespace")]
    #[case::newline("par\nser", "control")]
    #[case::nul("par\0ser", "control")]
    fn test_metadata_id_invalid(#[case] value: &str, #[case] expected_error: &str) {
        let result = MetadataId::new(value);
        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(
            err_msg.contains(expected_error),
            "Expected error to contain '{expected_error}', got: '{err_msg}'"
        );
    }

    #[test]
    fn test_metadata_id_from_str() {
        let id: MetadataId = "schema".parse().unwrap();
        assert_eq!(id.to_string(), "schema");
        assert!("".parse::<MetadataId>().is_err());
    }

    #[test]
    fn test_metadata_id_deserialize_validates() {
        let id: MetadataId = serde_yaml::from_str("\"schema:a\"").unwrap();
        assert_eq!(id.as_str(), "schema:a");

        let result: std::result::Result<MetadataId, _> = serde_yaml::from_str("\"  \"");
        assert!(result.is_err());
    }

    #[test]
    fn test_component_kind_labels() {
        assert_eq!(ComponentKind::DISPATCHER.as_str(), "dispatcher");
        assert_eq!(ComponentKind::from("builder"), ComponentKind::new("builder"));
        assert_eq!(
            ComponentKind::from(String::from("indexer")).to_string(),
            "indexer"
        );
    }

    #[test]
    fn test_dependency_edge_display() {
        let edge = DependencyEdge {
            upstream: MetadataId::new("a").unwrap(),
            downstream: MetadataId::new("b").unwrap(),
        };
        assert_eq!(edge.to_string(), "a -> b");
    }
}
