//! Component descriptors and the reference registry.
//!
//! # Responsibility
//! - Parse and match `group:type:kind:name:version` locators.
//! - Let persistence components find a shared connection manager.
//!
//! # Invariants
//! - `*` matches any value in either descriptor.
//! - Lookup returns components in registration order.

use crate::db::ConnectionManager;
use crate::error::{PersistenceError, PersistenceResult};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

const WILDCARD: &str = "*";

/// Locator of a component, e.g. `app:connection:sqlite:default:1.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    group: String,
    kind_type: String,
    kind: String,
    name: String,
    version: String,
}

impl Descriptor {
    pub fn new(group: &str, kind_type: &str, kind: &str, name: &str, version: &str) -> Self {
        Self {
            group: normalize_part(group),
            kind_type: normalize_part(kind_type),
            kind: normalize_part(kind),
            name: normalize_part(name),
            version: normalize_part(version),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn kind_type(&self) -> &str {
        &self.kind_type
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns true when every part is equal or a wildcard on either side.
    pub fn matches(&self, other: &Descriptor) -> bool {
        part_matches(&self.group, &other.group)
            && part_matches(&self.kind_type, &other.kind_type)
            && part_matches(&self.kind, &other.kind)
            && part_matches(&self.name, &other.name)
            && part_matches(&self.version, &other.version)
    }
}

impl FromStr for Descriptor {
    type Err = PersistenceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.split(':').collect();
        match parts.as_slice() {
            [group, kind_type, kind, name, version] => {
                Ok(Self::new(group, kind_type, kind, name, version))
            }
            _ => Err(PersistenceError::configuration(format!(
                "descriptor `{value}` must have 5 parts group:type:kind:name:version"
            ))),
        }
    }
}

impl Display for Descriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.group, self.kind_type, self.kind, self.name, self.version
        )
    }
}

fn normalize_part(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        WILDCARD.to_string()
    } else {
        trimmed.to_string()
    }
}

fn part_matches(left: &str, right: &str) -> bool {
    left == WILDCARD || right == WILDCARD || left == right
}

/// Registry of shared components keyed by descriptor.
#[derive(Default, Clone)]
pub struct References {
    connections: Vec<(Descriptor, Arc<dyn ConnectionManager>)>,
}

impl References {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection manager under `descriptor`.
    pub fn put(&mut self, descriptor: Descriptor, connection: Arc<dyn ConnectionManager>) {
        self.connections.push((descriptor, connection));
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Returns every connection manager matching `locator`.
    pub fn get_optional(&self, locator: &Descriptor) -> Vec<Arc<dyn ConnectionManager>> {
        self.connections
            .iter()
            .filter(|(descriptor, _)| descriptor.matches(locator))
            .map(|(_, connection)| Arc::clone(connection))
            .collect()
    }

    /// Returns the first connection manager matching `locator`.
    pub fn get_one_optional(&self, locator: &Descriptor) -> Option<Arc<dyn ConnectionManager>> {
        self.connections
            .iter()
            .find(|(descriptor, _)| descriptor.matches(locator))
            .map(|(_, connection)| Arc::clone(connection))
    }
}

/// Parses a descriptor string from configuration.
pub fn parse_locator(value: &str) -> PersistenceResult<Descriptor> {
    value.parse()
}

#[cfg(test)]
mod tests {
    use super::{Descriptor, References};
    use crate::config::PersistenceConfig;
    use crate::db::SqliteConnection;
    use std::sync::Arc;

    #[test]
    fn parses_and_displays_descriptors() {
        let descriptor: Descriptor = "app:connection:sqlite:main:1.0".parse().unwrap();
        assert_eq!(descriptor.group(), "app");
        assert_eq!(descriptor.kind_type(), "connection");
        assert_eq!(descriptor.kind(), "sqlite");
        assert_eq!(descriptor.name(), "main");
        assert_eq!(descriptor.version(), "1.0");
        assert_eq!(descriptor.to_string(), "app:connection:sqlite:main:1.0");
    }

    #[test]
    fn rejects_descriptors_with_wrong_arity() {
        assert!("connection:sqlite".parse::<Descriptor>().is_err());
    }

    #[test]
    fn wildcards_match_in_both_directions() {
        let concrete: Descriptor = "app:connection:sqlite:main:1.0".parse().unwrap();
        let locator: Descriptor = "*:connection:sqlite:*:1.0".parse().unwrap();
        let other_kind: Descriptor = "*:connection:mysql:*:1.0".parse().unwrap();

        assert!(concrete.matches(&locator));
        assert!(locator.matches(&concrete));
        assert!(!concrete.matches(&other_kind));
    }

    #[test]
    fn registry_returns_first_match_in_registration_order() {
        let first = Arc::new(SqliteConnection::new(&PersistenceConfig::default()));
        let second = Arc::new(SqliteConnection::new(&PersistenceConfig::default()));
        let mut references = References::new();
        references.put("app:connection:sqlite:first:1.0".parse().unwrap(), first.clone());
        references.put("app:connection:sqlite:second:1.0".parse().unwrap(), second);

        let locator = "*:connection:sqlite:*:1.0".parse().unwrap();
        let found = references.get_one_optional(&locator).unwrap();
        assert!(std::ptr::eq(
            Arc::as_ptr(&found) as *const u8,
            Arc::as_ptr(&first) as *const u8
        ));
        assert_eq!(references.get_optional(&locator).len(), 2);

        let missing = "*:connection:mysql:*:1.0".parse().unwrap();
        assert!(references.get_one_optional(&missing).is_none());
    }
}
