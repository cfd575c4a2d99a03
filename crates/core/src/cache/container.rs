//! Versioned container naming.
//!
//! Every container name embeds the cache version, so a version bump makes
//! all earlier containers garbage at activation time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The logical purpose of a cache container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePurpose {
    /// Install manifest, offline document and cache-first assets.
    Static,
    /// Network-first documents.
    Pages,
    /// Stale-while-revalidate API data.
    Api,
}

impl CachePurpose {
    pub const ALL: [CachePurpose; 3] = [CachePurpose::Static, CachePurpose::Pages, CachePurpose::Api];

    pub fn as_str(self) -> &'static str {
        match self {
            CachePurpose::Static => "static",
            CachePurpose::Pages => "pages",
            CachePurpose::Api => "api",
        }
    }
}

/// Names of the current-version containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSet {
    prefix: String,
    version: String,
}

impl ContainerSet {
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), version: version.into() }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `<prefix>-<purpose>-<version>`
    pub fn name(&self, purpose: CachePurpose) -> String {
        format!("{}-{}-{}", self.prefix, purpose.as_str(), self.version)
    }

    /// All current names, in `CachePurpose::ALL` order.
    pub fn names(&self) -> Vec<String> {
        CachePurpose::ALL.iter().map(|p| self.name(*p)).collect()
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.purpose_of(name).is_some()
    }

    /// The purpose of a current-version container, `None` for anything else.
    pub fn purpose_of(&self, name: &str) -> Option<CachePurpose> {
        CachePurpose::ALL.into_iter().find(|p| self.name(*p) == name)
    }
}

/// Maximum entry age per purpose, enforced only by maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxAge {
    pub default: Duration,
    pub api: Duration,
}

impl Default for MaxAge {
    fn default() -> Self {
        Self { default: Duration::from_secs(24 * 60 * 60), api: Duration::from_secs(5 * 60) }
    }
}

impl MaxAge {
    pub fn for_purpose(&self, purpose: CachePurpose) -> Duration {
        match purpose {
            CachePurpose::Api => self.api,
            CachePurpose::Static | CachePurpose::Pages => self.default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_names_embed_version() {
        let set = ContainerSet::new("clinic", "v2");
        assert_eq!(set.name(CachePurpose::Static), "clinic-static-v2");
        assert_eq!(set.names(), vec!["clinic-static-v2", "clinic-pages-v2", "clinic-api-v2"]);
    }

    #[test]
    fn test_previous_version_not_current() {
        let set = ContainerSet::new("clinic", "v2");
        assert!(set.is_current("clinic-api-v2"));
        assert!(!set.is_current("clinic-api-v1"));
        assert!(!set.is_current("unrelated"));
        assert_eq!(set.purpose_of("clinic-pages-v2"), Some(CachePurpose::Pages));
    }

    #[test]
    fn test_default_max_ages() {
        let max_age = MaxAge::default();
        assert_eq!(max_age.for_purpose(CachePurpose::Static), Duration::from_secs(86_400));
        assert_eq!(max_age.for_purpose(CachePurpose::Pages), Duration::from_secs(86_400));
        assert_eq!(max_age.for_purpose(CachePurpose::Api), Duration::from_secs(300));
    }
}
