//! SQLite-backed cache containers.
//!
//! Containers are named per purpose and version (`clinic-static-v2`); each
//! holds opaque responses keyed by request identity. Entries carry an
//! injected `cached-at` header that maintenance uses for age-based eviction.

pub mod container;
pub mod entry;
pub mod hash;
pub mod store;

pub use container::{CachePurpose, ContainerSet, MaxAge};
pub use entry::{CACHED_AT_HEADER, CachedEntry, RequestIdentity};
pub use store::CacheStore;
