//! Event catalog seam.
//!
//! Event and blog management live outside this subsystem. The manager only
//! needs to know whether an `(event_id, category)` pair exists.

use crate::BoxFuture;
use crate::error::CatalogError;

/// Result of looking up an event/category pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogLookup {
    /// Event exists and offers the category
    Found,
    /// No such event
    UnknownEvent,
    /// Event exists but does not offer the category
    UnknownCategory,
}

/// How the manager treats an unreachable catalog during `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogPolicy {
    /// Catalog failures fail the request with a transient error
    #[default]
    Strict,
    /// Catalog failures are logged and creation proceeds; unknown ids still fail
    Advisory,
}

/// Read-only view of the external event catalog.
pub trait EventCatalog: Send + Sync {
    /// Check whether `event_id` exists and offers `category`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unavailable`] if the backend cannot be reached.
    fn lookup<'a>(
        &'a self,
        event_id: &'a str,
        category: &'a str,
    ) -> BoxFuture<'a, Result<CatalogLookup, CatalogError>>;
}
