//! Directory transport abstraction.

use crate::operation::ModifyOperation;
use async_trait::async_trait;
use dirsync_core::{AttributeMap, TransportError};

/// Result type returned by transport primitives.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Protocol primitives consumed by [`Entry`](crate::Entry) and
/// [`AttributeClient`](crate::AttributeClient).
///
/// Each call is one round trip over a connection owned by the transport.
/// Implementations return [`TransportError::NotBound`] when no connection is
/// available.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DirectoryTransport: Send + Sync {
    /// Returns true while a bound connection is available.
    fn is_bound(&self) -> bool;

    /// Submits `batch` against `dn` as one atomic modify request.
    async fn batch_modify(&self, dn: &str, batch: &[ModifyOperation]) -> TransportResult<()>;

    /// Adds the given values to the attributes of `dn`.
    async fn modify_add(&self, dn: &str, attributes: &AttributeMap) -> TransportResult<()>;

    /// Replaces the values of the given attributes of `dn`.
    async fn modify_replace(&self, dn: &str, attributes: &AttributeMap) -> TransportResult<()>;

    /// Deletes the given values from the attributes of `dn`.
    ///
    /// An attribute mapped to an empty multi-value is removed entirely.
    async fn modify_delete(&self, dn: &str, attributes: &AttributeMap) -> TransportResult<()>;
}
