//! LDAP entry reconciliation for dirsync.
//!
//! An [`Entry`] holds the attribute snapshot of one directory entry. Calling
//! [`Entry::update`] with a desired attribute set diffs it against the
//! snapshot, sends the minimal modify batch through a [`DirectoryTransport`]
//! and commits the result locally only once the directory accepted it.
//!
//! [`LdapClient`] is the `ldap3`-backed transport; [`AttributeClient`] offers
//! stateless single-attribute changes over the same transport.

#![warn(missing_docs)]

mod attribute;
mod client;
mod entry;
mod operation;
mod raw;
mod transport;

pub use attribute::AttributeClient;
pub use client::{escape_dn_value, escape_filter_value, LdapClient, SearchResultEntry, SearchScope};
pub use entry::Entry;
pub use operation::{AttributeChange, ModifyBatch, ModifyOperation, ModifyPlan, OperationKind};
pub use raw::{attribute_value, RawEntry};
pub use transport::{DirectoryTransport, TransportResult};

pub use dirsync_core::{AttributeMap, AttributeValue, DirectoryConfig, Error, TransportError};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = dirsync_core::Result<T>;
