//! Directory entry reconciliation.

use crate::{
    client::SearchResultEntry, operation::ModifyPlan, raw::RawEntry,
    transport::DirectoryTransport, Result,
};
use dirsync_core::{AttributeMap, AttributeValue, Error};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A single directory entry and the attribute state it was last known to have.
///
/// The snapshot only changes when [`Entry::update`] has been accepted by the
/// directory. A failed update leaves it exactly as it was, and the entry can
/// be updated again afterwards.
pub struct Entry {
    transport: Arc<dyn DirectoryTransport>,
    dn: Option<String>,
    attributes: AttributeMap,
}

impl Entry {
    /// Creates an entry from an attribute snapshot.
    ///
    /// Multi-values with no values are not stored: the directory has no such
    /// attribute.
    #[must_use]
    pub fn new(transport: Arc<dyn DirectoryTransport>, mut attributes: AttributeMap) -> Self {
        attributes.retain(|_, value| !value.is_empty());
        Self {
            transport,
            dn: None,
            attributes,
        }
    }

    /// Creates an entry from a raw snapshot, stripping `count` metadata.
    ///
    /// Value shapes follow [`attribute_value`](crate::attribute_value).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAttribute`] if the snapshot cannot be interpreted.
    pub fn from_raw(transport: Arc<dyn DirectoryTransport>, raw: &Value) -> Result<Self> {
        let RawEntry { dn, attributes } = RawEntry::from_json(raw)?;
        Ok(Self::new(transport, attributes).with_dn_option(dn))
    }

    /// Creates an entry from a search result.
    ///
    /// Attributes with exactly one value become single-valued.
    #[must_use]
    pub fn from_search(transport: Arc<dyn DirectoryTransport>, entry: SearchResultEntry) -> Self {
        let dn = entry.dn.clone();
        Self::new(transport, entry.into_attributes()).with_dn(dn)
    }

    fn with_dn_option(mut self, dn: Option<String>) -> Self {
        self.dn = dn;
        self
    }

    /// Sets the distinguished name used by [`Entry::sync`].
    #[must_use]
    pub fn with_dn(mut self, dn: impl Into<String>) -> Self {
        self.dn = Some(dn.into());
        self
    }

    /// Distinguished name, if known.
    #[must_use]
    pub fn dn(&self) -> Option<&str> {
        self.dn.as_deref()
    }

    /// Current attribute snapshot.
    #[must_use]
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Value of one attribute in the snapshot.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
        self.attributes.get(attribute)
    }

    /// Computes what [`Entry::update`] would send for `desired`, without sending it.
    #[must_use]
    pub fn plan(&self, desired: &AttributeMap) -> ModifyPlan {
        ModifyPlan::compute(&self.attributes, desired)
    }

    /// Reconciles the entry at `dn` with `desired`.
    ///
    /// `desired` is the full target state: attributes missing from it are
    /// removed. All changes go out as one atomic batch; nothing is sent when
    /// the snapshot already matches. On success the snapshot is updated and
    /// the applied plan returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DirectoryOperation`] carrying the transport's error
    /// when the batch is rejected. The snapshot is left untouched.
    pub async fn update(&mut self, dn: &str, desired: &AttributeMap) -> Result<ModifyPlan> {
        let plan = self.plan(desired);
        let batch = plan.batch();

        if batch.is_empty() {
            debug!(dn, "entry already up to date");
            return Ok(plan);
        }

        debug!(
            dn,
            changed = plan.changed().len(),
            added = plan.added().len(),
            removed = plan.removed().len(),
            operations = batch.len(),
            "submitting modify batch"
        );
        self.transport
            .batch_modify(dn, &batch)
            .await
            .map_err(|source| Error::DirectoryOperation {
                dn: dn.to_string(),
                source,
            })?;

        plan.apply_to(&mut self.attributes);
        Ok(plan)
    }

    /// Same as [`Entry::update`], against the entry's own distinguished name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the entry has no known DN, or the
    /// errors of [`Entry::update`].
    pub async fn sync(&mut self, desired: &AttributeMap) -> Result<ModifyPlan> {
        let dn = self
            .dn
            .clone()
            .ok_or_else(|| Error::InvalidRequest("entry has no distinguished name".to_string()))?;
        self.update(&dn, desired).await
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("dn", &self.dn)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}
