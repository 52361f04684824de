//! Stateless single-attribute operations.

use crate::{transport::DirectoryTransport, Result};
use dirsync_core::{AttributeMap, Error};
use std::sync::Arc;

const EMPTY_ATTRIBUTES: &str = "attribute must have at least one value";

/// Adds, replaces or deletes attributes on any entry, without tracking state.
///
/// Each call validates its input locally and then issues exactly one
/// transport primitive.
#[derive(Clone)]
pub struct AttributeClient {
    transport: Arc<dyn DirectoryTransport>,
}

impl AttributeClient {
    /// Creates a facade over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn DirectoryTransport>) -> Self {
        Self { transport }
    }

    /// Adds values to existing or new attributes of `dn`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Attribute`] if `attributes` is empty or the directory
    /// rejects the change.
    pub async fn add_attribute(&self, dn: &str, attributes: &AttributeMap) -> Result<()> {
        ensure_not_empty(attributes)?;
        self.transport
            .modify_add(dn, attributes)
            .await
            .map_err(|err| Error::Attribute(err.to_string()))
    }

    /// Replaces the values of attributes of `dn`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Attribute`] if `attributes` is empty or the directory
    /// rejects the change.
    pub async fn update_attribute(&self, dn: &str, attributes: &AttributeMap) -> Result<()> {
        ensure_not_empty(attributes)?;
        self.transport
            .modify_replace(dn, attributes)
            .await
            .map_err(|err| Error::Attribute(err.to_string()))
    }

    /// Deletes values (or, with an empty multi-value, whole attributes) from `dn`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Attribute`] if `attributes` is empty or the directory
    /// rejects the change.
    pub async fn delete_attribute(&self, dn: &str, attributes: &AttributeMap) -> Result<()> {
        ensure_not_empty(attributes)?;
        self.transport
            .modify_delete(dn, attributes)
            .await
            .map_err(|err| Error::Attribute(err.to_string()))
    }
}

fn ensure_not_empty(attributes: &AttributeMap) -> Result<()> {
    if attributes.is_empty() {
        return Err(Error::Attribute(EMPTY_ATTRIBUTES.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockDirectoryTransport;
    use dirsync_core::{AttributeValue, TransportError};

    const DN: &str = "uid=alice,ou=People,dc=example,dc=com";

    fn title() -> AttributeMap {
        let mut attributes = AttributeMap::new();
        attributes.insert("title".to_string(), AttributeValue::single("eng"));
        attributes
    }

    #[tokio::test]
    async fn empty_mapping_fails_before_transport() {
        let mut transport = MockDirectoryTransport::new();
        transport.expect_modify_add().never();
        transport.expect_modify_replace().never();
        transport.expect_modify_delete().never();
        let client = AttributeClient::new(Arc::new(transport));

        for result in [
            client.add_attribute(DN, &AttributeMap::new()).await,
            client.update_attribute(DN, &AttributeMap::new()).await,
            client.delete_attribute(DN, &AttributeMap::new()).await,
        ] {
            assert_eq!(result, Err(Error::Attribute(EMPTY_ATTRIBUTES.to_string())));
        }
    }

    #[tokio::test]
    async fn add_issues_one_modify_add() {
        let mut transport = MockDirectoryTransport::new();
        transport
            .expect_modify_add()
            .withf(|dn, attributes| dn == DN && *attributes == title())
            .times(1)
            .returning(|_, _| Ok(()));

        let client = AttributeClient::new(Arc::new(transport));
        client.add_attribute(DN, &title()).await.unwrap();
    }

    #[tokio::test]
    async fn update_issues_one_modify_replace() {
        let mut transport = MockDirectoryTransport::new();
        transport
            .expect_modify_replace()
            .times(1)
            .returning(|_, _| Ok(()));

        let client = AttributeClient::new(Arc::new(transport));
        client.update_attribute(DN, &title()).await.unwrap();
    }

    #[tokio::test]
    async fn delete_failure_carries_transport_text() {
        let mut transport = MockDirectoryTransport::new();
        transport
            .expect_modify_delete()
            .times(1)
            .returning(|_, _| Err(TransportError::rejected(16, "no such attribute")));

        let client = AttributeClient::new(Arc::new(transport));
        let err = client.delete_attribute(DN, &title()).await.unwrap_err();
        assert_eq!(
            err,
            Error::Attribute("no such attribute (result code 16)".to_string())
        );
    }
}
