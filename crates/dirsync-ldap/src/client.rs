//! LDAP client backed by `ldap3`.

use crate::{
    entry::Entry,
    operation::ModifyOperation,
    transport::{DirectoryTransport, TransportResult},
    Result,
};
use async_trait::async_trait;
use dirsync_core::{AttributeMap, AttributeValue, DirectoryConfig, Error, TransportError};
use ldap3::{LdapConnAsync, LdapConnSettings, Mod, Scope, SearchEntry, SearchResult};
use native_tls::{Certificate, TlsConnector};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Represents the search scope for LDAP queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Base object only.
    Base,
    /// One level below the base.
    OneLevel,
    /// Entire subtree.
    Subtree,
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

/// Entry returned by a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResultEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute map (values in server order).
    pub attributes: HashMap<String, Vec<String>>,
}

impl SearchResultEntry {
    /// Returns the first value of the attribute if present.
    #[must_use]
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(|values| values.first().map(String::as_str))
    }

    /// Returns all values for the attribute.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes.get(attribute).map(Vec::as_slice)
    }

    /// Converts the attributes into an [`AttributeMap`].
    ///
    /// Attributes with exactly one value become single-valued.
    #[must_use]
    pub fn into_attributes(self) -> AttributeMap {
        self.attributes
            .into_iter()
            .map(|(name, values)| (name, AttributeValue::from_values(values)))
            .collect()
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapSession: Send {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> TransportResult<()>;
    async fn search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[String],
    ) -> TransportResult<Vec<SearchResultEntry>>;
    async fn add(&mut self, dn: &str, attributes: &AttributeMap) -> TransportResult<()>;
    async fn delete(&mut self, dn: &str) -> TransportResult<()>;
    async fn modify(&mut self, dn: &str, operations: &[ModifyOperation]) -> TransportResult<()>;
    async fn unbind(&mut self) -> TransportResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub(crate) trait LdapConnector: Send + Sync {
    async fn connect(&self) -> TransportResult<Box<dyn LdapSession>>;
}

/// Directory client holding one shared LDAP connection.
///
/// Implements [`DirectoryTransport`], so it can be handed to
/// [`Entry`] and [`AttributeClient`](crate::AttributeClient) wrapped in an
/// [`Arc`].
pub struct LdapClient {
    config: Arc<DirectoryConfig>,
    connector: Box<dyn LdapConnector>,
    session: Mutex<Option<Box<dyn LdapSession>>>,
    connected: AtomicBool,
}

impl LdapClient {
    /// Creates a client that uses the real LDAP connector.
    ///
    /// No connection is opened until [`LdapClient::connect`] is called.
    #[must_use]
    pub fn new(config: DirectoryConfig) -> Self {
        let config = Arc::new(config);
        let connector: Box<dyn LdapConnector> = Box::new(RealLdapConnector::new(config.clone()));
        Self::from_parts(config, connector)
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_connector(
        config: DirectoryConfig,
        connector: Box<dyn LdapConnector>,
    ) -> Self {
        Self::from_parts(Arc::new(config), connector)
    }

    fn from_parts(config: Arc<DirectoryConfig>, connector: Box<dyn LdapConnector>) -> Self {
        Self {
            config,
            connector,
            session: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Opens the connection and, when credentials are configured, binds with them.
    ///
    /// An existing connection is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the connection or the bind fails.
    pub async fn connect(&self) -> Result<()> {
        let mut session = self.connector.connect().await?;
        if let Some((dn, password)) = self.config.credentials() {
            session.simple_bind(dn, password).await?;
            debug!(bind_dn = %dn, "bound with configured credentials");
        }

        let mut guard = self.session.lock().await;
        if let Some(mut previous) = guard.replace(session) {
            if let Err(err) = previous.unbind().await {
                warn!("failed to unbind replaced connection: {err}");
            }
        }
        self.connected.store(true, Ordering::SeqCst);
        info!(url = %self.config.url, "directory connection established");
        Ok(())
    }

    /// Binds the open connection as `dn`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if there is no connection or the server
    /// rejects the credentials.
    pub async fn bind(&self, dn: &str, password: &str) -> Result<()> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(TransportError::NotBound)?;
        session.simple_bind(dn, password).await?;
        debug!(bind_dn = %dn, "bind succeeded");
        Ok(())
    }

    /// Searches below `base_dn`.
    ///
    /// An empty `attributes` list requests all user attributes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the search fails.
    pub async fn search(
        &self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<SearchResultEntry>> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(TransportError::NotBound)?;
        let entries = session.search(base_dn, scope, filter, attributes).await?;
        debug!(base_dn, filter, count = entries.len(), "search completed");
        Ok(entries)
    }

    /// Finds every entry in the subtree of `base_dn` matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the search fails.
    pub async fn find(&self, base_dn: &str, filter: &str) -> Result<Vec<SearchResultEntry>> {
        self.search(base_dn, SearchScope::Subtree, filter, &["*".to_string()])
            .await
    }

    /// Reads the entry at `dn` and wraps it in an [`Entry`] driven by this client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the entry does not exist, or
    /// [`Error::Transport`] if the search fails.
    pub async fn load_entry(self: &Arc<Self>, dn: &str) -> Result<Entry> {
        let entry = self
            .search(dn, SearchScope::Base, "(objectClass=*)", &[])
            .await
            .map_err(|err| match err {
                Error::Transport(TransportError::Rejected { code: 32, .. }) => {
                    Error::NotFound(format!("entry `{dn}` not found"))
                }
                other => other,
            })?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("entry `{dn}` not found")))?;

        let transport: Arc<dyn DirectoryTransport> = self.clone();
        Ok(Entry::from_search(transport, entry))
    }

    /// Adds a new entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `attributes` is empty, or
    /// [`Error::Transport`] if the server rejects the entry.
    pub async fn add(&self, dn: &str, attributes: &AttributeMap) -> Result<()> {
        if attributes.is_empty() {
            return Err(Error::InvalidRequest(format!(
                "entry `{dn}` must have at least one attribute"
            )));
        }
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(TransportError::NotBound)?;
        session.add(dn, attributes).await?;
        info!(dn, "entry added");
        Ok(())
    }

    /// Deletes the entry at `dn`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the deletion fails.
    pub async fn delete(&self, dn: &str) -> Result<()> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(TransportError::NotBound)?;
        session.delete(dn).await?;
        info!(dn, "entry deleted");
        Ok(())
    }

    /// Closes the connection. Later operations fail with [`TransportError::NotBound`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the unbind request fails; the
    /// connection is dropped either way.
    pub async fn unbind(&self) -> Result<()> {
        let session = self.session.lock().await.take();
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut session) = session {
            session.unbind().await?;
            debug!("directory connection closed");
        }
        Ok(())
    }

    async fn send_modify(
        &self,
        dn: &str,
        operations: &[ModifyOperation],
    ) -> TransportResult<()> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(TransportError::NotBound)?;
        session.modify(dn, operations).await
    }
}

#[async_trait]
impl DirectoryTransport for LdapClient {
    fn is_bound(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn batch_modify(&self, dn: &str, batch: &[ModifyOperation]) -> TransportResult<()> {
        self.send_modify(dn, batch).await
    }

    async fn modify_add(&self, dn: &str, attributes: &AttributeMap) -> TransportResult<()> {
        let operations = operations_from(attributes, |attribute, values| ModifyOperation::Add {
            attribute,
            values,
        });
        self.send_modify(dn, &operations).await
    }

    async fn modify_replace(&self, dn: &str, attributes: &AttributeMap) -> TransportResult<()> {
        let operations =
            operations_from(attributes, |attribute, values| ModifyOperation::Replace {
                attribute,
                values,
            });
        self.send_modify(dn, &operations).await
    }

    async fn modify_delete(&self, dn: &str, attributes: &AttributeMap) -> TransportResult<()> {
        let operations = operations_from(attributes, |attribute, values| ModifyOperation::Delete {
            attribute,
            values,
        });
        self.send_modify(dn, &operations).await
    }
}

fn operations_from(
    attributes: &AttributeMap,
    build: impl Fn(String, Vec<String>) -> ModifyOperation,
) -> Vec<ModifyOperation> {
    attributes
        .iter()
        .map(|(name, value)| build(name.clone(), value.to_vec()))
        .collect()
}

/// Real LDAP connector backed by `ldap3`.
struct RealLdapConnector {
    config: Arc<DirectoryConfig>,
}

impl RealLdapConnector {
    fn new(config: Arc<DirectoryConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LdapConnector for RealLdapConnector {
    async fn connect(&self) -> TransportResult<Box<dyn LdapSession>> {
        let settings = build_ldap_settings(&self.config)?;
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.url)
            .await
            .map_err(map_ldap_error)?;
        ldap3::drive!(conn);
        Ok(Box::new(RealLdapSession {
            inner: ldap,
            operation_timeout: self.config.operation_timeout(),
        }))
    }
}

struct RealLdapSession {
    inner: ldap3::Ldap,
    operation_timeout: Duration,
}

#[async_trait]
impl LdapSession for RealLdapSession {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> TransportResult<()> {
        let result = timeout(self.operation_timeout, self.inner.simple_bind(dn, password))
            .await
            .map_err(|_| TransportError::Timeout("bind".to_string()))?
            .map_err(map_ldap_error)?;
        ensure_ldap_success(result)
    }

    async fn search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[String],
    ) -> TransportResult<Vec<SearchResultEntry>> {
        let SearchResult(entries, result) = timeout(
            self.operation_timeout,
            self.inner
                .search(base_dn, scope.into(), filter, attributes.to_vec()),
        )
        .await
        .map_err(|_| TransportError::Timeout("search".to_string()))?
        .map_err(map_ldap_error)?;
        ensure_ldap_success(result)?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| SearchResultEntry {
                dn: entry.dn,
                attributes: entry.attrs,
            })
            .collect())
    }

    async fn add(&mut self, dn: &str, attributes: &AttributeMap) -> TransportResult<()> {
        let attrs = attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.to_vec().into_iter().collect::<HashSet<_>>()))
            .collect::<Vec<_>>();

        let result = timeout(self.operation_timeout, self.inner.add(dn, attrs))
            .await
            .map_err(|_| TransportError::Timeout("add".to_string()))?
            .map_err(map_ldap_error)?;
        ensure_ldap_success(result)
    }

    async fn delete(&mut self, dn: &str) -> TransportResult<()> {
        let result = timeout(self.operation_timeout, self.inner.delete(dn))
            .await
            .map_err(|_| TransportError::Timeout("delete".to_string()))?
            .map_err(map_ldap_error)?;
        ensure_ldap_success(result)
    }

    async fn modify(&mut self, dn: &str, operations: &[ModifyOperation]) -> TransportResult<()> {
        let mods = operations.iter().map(to_ldap_mod).collect::<Vec<_>>();

        let result = timeout(self.operation_timeout, self.inner.modify(dn, mods))
            .await
            .map_err(|_| TransportError::Timeout("modify".to_string()))?
            .map_err(map_ldap_error)?;
        ensure_ldap_success(result)
    }

    async fn unbind(&mut self) -> TransportResult<()> {
        timeout(self.operation_timeout, self.inner.unbind())
            .await
            .map_err(|_| TransportError::Timeout("unbind".to_string()))?
            .map_err(map_ldap_error)
    }
}

fn to_ldap_mod(operation: &ModifyOperation) -> Mod<String> {
    let values = operation.values().iter().cloned().collect::<HashSet<_>>();
    match operation {
        ModifyOperation::Add { attribute, .. } => Mod::Add(attribute.clone(), values),
        ModifyOperation::Delete { attribute, .. } => Mod::Delete(attribute.clone(), values),
        ModifyOperation::Replace { attribute, .. } => Mod::Replace(attribute.clone(), values),
    }
}

fn build_ldap_settings(config: &DirectoryConfig) -> TransportResult<LdapConnSettings> {
    let mut settings = LdapConnSettings::new().set_conn_timeout(config.connection_timeout());

    if !config.tls_verify {
        warn!("TLS verification disabled for directory connection");
        let connector = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| {
                TransportError::Protocol(format!("failed to construct TLS connector: {err}"))
            })?;
        settings = settings.set_connector(connector).set_no_tls_verify(true);
    } else if let Some(cert_path) = &config.tls_ca_cert {
        debug!("loading directory CA certificate from {}", cert_path.display());
        let pem = fs::read(cert_path).map_err(|err| {
            TransportError::Protocol(format!(
                "failed to read CA certificate {}: {err}",
                cert_path.display()
            ))
        })?;
        let certificate = Certificate::from_pem(&pem)
            .map_err(|err| TransportError::Protocol(format!("invalid CA certificate: {err}")))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|err| {
                TransportError::Protocol(format!("failed to load CA certificate: {err}"))
            })?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

fn map_ldap_error(err: ldap3::LdapError) -> TransportError {
    match err {
        ldap3::LdapError::LdapResult { result } => TransportError::rejected(result.rc, result.text),
        other => TransportError::Protocol(other.to_string()),
    }
}

fn ensure_ldap_success(result: ldap3::LdapResult) -> TransportResult<()> {
    if result.rc == 0 {
        Ok(())
    } else {
        Err(TransportError::rejected(result.rc, result.text))
    }
}

/// Escapes a value for use inside an LDAP search filter (RFC 4515).
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Escapes a value for use as an attribute value in a DN (RFC 4514).
#[must_use]
pub fn escape_dn_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());
    for (idx, ch) in value.chars().enumerate() {
        if ch == '\0' {
            escaped.push_str("\\00");
            continue;
        }
        let needs_escape = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (idx == 0 && (ch == ' ' || ch == '#'))
            || (idx == last && ch == ' ');
        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
