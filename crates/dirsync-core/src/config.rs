//! Configuration for connecting to a directory server.

use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Default connection timeout (seconds).
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;
/// Default operation timeout (seconds).
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;

/// Configuration for a directory client.
///
/// Can be built with [`DirectoryConfig::new`] and the `with_*` methods, or
/// deserialized from any serde format. The bind password is never serialized.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct DirectoryConfig {
    /// Directory URL (`ldap://`, `ldaps://` or `ldapi://`)
    #[validate(url)]
    pub url: String,

    /// Base distinguished name searches are rooted at
    pub base_dn: String,

    /// Distinguished name used for simple binds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_dn: Option<String>,

    /// Password used for simple binds
    #[serde(default, skip_serializing)]
    pub bind_password: Option<SecretString>,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional path to a PEM-encoded CA certificate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Connection timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Per-operation timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_connection_timeout_secs() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

const fn default_operation_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

impl DirectoryConfig {
    /// Creates a new configuration with default timeouts and TLS verification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the URL is invalid or the base DN is empty.
    pub fn new(url: impl Into<String>, base_dn: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            url: url.into(),
            base_dn: base_dn.into(),
            bind_dn: None,
            bind_password: None,
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            connection_timeout_secs: default_connection_timeout_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
        };
        config.check()?;
        Ok(config)
    }

    /// Validates field constraints and the base DN.
    ///
    /// Call this after deserializing a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] describing the first problem found.
    pub fn check(&self) -> Result<(), Error> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;
        if self.base_dn.trim().is_empty() {
            return Err(Error::ConfigError("base DN cannot be empty".to_string()));
        }
        if self.bind_dn.is_some() != self.bind_password.is_some() {
            return Err(Error::ConfigError(
                "bind DN and bind password must be set together".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the simple bind credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        bind_dn: impl Into<String>,
        bind_password: impl Into<String>,
    ) -> Self {
        self.bind_dn = Some(bind_dn.into());
        self.bind_password = Some(SecretString::from(bind_password.into()));
        self
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn with_tls_verification(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Sets the custom CA certificate path for TLS verification.
    #[must_use]
    pub fn with_tls_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Overrides the connection timeout in seconds.
    #[must_use]
    pub const fn with_connection_timeout_secs(mut self, seconds: u64) -> Self {
        self.connection_timeout_secs = seconds;
        self
    }

    /// Overrides the operation timeout in seconds.
    #[must_use]
    pub const fn with_operation_timeout_secs(mut self, seconds: u64) -> Self {
        self.operation_timeout_secs = seconds;
        self
    }

    /// Returns the bind credentials, if both DN and password are configured.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.bind_dn, &self.bind_password) {
            (Some(dn), Some(password)) => Some((dn.as_str(), password.expose_secret())),
            _ => None,
        }
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Returns the operation timeout duration.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Parse the directory URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_url(&self) -> Result<Url, Error> {
        Url::parse(&self.url).map_err(|e| Error::ConfigError(format!("Invalid directory URL: {e}")))
    }
}
