//! The `MongoDBCommunity` custom resource, reduced to the parts the
//! modification builders in this crate read.
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::secret::{SecretError, SecretReference};

/// The key of the password secret which is used when the user doesn't set
/// one.
pub const DEFAULT_PASSWORD_KEY: &str = "password";

#[derive(Clone, CustomResource, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "mongodbcommunity.mongodb.com",
    version = "v1",
    kind = "MongoDBCommunity",
    plural = "mongodbcommunity",
    shortname = "mdbc",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MongoDBCommunitySpec {
    /// Number of members of the replica set.
    #[serde(default)]
    pub members: u16,

    /// MongoDB version, e.g. `6.0.5`.
    #[serde(default)]
    pub version: String,

    /// Prometheus endpoint of the agents. Monitoring is disabled when not
    /// set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus: Option<Prometheus>,
}

/// Configures the Prometheus endpoint exposed by the MongoDB agents.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prometheus {
    /// Username for basic authentication against the endpoint.
    pub username: String,

    /// Secret holding the password for basic authentication. The key
    /// defaults to `password`.
    pub password_secret_ref: SecretKeyReference,

    /// Secret holding the TLS certificate and key. Either `tls.pem`, or
    /// `tls.crt` and `tls.key` must be present. The endpoint is served via
    /// HTTPS if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_secret_key_ref: Option<SecretKeyReference>,

    /// Port the endpoint binds to, defaults to 9216.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// HTTP path metrics are served under, defaults to `/metrics`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<String>,
}

impl Prometheus {
    pub fn password_key(&self) -> &str {
        self.password_secret_ref.key_or(DEFAULT_PASSWORD_KEY)
    }

    /// Returns the name of the TLS secret, treating an empty name as unset.
    pub fn tls_secret_name(&self) -> Option<&str> {
        self.tls_secret_key_ref
            .as_ref()
            .map(|tls| tls.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// The configured port, unless it is unset or zero.
    pub fn port_override(&self) -> Option<u16> {
        self.port.filter(|port| *port > 0)
    }

    /// The configured metrics path, unless it is unset or empty.
    pub fn metrics_path_override(&self) -> Option<&str> {
        self.metrics_path
            .as_deref()
            .filter(|metrics_path| !metrics_path.is_empty())
    }
}

/// A reference to a secret in the namespace of the owning object, plus an
/// optional key within it.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyReference {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl SecretKeyReference {
    /// Returns the configured key, or `default` if it is unset or empty.
    pub fn key_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.key
            .as_deref()
            .filter(|key| !key.is_empty())
            .unwrap_or(default)
    }
}

impl MongoDBCommunity {
    /// The secret holding the Prometheus TLS certificate, scoped to the
    /// namespace of this resource.
    pub fn prometheus_tls_secret_ref(&self) -> Result<Option<SecretReference>, SecretError> {
        self.spec
            .prometheus
            .as_ref()
            .and_then(Prometheus::tls_secret_name)
            .map(|name| SecretReference::for_owner(&self.metadata, name))
            .transpose()
    }

    /// The secret holding the Prometheus password, scoped to the namespace
    /// of this resource.
    pub fn prometheus_password_secret_ref(&self) -> Result<Option<SecretReference>, SecretError> {
        self.spec
            .prometheus
            .as_ref()
            .map(|prometheus| {
                SecretReference::for_owner(&self.metadata, &prometheus.password_secret_ref.name)
            })
            .transpose()
    }

    pub fn prometheus_enabled(&self) -> bool {
        self.spec.prometheus.is_some()
    }

    pub fn resource_name(&self) -> String {
        self.name_any()
    }
}
