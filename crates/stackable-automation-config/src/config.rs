use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::modification::Modification;

/// The address the Prometheus endpoint of the agents binds to, unless
/// overridden by the user.
pub const DEFAULT_PROMETHEUS_LISTEN_ADDRESS: &str = "0.0.0.0:9216";
pub const DEFAULT_PROMETHEUS_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_PROMETHEUS_MODE: &str = "opsManager";

/// The automation config document shared by all builders.
///
/// Only the parts owned by this crate are typed. Every other field is kept
/// verbatim in [`Self::rest`], so that reading and writing back a document
/// never drops anything.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationConfig {
    #[serde(default)]
    pub version: u64,

    /// The monitoring slot. It is replaced wholesale by the Prometheus
    /// modification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus: Option<Prometheus>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl AutomationConfig {
    /// Applies a single [`Modification`] to this document.
    pub fn apply(&mut self, modification: &impl Modification) -> &mut Self {
        modification.apply_to(self);
        self
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

/// Prometheus settings of the automation config.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Prometheus {
    pub enabled: bool,
    pub username: String,

    #[serde(default)]
    pub password: String,

    pub scheme: Scheme,

    /// Path of the combined certificate and private key, empty when TLS is
    /// not used.
    #[serde(default)]
    pub tls_pem_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_pem_password: Option<String>,

    pub mode: String,

    /// `host:port` the endpoint binds to.
    pub listen_address: String,
    pub metrics_path: String,
}

impl Prometheus {
    /// Returns the default Prometheus settings for the given user.
    ///
    /// This is a pure function, every call returns a fresh value.
    pub fn new_default(username: impl Into<String>) -> Self {
        Self {
            enabled: true,
            username: username.into(),
            password: String::new(),
            scheme: Scheme::Http,
            tls_pem_path: String::new(),
            tls_pem_password: None,
            mode: DEFAULT_PROMETHEUS_MODE.to_owned(),
            listen_address: DEFAULT_PROMETHEUS_LISTEN_ADDRESS.to_owned(),
            metrics_path: DEFAULT_PROMETHEUS_METRICS_PATH.to_owned(),
        }
    }
}
