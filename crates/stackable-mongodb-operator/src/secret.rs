//! Read access to Kubernetes [`Secret`]s.
//!
//! Builders only ever see the [`SecretAccessor`] trait, which allows them to
//! be driven either by a live cluster ([`KubeSecretAccessor`]) or by secret
//! contents which are already known ([`StaticSecretAccessor`]).
use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
};

use async_trait::async_trait;
use k8s_openapi::{api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use kube::{Api, runtime::reflector::ObjectRef};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, instrument};

#[derive(Debug, Snafu)]
pub enum SecretError {
    #[snafu(display("failed to retrieve secret {secret_ref}"))]
    GetSecret {
        source: kube::Error,
        secret_ref: SecretReference,
    },

    #[snafu(display("secret {secret_ref} does not exist"))]
    SecretNotFound { secret_ref: SecretReference },

    #[snafu(display("secret {secret_ref} does not contain the key {key:?}"))]
    KeyNotFound {
        secret_ref: SecretReference,
        key: String,
    },

    #[snafu(display("the value of key {key:?} in secret {secret_ref} is not valid UTF-8"))]
    DecodeUtf8 {
        source: std::string::FromUtf8Error,
        secret_ref: SecretReference,
        key: String,
    },

    #[snafu(display("the owning object {name:?} has no namespace"))]
    ObjectHasNoNamespace { name: String },
}

/// [`SecretReference`] identifies a Kubernetes [`Secret`] by name and
/// namespace.
///
/// The namespace is always the one of the object owning the reference, users
/// can't point at secrets in other namespaces. Use [`Self::for_owner`] to
/// construct one.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Namespace of the Secret being referred to.
    pub namespace: String,

    /// Name of the Secret being referred to.
    pub name: String,
}

impl SecretReference {
    /// Creates a reference to the secret `name` in the namespace of `owner`.
    pub fn for_owner(owner: &ObjectMeta, name: impl Into<String>) -> Result<Self, SecretError> {
        let namespace = owner
            .namespace
            .clone()
            .with_context(|| ObjectHasNoNamespaceSnafu {
                name: owner.name.clone().unwrap_or_default(),
            })?;

        Ok(Self {
            namespace,
            name: name.into(),
        })
    }
}

// Use ObjectRef for logging/errors
impl Display for SecretReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        ObjectRef::<Secret>::from(self).fmt(f)
    }
}

impl From<&SecretReference> for ObjectRef<Secret> {
    fn from(val: &SecretReference) -> Self {
        ObjectRef::<Secret>::new(&val.name).within(&val.namespace)
    }
}

/// Key-value read access to namespaced secrets.
//
// async-trait keeps the trait usable as `dyn SecretAccessor`.
#[async_trait]
pub trait SecretAccessor: Send + Sync {
    /// Returns all entries of the referenced secret.
    async fn read_data(
        &self,
        secret_ref: &SecretReference,
    ) -> Result<BTreeMap<String, String>, SecretError>;

    /// Returns the value stored under `key` in the referenced secret.
    async fn read_key(&self, secret_ref: &SecretReference, key: &str) -> Result<String, SecretError> {
        let mut data = self.read_data(secret_ref).await?;
        data.remove(key).with_context(|| KeyNotFoundSnafu {
            secret_ref: secret_ref.clone(),
            key,
        })
    }
}

/// Reads secrets from the Kubernetes API.
#[derive(Clone)]
pub struct KubeSecretAccessor {
    client: kube::Client,
}

impl KubeSecretAccessor {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretAccessor for KubeSecretAccessor {
    #[instrument(skip(self))]
    async fn read_data(
        &self,
        secret_ref: &SecretReference,
    ) -> Result<BTreeMap<String, String>, SecretError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &secret_ref.namespace);
        let secret = api
            .get_opt(&secret_ref.name)
            .await
            .with_context(|_| GetSecretSnafu {
                secret_ref: secret_ref.clone(),
            })?
            .with_context(|| SecretNotFoundSnafu {
                secret_ref: secret_ref.clone(),
            })?;

        secret_data(secret_ref, secret)
    }
}

/// Decodes the `data` and `stringData` entries of a [`Secret`].
///
/// `stringData` takes precedence, mirroring what the API server does on
/// write.
fn secret_data(
    secret_ref: &SecretReference,
    secret: Secret,
) -> Result<BTreeMap<String, String>, SecretError> {
    let mut decoded = BTreeMap::new();

    for (key, value) in secret.data.unwrap_or_default() {
        let value = String::from_utf8(value.0).with_context(|_| DecodeUtf8Snafu {
            secret_ref: secret_ref.clone(),
            key: key.clone(),
        })?;
        decoded.insert(key, value);
    }
    decoded.extend(secret.string_data.unwrap_or_default());

    debug!(
        secret = %secret_ref,
        keys = ?decoded.keys().collect::<Vec<_>>(),
        "read secret"
    );
    Ok(decoded)
}

/// Serves secrets from memory.
#[derive(Clone, Debug, Default)]
pub struct StaticSecretAccessor {
    secrets: HashMap<SecretReference, BTreeMap<String, String>>,
}

impl StaticSecretAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the secret `secret_ref` with the given entries.
    pub fn with_secret<K, V>(
        mut self,
        secret_ref: SecretReference,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.secrets.insert(
            secret_ref,
            data.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        );
        self
    }
}

#[async_trait]
impl SecretAccessor for StaticSecretAccessor {
    async fn read_data(
        &self,
        secret_ref: &SecretReference,
    ) -> Result<BTreeMap<String, String>, SecretError> {
        self.secrets
            .get(secret_ref)
            .cloned()
            .with_context(|| SecretNotFoundSnafu {
                secret_ref: secret_ref.clone(),
            })
    }
}
