//! Builds the [`Modification`] which enables the Prometheus endpoint of the
//! MongoDB agents.
//!
//! All secrets are read while building. The returned modification only
//! carries the resolved values, so applying it can neither fail nor perform
//! any I/O.
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use snafu::{ResultExt, Snafu};
use stackable_automation_config::{
    AutomationConfig, BoxedModification, Modification, Noop, Prometheus, Scheme,
};
use tracing::{debug, instrument};

use crate::{
    crd::{self, MongoDBCommunity},
    secret::{SecretAccessor, SecretError, SecretReference},
    tls::{self, PemFileNaming, TlsPemMount},
};

/// The Prometheus endpoint always binds to all interfaces.
pub const LISTEN_HOST: &str = "0.0.0.0";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("could not configure Prometheus modification"))]
    ReadPassword {
        source: SecretError,
        secret_ref: SecretReference,
    },

    #[snafu(display("could not configure Prometheus modification"))]
    ResolveSecretReference { source: SecretError },

    #[snafu(transparent)]
    Tls { source: tls::Error },
}

/// The resolved Prometheus settings, ready to be applied to any
/// [`AutomationConfig`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrometheusModification {
    password: String,
    scheme: Scheme,
    tls_pem_path: String,
    spec: crd::Prometheus,
}

impl Modification for PrometheusModification {
    fn apply_to(&self, config: &mut AutomationConfig) {
        let mut prometheus = Prometheus::new_default(&self.spec.username);

        prometheus.tls_pem_path.clone_from(&self.tls_pem_path);
        prometheus.scheme = self.scheme;
        prometheus.password.clone_from(&self.password);

        if let Some(port) = self.spec.port_override() {
            prometheus.listen_address = format!("{LISTEN_HOST}:{port}");
        }

        if let Some(metrics_path) = self.spec.metrics_path_override() {
            metrics_path.clone_into(&mut prometheus.metrics_path);
        }

        config.prometheus = Some(prometheus);
    }
}

/// Builds the Prometheus modification for the given resource.
pub async fn prometheus_modification(
    secrets: &(impl SecretAccessor + ?Sized),
    mdb: &MongoDBCommunity,
) -> Result<BoxedModification, Error> {
    build_prometheus_modification(secrets, &mdb.metadata, mdb.spec.prometheus.as_ref()).await
}

/// Builds the Prometheus modification, mounting TLS credentials below the
/// default operator secret mount path.
///
/// Returns [`Noop`] if `prometheus` is [`None`].
pub async fn build_prometheus_modification(
    secrets: &(impl SecretAccessor + ?Sized),
    owner: &ObjectMeta,
    prometheus: Option<&crd::Prometheus>,
) -> Result<BoxedModification, Error> {
    build_prometheus_modification_with(secrets, owner, prometheus, &TlsPemMount::default()).await
}

/// Like [`build_prometheus_modification`], with an explicit TLS mount
/// convention.
#[instrument(skip(secrets, owner, prometheus, tls_mount), fields(owner = owner.name.as_deref()))]
pub async fn build_prometheus_modification_with<N: PemFileNaming>(
    secrets: &(impl SecretAccessor + ?Sized),
    owner: &ObjectMeta,
    prometheus: Option<&crd::Prometheus>,
    tls_mount: &TlsPemMount<N>,
) -> Result<BoxedModification, Error> {
    let Some(prometheus) = prometheus else {
        debug!("prometheus is not configured, skipping");
        return Ok(Box::new(Noop));
    };

    let password_secret_ref =
        SecretReference::for_owner(owner, &prometheus.password_secret_ref.name)
            .context(ResolveSecretReferenceSnafu)?;
    let password = secrets
        .read_key(&password_secret_ref, prometheus.password_key())
        .await
        .with_context(|_| ReadPasswordSnafu {
            secret_ref: password_secret_ref.clone(),
        })?;

    let (scheme, tls_pem_path) = match prometheus.tls_secret_name() {
        Some(tls_secret_name) => {
            let tls_secret_ref = SecretReference::for_owner(owner, tls_secret_name)
                .context(ResolveSecretReferenceSnafu)?;
            let pem = tls::resolve_pem(secrets, &tls_secret_ref).await?;
            (Scheme::Https, tls_mount.pem_path(&pem))
        }
        None => (Scheme::Http, String::new()),
    };

    debug!(%scheme, tls_pem_path = %tls_pem_path, "resolved prometheus settings");
    Ok(Box::new(PrometheusModification {
        password,
        scheme,
        tls_pem_path,
        spec: prometheus.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::{crd::SecretKeyReference, secret::StaticSecretAccessor, tls::TLS_PEM_KEY};

    const NAMESPACE: &str = "mongodb";

    #[fixture]
    fn owner() -> ObjectMeta {
        ObjectMeta {
            name: Some("example-mongodb".to_owned()),
            namespace: Some(NAMESPACE.to_owned()),
            ..ObjectMeta::default()
        }
    }

    #[fixture]
    fn secrets() -> StaticSecretAccessor {
        StaticSecretAccessor::new()
            .with_secret(secret_ref("prometheus-password"), [("password", "hunter2")])
            .with_secret(secret_ref("prometheus-tls"), [(TLS_PEM_KEY, "pem-content")])
    }

    fn secret_ref(name: &str) -> SecretReference {
        SecretReference {
            namespace: NAMESPACE.to_owned(),
            name: name.to_owned(),
        }
    }

    fn spec() -> crd::Prometheus {
        crd::Prometheus {
            username: "prometheus-username".to_owned(),
            password_secret_ref: SecretKeyReference {
                name: "prometheus-password".to_owned(),
                key: None,
            },
            ..crd::Prometheus::default()
        }
    }

    fn with_tls(spec: crd::Prometheus) -> crd::Prometheus {
        crd::Prometheus {
            tls_secret_key_ref: Some(SecretKeyReference {
                name: "prometheus-tls".to_owned(),
                key: None,
            }),
            ..spec
        }
    }

    fn document() -> AutomationConfig {
        serde_json::from_value(json!({
            "version": 7,
            "processes": [{"name": "example-mongodb-0"}],
        }))
        .unwrap()
    }

    fn apply(modification: &BoxedModification) -> Prometheus {
        let mut config = document();
        config.apply(modification);
        config.prometheus.unwrap()
    }

    #[rstest]
    #[tokio::test]
    async fn disabled_is_noop(owner: ObjectMeta) {
        let modification = build_prometheus_modification(&StaticSecretAccessor::new(), &owner, None)
            .await
            .unwrap();
        assert!(modification.is_noop());

        let mut config = document();
        config.apply(&modification);
        assert_eq!(config, document());
    }

    #[rstest]
    #[tokio::test]
    async fn http(owner: ObjectMeta, secrets: StaticSecretAccessor) {
        let modification = build_prometheus_modification(&secrets, &owner, Some(&spec()))
            .await
            .unwrap();
        let prometheus = apply(&modification);

        assert_eq!(
            prometheus,
            Prometheus {
                password: "hunter2".to_owned(), // pragma: allowlist secret
                ..Prometheus::new_default("prometheus-username")
            }
        );
        assert_eq!(prometheus.scheme, Scheme::Http);
        assert_eq!(prometheus.tls_pem_path, "");
    }

    #[rstest]
    #[tokio::test]
    async fn https(owner: ObjectMeta, secrets: StaticSecretAccessor) {
        let first = build_prometheus_modification(&secrets, &owner, Some(&with_tls(spec())))
            .await
            .unwrap();
        let second = build_prometheus_modification(&secrets, &owner, Some(&with_tls(spec())))
            .await
            .unwrap();

        let prometheus = apply(&first);
        assert_eq!(prometheus.scheme, Scheme::Https);
        assert_eq!(
            prometheus.tls_pem_path,
            TlsPemMount::default().pem_path("pem-content")
        );
        assert_eq!(prometheus, apply(&second));
    }

    #[rstest]
    #[tokio::test]
    async fn empty_tls_secret_name_is_http(owner: ObjectMeta, secrets: StaticSecretAccessor) {
        let spec = crd::Prometheus {
            tls_secret_key_ref: Some(SecretKeyReference::default()),
            ..spec()
        };

        let modification = build_prometheus_modification(&secrets, &owner, Some(&spec))
            .await
            .unwrap();
        assert_eq!(apply(&modification).scheme, Scheme::Http);
    }

    #[rstest]
    #[tokio::test]
    async fn missing_password_secret(owner: ObjectMeta) {
        let secrets = StaticSecretAccessor::new()
            .with_secret(secret_ref("prometheus-tls"), [(TLS_PEM_KEY, "pem-content")]);

        let err = build_prometheus_modification(&secrets, &owner, Some(&spec()))
            .await
            .err()
            .unwrap();

        assert_eq!(err.to_string(), "could not configure Prometheus modification");
        assert!(matches!(
            err,
            Error::ReadPassword {
                source: SecretError::SecretNotFound { .. },
                ..
            }
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn missing_password_key(owner: ObjectMeta, secrets: StaticSecretAccessor) {
        let spec = crd::Prometheus {
            password_secret_ref: SecretKeyReference {
                name: "prometheus-password".to_owned(),
                key: Some("other".to_owned()),
            },
            ..spec()
        };

        let err = build_prometheus_modification(&secrets, &owner, Some(&spec))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::ReadPassword {
                source: SecretError::KeyNotFound { .. },
                ..
            }
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn tls_errors_are_not_wrapped(owner: ObjectMeta) {
        let secrets = StaticSecretAccessor::new()
            .with_secret(secret_ref("prometheus-password"), [("password", "hunter2")])
            .with_secret(secret_ref("prometheus-tls"), [("tls.crt", "certificate")]);

        let err = build_prometheus_modification(&secrets, &owner, Some(&with_tls(spec())))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::Tls {
                source: tls::Error::MissingPrivateKey { .. }
            }
        ));
        assert!(err.to_string().contains("tls.key"));
    }

    #[rstest]
    #[tokio::test]
    async fn owner_without_namespace(secrets: StaticSecretAccessor) {
        let err = build_prometheus_modification(&secrets, &ObjectMeta::default(), Some(&spec()))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::ResolveSecretReference { .. }));
    }

    #[rstest]
    #[case(None, "0.0.0.0:9216")]
    #[case(Some(0), "0.0.0.0:9216")]
    #[case(Some(9216), "0.0.0.0:9216")]
    #[case(Some(9999), "0.0.0.0:9999")]
    #[tokio::test]
    async fn port_override(
        owner: ObjectMeta,
        secrets: StaticSecretAccessor,
        #[case] port: Option<u16>,
        #[case] expected: &str,
    ) {
        let spec = crd::Prometheus { port, ..spec() };

        let modification = build_prometheus_modification(&secrets, &owner, Some(&spec))
            .await
            .unwrap();
        assert_eq!(apply(&modification).listen_address, expected);
    }

    #[rstest]
    #[case(None, "/metrics")]
    #[case(Some(""), "/metrics")]
    #[case(Some("/custom"), "/custom")]
    #[tokio::test]
    async fn metrics_path_override(
        owner: ObjectMeta,
        secrets: StaticSecretAccessor,
        #[case] metrics_path: Option<&str>,
        #[case] expected: &str,
    ) {
        let spec = crd::Prometheus {
            metrics_path: metrics_path.map(ToOwned::to_owned),
            ..spec()
        };

        let modification = build_prometheus_modification(&secrets, &owner, Some(&spec))
            .await
            .unwrap();
        assert_eq!(apply(&modification).metrics_path, expected);
    }

    #[rstest]
    #[tokio::test]
    async fn replaces_prior_prometheus_wholesale(owner: ObjectMeta, secrets: StaticSecretAccessor) {
        let modification = build_prometheus_modification(&secrets, &owner, Some(&spec()))
            .await
            .unwrap();

        let mut config = document();
        config.prometheus = Some(Prometheus {
            tls_pem_password: Some("stale".to_owned()),
            listen_address: "127.0.0.1:1234".to_owned(),
            ..Prometheus::new_default("previous-user")
        });
        config.apply(&modification);

        let prometheus = config.prometheus.unwrap();
        assert_eq!(prometheus.username, "prometheus-username");
        assert_eq!(prometheus.tls_pem_password, None);
        assert_eq!(prometheus.listen_address, "0.0.0.0:9216");
    }

    #[rstest]
    #[tokio::test]
    async fn idempotent(owner: ObjectMeta, secrets: StaticSecretAccessor) {
        let modification = build_prometheus_modification(&secrets, &owner, Some(&with_tls(spec())))
            .await
            .unwrap();

        let mut once = document();
        once.apply(&modification);

        let mut twice = document();
        twice.apply(&modification).apply(&modification);

        assert_eq!(once, twice);
        assert_eq!(once.version, 7);
        assert_eq!(once.rest["processes"], json!([{"name": "example-mongodb-0"}]));
    }
}
