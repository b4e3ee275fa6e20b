//! Resolves the TLS credential of an endpoint into a single PEM blob and
//! derives where the agents expect to find it on disk.
//!
//! The file itself is materialized by the volume mounting the operator
//! secret, this module only computes the path.
use sha2::{Digest, Sha256};
use snafu::{ResultExt, Snafu, ensure};
use tracing::{debug, instrument};

use crate::secret::{SecretAccessor, SecretError, SecretReference};

/// Key of the combined certificate and private key.
pub const TLS_PEM_KEY: &str = "tls.pem";
pub const TLS_CERTIFICATE_KEY: &str = "tls.crt";
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Directory the operator secret holding the server PEM files is mounted to.
pub const TLS_OPERATOR_SECRET_MOUNT_PATH: &str = "/var/lib/tls/server/";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read TLS secret {secret_ref}"))]
    ReadTlsSecret {
        source: SecretError,
        secret_ref: SecretReference,
    },

    #[snafu(display(
        "the TLS secret {secret_ref} contains neither {TLS_PEM_KEY:?} nor {TLS_CERTIFICATE_KEY:?} and {TLS_PRIVATE_KEY_KEY:?}"
    ))]
    NoCertificateData { secret_ref: SecretReference },

    #[snafu(display(
        "the TLS secret {secret_ref} contains {TLS_PRIVATE_KEY_KEY:?} but no {TLS_CERTIFICATE_KEY:?}"
    ))]
    MissingCertificate { secret_ref: SecretReference },

    #[snafu(display(
        "the TLS secret {secret_ref} contains {TLS_CERTIFICATE_KEY:?} but no {TLS_PRIVATE_KEY_KEY:?}"
    ))]
    MissingPrivateKey { secret_ref: SecretReference },

    #[snafu(display(
        "the TLS secret {secret_ref} contains {TLS_PEM_KEY:?} which does not match {TLS_CERTIFICATE_KEY:?} and {TLS_PRIVATE_KEY_KEY:?}"
    ))]
    PemMismatch { secret_ref: SecretReference },
}

impl Error {
    /// Whether the secret could be read, but its contents don't form a
    /// usable credential.
    pub fn is_certificate_assembly_error(&self) -> bool {
        !matches!(self, Self::ReadTlsSecret { .. })
    }
}

/// Reads the TLS secret and returns the certificate and private key as one
/// PEM blob.
///
/// A `tls.crt` and `tls.key` pair is joined into `<crt>\n<key>`. If the
/// secret only carries `tls.pem`, it is returned verbatim. If it carries
/// both, they must agree.
#[instrument(skip(secrets))]
pub async fn resolve_pem(
    secrets: &(impl SecretAccessor + ?Sized),
    secret_ref: &SecretReference,
) -> Result<String, Error> {
    let mut data = secrets
        .read_data(secret_ref)
        .await
        .with_context(|_| ReadTlsSecretSnafu {
            secret_ref: secret_ref.clone(),
        })?;

    let concatenated = match (
        data.remove(TLS_CERTIFICATE_KEY),
        data.remove(TLS_PRIVATE_KEY_KEY),
    ) {
        (Some(certificate), Some(private_key)) => {
            Some(combine_certificate_and_key(&certificate, &private_key))
        }
        (None, Some(_)) => {
            return MissingCertificateSnafu {
                secret_ref: secret_ref.clone(),
            }
            .fail();
        }
        (Some(_), None) => {
            return MissingPrivateKeySnafu {
                secret_ref: secret_ref.clone(),
            }
            .fail();
        }
        (None, None) => None,
    };
    let pem = data.remove(TLS_PEM_KEY);

    match (concatenated, pem) {
        (Some(concatenated), Some(pem)) => {
            ensure!(
                concatenated == pem,
                PemMismatchSnafu {
                    secret_ref: secret_ref.clone(),
                }
            );
            Ok(concatenated)
        }
        (Some(concatenated), None) => {
            debug!("using concatenated {TLS_CERTIFICATE_KEY} and {TLS_PRIVATE_KEY_KEY}");
            Ok(concatenated)
        }
        (None, Some(pem)) => {
            debug!("using {TLS_PEM_KEY}");
            Ok(pem)
        }
        (None, None) => NoCertificateDataSnafu {
            secret_ref: secret_ref.clone(),
        }
        .fail(),
    }
}

fn combine_certificate_and_key(certificate: &str, private_key: &str) -> String {
    format!(
        "{}\n{}",
        certificate.trim_end_matches('\n'),
        private_key.trim_end_matches('\n')
    )
}

/// Derives the file name of a PEM credential from its content.
///
/// Implementations must be deterministic, the same content always maps to the
/// same name.
pub trait PemFileNaming: Send + Sync {
    fn file_name(&self, pem: &str) -> String;
}

/// Names the file after the hex encoded SHA-256 digest of its content, so a
/// rotated certificate ends up in a new file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ContentHashFileNaming;

impl PemFileNaming for ContentHashFileNaming {
    fn file_name(&self, pem: &str) -> String {
        format!("{:x}.pem", Sha256::digest(pem.as_bytes()))
    }
}

/// Where TLS credentials are mounted into the agent containers.
#[derive(Clone, Debug)]
pub struct TlsPemMount<N = ContentHashFileNaming> {
    mount_path: String,
    naming: N,
}

impl Default for TlsPemMount {
    fn default() -> Self {
        Self::new(TLS_OPERATOR_SECRET_MOUNT_PATH, ContentHashFileNaming)
    }
}

impl<N: PemFileNaming> TlsPemMount<N> {
    pub fn new(mount_path: impl Into<String>, naming: N) -> Self {
        Self {
            mount_path: mount_path.into(),
            naming,
        }
    }

    /// Returns the path the given credential is mounted at.
    pub fn pem_path(&self, pem: &str) -> String {
        format!("{}{}", self.mount_path, self.naming.file_name(pem))
    }
}
