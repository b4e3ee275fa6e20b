//! Builds the automation config [`Modification`]s of the MongoDB community
//! operator which depend on user supplied secrets.
//!
//! Every builder reads what it needs through a [`SecretAccessor`] and either
//! fails, or returns a modification which can later be applied without any
//! further I/O.
//!
//! [`Modification`]: stackable_automation_config::Modification
//! [`SecretAccessor`]: secret::SecretAccessor

pub mod crd;
pub mod logging;
pub mod prometheus;
pub mod secret;
pub mod tls;

// External re-exports
pub use k8s_openapi;
pub use kube;
pub use schemars;
// Internal re-exports
pub use stackable_automation_config as automation_config;
