//! This crate models the automation config document which is consumed by the
//! MongoDB agents, and the [`Modification`]s which are folded onto it.
//!
//! Builders never touch the document directly. Instead they resolve all their
//! inputs upfront and return a [`Modification`], which an orchestrator later
//! applies. Applying a modification can't fail and performs no I/O.
//!
//! ```
//! use stackable_automation_config::{AutomationConfig, Modification, Modifications, Noop};
//!
//! let mut modifications = Modifications::new();
//! modifications.push(Noop);
//! modifications.push(|config: &mut AutomationConfig| config.version += 1);
//!
//! let mut config = AutomationConfig::default();
//! modifications.apply_to(&mut config);
//!
//! assert_eq!(config.version, 1);
//! ```
mod config;
mod modification;

pub use config::{
    AutomationConfig, DEFAULT_PROMETHEUS_LISTEN_ADDRESS, DEFAULT_PROMETHEUS_METRICS_PATH,
    DEFAULT_PROMETHEUS_MODE, Prometheus, Scheme,
};
pub use modification::{BoxedModification, Modification, Modifications, Noop};
