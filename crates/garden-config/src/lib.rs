//! Garden Config
//!
//! This crate contains the serializable import configuration of a virtual
//! garden deployment: the hosting cluster, the etcd and kube-apiserver
//! settings and the named infrastructure credentials.
//!
//! Configuration can be loaded from YAML or JSON files via
//! [`Imports::from_path`], and is checked by [`validate_imports`] before any
//! operation runs.

mod error;
mod imports;
mod provider;
mod validation;

pub use error::ConfigError;
pub use imports::{
  AuditWebhookConfig, Credentials, Etcd, EtcdBackup, GardenerControlplane, HostingCluster, Imports,
  KubeApiServer, KubeApiServerExposure, Sni, VirtualGarden,
};
pub use provider::{InfrastructureProvider, StorageClassConfiguration};
pub use validation::{FieldError, FieldErrorKind, validate_imports};
