use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::validation::validate_imports;

/// Import configuration of a virtual garden deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Imports {
  pub hosting_cluster: HostingCluster,
  #[serde(default)]
  pub virtual_garden: VirtualGarden,
  /// Named infrastructure credentials, referenced by e.g. the etcd backup.
  #[serde(default)]
  pub credentials: BTreeMap<String, Credentials>,
}

/// The cluster hosting the virtual garden control plane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostingCluster {
  #[serde(default)]
  pub kubeconfig: String,
  #[serde(default)]
  pub namespace: String,
  #[serde(default)]
  pub infrastructure_provider: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualGarden {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub etcd: Option<Etcd>,
  #[serde(default, rename = "kubeAPIServer", skip_serializing_if = "Option::is_none")]
  pub kube_api_server: Option<KubeApiServer>,
  /// Delete the hosting namespace when the virtual garden is deleted.
  #[serde(default)]
  pub delete_namespace: bool,
  #[serde(default)]
  pub priority_class_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Etcd {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub storage_class_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub backup: Option<EtcdBackup>,
  #[serde(default, rename = "handleETCDPersistentVolumes")]
  pub handle_etcd_persistent_volumes: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcdBackup {
  #[serde(default)]
  pub infrastructure_provider: String,
  #[serde(default)]
  pub region: String,
  #[serde(default)]
  pub bucket_name: String,
  #[serde(default)]
  pub credentials_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeApiServer {
  #[serde(default = "default_replicas")]
  pub replicas: u32,
  #[serde(default)]
  pub dns_access_domain: String,
  #[serde(default)]
  pub gardener_controlplane: GardenerControlplane,
  #[serde(default)]
  pub audit_webhook_config: AuditWebhookConfig,
  #[serde(default)]
  pub audit_webhook_batch_max_size: String,
  #[serde(default, rename = "eventTTL", skip_serializing_if = "Option::is_none")]
  pub event_ttl: Option<String>,
  #[serde(default, rename = "oidcIssuerURL", skip_serializing_if = "Option::is_none")]
  pub oidc_issuer_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exposure: Option<KubeApiServerExposure>,
}

fn default_replicas() -> u32 {
  1
}

impl Default for KubeApiServer {
  fn default() -> Self {
    Self {
      replicas: default_replicas(),
      dns_access_domain: String::new(),
      gardener_controlplane: GardenerControlplane::default(),
      audit_webhook_config: AuditWebhookConfig::default(),
      audit_webhook_batch_max_size: String::new(),
      event_ttl: None,
      oidc_issuer_url: None,
      exposure: None,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GardenerControlplane {
  #[serde(default)]
  pub validating_webhook_enabled: bool,
  #[serde(default)]
  pub mutating_webhook_enabled: bool,
}

impl GardenerControlplane {
  pub fn any_webhook_enabled(&self) -> bool {
    self.validating_webhook_enabled || self.mutating_webhook_enabled
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditWebhookConfig {
  /// Raw kubeconfig of the audit webhook backend. Empty disables it.
  #[serde(default)]
  pub config: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KubeApiServerExposure {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sni: Option<Sni>,
}

/// Server name indication settings for exposing the kube-apiserver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sni {
  #[serde(default)]
  pub hostnames: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dns_class: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ttl: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
  /// Infrastructure provider the credentials belong to.
  #[serde(default, rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub data: BTreeMap<String, String>,
}

impl Imports {
  /// Parse imports from a file, picking the format by extension.
  ///
  /// `.json` files are parsed as JSON, everything else as YAML.
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;

    if path.extension().is_some_and(|ext| ext == "json") {
      serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
      })
    } else {
      serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
      })
    }
  }

  /// Parse and validate imports from a file.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let imports = Self::from_path(path)?;
    let errors = validate_imports(&imports);
    if !errors.is_empty() {
      return Err(ConfigError::Invalid { errors });
    }
    Ok(imports)
  }

  /// The kube-apiserver settings, or defaults when none are configured.
  pub fn kube_api_server(&self) -> KubeApiServer {
    self.virtual_garden.kube_api_server.clone().unwrap_or_default()
  }

  /// The etcd backup settings, if a backup is configured.
  pub fn etcd_backup(&self) -> Option<&EtcdBackup> {
    self.virtual_garden.etcd.as_ref()?.backup.as_ref()
  }
}
