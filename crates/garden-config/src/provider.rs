use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Infrastructure the hosting cluster runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfrastructureProvider {
  Aws,
  Gcp,
  Alicloud,
}

/// Provisioner and parameters of the storage class backing etcd volumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageClassConfiguration {
  pub provisioner: String,
  pub parameters: BTreeMap<String, String>,
}

impl InfrastructureProvider {
  pub const ALL: [InfrastructureProvider; 3] = [
    InfrastructureProvider::Aws,
    InfrastructureProvider::Gcp,
    InfrastructureProvider::Alicloud,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      InfrastructureProvider::Aws => "aws",
      InfrastructureProvider::Gcp => "gcp",
      InfrastructureProvider::Alicloud => "alicloud",
    }
  }

  pub fn storage_class_configuration(&self) -> StorageClassConfiguration {
    let (provisioner, parameters): (&str, &[(&str, &str)]) = match self {
      InfrastructureProvider::Aws => (
        "kubernetes.io/aws-ebs",
        &[("type", "gp2"), ("encrypted", "true")],
      ),
      InfrastructureProvider::Gcp => ("kubernetes.io/gce-pd", &[("type", "pd-ssd")]),
      InfrastructureProvider::Alicloud => {
        ("diskplugin.csi.alibabacloud.com", &[("type", "cloud_ssd")])
      }
    };

    StorageClassConfiguration {
      provisioner: provisioner.to_string(),
      parameters: parameters
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    }
  }
}

impl fmt::Display for InfrastructureProvider {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for InfrastructureProvider {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|p| p.as_str() == s)
      .ok_or_else(|| ConfigError::UnsupportedProvider(s.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_provider() {
    assert_eq!("aws".parse::<InfrastructureProvider>().unwrap(), InfrastructureProvider::Aws);
    assert!(matches!(
      "openstack".parse::<InfrastructureProvider>(),
      Err(ConfigError::UnsupportedProvider(p)) if p == "openstack"
    ));
  }

  #[test]
  fn test_aws_storage_class() {
    let config = InfrastructureProvider::Aws.storage_class_configuration();
    assert_eq!(config.provisioner, "kubernetes.io/aws-ebs");
    assert_eq!(config.parameters.get("type").map(String::as_str), Some("gp2"));
    assert_eq!(config.parameters.get("encrypted").map(String::as_str), Some("true"));
  }
}
