//! Field-level validation of [`Imports`].

use std::fmt;

use crate::imports::{Etcd, Imports, Sni};
use crate::provider::InfrastructureProvider;

const SNI_TTL_RANGE: std::ops::RangeInclusive<i32> = 60..=600;
const DNS1123_LABEL_MAX_LEN: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
  Required,
  NotSupported,
  Invalid,
}

impl FieldErrorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      FieldErrorKind::Required => "Required value",
      FieldErrorKind::NotSupported => "Unsupported value",
      FieldErrorKind::Invalid => "Invalid value",
    }
  }
}

/// A single validation failure, addressed by its dotted field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
  pub kind: FieldErrorKind,
  pub field: String,
  pub detail: String,
}

impl FieldError {
  fn required(field: impl Into<String>, detail: impl Into<String>) -> Self {
    Self {
      kind: FieldErrorKind::Required,
      field: field.into(),
      detail: detail.into(),
    }
  }

  fn not_supported(field: impl Into<String>, value: &str) -> Self {
    let supported: Vec<&str> = InfrastructureProvider::ALL.iter().map(|p| p.as_str()).collect();
    Self {
      kind: FieldErrorKind::NotSupported,
      field: field.into(),
      detail: format!("{value:?}, supported values: {}", supported.join(", ")),
    }
  }

  fn invalid(field: impl Into<String>, detail: impl Into<String>) -> Self {
    Self {
      kind: FieldErrorKind::Invalid,
      field: field.into(),
      detail: detail.into(),
    }
  }
}

impl fmt::Display for FieldError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}: {}", self.field, self.kind.as_str(), self.detail)
  }
}

/// Validate imports, returning every failure found. Empty means valid.
pub fn validate_imports(imports: &Imports) -> Vec<FieldError> {
  let mut errors = Vec::new();
  validate_hosting_cluster(imports, &mut errors);

  if let Some(etcd) = &imports.virtual_garden.etcd {
    validate_etcd(etcd, imports, &mut errors);
  }
  if let Some(sni) = imports
    .virtual_garden
    .kube_api_server
    .as_ref()
    .and_then(|k| k.exposure.as_ref())
    .and_then(|e| e.sni.as_ref())
  {
    validate_sni(sni, &mut errors);
  }

  for (name, credentials) in &imports.credentials {
    let path = format!("credentials.{name}");
    if credentials.kind.is_empty() {
      errors.push(FieldError::required(format!("{path}.type"), "type is required"));
    }
    if credentials.data.is_empty() {
      errors.push(FieldError::required(format!("{path}.data"), "data is required"));
    }
  }

  errors
}

fn validate_hosting_cluster(imports: &Imports, errors: &mut Vec<FieldError>) {
  let cluster = &imports.hosting_cluster;
  if cluster.kubeconfig.is_empty() {
    errors.push(FieldError::required(
      "hostingCluster.kubeconfig",
      "kubeconfig is required",
    ));
  }
  if cluster.namespace.is_empty() {
    errors.push(FieldError::required(
      "hostingCluster.namespace",
      "namespace is required",
    ));
  } else if !is_dns1123_label(&cluster.namespace) {
    errors.push(FieldError::invalid(
      "hostingCluster.namespace",
      dns1123_label_detail(&cluster.namespace),
    ));
  }
  if cluster
    .infrastructure_provider
    .parse::<InfrastructureProvider>()
    .is_err()
  {
    errors.push(FieldError::not_supported(
      "hostingCluster.infrastructureProvider",
      &cluster.infrastructure_provider,
    ));
  }
}

fn validate_etcd(etcd: &Etcd, imports: &Imports, errors: &mut Vec<FieldError>) {
  if etcd.storage_class_name.as_deref() == Some("") {
    errors.push(FieldError::required(
      "virtualGarden.etcd.storageClassName",
      "storage class name must not be empty when set",
    ));
  }

  let Some(backup) = &etcd.backup else {
    return;
  };
  let path = "virtualGarden.etcd.backup";

  let provider = backup.infrastructure_provider.parse::<InfrastructureProvider>();
  if provider.is_err() {
    errors.push(FieldError::not_supported(
      format!("{path}.infrastructureProvider"),
      &backup.infrastructure_provider,
    ));
  }
  if backup.region.is_empty() {
    errors.push(FieldError::required(format!("{path}.region"), "region is required"));
  }
  if backup.bucket_name.is_empty() {
    errors.push(FieldError::required(
      format!("{path}.bucketName"),
      "bucket name is required",
    ));
  } else if !is_dns1123_label(&backup.bucket_name) {
    errors.push(FieldError::invalid(
      format!("{path}.bucketName"),
      dns1123_label_detail(&backup.bucket_name),
    ));
  }

  if backup.credentials_ref.is_empty() {
    errors.push(FieldError::required(
      format!("{path}.credentialsRef"),
      "credentials ref is required",
    ));
    return;
  }
  match imports.credentials.get(&backup.credentials_ref) {
    None => errors.push(FieldError::invalid(
      format!("{path}.credentialsRef"),
      format!("no credentials named {:?}", backup.credentials_ref),
    )),
    Some(credentials) if credentials.kind != backup.infrastructure_provider => {
      errors.push(FieldError::invalid(
        format!("{path}.credentialsRef"),
        format!(
          "credentials {:?} are of type {:?}, backup requires {:?}",
          backup.credentials_ref, credentials.kind, backup.infrastructure_provider
        ),
      ))
    }
    Some(_) => {}
  }
}

fn validate_sni(sni: &Sni, errors: &mut Vec<FieldError>) {
  let path = "virtualGarden.exposure.sni";
  if sni.hostnames.is_empty() {
    errors.push(FieldError::required(
      format!("{path}.hostnames"),
      "at least one hostname is required",
    ));
  }
  if let Some(ttl) = sni.ttl.filter(|ttl| !SNI_TTL_RANGE.contains(ttl)) {
    errors.push(FieldError::invalid(
      format!("{path}.ttl"),
      format!(
        "ttl {ttl} must be between {} and {}",
        SNI_TTL_RANGE.start(),
        SNI_TTL_RANGE.end()
      ),
    ));
  }
}

/// Lowercase alphanumerics and '-', starting and ending alphanumeric.
fn is_dns1123_label(value: &str) -> bool {
  let bytes = value.as_bytes();
  let alphanumeric = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
  match (bytes.first(), bytes.last()) {
    (Some(first), Some(last)) => {
      bytes.len() <= DNS1123_LABEL_MAX_LEN
        && alphanumeric(first)
        && alphanumeric(last)
        && bytes.iter().all(|b| alphanumeric(b) || *b == b'-')
    }
    _ => false,
  }
}

fn dns1123_label_detail(value: &str) -> String {
  format!(
    "{value:?} must be a DNS-1123 label of at most {DNS1123_LABEL_MAX_LEN} lowercase \
     alphanumeric characters or '-', starting and ending with an alphanumeric character"
  )
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;
  use crate::imports::{
    Credentials, EtcdBackup, HostingCluster, KubeApiServer, KubeApiServerExposure, VirtualGarden,
  };

  fn valid() -> Imports {
    Imports {
      hosting_cluster: HostingCluster {
        kubeconfig: "abc".into(),
        namespace: "foo".into(),
        infrastructure_provider: "gcp".into(),
      },
      virtual_garden: VirtualGarden {
        etcd: Some(Etcd {
          backup: Some(EtcdBackup {
            infrastructure_provider: "gcp".into(),
            region: "foo".into(),
            bucket_name: "bar".into(),
            credentials_ref: "baz".into(),
          }),
          ..Default::default()
        }),
        ..Default::default()
      },
      credentials: BTreeMap::from([(
        "baz".to_string(),
        Credentials {
          kind: "gcp".into(),
          data: BTreeMap::from([("foo".to_string(), "bar".to_string())]),
        },
      )]),
    }
  }

  fn fields(errors: &[FieldError]) -> Vec<(FieldErrorKind, &str)> {
    let mut fields: Vec<_> = errors.iter().map(|e| (e.kind, e.field.as_str())).collect();
    fields.sort_by(|a, b| a.1.cmp(b.1));
    fields
  }

  fn with_sni(imports: &mut Imports, sni: Option<Sni>) {
    imports.virtual_garden.kube_api_server = Some(KubeApiServer {
      exposure: Some(KubeApiServerExposure { sni }),
      ..Default::default()
    });
  }

  #[test]
  fn test_valid_configuration() {
    assert!(validate_imports(&valid()).is_empty());
  }

  #[test]
  fn test_hosting_cluster_required_fields() {
    let mut imports = valid();
    imports.hosting_cluster = HostingCluster::default();

    assert_eq!(
      fields(&validate_imports(&imports)),
      vec![
        (FieldErrorKind::NotSupported, "hostingCluster.infrastructureProvider"),
        (FieldErrorKind::Required, "hostingCluster.kubeconfig"),
        (FieldErrorKind::Required, "hostingCluster.namespace"),
      ]
    );
  }

  #[test]
  fn test_namespace_must_be_dns_label() {
    for namespace in ["../escaped", "_cluster", "Garden", "-garden", "garden-", "a.b"] {
      let mut imports = valid();
      imports.hosting_cluster.namespace = namespace.into();
      assert_eq!(
        fields(&validate_imports(&imports)),
        vec![(FieldErrorKind::Invalid, "hostingCluster.namespace")],
        "namespace {namespace:?}"
      );
    }

    let mut imports = valid();
    imports.hosting_cluster.namespace = "a".repeat(64);
    assert_eq!(
      fields(&validate_imports(&imports)),
      vec![(FieldErrorKind::Invalid, "hostingCluster.namespace")]
    );

    imports.hosting_cluster.namespace = "garden-1".into();
    assert!(validate_imports(&imports).is_empty());
  }

  #[test]
  fn test_bucket_name_must_be_dns_label() {
    for bucket in ["../../../escaped", "..", "Bucket", "bucket/name"] {
      let mut imports = valid();
      imports.virtual_garden.etcd.as_mut().unwrap().backup.as_mut().unwrap().bucket_name =
        bucket.into();
      assert_eq!(
        fields(&validate_imports(&imports)),
        vec![(FieldErrorKind::Invalid, "virtualGarden.etcd.backup.bucketName")],
        "bucket {bucket:?}"
      );
    }
  }

  #[test]
  fn test_empty_etcd_settings_pass() {
    let mut imports = valid();
    imports.virtual_garden.etcd = Some(Etcd::default());
    assert!(validate_imports(&imports).is_empty());
  }

  #[test]
  fn test_invalid_etcd_settings() {
    let mut imports = valid();
    imports.virtual_garden.etcd = Some(Etcd {
      storage_class_name: Some(String::new()),
      backup: Some(EtcdBackup::default()),
      ..Default::default()
    });

    assert_eq!(
      fields(&validate_imports(&imports)),
      vec![
        (FieldErrorKind::Required, "virtualGarden.etcd.backup.bucketName"),
        (FieldErrorKind::Required, "virtualGarden.etcd.backup.credentialsRef"),
        (FieldErrorKind::NotSupported, "virtualGarden.etcd.backup.infrastructureProvider"),
        (FieldErrorKind::Required, "virtualGarden.etcd.backup.region"),
        (FieldErrorKind::Required, "virtualGarden.etcd.storageClassName"),
      ]
    );
  }

  #[test]
  fn test_unknown_credentials_ref() {
    let mut imports = valid();
    imports.virtual_garden.etcd.as_mut().unwrap().backup.as_mut().unwrap().credentials_ref =
      "baz2".into();

    assert_eq!(
      fields(&validate_imports(&imports)),
      vec![(FieldErrorKind::Invalid, "virtualGarden.etcd.backup.credentialsRef")]
    );
  }

  #[test]
  fn test_credentials_ref_of_other_type() {
    let mut imports = valid();
    imports.virtual_garden.etcd.as_mut().unwrap().backup.as_mut().unwrap().credentials_ref =
      "wrong".into();
    imports.credentials.insert(
      "wrong".into(),
      Credentials {
        kind: "type".into(),
        data: BTreeMap::from([("foo".to_string(), "bar".to_string())]),
      },
    );

    assert_eq!(
      fields(&validate_imports(&imports)),
      vec![(FieldErrorKind::Invalid, "virtualGarden.etcd.backup.credentialsRef")]
    );
  }

  #[test]
  fn test_sni_absent_or_valid_passes() {
    let mut imports = valid();
    with_sni(&mut imports, None);
    assert!(validate_imports(&imports).is_empty());

    with_sni(
      &mut imports,
      Some(Sni {
        hostnames: vec!["foo.com".into()],
        dns_class: Some("bar".into()),
        ttl: Some(62),
      }),
    );
    assert!(validate_imports(&imports).is_empty());
  }

  #[test]
  fn test_invalid_sni() {
    for ttl in [42, 1000] {
      let mut imports = valid();
      with_sni(
        &mut imports,
        Some(Sni {
          ttl: Some(ttl),
          ..Default::default()
        }),
      );

      assert_eq!(
        fields(&validate_imports(&imports)),
        vec![
          (FieldErrorKind::Required, "virtualGarden.exposure.sni.hostnames"),
          (FieldErrorKind::Invalid, "virtualGarden.exposure.sni.ttl"),
        ],
        "ttl {ttl}"
      );
    }
  }

  #[test]
  fn test_sni_ttl_bounds_are_inclusive() {
    for ttl in [60, 600] {
      let mut imports = valid();
      with_sni(
        &mut imports,
        Some(Sni {
          hostnames: vec!["foo.com".into()],
          ttl: Some(ttl),
          ..Default::default()
        }),
      );
      assert!(validate_imports(&imports).is_empty(), "ttl {ttl}");
    }
  }

  #[test]
  fn test_empty_credentials_entry() {
    let mut imports = valid();
    imports.credentials.insert("foo".into(), Credentials::default());

    assert_eq!(
      fields(&validate_imports(&imports)),
      vec![
        (FieldErrorKind::Required, "credentials.foo.data"),
        (FieldErrorKind::Required, "credentials.foo.type"),
      ]
    );
  }

  #[test]
  fn test_field_error_display() {
    let error = FieldError::required("hostingCluster.namespace", "namespace is required");
    assert_eq!(
      error.to_string(),
      "hostingCluster.namespace: Required value: namespace is required"
    );
  }
}
