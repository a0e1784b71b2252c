//! Loading imports from YAML and JSON files.

use std::io::Write;

use garden_config::{ConfigError, FieldErrorKind, Imports, InfrastructureProvider};
use tempfile::NamedTempFile;

const IMPORTS_YAML: &str = r#"
hostingCluster:
  kubeconfig: "apiVersion: v1"
  namespace: garden
  infrastructureProvider: aws
virtualGarden:
  deleteNamespace: true
  priorityClassName: garden-critical
  etcd:
    handleETCDPersistentVolumes: true
    backup:
      infrastructureProvider: aws
      region: eu-west-1
      bucketName: garden-backup
      credentialsRef: backup
  kubeAPIServer:
    replicas: 3
    dnsAccessDomain: garden.example.com
    gardenerControlplane:
      validatingWebhookEnabled: true
    auditWebhookConfig:
      config: "kind: Config"
    eventTTL: 24h
    oidcIssuerURL: https://issuer.example.com
    exposure:
      sni:
        hostnames: [api.garden.example.com]
        ttl: 120
credentials:
  backup:
    type: aws
    data:
      accessKeyID: id
      secretAccessKey: secret
"#;

fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
  let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
  file.write_all(content.as_bytes()).unwrap();
  file
}

#[test]
fn test_load_yaml() {
  let file = write_temp(".yaml", IMPORTS_YAML);
  let imports = Imports::load(file.path()).unwrap();

  assert_eq!(imports.hosting_cluster.namespace, "garden");
  assert!(imports.virtual_garden.delete_namespace);

  let etcd = imports.virtual_garden.etcd.as_ref().unwrap();
  assert!(etcd.handle_etcd_persistent_volumes);
  assert_eq!(imports.etcd_backup().unwrap().bucket_name, "garden-backup");

  let api = imports.kube_api_server();
  assert_eq!(api.replicas, 3);
  assert!(api.gardener_controlplane.validating_webhook_enabled);
  assert!(!api.gardener_controlplane.mutating_webhook_enabled);
  assert_eq!(api.event_ttl.as_deref(), Some("24h"));
  assert_eq!(api.exposure.unwrap().sni.unwrap().ttl, Some(120));

  assert_eq!(imports.credentials["backup"].kind, "aws");
  assert_eq!(
    imports.hosting_cluster.infrastructure_provider.parse::<InfrastructureProvider>().unwrap(),
    InfrastructureProvider::Aws
  );
}

#[test]
fn test_load_json() {
  let file = write_temp(
    ".json",
    r#"{
      "hostingCluster": {
        "kubeconfig": "apiVersion: v1",
        "namespace": "garden",
        "infrastructureProvider": "gcp"
      }
    }"#,
  );
  let imports = Imports::load(file.path()).unwrap();

  assert_eq!(imports.hosting_cluster.infrastructure_provider, "gcp");
  assert!(imports.virtual_garden.etcd.is_none());
  assert_eq!(imports.kube_api_server().replicas, 1);
  assert!(imports.credentials.is_empty());
}

#[test]
fn test_load_rejects_invalid_imports() {
  let file = write_temp(
    ".yaml",
    "hostingCluster:\n  namespace: garden\n  infrastructureProvider: openstack\n",
  );

  let Err(ConfigError::Invalid { errors }) = Imports::load(file.path()) else {
    panic!("expected validation errors");
  };
  let mut kinds: Vec<_> = errors.iter().map(|e| (e.field.as_str(), e.kind)).collect();
  kinds.sort_by(|a, b| a.0.cmp(b.0));
  assert_eq!(
    kinds,
    vec![
      ("hostingCluster.infrastructureProvider", FieldErrorKind::NotSupported),
      ("hostingCluster.kubeconfig", FieldErrorKind::Required),
    ]
  );

  // Parsing alone does not validate.
  assert!(Imports::from_path(file.path()).is_ok());
}

#[test]
fn test_load_reports_parse_errors() {
  let file = write_temp(".yaml", "hostingCluster: [not, a, map]\n");
  assert!(matches!(
    Imports::from_path(file.path()),
    Err(ConfigError::Yaml { .. })
  ));

  let file = write_temp(".json", "{ not json");
  assert!(matches!(
    Imports::from_path(file.path()),
    Err(ConfigError::Json { .. })
  ));
}

#[test]
fn test_load_missing_file() {
  let dir = tempfile::tempdir().unwrap();
  let err = Imports::from_path(dir.path().join("missing.yaml")).unwrap_err();
  assert!(matches!(err, ConfigError::Io { .. }));
}
