//! Object names, label keys and checksum annotation keys.

/// Common prefix of all objects owned by the virtual garden.
pub const PREFIX: &str = "virtual-garden";

pub const LABEL_KEY_APP: &str = "app";
pub const LABEL_KEY_COMPONENT: &str = "component";
pub const LABEL_VALUE_ALLOWED: &str = "allowed";

pub const STORAGE_CLASS_NAME_ETCD: &str = "virtual-garden-etcd";
pub const SECRET_NAME_ETCD_BACKUP: &str = "virtual-garden-etcd-backup";

pub const ETCD_ROLE_MAIN: &str = "main";
pub const ETCD_ROLE_EVENTS: &str = "events";

pub const SERVICE_NAME_KUBE_APISERVER: &str = "virtual-garden-kube-apiserver";

pub const SECRET_NAME_ADMISSION_KUBECONFIG: &str =
  "virtual-garden-kube-apiserver-admission-kubeconfig";
pub const SECRET_NAME_AUDIT_WEBHOOK_CONFIG: &str = "kube-apiserver-audit-webhook-config";
pub const SECRET_NAME_BASIC_AUTH: &str = "virtual-garden-kube-apiserver-basic-auth";
pub const SECRET_NAME_ENCRYPTION_CONFIG: &str = "virtual-garden-kube-apiserver-encryption-config";

pub const DEPLOYMENT_NAME_KUBE_APISERVER: &str = "virtual-garden-kube-apiserver";
pub const DEPLOYMENT_NAME_KUBE_CONTROLLER_MANAGER: &str = "virtual-garden-kube-controller-manager";

pub const DATA_KEY_VALIDATING_WEBHOOK: &str = "validating-webhook";
pub const DATA_KEY_MUTATING_WEBHOOK: &str = "mutating-webhook";
pub const DATA_KEY_AUDIT_WEBHOOK_CONFIG: &str = "audit-webhook-config.yaml";
pub const DATA_KEY_BASIC_AUTH: &str = "basic_auth.csv";
pub const DATA_KEY_ENCRYPTION_CONFIG: &str = "encryption-config.yaml";

pub const CHECKSUM_KEY_ADMISSION_KUBECONFIG: &str =
  "checksum/secret-kube-apiserver-admission-kubeconfig";
pub const CHECKSUM_KEY_AUDIT_WEBHOOK_CONFIG: &str =
  "checksum/secret-kube-apiserver-audit-webhook-config";
pub const CHECKSUM_KEY_BASIC_AUTH: &str = "checksum/secret-kube-apiserver-basic-auth";
pub const CHECKSUM_KEY_ENCRYPTION_CONFIG: &str = "checksum/secret-kube-apiserver-encryption-config";

/// Checksums stamped onto the kube-apiserver pod template.
pub const KUBE_APISERVER_WATCHED_CHECKSUMS: &[&str] = &[
  CHECKSUM_KEY_ENCRYPTION_CONFIG,
  CHECKSUM_KEY_AUDIT_WEBHOOK_CONFIG,
  CHECKSUM_KEY_BASIC_AUTH,
  CHECKSUM_KEY_ADMISSION_KUBECONFIG,
];

/// Task names of the deploy graph.
pub mod deploy {
  pub const NAMESPACE: &str = "deploy-namespace";
  pub const STORAGE_CLASS: &str = "deploy-storage-class";
  pub const BACKUP_BUCKET: &str = "deploy-backup-bucket";
  pub const ETCD: &str = "deploy-etcd";
  pub const KUBE_APISERVER_SERVICE: &str = "deploy-kube-apiserver-service";
  pub const KUBE_APISERVER_SECRETS: &str = "deploy-kube-apiserver-secrets";
  pub const KUBE_APISERVER_DEPLOYMENT: &str = "deploy-kube-apiserver-deployment";
}

/// Task names of the delete graph.
pub mod delete {
  pub const KUBE_APISERVER_DEPLOYMENTS: &str = "delete-kube-apiserver-deployments";
  pub const KUBE_APISERVER_SECRETS: &str = "delete-kube-apiserver-secrets";
  pub const KUBE_APISERVER_SERVICE: &str = "delete-kube-apiserver-service";
  pub const ETCD: &str = "delete-etcd";
  pub const BACKUP_BUCKET: &str = "delete-backup-bucket";
  pub const NAMESPACE: &str = "delete-namespace";
}

/// Name of the statefulset of an etcd role.
pub fn etcd_name(role: &str) -> String {
  format!("{PREFIX}-etcd-{role}")
}

/// Name of the client service of an etcd role.
pub fn etcd_client_service(role: &str) -> String {
  format!("{PREFIX}-etcd-{role}-client")
}
