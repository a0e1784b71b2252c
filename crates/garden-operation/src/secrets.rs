//! Secrets mounted by the kube-apiserver.
//!
//! The basic auth password and the encryption key are generated on first
//! deploy and carried forward afterwards. Every written secret has its
//! fingerprint recorded so the deployment rolls when the content changes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use garden_config::KubeApiServer;
use garden_flow::{TaskContext, TaskError};
use garden_reconcile::{
  BoxError, SecretSource, delete_all, ensure_data, generate_key, generate_password, reconcile,
};
use garden_store::{Object, ResourceKind};
use serde_json::json;
use tracing::debug;

use crate::names::{
  CHECKSUM_KEY_ADMISSION_KUBECONFIG, CHECKSUM_KEY_AUDIT_WEBHOOK_CONFIG, CHECKSUM_KEY_BASIC_AUTH,
  CHECKSUM_KEY_ENCRYPTION_CONFIG, DATA_KEY_AUDIT_WEBHOOK_CONFIG, DATA_KEY_BASIC_AUTH,
  DATA_KEY_ENCRYPTION_CONFIG, DATA_KEY_MUTATING_WEBHOOK, DATA_KEY_VALIDATING_WEBHOOK,
  SECRET_NAME_ADMISSION_KUBECONFIG, SECRET_NAME_AUDIT_WEBHOOK_CONFIG, SECRET_NAME_BASIC_AUTH,
  SECRET_NAME_ENCRYPTION_CONFIG,
};
use crate::operation::{RunContext, labels};

const VALIDATING_WEBHOOK_KUBECONFIG: &str =
  include_str!("../resources/validating-webhook-kubeconfig.yaml");
const MUTATING_WEBHOOK_KUBECONFIG: &str =
  include_str!("../resources/mutating-webhook-kubeconfig.yaml");

const PASSWORD_LENGTH: usize = 32;
const ENCRYPTION_KEY_LENGTH: usize = 32;

const SECRET_NAMES: [&str; 4] = [
  SECRET_NAME_ADMISSION_KUBECONFIG,
  SECRET_NAME_AUDIT_WEBHOOK_CONFIG,
  SECRET_NAME_BASIC_AUTH,
  SECRET_NAME_ENCRYPTION_CONFIG,
];

pub(crate) async fn deploy(ctx: TaskContext<RunContext>) -> Result<(), TaskError> {
  let op = &ctx.state;
  let api = op.imports.kube_api_server();

  ctx.check_cancelled()?;
  deploy_admission_kubeconfig(op, &api).await?;
  ctx.check_cancelled()?;
  deploy_audit_webhook_config(op, &api).await?;
  ctx.check_cancelled()?;
  deploy_basic_auth(op).await?;
  ctx.check_cancelled()?;
  deploy_encryption_config(op).await
}

pub(crate) async fn delete(ctx: TaskContext<RunContext>) -> Result<(), TaskError> {
  ctx.check_cancelled()?;
  let op = &ctx.state;
  let identities: Vec<_> = SECRET_NAMES
    .iter()
    .map(|name| op.identity(ResourceKind::Secret, *name))
    .collect();
  delete_all(op.store.as_ref(), &identities)
    .await
    .map_err(TaskError::failed)
}

/// Reconcile one secret and record its fingerprint under `checksum_key`.
async fn write_secret<F>(
  op: &RunContext,
  name: &str,
  checksum_key: &str,
  mutate: F,
) -> Result<(), TaskError>
where
  F: FnOnce(&mut Object) -> Result<(), BoxError>,
{
  let id = op.identity(ResourceKind::Secret, name);
  let reconciled = reconcile(op.store.as_ref(), &id, |secret| {
    secret.labels.extend(labels("kube-apiserver"));
    mutate(secret)
  })
  .await
  .map_err(TaskError::failed)?;

  op.record_checksum(checksum_key, &reconciled.object);
  Ok(())
}

async fn deploy_admission_kubeconfig(
  op: &RunContext,
  api: &KubeApiServer,
) -> Result<(), TaskError> {
  if !api.gardener_controlplane.any_webhook_enabled() {
    debug!(secret = SECRET_NAME_ADMISSION_KUBECONFIG, "secret_disabled");
    return Ok(());
  }

  write_secret(
    op,
    SECRET_NAME_ADMISSION_KUBECONFIG,
    CHECKSUM_KEY_ADMISSION_KUBECONFIG,
    |secret| {
      secret.set_data(DATA_KEY_VALIDATING_WEBHOOK, VALIDATING_WEBHOOK_KUBECONFIG);
      secret.set_data(DATA_KEY_MUTATING_WEBHOOK, MUTATING_WEBHOOK_KUBECONFIG);
      Ok(())
    },
  )
  .await
}

async fn deploy_audit_webhook_config(
  op: &RunContext,
  api: &KubeApiServer,
) -> Result<(), TaskError> {
  let config = &api.audit_webhook_config.config;
  if config.is_empty() {
    debug!(secret = SECRET_NAME_AUDIT_WEBHOOK_CONFIG, "secret_disabled");
    return Ok(());
  }

  write_secret(
    op,
    SECRET_NAME_AUDIT_WEBHOOK_CONFIG,
    CHECKSUM_KEY_AUDIT_WEBHOOK_CONFIG,
    |secret| {
      secret.set_data(DATA_KEY_AUDIT_WEBHOOK_CONFIG, config.as_str());
      Ok(())
    },
  )
  .await
}

async fn deploy_basic_auth(op: &RunContext) -> Result<(), TaskError> {
  let source = op.secrets.as_ref();
  write_secret(op, SECRET_NAME_BASIC_AUTH, CHECKSUM_KEY_BASIC_AUTH, |secret| {
    ensure_data(secret, DATA_KEY_BASIC_AUTH, || {
      let password = generate_password(source, PASSWORD_LENGTH)?;
      Ok(format!("{password},admin,admin,system:masters").into_bytes())
    })?;
    Ok(())
  })
  .await
}

async fn deploy_encryption_config(op: &RunContext) -> Result<(), TaskError> {
  let source = op.secrets.as_ref();
  write_secret(
    op,
    SECRET_NAME_ENCRYPTION_CONFIG,
    CHECKSUM_KEY_ENCRYPTION_CONFIG,
    |secret| {
      ensure_data(secret, DATA_KEY_ENCRYPTION_CONFIG, || {
        encryption_configuration(source)
      })?;
      Ok(())
    },
  )
  .await
}

/// Encryption configuration for secrets: AES-CBC with a fresh 32-byte key,
/// falling back to identity so existing plaintext secrets stay readable.
pub(crate) fn encryption_configuration(source: &dyn SecretSource) -> Result<Vec<u8>, BoxError> {
  let key = generate_key(source, ENCRYPTION_KEY_LENGTH)?;
  let config = json!({
    "apiVersion": "apiserver.config.k8s.io/v1",
    "kind": "EncryptionConfiguration",
    "resources": [{
      "resources": ["secrets"],
      "providers": [
        { "aescbc": { "keys": [{ "name": "key", "secret": STANDARD.encode(key) }] } },
        { "identity": {} },
      ],
    }],
  });
  Ok(serde_yaml::to_string(&config)?.into_bytes())
}
