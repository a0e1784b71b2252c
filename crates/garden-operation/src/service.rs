use garden_flow::{TaskContext, TaskError};
use garden_reconcile::{delete_all, reconcile};
use garden_store::ResourceKind;
use serde_json::json;

use crate::names::SERVICE_NAME_KUBE_APISERVER;
use crate::operation::{RunContext, labels};

const ANNOTATION_DNS_NAMES: &str = "dns.gardener.cloud/dnsnames";
const ANNOTATION_DNS_TTL: &str = "dns.gardener.cloud/ttl";
const ANNOTATION_DNS_CLASS: &str = "dns.gardener.cloud/class";

/// Expose the kube-apiserver. With SNI configured, the service also carries
/// the DNS annotations for the SNI hostnames.
pub(crate) async fn deploy(ctx: TaskContext<RunContext>) -> Result<(), TaskError> {
  ctx.check_cancelled()?;
  let op = &ctx.state;
  let sni = op
    .imports
    .kube_api_server()
    .exposure
    .and_then(|exposure| exposure.sni);

  let id = op.identity(ResourceKind::Service, SERVICE_NAME_KUBE_APISERVER);
  reconcile(op.store.as_ref(), &id, |service| {
    service.labels.extend(labels("kube-apiserver"));

    for key in [ANNOTATION_DNS_NAMES, ANNOTATION_DNS_TTL, ANNOTATION_DNS_CLASS] {
      service.annotations.remove(key);
    }
    if let Some(sni) = &sni {
      service
        .annotations
        .insert(ANNOTATION_DNS_NAMES.to_string(), sni.hostnames.join(","));
      if let Some(ttl) = sni.ttl {
        service
          .annotations
          .insert(ANNOTATION_DNS_TTL.to_string(), ttl.to_string());
      }
      if let Some(class) = &sni.dns_class {
        service
          .annotations
          .insert(ANNOTATION_DNS_CLASS.to_string(), class.clone());
      }
    }

    service.spec = json!({
      "type": "LoadBalancer",
      "selector": labels("kube-apiserver"),
      "ports": [{ "name": "https", "port": 443, "targetPort": 443, "protocol": "TCP" }],
    });
    Ok(())
  })
  .await
  .map_err(TaskError::failed)?;
  Ok(())
}

pub(crate) async fn delete(ctx: TaskContext<RunContext>) -> Result<(), TaskError> {
  ctx.check_cancelled()?;
  let op = &ctx.state;
  delete_all(
    op.store.as_ref(),
    &[op.identity(ResourceKind::Service, SERVICE_NAME_KUBE_APISERVER)],
  )
  .await
  .map_err(TaskError::failed)
}
